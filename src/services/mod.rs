pub mod allocator;
pub mod bookings;
pub mod catalog;
pub mod dashboard;
pub mod slots;

pub use allocator::Allocator;
pub use bookings::BookingService;
pub use catalog::CatalogService;
pub use dashboard::DashboardService;
pub use slots::SlotStore;
