pub mod availability_slot;
pub mod booking;
pub mod inventory_item;
