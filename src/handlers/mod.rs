pub mod availability;
pub mod bookings;
pub mod dashboard;
pub mod inventory;
pub mod payment_webhooks;

use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{Allocator, BookingService, CatalogService, DashboardService, SlotStore};

/// All services, wired once at startup and shared through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub bookings: BookingService,
    pub dashboard: DashboardService,
    pub allocator: Allocator,
    pub slots: SlotStore,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let allocator = Allocator::new(
            db.clone(),
            Duration::from_millis(config.allocation_lock_wait_ms),
            event_sender.clone(),
        );
        let catalog = CatalogService::new(
            db.clone(),
            config.service_fee_rate,
            config.default_tax_rate,
            event_sender.clone(),
        );
        let bookings = BookingService::new(
            db.clone(),
            allocator.clone(),
            catalog.clone(),
            event_sender,
        );
        let dashboard = DashboardService::new(db.clone());
        let slots = SlotStore::new(db);

        Self {
            catalog,
            bookings,
            dashboard,
            allocator,
            slots,
        }
    }
}

/// Shared list pagination query parameters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl PaginationParams {
    /// Page is 1-based; limit is capped to keep queries bounded.
    pub fn normalized(&self) -> (u64, u64) {
        (self.page.max(1), self.limit.clamp(1, 100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let params = PaginationParams { page: 0, limit: 5000 };
        assert_eq!(params.normalized(), (1, 100));

        let params = PaginationParams { page: 3, limit: 25 };
        assert_eq!(params.normalized(), (3, 25));
    }
}
