//! Merchant dashboard aggregates. Occupancy is computed from the actual
//! slot calendar for the next 30 days rather than estimated.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::availability_slot::{self, Entity as SlotEntity};
use crate::entities::booking::{self, BookingStatus, Entity as BookingEntity};
use crate::entities::inventory_item::{self, Entity as InventoryEntity};
use crate::errors::ServiceError;

const OCCUPANCY_WINDOW_DAYS: u64 = 30;

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_listings: u64,
    pub active_listings: u64,
    pub total_bookings: u64,
    pub pending_bookings: u64,
    pub confirmed_bookings: u64,
    /// Sum of totals across confirmed, completed and refunded bookings
    pub total_revenue: Decimal,
    /// Share of slot-days sold out over the next 30 days, 0-100.
    /// Zero when the merchant has no slots in the window.
    pub occupancy_rate: f64,
    pub recent_bookings: Vec<booking::Model>,
}

#[derive(FromQueryResult)]
struct RevenueRow {
    total: Option<Decimal>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn stats(&self, merchant_id: Uuid) -> Result<DashboardStats, ServiceError> {
        let total_listings = InventoryEntity::find()
            .filter(inventory_item::Column::MerchantId.eq(merchant_id))
            .count(&*self.db)
            .await?;
        let active_listings = InventoryEntity::find()
            .filter(inventory_item::Column::MerchantId.eq(merchant_id))
            .filter(inventory_item::Column::IsActive.eq(true))
            .count(&*self.db)
            .await?;

        let total_bookings = BookingEntity::find()
            .filter(booking::Column::MerchantId.eq(merchant_id))
            .count(&*self.db)
            .await?;
        let pending_bookings = self
            .count_by_status(merchant_id, BookingStatus::Pending)
            .await?;
        let confirmed_bookings = self
            .count_by_status(merchant_id, BookingStatus::Confirmed)
            .await?;

        let revenue = BookingEntity::find()
            .select_only()
            .column_as(booking::Column::TotalAmount.sum(), "total")
            .filter(booking::Column::MerchantId.eq(merchant_id))
            .filter(booking::Column::Status.is_in([
                BookingStatus::Confirmed.as_str(),
                BookingStatus::Completed.as_str(),
                BookingStatus::Refunded.as_str(),
            ]))
            .into_model::<RevenueRow>()
            .one(&*self.db)
            .await?;
        let total_revenue = revenue.and_then(|row| row.total).unwrap_or(Decimal::ZERO);

        let occupancy_rate = self.occupancy(merchant_id).await?;

        let recent_bookings = BookingEntity::find()
            .filter(booking::Column::MerchantId.eq(merchant_id))
            .order_by_desc(booking::Column::CreatedAt)
            .limit(5)
            .all(&*self.db)
            .await?;

        Ok(DashboardStats {
            total_listings,
            active_listings,
            total_bookings,
            pending_bookings,
            confirmed_bookings,
            total_revenue,
            occupancy_rate,
            recent_bookings,
        })
    }

    async fn count_by_status(
        &self,
        merchant_id: Uuid,
        status: BookingStatus,
    ) -> Result<u64, ServiceError> {
        let count = BookingEntity::find()
            .filter(booking::Column::MerchantId.eq(merchant_id))
            .filter(booking::Column::Status.eq(status.as_str()))
            .count(&*self.db)
            .await?;
        Ok(count)
    }

    /// Sold-out slot-days over total slot-days in the upcoming window.
    async fn occupancy(&self, merchant_id: Uuid) -> Result<f64, ServiceError> {
        let item_ids: Vec<Uuid> = InventoryEntity::find()
            .filter(inventory_item::Column::MerchantId.eq(merchant_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();
        if item_ids.is_empty() {
            return Ok(0.0);
        }

        let today = Utc::now().date_naive();
        let window_end = today + chrono::Days::new(OCCUPANCY_WINDOW_DAYS);

        let total_slots = SlotEntity::find()
            .filter(availability_slot::Column::InventoryId.is_in(item_ids.clone()))
            .filter(availability_slot::Column::Date.gte(today))
            .filter(availability_slot::Column::Date.lt(window_end))
            .count(&*self.db)
            .await?;
        if total_slots == 0 {
            return Ok(0.0);
        }

        let sold_out_slots = SlotEntity::find()
            .filter(availability_slot::Column::InventoryId.is_in(item_ids))
            .filter(availability_slot::Column::Date.gte(today))
            .filter(availability_slot::Column::Date.lt(window_end))
            .filter(availability_slot::Column::IsAvailable.eq(false))
            .count(&*self.db)
            .await?;

        Ok(sold_out_slots as f64 / total_slots as f64 * 100.0)
    }
}
