//! Inventory catalog: the read side of the marketplace (search, featured,
//! merchant listings) plus server-side quoting. Supplies stay policy
//! (`min_stay`/`max_stay`) and pricing to the booking path.

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::inventory_item::{self, Entity as InventoryEntity, ItemCategory};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::slots::{nights_in_range, SlotStore};

/// The financial breakdown of a booking. The ledger only accepts
/// breakdowns where `total = base + fee + tax - discount` holds exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FinancialBreakdown {
    pub base_amount: Decimal,
    pub service_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl FinancialBreakdown {
    pub fn is_consistent(&self) -> bool {
        self.base_amount + self.service_fee + self.tax_amount - self.discount_amount
            == self.total_amount
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    pub state: Option<String>,
    pub district: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateItemRequest {
    pub merchant_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    #[validate(length(min = 1, max = 50))]
    pub item_type: String,
    #[validate(length(min = 1, max = 50))]
    pub state: String,
    #[validate(length(min = 1, max = 100))]
    pub district: String,
    pub base_price: Decimal,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[validate(range(min = 1, max = 365))]
    pub min_stay: i32,
    pub max_stay: Option<i32>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    slots: SlotStore,
    service_fee_rate: Decimal,
    tax_rate: Decimal,
    event_sender: Option<Arc<EventSender>>,
}

impl CatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        service_fee_rate: f64,
        tax_rate: f64,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let slots = SlotStore::new(db.clone());
        Self {
            db,
            slots,
            // Rates are validated into [0, 1] by the config layer.
            service_fee_rate: Decimal::from_f64(service_fee_rate).unwrap_or(Decimal::ZERO),
            tax_rate: Decimal::from_f64(tax_rate).unwrap_or(Decimal::ZERO),
            event_sender,
        }
    }

    /// Fetches one item by id.
    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<inventory_item::Model, ServiceError> {
        InventoryEntity::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", item_id)))
    }

    /// Public search across active, verified listings, cheapest first.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        filters: SearchFilters,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let mut query = InventoryEntity::find()
            .filter(inventory_item::Column::IsActive.eq(true))
            .filter(inventory_item::Column::IsVerified.eq(true));

        if let Some(state) = &filters.state {
            query = query.filter(inventory_item::Column::State.eq(state.clone()));
        }
        if let Some(district) = &filters.district {
            query = query.filter(inventory_item::Column::District.eq(district.clone()));
        }
        if let Some(category) = &filters.category {
            let category = ItemCategory::from_str(category).ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown category: {}", category))
            })?;
            query = query.filter(inventory_item::Column::Category.eq(category.as_str()));
        }
        if let Some(min_price) = filters.min_price {
            query = query.filter(inventory_item::Column::BasePrice.gte(min_price));
        }
        if let Some(max_price) = filters.max_price {
            query = query.filter(inventory_item::Column::BasePrice.lte(max_price));
        }

        let paginator = query
            .order_by_asc(inventory_item::Column::BasePrice)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok((items, total))
    }

    /// Featured listings for the landing page.
    #[instrument(skip(self))]
    pub async fn featured(&self, limit: u64) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let items = InventoryEntity::find()
            .filter(inventory_item::Column::IsActive.eq(true))
            .filter(inventory_item::Column::IsVerified.eq(true))
            .filter(inventory_item::Column::IsFeatured.eq(true))
            .order_by_desc(inventory_item::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// All listings belonging to one merchant, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        let paginator = InventoryEntity::find()
            .filter(inventory_item::Column::MerchantId.eq(merchant_id))
            .order_by_desc(inventory_item::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    /// Creates a merchant listing. New listings start unverified.
    #[instrument(skip(self, request), fields(merchant_id = %request.merchant_id))]
    pub async fn create_item(
        &self,
        request: CreateItemRequest,
    ) -> Result<inventory_item::Model, ServiceError> {
        request.validate()?;

        if ItemCategory::from_str(&request.category).is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Unknown category: {}",
                request.category
            )));
        }
        if request.base_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Base price must not be negative".to_string(),
            ));
        }
        if let Some(max_stay) = request.max_stay {
            if max_stay < request.min_stay {
                return Err(ServiceError::ValidationError(
                    "Maximum stay must not be below minimum stay".to_string(),
                ));
            }
        }

        let active = inventory_item::ActiveModel {
            merchant_id: Set(request.merchant_id),
            name: Set(request.name),
            description: Set(request.description),
            category: Set(request.category),
            item_type: Set(request.item_type),
            state: Set(request.state),
            district: Set(request.district),
            base_price: Set(request.base_price),
            currency: Set(request.currency),
            min_stay: Set(request.min_stay),
            max_stay: Set(request.max_stay),
            is_active: Set(true),
            is_verified: Set(false),
            is_featured: Set(false),
            ..Default::default()
        };

        let model = active.insert(&*self.db).await?;

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::InventoryItemCreated(model.id)).await {
                warn!(error = %e, item_id = %model.id, "failed to publish item created event");
            }
        }

        Ok(model)
    }

    /// Computes the server-side quote for a stay: nightly prices (honoring
    /// per-day overrides) summed over the half-open range, times quantity,
    /// plus the configured fee and tax.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn quote(
        &self,
        item: &inventory_item::Model,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> Result<FinancialBreakdown, ServiceError> {
        let slots = self.slots.get_range(item.id, check_in, check_out).await?;

        let nightly_sum: Decimal = slots
            .iter()
            .map(|slot| slot.price_override.unwrap_or(item.base_price))
            .sum();
        let base_amount = (nightly_sum * Decimal::from(quantity)).round_dp(2);

        Ok(self.breakdown_from_base(base_amount))
    }

    /// Applies fee and tax rates to a base amount. Pure; used by `quote`
    /// and directly testable without slot rows.
    pub fn breakdown_from_base(&self, base_amount: Decimal) -> FinancialBreakdown {
        let service_fee = (base_amount * self.service_fee_rate).round_dp(2);
        let tax_amount = (base_amount * self.tax_rate).round_dp(2);
        let discount_amount = Decimal::ZERO;
        let total_amount = base_amount + service_fee + tax_amount - discount_amount;

        FinancialBreakdown {
            base_amount,
            service_fee,
            tax_amount,
            discount_amount,
            total_amount,
        }
    }

    /// Nights in the requested range, for quoting display.
    pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
        nights_in_range(check_in, check_out)
    }
}
