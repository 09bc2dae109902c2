use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable listing owned by a merchant: accommodation, transportation
/// or experience. Capacity lives in `availability_slot`, one row per day.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub item_type: String,
    pub state: String,
    pub district: String,
    pub base_price: Decimal,
    pub currency: String,
    /// Minimum number of nights per booking
    pub min_stay: i32,
    pub max_stay: Option<i32>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_featured: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::availability_slot::Entity")]
    AvailabilitySlots,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::availability_slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AvailabilitySlots.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}

/// Listing category, mirrored from the marketplace taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Accommodation,
    Transportation,
    Experience,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Accommodation => "accommodation",
            ItemCategory::Transportation => "transportation",
            ItemCategory::Experience => "experience",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "accommodation" => Some(ItemCategory::Accommodation),
            "transportation" => Some(ItemCategory::Transportation),
            "experience" => Some(ItemCategory::Experience),
            _ => None,
        }
    }
}
