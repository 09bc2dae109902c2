use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking lifecycle states. Stored as strings in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    CancelledByGuest,
    CancelledByMerchant,
    NoShow,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::CancelledByGuest => "cancelled_by_guest",
            BookingStatus::CancelledByMerchant => "cancelled_by_merchant",
            BookingStatus::NoShow => "no_show",
            BookingStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled_by_guest" => Some(BookingStatus::CancelledByGuest),
            "cancelled_by_merchant" => Some(BookingStatus::CancelledByMerchant),
            "no_show" => Some(BookingStatus::NoShow),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }

    /// No further transitions are permitted from a terminal state, with the
    /// single exception of `Completed -> Refunded`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::CancelledByGuest
                | BookingStatus::CancelledByMerchant
                | BookingStatus::NoShow
                | BookingStatus::Refunded
        )
    }

    /// The transition table of the booking state machine.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Completed)
                | (Pending, CancelledByGuest)
                | (Pending, CancelledByMerchant)
                | (Confirmed, CancelledByGuest)
                | (Confirmed, CancelledByMerchant)
                | (Confirmed, NoShow)
                | (Completed, Refunded)
        )
    }

    /// States in which the booking holds slot capacity.
    pub fn holds_capacity(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Completed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Where the booking originated: public checkout or merchant walk-in entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingChannel {
    Online,
    WalkIn,
}

impl BookingChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingChannel::Online => "online",
            BookingChannel::WalkIn => "walk_in",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(BookingChannel::Online),
            "walk_in" => Some(BookingChannel::WalkIn),
            _ => None,
        }
    }
}

/// A booking row. Never physically deleted; cancellation is a status
/// transition so the audit trail survives.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub booking_reference: String,
    /// Registered guest, absent for walk-ins
    pub user_id: Option<Uuid>,
    pub inventory_id: Uuid,
    pub merchant_id: Uuid,
    /// Range is half-open: [check_in_date, check_out_date)
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub quantity: i32,
    pub status: String,
    pub channel: String,
    pub base_amount: Decimal,
    pub service_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    /// Must equal base + fee + tax - discount exactly
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_status: String,
    pub guest_name: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_email: Option<String>,
    pub guest_count: i32,
    pub special_requests: Option<String>,
    pub paid_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_item::Entity",
        from = "Column::InventoryId",
        to = "super::inventory_item::Column::Id"
    )]
    InventoryItem,
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryItem.def()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Refunded));
    }

    #[test]
    fn cancellation_branches() {
        use BookingStatus::*;
        for from in [Pending, Confirmed] {
            assert!(from.can_transition_to(CancelledByGuest));
            assert!(from.can_transition_to(CancelledByMerchant));
        }
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Pending.can_transition_to(NoShow));
    }

    #[test]
    fn terminal_states_reject_everything_but_refund() {
        use BookingStatus::*;
        let all = [
            Pending,
            Confirmed,
            Completed,
            CancelledByGuest,
            CancelledByMerchant,
            NoShow,
            Refunded,
        ];
        for from in [CancelledByGuest, CancelledByMerchant, NoShow, Refunded] {
            for to in all {
                assert!(
                    !from.can_transition_to(to),
                    "{:?} -> {:?} should be rejected",
                    from,
                    to
                );
            }
        }
        for to in all {
            assert_eq!(Completed.can_transition_to(to), to == Refunded);
        }
    }

    #[test]
    fn status_string_round_trip() {
        use BookingStatus::*;
        for status in [
            Pending,
            Confirmed,
            Completed,
            CancelledByGuest,
            CancelledByMerchant,
            NoShow,
            Refunded,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("nonsense"), None);
    }

    #[test]
    fn capacity_holding_states() {
        use BookingStatus::*;
        assert!(Pending.holds_capacity());
        assert!(Confirmed.holds_capacity());
        assert!(!CancelledByGuest.holds_capacity());
        assert!(!NoShow.holds_capacity());
    }
}
