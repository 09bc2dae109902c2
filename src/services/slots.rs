//! Slot Store
//!
//! Owns per-day availability rows. Reads are open to the rest of the
//! system; mutations run inside a caller-provided transaction and are only
//! ever issued by the allocator.

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::entities::availability_slot::{self, Entity as SlotEntity};
use crate::errors::ServiceError;

/// Longest range any read or reservation may span. Checked before a range
/// is materialized, so an absurd `check_out` cannot allocate.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Number of nights in `[check_in, check_out)`. Pure date arithmetic,
/// safe for arbitrary inputs; negative for inverted ranges.
pub fn nights_in_range(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

fn check_range_bound(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), ServiceError> {
    let nights = nights_in_range(check_in, check_out);
    if nights > MAX_RANGE_DAYS {
        return Err(ServiceError::InvalidDateRange(format!(
            "range of {} nights exceeds the {}-night maximum",
            nights, MAX_RANGE_DAYS
        )));
    }
    Ok(())
}

/// Every calendar date in the half-open range `[check_in, check_out)`.
/// Callers bound the range (see [`MAX_RANGE_DAYS`]) before materializing.
pub fn dates_in_range(check_in: NaiveDate, check_out: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = check_in;
    while current < check_out {
        dates.push(current);
        current = current.succ_opt().expect("date overflow");
    }
    dates
}

#[derive(Clone)]
pub struct SlotStore {
    db: Arc<DatabaseConnection>,
}

impl SlotStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads the slots covering every date in `[check_in, check_out)`,
    /// ordered by date. A missing row for any date fails with
    /// `IncompleteAvailabilityData` — an unorchestrated window is never
    /// treated as bookable.
    #[instrument(skip(self))]
    pub async fn get_range(
        &self,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<availability_slot::Model>, ServiceError> {
        self.get_range_on(&*self.db, item_id, check_in, check_out, false)
            .await
    }

    /// Same as [`get_range`](Self::get_range) but on an explicit connection,
    /// optionally taking exclusive row locks (used inside the allocator's
    /// transaction).
    pub async fn get_range_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        lock: bool,
    ) -> Result<Vec<availability_slot::Model>, ServiceError> {
        check_range_bound(check_in, check_out)?;

        let mut query = SlotEntity::find()
            .filter(availability_slot::Column::InventoryId.eq(item_id))
            .filter(availability_slot::Column::Date.gte(check_in))
            .filter(availability_slot::Column::Date.lt(check_out))
            .order_by_asc(availability_slot::Column::Date);

        if lock {
            query = query.lock_exclusive();
        }

        let slots = query.all(conn).await?;

        // One row per date; detect the first gap.
        let expected = dates_in_range(check_in, check_out);
        for (i, date) in expected.iter().enumerate() {
            match slots.get(i) {
                Some(slot) if slot.date == *date => {}
                _ => {
                    return Err(ServiceError::IncompleteAvailabilityData {
                        item_id,
                        date: *date,
                    })
                }
            }
        }

        Ok(slots)
    }

    /// Calendar read for display: returns whatever slot rows exist in the
    /// range, without the one-row-per-date check. Callers render missing
    /// dates as unavailable.
    #[instrument(skip(self))]
    pub async fn get_calendar(
        &self,
        item_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<availability_slot::Model>, ServiceError> {
        check_range_bound(from, to)?;

        let slots = SlotEntity::find()
            .filter(availability_slot::Column::InventoryId.eq(item_id))
            .filter(availability_slot::Column::Date.gte(from))
            .filter(availability_slot::Column::Date.lt(to))
            .order_by_asc(availability_slot::Column::Date)
            .all(&*self.db)
            .await?;
        Ok(slots)
    }

    /// Decrements every slot in the range by `quantity`, flagging slots
    /// unavailable and stamping `blocked_by` when they hit zero. Verifies
    /// capacity on every date first; the caller's transaction makes the
    /// whole range all-or-nothing.
    #[instrument(skip(self, conn))]
    pub async fn decrement_range<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        booking_ref: Uuid,
    ) -> Result<(), ServiceError> {
        let slots = self
            .get_range_on(conn, item_id, check_in, check_out, true)
            .await?;

        for slot in &slots {
            if slot.quantity < quantity {
                return Err(ServiceError::InsufficientAvailability {
                    item_id,
                    date: slot.date,
                    requested: quantity,
                    available: slot.quantity,
                });
            }
        }

        for slot in slots {
            let remaining = slot.quantity - quantity;
            let mut active: availability_slot::ActiveModel = slot.into();
            active.quantity = Set(remaining);
            active.is_available = Set(remaining > 0);
            if remaining == 0 {
                active.blocked_by = Set(Some(booking_ref));
            }
            active.update(conn).await?;
        }

        Ok(())
    }

    /// Inverse of [`decrement_range`](Self::decrement_range): returns
    /// capacity to the range and clears `blocked_by` once a slot has
    /// capacity again.
    #[instrument(skip(self, conn))]
    pub async fn restore_range<C: ConnectionTrait>(
        &self,
        conn: &C,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let slots = self
            .get_range_on(conn, item_id, check_in, check_out, true)
            .await?;

        for slot in slots {
            let restored = slot.quantity + quantity;
            let mut active: availability_slot::ActiveModel = slot.into();
            active.quantity = Set(restored);
            active.is_available = Set(restored > 0);
            if restored > 0 {
                active.blocked_by = Set(None);
            }
            active.update(conn).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn range_is_half_open() {
        let dates = dates_in_range(d("2024-06-01"), d("2024-06-03"));
        assert_eq!(dates, vec![d("2024-06-01"), d("2024-06-02")]);
    }

    #[test]
    fn empty_range_has_no_dates() {
        assert!(dates_in_range(d("2024-06-01"), d("2024-06-01")).is_empty());
        // Inverted ranges are rejected upstream; here they just yield nothing.
        assert!(dates_in_range(d("2024-06-03"), d("2024-06-01")).is_empty());
    }

    #[test]
    fn range_crosses_month_boundary() {
        let dates = dates_in_range(d("2024-06-29"), d("2024-07-02"));
        assert_eq!(
            dates,
            vec![d("2024-06-29"), d("2024-06-30"), d("2024-07-01")]
        );
    }

    #[test]
    fn nights_are_plain_date_arithmetic() {
        assert_eq!(nights_in_range(d("2024-06-01"), d("2024-06-03")), 2);
        assert_eq!(nights_in_range(d("2024-06-01"), d("2024-06-01")), 0);
        assert_eq!(nights_in_range(d("2024-06-03"), d("2024-06-01")), -2);
        // A far-future check-out is just a big number, not a big allocation.
        let far_future = NaiveDate::from_ymd_opt(262142, 1, 1).unwrap();
        assert!(nights_in_range(d("2024-01-01"), far_future) > 90_000_000);
    }

    #[tokio::test]
    async fn oversized_range_is_rejected_before_any_query() {
        let store = SlotStore::new(Arc::new(DatabaseConnection::Disconnected));

        // The bound fires on arithmetic alone, so the disconnected pool is
        // never reached on either read path.
        let err = store
            .get_range_on(
                &DatabaseConnection::Disconnected,
                Uuid::new_v4(),
                d("2024-01-01"),
                NaiveDate::from_ymd_opt(262142, 1, 1).unwrap(),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));

        let err = store
            .get_calendar(Uuid::new_v4(), d("2024-01-01"), d("9999-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));
    }

    #[tokio::test]
    async fn year_long_range_passes_the_bound() {
        let store = SlotStore::new(Arc::new(DatabaseConnection::Disconnected));

        // 366 nights is allowed; the failure here is the missing database,
        // not the range bound.
        let err = store
            .get_calendar(Uuid::new_v4(), d("2024-01-01"), d("2025-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }
}
