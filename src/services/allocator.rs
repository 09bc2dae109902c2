//! Allocator
//!
//! Sole gatekeeper between a booking request and slot mutation. Guarantees
//! at-most-N concurrent bookings per (item, date) where N is the slot
//! quantity: validation and decrement run under a per-item async lock plus
//! a database transaction, so two overlapping reservations serialize and
//! the loser sees the winner's decrement. Items never contend with each
//! other.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, Entity as BookingEntity};
use crate::entities::inventory_item;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::slots::{nights_in_range, SlotStore, MAX_RANGE_DAYS};

/// Proof that capacity was decremented for a date range. Handed to the
/// booking ledger for persistence, and back to the allocator on release.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub item_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub quantity: i32,
    /// Booking id stamped onto exhausted slots
    pub reference: Uuid,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Allocator {
    db: Arc<DatabaseConnection>,
    slots: SlotStore,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    lock_wait: Duration,
    event_sender: Option<Arc<EventSender>>,
}

impl Allocator {
    pub fn new(
        db: Arc<DatabaseConnection>,
        lock_wait: Duration,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let slots = SlotStore::new(db.clone());
        Self {
            db,
            slots,
            locks: Arc::new(DashMap::new()),
            lock_wait,
            event_sender,
        }
    }

    /// Acquires the per-item lock within the configured bound.
    async fn acquire(&self, item_id: Uuid) -> Result<tokio::sync::OwnedMutexGuard<()>, ServiceError> {
        let lock = self
            .locks
            .entry(item_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        tokio::time::timeout(self.lock_wait, lock.lock_owned())
            .await
            .map_err(|_| ServiceError::AllocationTimeout(item_id))
    }

    /// Drops a registry entry once nobody holds or waits on its lock, so
    /// the registry stays proportional to in-flight items rather than
    /// every item ever reserved.
    fn evict(&self, item_id: Uuid) {
        self.locks
            .remove_if(&item_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Reserves `quantity` units of `item` for every date in
    /// `[check_in, check_out)`. All-or-nothing: a failure on any date
    /// leaves every slot untouched.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn reserve(
        &self,
        item: &inventory_item::Model,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        reference: Uuid,
    ) -> Result<Reservation, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if check_in >= check_out {
            return Err(ServiceError::InvalidDateRange(format!(
                "check-in {} must be before check-out {}",
                check_in, check_out
            )));
        }

        // Pure date arithmetic; nothing range-sized is materialized until
        // the stay length has passed every bound.
        let nights = nights_in_range(check_in, check_out);
        if nights > MAX_RANGE_DAYS {
            return Err(ServiceError::InvalidDateRange(format!(
                "stay of {} nights exceeds the {}-night maximum",
                nights, MAX_RANGE_DAYS
            )));
        }
        if nights < i64::from(item.min_stay) {
            return Err(ServiceError::InvalidDateRange(format!(
                "stay of {} night(s) is below the minimum of {}",
                nights, item.min_stay
            )));
        }
        if let Some(max_stay) = item.max_stay {
            if nights > i64::from(max_stay) {
                return Err(ServiceError::InvalidDateRange(format!(
                    "stay of {} night(s) exceeds the maximum of {}",
                    nights, max_stay
                )));
            }
        }

        let guard = self.acquire(item.id).await?;
        let result = self
            .decrement_in_txn(item.id, check_in, check_out, quantity, reference)
            .await;
        drop(guard);
        self.evict(item.id);
        result?;

        self.emit(Event::SlotsBlocked {
            item_id: item.id,
            check_in,
            check_out,
            quantity,
        })
        .await;

        Ok(Reservation {
            item_id: item.id,
            check_in,
            check_out,
            quantity,
            reference,
            reserved_at: Utc::now(),
        })
    }

    /// Returns a reservation's capacity to the slot store. Used when
    /// persistence fails after a successful reserve; lifecycle-driven
    /// restores go through
    /// [`release_on_transition`](Self::release_on_transition) instead.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let guard = self.acquire(item_id).await?;
        let result = self
            .restore_in_txn(item_id, check_in, check_out, quantity)
            .await;
        drop(guard);
        self.evict(item_id);
        result?;

        self.emit(Event::SlotsReleased {
            item_id,
            check_in,
            check_out,
            quantity,
        })
        .await;

        Ok(())
    }

    /// Flips the booking's status and restores its capacity in one
    /// transaction. The conditional flip (expected statuses plus the
    /// optimistic version) gates the restore, so either both commit or
    /// neither does: a failure leaves the booking cancellable and its
    /// capacity held, and a retry restores exactly once. Returns whether
    /// this call changed the row.
    #[instrument(skip(self, from_any_of), fields(booking_id = %current.id))]
    pub async fn release_on_transition(
        &self,
        current: &booking::Model,
        from_any_of: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<bool, ServiceError> {
        let guard = self.acquire(current.inventory_id).await?;
        let result = self.flip_and_restore_in_txn(current, from_any_of, to).await;
        drop(guard);
        self.evict(current.inventory_id);

        let released = result?;
        if released {
            self.emit(Event::SlotsReleased {
                item_id: current.inventory_id,
                check_in: current.check_in_date,
                check_out: current.check_out_date,
                quantity: current.quantity,
            })
            .await;
        }
        Ok(released)
    }

    async fn decrement_in_txn(
        &self,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
        reference: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        match self
            .slots
            .decrement_range(&txn, item_id, check_in, check_out, quantity, reference)
            .await
        {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(err) => {
                txn.rollback().await.ok();
                Err(err)
            }
        }
    }

    async fn restore_in_txn(
        &self,
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        match self
            .slots
            .restore_range(&txn, item_id, check_in, check_out, quantity)
            .await
        {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(err) => {
                txn.rollback().await.ok();
                Err(err)
            }
        }
    }

    async fn flip_and_restore_in_txn(
        &self,
        current: &booking::Model,
        from_any_of: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;

        let flip = BookingEntity::update_many()
            .col_expr(booking::Column::Status, Expr::value(to.as_str()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(booking::Column::Version, Expr::value(current.version + 1))
            .filter(booking::Column::Id.eq(current.id))
            .filter(
                booking::Column::Status
                    .is_in(from_any_of.iter().map(|status| status.as_str())),
            )
            .filter(booking::Column::Version.eq(current.version))
            .exec(&txn)
            .await;

        let flip = match flip {
            Ok(flip) => flip,
            Err(err) => {
                txn.rollback().await.ok();
                return Err(err.into());
            }
        };
        if flip.rows_affected == 0 {
            txn.rollback().await.ok();
            return Ok(false);
        }

        if let Err(err) = self
            .slots
            .restore_range(
                &txn,
                current.inventory_id,
                current.check_in_date,
                current.check_out_date,
                current.quantity,
            )
            .await
        {
            txn.rollback().await.ok();
            return Err(err);
        }

        txn.commit().await?;
        Ok(true)
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to publish allocator event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn item(min_stay: i32, max_stay: Option<i32>) -> inventory_item::Model {
        inventory_item::Model {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            name: "Beachfront chalet".to_string(),
            description: None,
            category: "accommodation".to_string(),
            item_type: "homestay".to_string(),
            state: "TERENGGANU".to_string(),
            district: "Kuala Terengganu".to_string(),
            base_price: dec!(180.00),
            currency: "MYR".to_string(),
            min_stay,
            max_stay,
            is_active: true,
            is_verified: true,
            is_featured: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn allocator() -> Allocator {
        Allocator::new(
            Arc::new(DatabaseConnection::Disconnected),
            Duration::from_millis(100),
            None,
        )
    }

    #[tokio::test]
    async fn rejects_inverted_date_range() {
        let alloc = allocator();
        let err = alloc
            .reserve(&item(1, None), d("2024-06-03"), d("2024-06-01"), 1, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));
    }

    #[tokio::test]
    async fn rejects_zero_length_range() {
        let alloc = allocator();
        let err = alloc
            .reserve(&item(1, None), d("2024-06-01"), d("2024-06-01"), 1, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));
    }

    #[tokio::test]
    async fn enforces_min_stay() {
        let alloc = allocator();
        let err = alloc
            .reserve(&item(3, None), d("2024-06-01"), d("2024-06-03"), 1, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));
    }

    #[tokio::test]
    async fn enforces_max_stay() {
        let alloc = allocator();
        let err = alloc
            .reserve(&item(1, Some(2)), d("2024-06-01"), d("2024-06-05"), 1, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));
    }

    #[tokio::test]
    async fn rejects_non_positive_quantity() {
        let alloc = allocator();
        let err = alloc
            .reserve(&item(1, None), d("2024-06-01"), d("2024-06-02"), 0, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn contended_lock_times_out() {
        let alloc = allocator();
        let item_id = Uuid::new_v4();

        // Hold the per-item lock so acquisition must hit the bound.
        let held = alloc
            .locks
            .entry(item_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = held.lock().await;

        let err = alloc.acquire(item_id).await.map(|_| ()).unwrap_err();
        assert!(matches!(err, ServiceError::AllocationTimeout(id) if id == item_id));
    }

    #[tokio::test]
    async fn rejects_oversized_range_before_touching_the_database() {
        let alloc = allocator();
        // Far beyond any plausible stay; must fail on arithmetic alone.
        let err = alloc
            .reserve(&item(1, None), d("2024-01-01"), d("9999-01-01"), 1, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidDateRange(_)));
    }

    #[tokio::test]
    async fn idle_lock_entries_are_evicted() {
        let alloc = allocator();
        let item_id = Uuid::new_v4();

        let guard = alloc.acquire(item_id).await.unwrap();
        alloc.evict(item_id);
        // Held locks must survive eviction.
        assert!(alloc.locks.contains_key(&item_id));

        drop(guard);
        alloc.evict(item_id);
        assert!(!alloc.locks.contains_key(&item_id));
    }

    #[tokio::test]
    async fn failed_reserve_does_not_grow_the_lock_registry() {
        let alloc = allocator();
        let it = item(1, None);
        // Disconnected database: the transaction fails after the lock was
        // taken, and the registry entry must still be cleaned up.
        let result = alloc
            .reserve(&it, d("2024-06-01"), d("2024-06-03"), 1, Uuid::new_v4())
            .await;
        assert!(result.is_err());
        assert!(alloc.locks.is_empty());
    }

    #[tokio::test]
    async fn distinct_items_do_not_contend() {
        let alloc = allocator();
        let busy = Uuid::new_v4();
        let idle = Uuid::new_v4();

        let held = alloc
            .locks
            .entry(busy)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = held.lock().await;

        // Unrelated item acquires immediately.
        assert!(alloc.acquire(idle).await.is_ok());
    }

    // Requires a real database and migrations.
    // Run with: cargo test -- --ignored gated_release_is_atomic_with_the_status_flip
    #[tokio::test]
    #[ignore]
    async fn gated_release_is_atomic_with_the_status_flip() {
        use crate::config::AppConfig;
        use crate::db;
        use crate::entities::availability_slot;
        use sea_orm::{ActiveModelTrait, Set};

        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_that_is_at_least_sixty_four_characters_long_for_tests_".to_string(),
            18095,
            "test".to_string(),
        );
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");
        let db_arc = Arc::new(pool);

        let alloc = Allocator::new(db_arc.clone(), Duration::from_millis(50), None);
        let store = SlotStore::new(db_arc.clone());

        let it = inventory_item::ActiveModel {
            merchant_id: Set(Uuid::new_v4()),
            name: Set("Island chalet".to_string()),
            description: Set(None),
            category: Set("accommodation".to_string()),
            item_type: Set("homestay".to_string()),
            state: Set("TERENGGANU".to_string()),
            district: Set("Kuala Nerus".to_string()),
            base_price: Set(dec!(180.00)),
            currency: Set("MYR".to_string()),
            min_stay: Set(1),
            max_stay: Set(None),
            is_active: Set(true),
            is_verified: Set(true),
            is_featured: Set(false),
            ..Default::default()
        }
        .insert(&*db_arc)
        .await
        .expect("seed item");

        let stay = booking::ActiveModel {
            booking_reference: Set("TRB-GATE0001".to_string()),
            user_id: Set(Some(Uuid::new_v4())),
            inventory_id: Set(it.id),
            merchant_id: Set(it.merchant_id),
            check_in_date: Set(d("2024-06-01")),
            check_out_date: Set(d("2024-06-03")),
            quantity: Set(1),
            status: Set(BookingStatus::Confirmed.as_str().to_string()),
            channel: Set("online".to_string()),
            base_amount: Set(dec!(360.00)),
            service_fee: Set(dec!(18.00)),
            tax_amount: Set(dec!(28.80)),
            discount_amount: Set(dec!(0.00)),
            total_amount: Set(dec!(406.80)),
            currency: Set("MYR".to_string()),
            payment_status: Set("completed".to_string()),
            guest_name: Set(None),
            guest_phone: Set(None),
            guest_email: Set(None),
            guest_count: Set(2),
            special_requests: Set(None),
            paid_at: Set(Some(Utc::now())),
            version: Set(0),
            ..Default::default()
        }
        .insert(&*db_arc)
        .await
        .expect("seed booking");

        // Slots as the reserve left them: sold out and stamped.
        for date in [d("2024-06-01"), d("2024-06-02")] {
            availability_slot::ActiveModel {
                inventory_id: Set(it.id),
                date: Set(date),
                is_available: Set(false),
                quantity: Set(0),
                price_override: Set(None),
                blocked_by: Set(Some(stay.id)),
                ..Default::default()
            }
            .insert(&*db_arc)
            .await
            .expect("seed slot");
        }

        let cancellable = [BookingStatus::Pending, BookingStatus::Confirmed];

        // Hold the per-item lock so the release fails on the bound. The
        // booking must stay cancellable and the capacity must stay held.
        let held = alloc
            .locks
            .entry(it.id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = held.lock().await;
        let err = alloc
            .release_on_transition(&stay, &cancellable, BookingStatus::CancelledByGuest)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AllocationTimeout(_)));

        let after_timeout = BookingEntity::find_by_id(stay.id)
            .one(&*db_arc)
            .await
            .expect("query")
            .expect("booking");
        assert_eq!(after_timeout.status, BookingStatus::Confirmed.as_str());
        let slots = store
            .get_range(it.id, d("2024-06-01"), d("2024-06-03"))
            .await
            .expect("slots");
        assert!(slots.iter().all(|s| s.quantity == 0 && !s.is_available));

        // Retry after the contention clears: flip and restore commit together.
        drop(guard);
        let released = alloc
            .release_on_transition(&stay, &cancellable, BookingStatus::CancelledByGuest)
            .await
            .expect("release");
        assert!(released);

        let cancelled = BookingEntity::find_by_id(stay.id)
            .one(&*db_arc)
            .await
            .expect("query")
            .expect("booking");
        assert_eq!(cancelled.status, BookingStatus::CancelledByGuest.as_str());
        let slots = store
            .get_range(it.id, d("2024-06-01"), d("2024-06-03"))
            .await
            .expect("slots");
        assert!(slots
            .iter()
            .all(|s| s.quantity == 1 && s.is_available && s.blocked_by.is_none()));

        // A stale retry no-ops on the version gate and never restores twice.
        let released_again = alloc
            .release_on_transition(&stay, &cancellable, BookingStatus::CancelledByGuest)
            .await
            .expect("stale retry");
        assert!(!released_again);
        let slots = store
            .get_range(it.id, d("2024-06-01"), d("2024-06-03"))
            .await
            .expect("slots");
        assert!(slots.iter().all(|s| s.quantity == 1));
    }
}
