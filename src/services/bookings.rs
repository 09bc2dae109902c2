//! Booking Ledger
//!
//! Owns the booking lifecycle. Every status change goes through a
//! conditional update filtered on the expected current status (plus the
//! optimistic `version` column), so concurrent transitions resolve to
//! exactly one winner and capacity is restored exactly once.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::booking::{
    self, BookingChannel, BookingStatus, Entity as BookingEntity, PaymentStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocator::Allocator;
use crate::services::catalog::{CatalogService, FinancialBreakdown};

const REFERENCE_ATTEMPTS: usize = 5;

/// Who is cancelling. Maps to the two distinct cancelled states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelActor {
    Guest,
    Merchant,
}

impl CancelActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelActor::Guest => "guest",
            CancelActor::Merchant => "merchant",
        }
    }

    fn target_status(&self) -> BookingStatus {
        match self {
            CancelActor::Guest => BookingStatus::CancelledByGuest,
            CancelActor::Merchant => BookingStatus::CancelledByMerchant,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub inventory_id: Uuid,
    /// Registered guest. Walk-ins may omit this and supply `guest_name`.
    pub user_id: Option<Uuid>,
    pub check_in_date: chrono::NaiveDate,
    pub check_out_date: chrono::NaiveDate,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    #[validate(range(min = 1, max = 500))]
    pub guest_count: i32,
    /// "online" or "walk_in"
    pub channel: String,
    #[validate(length(min = 1, max = 200))]
    pub guest_name: Option<String>,
    #[validate(length(max = 50))]
    pub guest_phone: Option<String>,
    #[validate(email)]
    pub guest_email: Option<String>,
    #[validate(length(max = 2000))]
    pub special_requests: Option<String>,
    /// Pre-agreed amounts (walk-in entry). When absent the server quotes.
    pub financials: Option<FinancialBreakdown>,
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<DatabaseConnection>,
    allocator: Allocator,
    catalog: CatalogService,
    event_sender: Option<Arc<EventSender>>,
}

impl BookingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        allocator: Allocator,
        catalog: CatalogService,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            allocator,
            catalog,
            event_sender,
        }
    }

    /// Creates a booking. The reference is generated before capacity moves,
    /// so the only fallible step after the reserve is the insert, and that
    /// path releases the reservation on failure. Online bookings start
    /// `pending` awaiting payment; walk-ins are recorded `confirmed` and
    /// paid, since the merchant already collected on the spot.
    #[instrument(skip(self, request), fields(item_id = %request.inventory_id))]
    pub async fn create(
        &self,
        request: CreateBookingRequest,
    ) -> Result<booking::Model, ServiceError> {
        request.validate()?;

        let channel = BookingChannel::from_str(&request.channel).ok_or_else(|| {
            ServiceError::ValidationError(format!("Unknown booking channel: {}", request.channel))
        })?;
        if request.user_id.is_none() && request.guest_name.is_none() {
            return Err(ServiceError::ValidationError(
                "Either a registered user or a guest name is required".to_string(),
            ));
        }
        if let Some(financials) = &request.financials {
            Self::check_financials(financials)?;
        }

        let item = self.catalog.get_item(request.inventory_id).await?;
        if !item.is_active || !item.is_verified {
            return Err(ServiceError::ValidationError(
                "Inventory item is not open for booking".to_string(),
            ));
        }

        let financials = match request.financials {
            Some(financials) => financials,
            None => {
                self.catalog
                    .quote(
                        &item,
                        request.check_in_date,
                        request.check_out_date,
                        request.quantity,
                    )
                    .await?
            }
        };

        let booking_reference = self.unique_reference().await?;

        let booking_id = Uuid::new_v4();
        let reservation = self
            .allocator
            .reserve(
                &item,
                request.check_in_date,
                request.check_out_date,
                request.quantity,
                booking_id,
            )
            .await?;

        let now = Utc::now();
        let (status, payment_status, paid_at) = match channel {
            BookingChannel::Online => (BookingStatus::Pending, PaymentStatus::Pending, None),
            BookingChannel::WalkIn => {
                (BookingStatus::Confirmed, PaymentStatus::Completed, Some(now))
            }
        };

        let active = booking::ActiveModel {
            id: Set(booking_id),
            booking_reference: Set(booking_reference),
            user_id: Set(request.user_id),
            inventory_id: Set(item.id),
            merchant_id: Set(item.merchant_id),
            check_in_date: Set(request.check_in_date),
            check_out_date: Set(request.check_out_date),
            quantity: Set(request.quantity),
            status: Set(status.as_str().to_string()),
            channel: Set(channel.as_str().to_string()),
            base_amount: Set(financials.base_amount),
            service_fee: Set(financials.service_fee),
            tax_amount: Set(financials.tax_amount),
            discount_amount: Set(financials.discount_amount),
            total_amount: Set(financials.total_amount),
            currency: Set(item.currency.clone()),
            payment_status: Set(payment_status.as_str().to_string()),
            guest_name: Set(request.guest_name),
            guest_phone: Set(request.guest_phone),
            guest_email: Set(request.guest_email),
            guest_count: Set(request.guest_count),
            special_requests: Set(request.special_requests),
            paid_at: Set(paid_at),
            version: Set(0),
            ..Default::default()
        };

        let model = match active.insert(&*self.db).await {
            Ok(model) => model,
            Err(err) => {
                // Compensate: the reservation must not outlive a failed insert.
                if let Err(release_err) = self
                    .allocator
                    .release(
                        reservation.item_id,
                        reservation.check_in,
                        reservation.check_out,
                        reservation.quantity,
                    )
                    .await
                {
                    error!(
                        booking_id = %booking_id,
                        error = %release_err,
                        "failed to release reservation after insert failure"
                    );
                }
                return Err(err.into());
            }
        };

        self.emit(Event::BookingCreated {
            booking_id: model.id,
            booking_reference: model.booking_reference.clone(),
            channel: model.channel.clone(),
        })
        .await;
        if status == BookingStatus::Confirmed {
            self.emit(Event::BookingConfirmed(model.id)).await;
        }

        Ok(model)
    }

    /// Confirms a pending booking on successful payment capture.
    /// Idempotent: confirming an already-confirmed booking is a no-op.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let booking = self.get(booking_id).await?;
        let current = Self::parse_status(&booking)?;

        if current == BookingStatus::Confirmed {
            return Ok(booking);
        }
        if !current.can_transition_to(BookingStatus::Confirmed) {
            return Err(Self::invalid_transition(current, BookingStatus::Confirmed));
        }

        let now = Utc::now();
        let result = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Confirmed.as_str()),
            )
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Completed.as_str()),
            )
            .col_expr(booking::Column::PaidAt, Expr::value(Some(now)))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(booking::Column::Version, Expr::value(booking.version + 1))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .filter(booking::Column::Version.eq(booking.version))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            // Lost the race; accept if someone else got it there first.
            let current = self.get(booking_id).await?;
            if Self::parse_status(&current)? == BookingStatus::Confirmed {
                return Ok(current);
            }
            return Err(Self::invalid_transition(
                Self::parse_status(&current)?,
                BookingStatus::Confirmed,
            ));
        }

        self.emit(Event::PaymentCaptured(booking_id)).await;
        self.emit(Event::BookingConfirmed(booking_id)).await;

        self.get(booking_id).await
    }

    /// Records a failed payment capture. The booking stays `pending`; the
    /// guest may retry payment or let the booking be cancelled.
    #[instrument(skip(self))]
    pub async fn fail_payment(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let booking = self.get(booking_id).await?;

        let result = BookingEntity::update_many()
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Failed.as_str()),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .filter(
                booking::Column::PaymentStatus
                    .is_in([PaymentStatus::Pending.as_str(), PaymentStatus::Failed.as_str()]),
            )
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            self.emit(Event::PaymentFailed(booking_id)).await;
            return self.get(booking_id).await;
        }

        Ok(booking)
    }

    /// Cancels a booking and restores its capacity. The conditional flip
    /// and the restore commit in one transaction inside the allocator, so
    /// capacity comes back exactly once: a failure mid-way leaves the
    /// booking cancellable for a retry. Re-cancelling to the same state is
    /// a no-op; a guest/merchant mismatch on an already-cancelled booking
    /// conflicts.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        actor: CancelActor,
    ) -> Result<booking::Model, ServiceError> {
        let booking = self.get(booking_id).await?;
        let current = Self::parse_status(&booking)?;
        let target = actor.target_status();

        if current == target {
            return Ok(booking);
        }
        if !current.can_transition_to(target) {
            return Err(Self::invalid_transition(current, target));
        }

        let released = self
            .allocator
            .release_on_transition(
                &booking,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
                target,
            )
            .await?;

        if !released {
            // Lost the race; accept if another call reached the same state.
            let latest = self.get(booking_id).await?;
            if Self::parse_status(&latest)? == target {
                return Ok(latest);
            }
            return Err(Self::invalid_transition(Self::parse_status(&latest)?, target));
        }

        self.emit(Event::BookingCancelled {
            booking_id,
            actor: actor.as_str().to_string(),
        })
        .await;

        self.get(booking_id).await
    }

    /// Marks a confirmed stay as completed after check-out. Idempotent.
    #[instrument(skip(self))]
    pub async fn complete(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let booking = self.get(booking_id).await?;
        let current = Self::parse_status(&booking)?;

        if current == BookingStatus::Completed {
            return Ok(booking);
        }
        if !current.can_transition_to(BookingStatus::Completed) {
            return Err(Self::invalid_transition(current, BookingStatus::Completed));
        }

        let flipped = self
            .flip_from(booking_id, &booking, BookingStatus::Confirmed, BookingStatus::Completed)
            .await?;
        if flipped {
            self.emit(Event::BookingCompleted(booking_id)).await;
        }

        self.get(booking_id).await
    }

    /// Records a no-show on a confirmed booking and returns its capacity,
    /// so the dates become sellable again. The flip and the restore commit
    /// together, same as [`cancel`](Self::cancel).
    #[instrument(skip(self))]
    pub async fn mark_no_show(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let booking = self.get(booking_id).await?;
        let current = Self::parse_status(&booking)?;

        if current == BookingStatus::NoShow {
            return Ok(booking);
        }
        if !current.can_transition_to(BookingStatus::NoShow) {
            return Err(Self::invalid_transition(current, BookingStatus::NoShow));
        }

        let released = self
            .allocator
            .release_on_transition(&booking, &[BookingStatus::Confirmed], BookingStatus::NoShow)
            .await?;
        if released {
            self.emit(Event::BookingNoShow(booking_id)).await;
        } else {
            let latest = self.get(booking_id).await?;
            if Self::parse_status(&latest)? != BookingStatus::NoShow {
                return Err(Self::invalid_transition(
                    Self::parse_status(&latest)?,
                    BookingStatus::NoShow,
                ));
            }
        }

        self.get(booking_id).await
    }

    /// Refunds a completed booking. The stay already happened, so no
    /// capacity moves; only the money does.
    #[instrument(skip(self))]
    pub async fn refund(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let booking = self.get(booking_id).await?;
        let current = Self::parse_status(&booking)?;

        if current == BookingStatus::Refunded {
            return Ok(booking);
        }
        if !current.can_transition_to(BookingStatus::Refunded) {
            return Err(Self::invalid_transition(current, BookingStatus::Refunded));
        }

        let now = Utc::now();
        let result = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Refunded.as_str()),
            )
            .col_expr(
                booking::Column::PaymentStatus,
                Expr::value(PaymentStatus::Refunded.as_str()),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(booking::Column::Version, Expr::value(booking.version + 1))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Completed.as_str()))
            .filter(booking::Column::Version.eq(booking.version))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            self.emit(Event::BookingRefunded(booking_id)).await;
        } else {
            let latest = self.get(booking_id).await?;
            if Self::parse_status(&latest)? != BookingStatus::Refunded {
                return Err(Self::invalid_transition(
                    Self::parse_status(&latest)?,
                    BookingStatus::Refunded,
                ));
            }
        }

        self.get(booking_id).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        BookingEntity::find_by_id(booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_by_reference(&self, reference: &str) -> Result<booking::Model, ServiceError> {
        BookingEntity::find()
            .filter(booking::Column::BookingReference.eq(reference))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", reference)))
    }

    #[instrument(skip(self))]
    pub async fn list_for_guest(
        &self,
        user_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<booking::Model>, u64), ServiceError> {
        let paginator = BookingEntity::find()
            .filter(booking::Column::UserId.eq(user_id))
            .order_by_desc(booking::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let bookings = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((bookings, total))
    }

    #[instrument(skip(self))]
    pub async fn list_for_merchant(
        &self,
        merchant_id: Uuid,
        status: Option<BookingStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<booking::Model>, u64), ServiceError> {
        let mut condition = Condition::all().add(booking::Column::MerchantId.eq(merchant_id));
        if let Some(status) = status {
            condition = condition.add(booking::Column::Status.eq(status.as_str()));
        }

        let paginator = BookingEntity::find()
            .filter(condition)
            .order_by_desc(booking::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let bookings = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((bookings, total))
    }

    /// Conditional status flip. Returns whether this call changed the row.
    async fn flip_from(
        &self,
        booking_id: Uuid,
        booking: &booking::Model,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool, ServiceError> {
        let result = BookingEntity::update_many()
            .col_expr(booking::Column::Status, Expr::value(to.as_str()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(booking::Column::Version, Expr::value(booking.version + 1))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(from.as_str()))
            .filter(booking::Column::Version.eq(booking.version))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            return Ok(true);
        }

        let latest = self.get(booking_id).await?;
        if Self::parse_status(&latest)? == to {
            return Ok(false);
        }
        Err(Self::invalid_transition(Self::parse_status(&latest)?, to))
    }

    async fn unique_reference(&self) -> Result<String, ServiceError> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let reference = generate_reference();
            let taken = BookingEntity::find()
                .filter(booking::Column::BookingReference.eq(reference.clone()))
                .one(&*self.db)
                .await?
                .is_some();
            if !taken {
                return Ok(reference);
            }
            warn!(reference, "booking reference collision, regenerating");
        }
        Err(ServiceError::InternalError(
            "Could not generate a unique booking reference".to_string(),
        ))
    }

    fn check_financials(financials: &FinancialBreakdown) -> Result<(), ServiceError> {
        use rust_decimal::Decimal;
        let parts = [
            financials.base_amount,
            financials.service_fee,
            financials.tax_amount,
            financials.discount_amount,
            financials.total_amount,
        ];
        if parts.iter().any(|amount| *amount < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Amounts must not be negative".to_string(),
            ));
        }
        if !financials.is_consistent() {
            return Err(ServiceError::ValidationError(
                "Total must equal base + service fee + tax - discount".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_status(booking: &booking::Model) -> Result<BookingStatus, ServiceError> {
        BookingStatus::from_str(&booking.status).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Booking {} has unknown status {:?}",
                booking.id, booking.status
            ))
        })
    }

    fn invalid_transition(from: BookingStatus, to: BookingStatus) -> ServiceError {
        ServiceError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to publish booking event");
            }
        }
    }
}

/// `TRB-` plus eight uppercase alphanumerics, e.g. `TRB-7KQ2M9XA`.
fn generate_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("TRB-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn service() -> BookingService {
        let db = Arc::new(DatabaseConnection::Disconnected);
        let allocator = Allocator::new(db.clone(), Duration::from_millis(100), None);
        let catalog = CatalogService::new(db.clone(), 0.05, 0.08, None);
        BookingService::new(db, allocator, catalog, None)
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn request() -> CreateBookingRequest {
        CreateBookingRequest {
            inventory_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            check_in_date: d("2024-06-01"),
            check_out_date: d("2024-06-03"),
            quantity: 1,
            guest_count: 2,
            channel: "online".to_string(),
            guest_name: None,
            guest_phone: None,
            guest_email: None,
            special_requests: None,
            financials: None,
        }
    }

    #[tokio::test]
    async fn create_rejects_unknown_channel() {
        let mut req = request();
        req.channel = "telepathy".to_string();
        let err = service().create(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn create_requires_a_guest_identity() {
        let mut req = request();
        req.user_id = None;
        req.guest_name = None;
        let err = service().create(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn create_rejects_inconsistent_financials() {
        let mut req = request();
        req.financials = Some(FinancialBreakdown {
            base_amount: dec!(100.00),
            service_fee: dec!(5.00),
            tax_amount: dec!(8.00),
            discount_amount: Decimal::ZERO,
            total_amount: dec!(999.00),
        });
        let err = service().create(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn create_rejects_negative_amounts() {
        let mut req = request();
        req.financials = Some(FinancialBreakdown {
            base_amount: dec!(100.00),
            service_fee: dec!(-5.00),
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: dec!(95.00),
        });
        let err = service().create(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn create_rejects_zero_quantity() {
        let mut req = request();
        req.quantity = 0;
        let err = service().create(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn reference_format() {
        let reference = generate_reference();
        assert!(reference.starts_with("TRB-"));
        assert_eq!(reference.len(), 12);
        assert!(reference[4..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn cancel_actor_maps_to_distinct_states() {
        assert_eq!(
            CancelActor::Guest.target_status(),
            BookingStatus::CancelledByGuest
        );
        assert_eq!(
            CancelActor::Merchant.target_status(),
            BookingStatus::CancelledByMerchant
        );
    }
}
