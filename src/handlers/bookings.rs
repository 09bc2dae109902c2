use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::entities::booking::{self, BookingStatus};
use crate::errors::ServiceError;
use crate::handlers::PaginationParams;
use crate::services::bookings::{CancelActor, CreateBookingRequest};
use crate::services::catalog::FinancialBreakdown;
use crate::services::slots::nights_in_range;
use crate::{ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateBookingPayload {
    pub inventory_id: Uuid,
    #[schema(example = "2024-06-01")]
    pub check_in_date: NaiveDate,
    #[schema(example = "2024-06-03")]
    pub check_out_date: NaiveDate,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    #[validate(range(min = 1, max = 500))]
    pub guest_count: i32,
    #[validate(length(max = 2000))]
    pub special_requests: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateWalkInPayload {
    pub inventory_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
    #[validate(range(min = 1, max = 500))]
    pub guest_count: i32,
    #[validate(length(min = 1, max = 200))]
    pub guest_name: String,
    #[validate(length(max = 50))]
    pub guest_phone: Option<String>,
    #[validate(email)]
    pub guest_email: Option<String>,
    #[validate(length(max = 2000))]
    pub special_requests: Option<String>,
    /// Price agreed at the counter. Omitted means "quote server-side".
    pub financials: Option<FinancialBreakdown>,
}

#[derive(Debug, Deserialize)]
pub struct MerchantBookingFilter {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    #[schema(example = "TRB-7KQ2M9XA")]
    pub booking_reference: String,
    pub user_id: Option<Uuid>,
    pub inventory_id: Uuid,
    pub merchant_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub nights: i64,
    pub quantity: i32,
    pub status: String,
    pub channel: String,
    pub base_amount: Decimal,
    pub service_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_status: String,
    pub guest_name: Option<String>,
    pub guest_count: i32,
    pub special_requests: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub fn model_to_response(model: booking::Model) -> BookingResponse {
    let nights = nights_in_range(model.check_in_date, model.check_out_date);
    BookingResponse {
        id: model.id,
        booking_reference: model.booking_reference,
        user_id: model.user_id,
        inventory_id: model.inventory_id,
        merchant_id: model.merchant_id,
        check_in_date: model.check_in_date,
        check_out_date: model.check_out_date,
        nights,
        quantity: model.quantity,
        status: model.status,
        channel: model.channel,
        base_amount: model.base_amount,
        service_fee: model.service_fee,
        tax_amount: model.tax_amount,
        discount_amount: model.discount_amount,
        total_amount: model.total_amount,
        currency: model.currency,
        payment_status: model.payment_status,
        guest_name: model.guest_name,
        guest_count: model.guest_count,
        special_requests: model.special_requests,
        paid_at: model.paid_at,
        created_at: model.created_at,
    }
}

/// Create an online booking for the authenticated guest.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingPayload,
    responses(
        (status = 201, description = "Booking created, pending payment", body = BookingResponse),
        (status = 409, description = "Insufficient availability"),
        (status = 422, description = "Dates not open for booking"),
        (status = 503, description = "Allocation busy, retry")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), ServiceError> {
    payload.validate()?;

    let booking = state
        .services
        .bookings
        .create(CreateBookingRequest {
            inventory_id: payload.inventory_id,
            user_id: Some(user.user_id),
            check_in_date: payload.check_in_date,
            check_out_date: payload.check_out_date,
            quantity: payload.quantity,
            guest_count: payload.guest_count,
            channel: "online".to_string(),
            guest_name: None,
            guest_phone: None,
            guest_email: None,
            special_requests: payload.special_requests,
            financials: None,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(model_to_response(booking))),
    ))
}

/// Record a walk-in booking against the merchant's own listing.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/bookings",
    request_body = CreateWalkInPayload,
    responses(
        (status = 201, description = "Walk-in recorded as confirmed and paid", body = BookingResponse),
        (status = 403, description = "Not the listing's merchant"),
        (status = 409, description = "Insufficient availability")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn create_walk_in_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateWalkInPayload>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), ServiceError> {
    user.require_merchant()?;
    payload.validate()?;

    // Walk-ins go through the same allocator as online checkout; the
    // offline channel gets no bypass around capacity checks.
    let item = state.services.catalog.get_item(payload.inventory_id).await?;
    if item.merchant_id != user.user_id {
        return Err(ServiceError::Forbidden(
            "Listing belongs to another merchant".to_string(),
        ));
    }

    let booking = state
        .services
        .bookings
        .create(CreateBookingRequest {
            inventory_id: payload.inventory_id,
            user_id: None,
            check_in_date: payload.check_in_date,
            check_out_date: payload.check_out_date,
            quantity: payload.quantity,
            guest_count: payload.guest_count,
            channel: "walk_in".to_string(),
            guest_name: Some(payload.guest_name),
            guest_phone: payload.guest_phone,
            guest_email: payload.guest_email,
            special_requests: payload.special_requests,
            financials: payload.financials,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(model_to_response(booking))),
    ))
}

/// List the authenticated guest's bookings, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    params(PaginationParams),
    responses((status = 200, description = "Guest's bookings")),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn list_my_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<BookingResponse>>>, ServiceError> {
    let (page, limit) = pagination.normalized();
    let (bookings, total) = state
        .services
        .bookings
        .list_for_guest(user.user_id, page, limit)
        .await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse {
        items: bookings.into_iter().map(model_to_response).collect(),
        total,
        page,
        limit,
    })))
}

/// Fetch one booking. Guests see their own; merchants see their listings'.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "The booking", body = BookingResponse),
        (status = 404, description = "Unknown booking")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state.services.bookings.get(id).await?;
    authorize_booking_access(&user, &booking)?;
    Ok(Json(ApiResponse::ok(model_to_response(booking))))
}

/// Look a booking up by its human-facing reference.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/reference/{reference}",
    params(("reference" = String, Path, description = "Booking reference, e.g. TRB-7KQ2M9XA")),
    responses(
        (status = 200, description = "The booking", body = BookingResponse),
        (status = 404, description = "Unknown reference")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn get_booking_by_reference(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reference): Path<String>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state.services.bookings.get_by_reference(&reference).await?;
    authorize_booking_access(&user, &booking)?;
    Ok(Json(ApiResponse::ok(model_to_response(booking))))
}

/// Guest-initiated cancellation. Restores availability for the dates.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled", body = BookingResponse),
        (status = 409, description = "Booking is not cancellable")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn cancel_my_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state.services.bookings.get(id).await?;
    if booking.user_id != Some(user.user_id) {
        return Err(ServiceError::Forbidden(
            "Booking belongs to another guest".to_string(),
        ));
    }

    let cancelled = state.services.bookings.cancel(id, CancelActor::Guest).await?;
    Ok(Json(ApiResponse::ok(model_to_response(cancelled))))
}

/// List bookings across the merchant's listings, optionally by status.
#[utoipa::path(
    get,
    path = "/api/v1/merchant/bookings",
    params(
        PaginationParams,
        ("status" = Option<String>, Query, description = "Filter by booking status")
    ),
    responses((status = 200, description = "Merchant's bookings")),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn list_merchant_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<MerchantBookingFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<BookingResponse>>>, ServiceError> {
    user.require_merchant()?;

    let status = filter
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::from_str(s).ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown booking status: {}", s))
            })
        })
        .transpose()?;

    let (page, limit) = pagination.normalized();
    let (bookings, total) = state
        .services
        .bookings
        .list_for_merchant(user.user_id, status, page, limit)
        .await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse {
        items: bookings.into_iter().map(model_to_response).collect(),
        total,
        page,
        limit,
    })))
}

/// Manual confirmation for merchant tooling, e.g. when payment was taken
/// outside the provider flow. Same transition as the payment webhook.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/bookings/{id}/confirm",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking confirmed", body = BookingResponse),
        (status = 409, description = "Booking is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = authorize_merchant_booking(&state, &user, id).await?;
    let confirmed = state.services.bookings.confirm_payment(booking.id).await?;
    Ok(Json(ApiResponse::ok(model_to_response(confirmed))))
}

/// Merchant-initiated cancellation.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled", body = BookingResponse),
        (status = 409, description = "Booking is not cancellable")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn merchant_cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = authorize_merchant_booking(&state, &user, id).await?;
    let cancelled = state
        .services
        .bookings
        .cancel(booking.id, CancelActor::Merchant)
        .await?;
    Ok(Json(ApiResponse::ok(model_to_response(cancelled))))
}

/// Mark a confirmed stay as completed after check-out.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/bookings/{id}/complete",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking completed", body = BookingResponse),
        (status = 409, description = "Booking is not confirmed")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = authorize_merchant_booking(&state, &user, id).await?;
    let completed = state.services.bookings.complete(booking.id).await?;
    Ok(Json(ApiResponse::ok(model_to_response(completed))))
}

/// Record a no-show; the dates become sellable again.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/bookings/{id}/no-show",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "No-show recorded", body = BookingResponse),
        (status = 409, description = "Booking is not confirmed")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn mark_no_show(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = authorize_merchant_booking(&state, &user, id).await?;
    let updated = state.services.bookings.mark_no_show(booking.id).await?;
    Ok(Json(ApiResponse::ok(model_to_response(updated))))
}

/// Refund a completed booking.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/bookings/{id}/refund",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking refunded", body = BookingResponse),
        (status = 409, description = "Booking is not completed")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn refund_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = authorize_merchant_booking(&state, &user, id).await?;
    let refunded = state.services.bookings.refund(booking.id).await?;
    Ok(Json(ApiResponse::ok(model_to_response(refunded))))
}

fn authorize_booking_access(user: &AuthUser, booking: &booking::Model) -> Result<(), ServiceError> {
    let is_guest_owner = booking.user_id == Some(user.user_id);
    let is_merchant_owner =
        booking.merchant_id == user.user_id && user.require_merchant().is_ok();
    if is_guest_owner || is_merchant_owner {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Not a party to this booking".to_string(),
        ))
    }
}

async fn authorize_merchant_booking(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
) -> Result<booking::Model, ServiceError> {
    user.require_merchant()?;
    let booking = state.services.bookings.get(booking_id).await?;
    if booking.merchant_id != user.user_id {
        return Err(ServiceError::Forbidden(
            "Booking belongs to another merchant".to_string(),
        ));
    }
    Ok(booking)
}
