use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::slots::{dates_in_range, nights_in_range, MAX_RANGE_DAYS};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

/// One calendar day of the availability view. Dates with no slot row are
/// reported unavailable with zero quantity.
#[derive(Debug, Serialize, ToSchema)]
pub struct DayAvailability {
    #[schema(example = "2024-06-01")]
    pub date: NaiveDate,
    pub is_available: bool,
    pub quantity: i32,
    /// Nightly price for the day, if a slot row prices it
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub inventory_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub days: Vec<DayAvailability>,
    /// True when every day in the range can satisfy a one-unit booking
    pub all_available: bool,
}

/// Day-by-day availability for a listing over `[check_in, check_out)`.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/availability",
    params(
        ("id" = Uuid, Path, description = "Inventory item id"),
        ("check_in" = NaiveDate, Query, description = "Range start"),
        ("check_out" = NaiveDate, Query, description = "Range end (exclusive)")
    ),
    responses(
        (status = 200, description = "Per-day availability", body = AvailabilityResponse),
        (status = 400, description = "Invalid date range"),
        (status = 404, description = "Unknown listing")
    ),
    tag = "inventory"
)]
pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<ApiResponse<AvailabilityResponse>>, ServiceError> {
    if params.check_in >= params.check_out {
        return Err(ServiceError::InvalidDateRange(format!(
            "check-in {} must be before check-out {}",
            params.check_in, params.check_out
        )));
    }

    // Bound the range on date arithmetic before building anything its size.
    let nights = nights_in_range(params.check_in, params.check_out);
    if nights > MAX_RANGE_DAYS {
        return Err(ServiceError::InvalidDateRange(format!(
            "range of {} days exceeds the {}-day maximum",
            nights, MAX_RANGE_DAYS
        )));
    }
    let dates = dates_in_range(params.check_in, params.check_out);

    // 404 for unknown items rather than an empty calendar.
    let item = state.services.catalog.get_item(id).await?;

    let slots = state
        .services
        .slots
        .get_calendar(item.id, params.check_in, params.check_out)
        .await?;
    let by_date: HashMap<NaiveDate, _> =
        slots.into_iter().map(|slot| (slot.date, slot)).collect();

    let days: Vec<DayAvailability> = dates
        .into_iter()
        .map(|date| match by_date.get(&date) {
            Some(slot) => DayAvailability {
                date,
                is_available: slot.is_available && slot.quantity > 0,
                quantity: slot.quantity,
                price: Some(slot.price_override.unwrap_or(item.base_price)),
            },
            // Unorchestrated day: not bookable.
            None => DayAvailability {
                date,
                is_available: false,
                quantity: 0,
                price: None,
            },
        })
        .collect();

    let all_available = days.iter().all(|day| day.is_available);

    Ok(Json(ApiResponse::ok(AvailabilityResponse {
        inventory_id: item.id,
        check_in: params.check_in,
        check_out: params.check_out,
        days,
        all_available,
    })))
}
