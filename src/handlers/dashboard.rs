use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::bookings::{model_to_response, BookingResponse};
use crate::services::dashboard::DashboardStats;
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub total_listings: u64,
    pub active_listings: u64,
    pub total_bookings: u64,
    pub pending_bookings: u64,
    pub confirmed_bookings: u64,
    pub total_revenue: rust_decimal::Decimal,
    /// Percentage of slot-days sold out over the next 30 days
    pub occupancy_rate: f64,
    pub recent_bookings: Vec<BookingResponse>,
}

impl From<DashboardStats> for DashboardResponse {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_listings: stats.total_listings,
            active_listings: stats.active_listings,
            total_bookings: stats.total_bookings,
            pending_bookings: stats.pending_bookings,
            confirmed_bookings: stats.confirmed_bookings,
            total_revenue: stats.total_revenue,
            occupancy_rate: stats.occupancy_rate,
            recent_bookings: stats
                .recent_bookings
                .into_iter()
                .map(model_to_response)
                .collect(),
        }
    }
}

/// Merchant dashboard: listing and booking counts, revenue, and real
/// occupancy over the upcoming month.
#[utoipa::path(
    get,
    path = "/api/v1/merchant/dashboard",
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardResponse),
        (status = 403, description = "Merchant role required")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn merchant_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<DashboardResponse>>, ServiceError> {
    user.require_merchant()?;
    let stats = state.services.dashboard.stats(user.user_id).await?;
    Ok(Json(ApiResponse::ok(DashboardResponse::from(stats))))
}
