/*!
 * TourStay API
 *
 * Booking and availability backend for a tourism marketplace: per-day
 * slot inventory, an allocator that serializes capacity changes per
 * item, and a booking ledger with an explicit lifecycle state machine.
 */

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Option<Arc<EventSender>>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let services = AppServices::new(db.clone(), &config, event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Envelope for every successful response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// Liveness plus a database ping.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = state.db.ping().await.is_ok();
    Json(serde_json::json!({
        "status": if db_ok { "healthy" } else { "degraded" },
        "database": if db_ok { "up" } else { "down" },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Service identity for the API root.
pub async fn api_status() -> Json<ApiResponse<StatusResponse>> {
    Json(ApiResponse::ok(StatusResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "ok",
    }))
}

/// All `/api/v1` routes.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        // Public catalog
        .route("/inventory/search", get(handlers::inventory::search_inventory))
        .route(
            "/inventory/featured",
            get(handlers::inventory::featured_inventory),
        )
        .route("/inventory/:id", get(handlers::inventory::get_inventory_item))
        .route("/inventory/:id/quote", get(handlers::inventory::quote_stay))
        .route(
            "/inventory/:id/availability",
            get(handlers::availability::get_availability),
        )
        // Guest bookings
        .route(
            "/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_my_bookings),
        )
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/bookings/reference/:reference",
            get(handlers::bookings::get_booking_by_reference),
        )
        .route(
            "/bookings/:id/cancel",
            post(handlers::bookings::cancel_my_booking),
        )
        // Merchant surface
        .route(
            "/merchant/inventory",
            post(handlers::inventory::create_inventory_item)
                .get(handlers::inventory::list_merchant_inventory),
        )
        .route(
            "/merchant/bookings",
            post(handlers::bookings::create_walk_in_booking)
                .get(handlers::bookings::list_merchant_bookings),
        )
        .route(
            "/merchant/bookings/:id/confirm",
            post(handlers::bookings::confirm_booking),
        )
        .route(
            "/merchant/bookings/:id/cancel",
            post(handlers::bookings::merchant_cancel_booking),
        )
        .route(
            "/merchant/bookings/:id/complete",
            post(handlers::bookings::complete_booking),
        )
        .route(
            "/merchant/bookings/:id/no-show",
            post(handlers::bookings::mark_no_show),
        )
        .route(
            "/merchant/bookings/:id/refund",
            post(handlers::bookings::refund_booking),
        )
        .route("/merchant/dashboard", get(handlers::dashboard::merchant_dashboard))
        // Payment provider callbacks
        .route(
            "/webhooks/payment",
            post(handlers::payment_webhooks::payment_webhook),
        )
}
