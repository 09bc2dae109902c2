use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TourStay API",
        version = "0.3.0",
        description = r#"
# TourStay Booking API

Availability and booking backend for a tourism marketplace.

## Concepts

- **Inventory item**: a bookable listing (homestay, tour, activity) owned by a merchant.
- **Availability slot**: one row per (item, calendar day) carrying remaining capacity
  and an optional nightly price override.
- **Booking**: a guest's or walk-in's claim on a date range. Ranges are half-open:
  the check-out day is not charged and not blocked.

## Booking lifecycle

`pending -> confirmed -> completed -> refunded`, with cancellation from
`pending`/`confirmed` by either party and `no_show` from `confirmed`.
Cancellations and no-shows return capacity to the calendar.

## Authentication

Pass a bearer token in the Authorization header:

```
Authorization: Bearer <jwt>
```

Merchant endpoints require a merchant-role token.
        "#,
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "inventory", description = "Public catalog, quoting and availability"),
        (name = "bookings", description = "Guest booking lifecycle"),
        (name = "merchant", description = "Merchant inventory, bookings and dashboard"),
        (name = "webhooks", description = "Payment provider callbacks")
    ),
    paths(
        // Catalog
        crate::handlers::inventory::search_inventory,
        crate::handlers::inventory::featured_inventory,
        crate::handlers::inventory::get_inventory_item,
        crate::handlers::inventory::quote_stay,
        crate::handlers::availability::get_availability,

        // Guest bookings
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::list_my_bookings,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::get_booking_by_reference,
        crate::handlers::bookings::cancel_my_booking,

        // Merchant
        crate::handlers::inventory::create_inventory_item,
        crate::handlers::inventory::list_merchant_inventory,
        crate::handlers::bookings::create_walk_in_booking,
        crate::handlers::bookings::list_merchant_bookings,
        crate::handlers::bookings::confirm_booking,
        crate::handlers::bookings::merchant_cancel_booking,
        crate::handlers::bookings::complete_booking,
        crate::handlers::bookings::mark_no_show,
        crate::handlers::bookings::refund_booking,
        crate::handlers::dashboard::merchant_dashboard,

        // Webhooks
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            crate::handlers::inventory::ItemResponse,
            crate::handlers::inventory::CreateItemPayload,
            crate::handlers::inventory::QuoteResponse,
            crate::handlers::availability::AvailabilityResponse,
            crate::handlers::availability::DayAvailability,

            crate::handlers::bookings::BookingResponse,
            crate::handlers::bookings::CreateBookingPayload,
            crate::handlers::bookings::CreateWalkInPayload,
            crate::services::catalog::FinancialBreakdown,

            crate::handlers::dashboard::DashboardResponse,
            crate::handlers::payment_webhooks::PaymentWebhookPayload,
            crate::handlers::payment_webhooks::WebhookAck,

            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("TourStay API"));
        assert!(json.contains("/api/v1/bookings"));
        assert!(json.contains("bearer_auth"));
    }
}
