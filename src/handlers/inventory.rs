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
use crate::entities::inventory_item;
use crate::errors::ServiceError;
use crate::handlers::PaginationParams;
use crate::services::catalog::{CreateItemRequest, FinancialBreakdown, SearchFilters};
use crate::{ApiResponse, AppState, PaginatedResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub item_type: String,
    pub state: String,
    pub district: String,
    pub base_price: Decimal,
    #[schema(example = "MYR")]
    pub currency: String,
    pub min_stay: i32,
    pub max_stay: Option<i32>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

pub fn model_to_response(model: inventory_item::Model) -> ItemResponse {
    ItemResponse {
        id: model.id,
        merchant_id: model.merchant_id,
        name: model.name,
        description: model.description,
        category: model.category,
        item_type: model.item_type,
        state: model.state,
        district: model.district,
        base_price: model.base_price,
        currency: model.currency,
        min_stay: model.min_stay,
        max_stay: model.max_stay,
        is_active: model.is_active,
        is_verified: model.is_verified,
        is_featured: model.is_featured,
        created_at: model.created_at,
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub inventory_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub quantity: i32,
    pub currency: String,
    #[serde(flatten)]
    pub financials: FinancialBreakdown,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateItemPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[schema(example = "accommodation")]
    pub category: String,
    #[validate(length(min = 1, max = 50))]
    #[schema(example = "homestay")]
    pub item_type: String,
    #[validate(length(min = 1, max = 50))]
    pub state: String,
    #[validate(length(min = 1, max = 100))]
    pub district: String,
    pub base_price: Decimal,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[validate(range(min = 1, max = 365))]
    pub min_stay: i32,
    pub max_stay: Option<i32>,
}

/// Public catalog search. Only active, verified listings appear,
/// cheapest first.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/search",
    params(
        PaginationParams,
        ("state" = Option<String>, Query, description = "Malaysian state filter"),
        ("district" = Option<String>, Query, description = "District filter"),
        ("category" = Option<String>, Query, description = "Item category"),
        ("min_price" = Option<Decimal>, Query, description = "Minimum nightly price"),
        ("max_price" = Option<Decimal>, Query, description = "Maximum nightly price")
    ),
    responses((status = 200, description = "Matching listings, cheapest first")),
    tag = "inventory"
)]
pub async fn search_inventory(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filters): Query<SearchFilters>,
) -> Result<Json<ApiResponse<PaginatedResponse<ItemResponse>>>, ServiceError> {
    let (page, limit) = pagination.normalized();
    let (items, total) = state.services.catalog.search(filters, page, limit).await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse {
        items: items.into_iter().map(model_to_response).collect(),
        total,
        page,
        limit,
    })))
}

/// Featured listings for the landing page.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/featured",
    responses((status = 200, description = "Featured listings")),
    tag = "inventory"
)]
pub async fn featured_inventory(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ItemResponse>>>, ServiceError> {
    let items = state.services.catalog.featured(12).await?;
    Ok(Json(ApiResponse::ok(
        items.into_iter().map(model_to_response).collect(),
    )))
}

/// Fetch one listing.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory item id")),
    responses(
        (status = 200, description = "The listing", body = ItemResponse),
        (status = 404, description = "Unknown listing")
    ),
    tag = "inventory"
)]
pub async fn get_inventory_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ItemResponse>>, ServiceError> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(ApiResponse::ok(model_to_response(item))))
}

/// Server-side price quote for a stay. The same arithmetic the booking
/// path uses, so a displayed quote always matches the charged total.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/quote",
    params(
        ("id" = Uuid, Path, description = "Inventory item id"),
        ("check_in" = NaiveDate, Query, description = "Check-in date"),
        ("check_out" = NaiveDate, Query, description = "Check-out date (exclusive)"),
        ("quantity" = Option<i32>, Query, description = "Units, default 1")
    ),
    responses(
        (status = 200, description = "Quoted breakdown", body = QuoteResponse),
        (status = 422, description = "Dates not open for booking")
    ),
    tag = "inventory"
)]
pub async fn quote_stay(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ServiceError> {
    if params.quantity < 1 {
        return Err(ServiceError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if params.check_in >= params.check_out {
        return Err(ServiceError::InvalidDateRange(format!(
            "check-in {} must be before check-out {}",
            params.check_in, params.check_out
        )));
    }

    let item = state.services.catalog.get_item(id).await?;
    let financials = state
        .services
        .catalog
        .quote(&item, params.check_in, params.check_out, params.quantity)
        .await?;

    Ok(Json(ApiResponse::ok(QuoteResponse {
        inventory_id: item.id,
        check_in: params.check_in,
        check_out: params.check_out,
        nights: crate::services::CatalogService::nights(params.check_in, params.check_out),
        quantity: params.quantity,
        currency: item.currency,
        financials,
    })))
}

/// Create a listing under the authenticated merchant. Starts unverified
/// and invisible to public search until reviewed.
#[utoipa::path(
    post,
    path = "/api/v1/merchant/inventory",
    request_body = CreateItemPayload,
    responses(
        (status = 201, description = "Listing created", body = ItemResponse),
        (status = 403, description = "Merchant role required")
    ),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn create_inventory_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateItemPayload>,
) -> Result<(StatusCode, Json<ApiResponse<ItemResponse>>), ServiceError> {
    user.require_merchant()?;
    payload.validate()?;

    let item = state
        .services
        .catalog
        .create_item(CreateItemRequest {
            merchant_id: user.user_id,
            name: payload.name,
            description: payload.description,
            category: payload.category,
            item_type: payload.item_type,
            state: payload.state,
            district: payload.district,
            base_price: payload.base_price,
            currency: payload.currency,
            min_stay: payload.min_stay,
            max_stay: payload.max_stay,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(model_to_response(item))),
    ))
}

/// List the merchant's own listings, including unverified and inactive.
#[utoipa::path(
    get,
    path = "/api/v1/merchant/inventory",
    params(PaginationParams),
    responses((status = 200, description = "Merchant's listings")),
    security(("bearer_auth" = [])),
    tag = "merchant"
)]
pub async fn list_merchant_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<ItemResponse>>>, ServiceError> {
    user.require_merchant()?;

    let (page, limit) = pagination.normalized();
    let (items, total) = state
        .services
        .catalog
        .list_for_merchant(user.user_id, page, limit)
        .await?;

    Ok(Json(ApiResponse::ok(PaginatedResponse {
        items: items.into_iter().map(model_to_response).collect(),
        total,
        page,
        limit,
    })))
}
