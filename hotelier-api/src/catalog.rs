use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use hotelier_catalog::seed_sample;
use hotelier_core::catalog::{AvailabilityItem, InventoryDay, Quote, RoomType};
use hotelier_core::CoreError;
use crate::error::AppError;
use crate::middleware::require_admin;
use crate::state::CatalogState;

pub fn routes(state: CatalogState) -> Router {
    let admin = Router::new()
        .route("/admin/room-types", post(upsert_room_type))
        .route("/admin/inventory", post(upsert_inventory))
        .route("/admin/seed", post(seed))
        .route_layer(from_fn_with_state(state.auth.clone(), require_admin));

    Router::new()
        .route("/catalog/room-types", get(list_room_types))
        .route("/catalog/availability", get(availability))
        .route("/catalog/quote", get(quote))
        .merge(admin)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    check_in: NaiveDate,
    check_out: NaiveDate,
    #[serde(default)]
    guests: i32,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    check_in: NaiveDate,
    check_out: NaiveDate,
    items: Vec<AvailabilityItem>,
}

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    room_type_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    #[serde(default = "one")]
    quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Serialize)]
struct QuoteResponse {
    #[serde(flatten)]
    quote: Quote,
    available: i32,
}

#[derive(Debug, Deserialize)]
struct RoomTypeRequest {
    id: Option<Uuid>,
    name: String,
    description: Option<String>,
    base_price: i64,
    capacity: i32,
}

#[derive(Debug, Deserialize)]
struct InventoryRequest {
    room_type_id: Uuid,
    date: NaiveDate,
    total: i32,
    available: Option<i32>,
    price_override: Option<i64>,
}

async fn list_room_types(State(state): State<CatalogState>) -> Result<Json<Vec<RoomType>>, AppError> {
    Ok(Json(state.oracle.room_types().list_room_types().await?))
}

/// GET /catalog/availability?check_in=..&check_out=..&guests=..
async fn availability(
    State(state): State<CatalogState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let items = state
        .oracle
        .availability(query.check_in, query.check_out, query.guests)
        .await?;
    Ok(Json(AvailabilityResponse {
        check_in: query.check_in,
        check_out: query.check_out,
        items,
    }))
}

/// GET /catalog/quote?room_type_id=..&check_in=..&check_out=..&quantity=..
async fn quote(
    State(state): State<CatalogState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = state
        .oracle
        .quote(query.room_type_id, query.check_in, query.check_out, query.quantity)
        .await?;
    let available = state
        .oracle
        .min_available(query.room_type_id, query.check_in, query.check_out)
        .await?;
    Ok(Json(QuoteResponse { quote, available }))
}

async fn upsert_room_type(
    State(state): State<CatalogState>,
    Json(req): Json<RoomTypeRequest>,
) -> Result<(StatusCode, Json<RoomType>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("name is required".to_string()));
    }
    if req.base_price < 0 || req.capacity <= 0 {
        return Err(AppError::ValidationError(
            "base_price must be non-negative and capacity positive".to_string(),
        ));
    }

    let repo = state.oracle.room_types();
    let existing = match req.id {
        Some(id) => repo.get_room_type(id).await?,
        None => None,
    };
    let created = existing.is_none();

    let mut room_type = existing.unwrap_or_else(|| {
        let mut fresh = RoomType::new(name, req.base_price, req.capacity);
        if let Some(id) = req.id {
            fresh.id = id;
        }
        fresh
    });
    room_type.name = name.to_string();
    room_type.description = req.description;
    room_type.base_price = req.base_price;
    room_type.capacity = req.capacity;
    room_type.updated_at = Utc::now();

    repo.upsert_room_type(&room_type).await?;
    tracing::info!("Room type {} ({}) saved", room_type.name, room_type.id);

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(room_type)))
}

async fn upsert_inventory(
    State(state): State<CatalogState>,
    Json(req): Json<InventoryRequest>,
) -> Result<Json<InventoryDay>, AppError> {
    state
        .oracle
        .room_types()
        .get_room_type(req.room_type_id)
        .await?
        .ok_or(CoreError::RoomTypeNotFound(req.room_type_id))?;

    let mut day = InventoryDay::new(req.room_type_id, req.date, req.total);
    day.available = req.available.unwrap_or(req.total);
    day.price_override = req.price_override;
    if !day.is_consistent() || req.price_override.is_some_and(|p| p < 0) {
        return Err(AppError::ValidationError(
            "inventory must satisfy 0 <= available <= total with a non-negative price".to_string(),
        ));
    }

    state.oracle.inventory().upsert_day(&day).await?;
    Ok(Json(day))
}

async fn seed(State(state): State<CatalogState>) -> Result<Json<Vec<RoomType>>, AppError> {
    let seeded = seed_sample(
        state.oracle.room_types().as_ref(),
        state.oracle.inventory().as_ref(),
        Utc::now().date_naive(),
    )
    .await?;
    Ok(Json(seeded))
}
