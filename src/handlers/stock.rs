use crate::entities::stock_movement::{self, MovementKind};
use crate::entities::location_stock;
use crate::errors::ServiceError;
use crate::handlers::Caller;
use crate::services::ledger::{LedgerService, MovementFilter, MovementReference, NewMovement};
use crate::{ListQuery, PaginatedResponse};
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// State required by the stock handlers.
pub trait StockHandlerState: Clone + Send + Sync + 'static {
    fn ledger_service(&self) -> &LedgerService;
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordMovementRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub kind: MovementKind,
    /// Positive magnitude for PURCHASE/SALE/RETURN, signed for ADJUSTMENT.
    pub quantity: i64,
    pub location_from: Option<String>,
    pub location_to: Option<String>,
    #[validate(length(max = 64))]
    pub reference_type: Option<String>,
    #[validate(length(max = 128))]
    pub reference_id: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TransferRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub from_location: String,
    #[validate(length(min = 1, max = 255))]
    pub to_location: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(length(max = 64))]
    pub reference_type: Option<String>,
    #[validate(length(max = 128))]
    pub reference_id: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetLevelRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub location: String,
    #[validate(range(min = 0))]
    pub quantity: i64,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StockLevelQuery {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementQuery {
    pub product_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    pub location: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementRecord {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub kind: String,
    pub quantity_delta: i64,
    pub location_from: Option<String>,
    pub location_to: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<stock_movement::Model> for MovementRecord {
    fn from(m: stock_movement::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            variant_id: m.variant_id,
            kind: m.kind,
            quantity_delta: m.quantity_delta,
            location_from: m.location_from,
            location_to: m.location_to,
            reference_type: m.reference_type,
            reference_id: m.reference_id,
            notes: m.notes,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub location: String,
    pub quantity: i64,
    pub reserved_quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<location_stock::Model> for StockLevel {
    fn from(row: location_stock::Model) -> Self {
        Self {
            product_id: row.product_id,
            variant_id: row.variant_id,
            location: row.location,
            quantity: row.quantity,
            reserved_quantity: row.reserved_quantity,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLevelsResponse {
    pub levels: Vec<StockLevel>,
    /// Aggregate total across all locations, scoped like `levels`: the
    /// requested variant, or the whole product when no variant is given.
    pub total_quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetLevelResponse {
    pub quantity: i64,
    /// Absent when the requested quantity already matched.
    pub movement: Option<MovementRecord>,
}

pub fn stock_router<S>() -> Router<S>
where
    S: StockHandlerState,
{
    Router::new()
        .route("/movements", post(record_movement::<S>).get(list_movements::<S>))
        .route("/transfers", post(transfer_stock::<S>))
        .route("/levels", put(set_level::<S>).get(get_levels::<S>))
}

fn reference(
    reference_type: Option<String>,
    reference_id: Option<String>,
) -> Result<Option<MovementReference>, ServiceError> {
    match (reference_type, reference_id) {
        (Some(t), Some(i)) => Ok(Some(MovementReference::new(t, i))),
        (None, None) => Ok(None),
        _ => Err(ServiceError::ValidationError(
            "reference_type and reference_id must be provided together".into(),
        )),
    }
}

/// Record a stock movement
#[utoipa::path(
    post,
    path = "/api/v1/stock/movements",
    request_body = RecordMovementRequest,
    responses(
        (status = 201, description = "Movement recorded", body = MovementRecord),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown location", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn record_movement<S>(
    State(state): State<S>,
    caller: Caller,
    Json(payload): Json<RecordMovementRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockHandlerState,
{
    payload.validate()?;
    if payload.kind == MovementKind::StockTakeCorrection {
        return Err(ServiceError::InvalidOperation(
            "STOCK_TAKE_CORRECTION movements are only written by stock take finalization".into(),
        ));
    }

    let movement = state
        .ledger_service()
        .apply_movement(NewMovement {
            tenant_id: caller.tenant_id,
            product_id: payload.product_id,
            variant_id: payload.variant_id,
            kind: payload.kind,
            quantity: payload.quantity,
            location_from: payload.location_from,
            location_to: payload.location_to,
            reference: reference(payload.reference_type, payload.reference_id)?,
            notes: payload.notes,
            created_by: caller.actor_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MovementRecord::from(movement))))
}

/// Transfer stock between two locations
#[utoipa::path(
    post,
    path = "/api/v1/stock/transfers",
    request_body = TransferRequest,
    responses(
        (status = 201, description = "Transfer recorded", body = MovementRecord),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock at source", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn transfer_stock<S>(
    State(state): State<S>,
    caller: Caller,
    Json(payload): Json<TransferRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockHandlerState,
{
    payload.validate()?;

    let movement = state
        .ledger_service()
        .transfer(
            caller.tenant_id,
            payload.product_id,
            payload.variant_id,
            payload.from_location,
            payload.to_location,
            payload.quantity,
            reference(payload.reference_type, payload.reference_id)?,
            payload.notes,
            caller.actor_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(MovementRecord::from(movement))))
}

/// Set the absolute quantity at a location
#[utoipa::path(
    put,
    path = "/api/v1/stock/levels",
    request_body = SetLevelRequest,
    responses(
        (status = 200, description = "Level set", body = SetLevelResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn set_level<S>(
    State(state): State<S>,
    caller: Caller,
    Json(payload): Json<SetLevelRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockHandlerState,
{
    payload.validate()?;

    let outcome = state
        .ledger_service()
        .set_quantity(
            caller.tenant_id,
            payload.product_id,
            payload.variant_id,
            payload.location,
            payload.quantity,
            None,
            payload.notes,
            caller.actor_id,
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(SetLevelResponse {
            quantity: outcome.quantity,
            movement: outcome.movement.map(MovementRecord::from),
        }),
    ))
}

/// Query stock levels for a product
#[utoipa::path(
    get,
    path = "/api/v1/stock/levels",
    params(StockLevelQuery),
    responses(
        (status = 200, description = "Stock levels returned", body = StockLevelsResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn get_levels<S>(
    State(state): State<S>,
    caller: Caller,
    Query(query): Query<StockLevelQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockHandlerState,
{
    let service = state.ledger_service();
    let levels = service
        .get_location_stock(
            caller.tenant_id,
            query.product_id,
            query.variant_id,
            query.location.as_deref(),
        )
        .await?;
    let total_quantity = service
        .total_stock(caller.tenant_id, query.product_id, query.variant_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(StockLevelsResponse {
            levels: levels.into_iter().map(StockLevel::from).collect(),
            total_quantity,
        }),
    ))
}

/// List the movement log
#[utoipa::path(
    get,
    path = "/api/v1/stock/movements",
    params(MovementQuery, ListQuery),
    responses(
        (status = 200, description = "Movements returned", body = PaginatedResponse<MovementRecord>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn list_movements<S>(
    State(state): State<S>,
    caller: Caller,
    Query(query): Query<MovementQuery>,
    Query(paging): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockHandlerState,
{
    let page = paging.page.max(1);
    let limit = paging.limit.clamp(1, 500);

    let (movements, total) = state
        .ledger_service()
        .list_movements(
            caller.tenant_id,
            MovementFilter {
                product_id: query.product_id,
                kind: query.kind,
                location: query.location,
                created_after: query.created_after,
                created_before: query.created_before,
            },
            page,
            limit,
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(PaginatedResponse {
            items: movements.into_iter().map(MovementRecord::from).collect(),
            total,
            page,
            limit,
        }),
    ))
}
