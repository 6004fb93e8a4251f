use crate::entities::{stock_take_item, stock_take_session};
use crate::errors::ServiceError;
use crate::handlers::stock::MovementRecord;
use crate::handlers::Caller;
use crate::services::stock_take::{CountEntry, StockTakeDetail, StockTakeService};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// State required by the stock take handlers.
pub trait StockTakeHandlerState: Clone + Send + Sync + 'static {
    fn stock_take_service(&self) -> &StockTakeService;
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OpenStockTakeRequest {
    #[validate(length(min = 1, max = 255))]
    pub location: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

// Serialize is required by the length rule on `RecordCountsRequest::counts`;
// the derive reports the offending value through `ValidationError::add_param`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CountLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    /// Negative counts are rejected.
    pub counted_quantity: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordCountsRequest {
    #[validate(length(min = 1))]
    pub counts: Vec<CountLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockTakeItemView {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub expected_quantity: i64,
    pub counted_quantity: i64,
    pub counted: bool,
    pub variance: i64,
    pub notes: Option<String>,
}

impl From<stock_take_item::Model> for StockTakeItemView {
    fn from(item: stock_take_item::Model) -> Self {
        let variance = item.variance();
        Self {
            product_id: item.product_id,
            variant_id: item.variant_id,
            expected_quantity: item.expected_quantity,
            counted_quantity: item.counted_quantity,
            counted: item.counted,
            variance,
            notes: item.notes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockTakeView {
    pub id: Uuid,
    pub location: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items: Vec<StockTakeItemView>,
}

impl StockTakeView {
    fn new(session: stock_take_session::Model, items: Vec<stock_take_item::Model>) -> Self {
        Self {
            id: session.id,
            location: session.location,
            status: session.status,
            notes: session.notes,
            created_by: session.created_by,
            created_at: session.created_at,
            completed_at: session.completed_at,
            items: items.into_iter().map(StockTakeItemView::from).collect(),
        }
    }
}

impl From<StockTakeDetail> for StockTakeView {
    fn from(detail: StockTakeDetail) -> Self {
        Self::new(detail.session, detail.items)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinalizeResponse {
    pub id: Uuid,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    /// One correction movement per nonzero variance.
    pub corrections: Vec<MovementRecord>,
}

pub fn stock_take_router<S>() -> Router<S>
where
    S: StockTakeHandlerState,
{
    Router::new()
        .route("/", post(open_stock_take::<S>))
        .route("/:id", get(get_stock_take::<S>))
        .route("/:id/counts", post(record_counts::<S>))
        .route("/:id/finalize", post(finalize_stock_take::<S>))
        .route("/:id/cancel", post(cancel_stock_take::<S>))
}

/// Open a stock take session
#[utoipa::path(
    post,
    path = "/api/v1/stock-takes",
    request_body = OpenStockTakeRequest,
    responses(
        (status = 201, description = "Session opened", body = StockTakeView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown location", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-takes"
)]
pub async fn open_stock_take<S>(
    State(state): State<S>,
    caller: Caller,
    Json(payload): Json<OpenStockTakeRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTakeHandlerState,
{
    payload.validate()?;

    let detail = state
        .stock_take_service()
        .open(
            caller.tenant_id,
            payload.location,
            payload.notes,
            caller.actor_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(StockTakeView::from(detail))))
}

/// Fetch a stock take session with its count sheet
#[utoipa::path(
    get,
    path = "/api/v1/stock-takes/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session returned", body = StockTakeView),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-takes"
)]
pub async fn get_stock_take<S>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTakeHandlerState,
{
    let detail = state.stock_take_service().get(caller.tenant_id, id).await?;
    Ok((StatusCode::OK, Json(StockTakeView::from(detail))))
}

/// Record counted quantities against an open session
#[utoipa::path(
    post,
    path = "/api/v1/stock-takes/{id}/counts",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = RecordCountsRequest,
    responses(
        (status = 200, description = "Counts recorded", body = [StockTakeItemView]),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Session or item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session is not in progress", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-takes"
)]
pub async fn record_counts<S>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordCountsRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTakeHandlerState,
{
    payload.validate()?;

    let entries = payload
        .counts
        .into_iter()
        .map(|line| CountEntry {
            product_id: line.product_id,
            variant_id: line.variant_id,
            counted_quantity: line.counted_quantity,
            notes: line.notes,
        })
        .collect();

    let items = state
        .stock_take_service()
        .record_counts(caller.tenant_id, id, entries)
        .await?;

    let views: Vec<StockTakeItemView> = items.into_iter().map(StockTakeItemView::from).collect();
    Ok((StatusCode::OK, Json(views)))
}

/// Finalize a session, writing corrections for every nonzero variance
#[utoipa::path(
    post,
    path = "/api/v1/stock-takes/{id}/finalize",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session finalized", body = FinalizeResponse),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session not in progress or reconciliation conflict", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-takes"
)]
pub async fn finalize_stock_take<S>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTakeHandlerState,
{
    let outcome = state
        .stock_take_service()
        .finalize(caller.tenant_id, id, caller.actor_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(FinalizeResponse {
            id: outcome.session.id,
            status: outcome.session.status,
            completed_at: outcome.session.completed_at,
            corrections: outcome
                .corrections
                .into_iter()
                .map(MovementRecord::from)
                .collect(),
        }),
    ))
}

/// Cancel an open session without writing any movements
#[utoipa::path(
    post,
    path = "/api/v1/stock-takes/{id}/cancel",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session cancelled", body = StockTakeView),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session not in progress", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-takes"
)]
pub async fn cancel_stock_take<S>(
    State(state): State<S>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: StockTakeHandlerState,
{
    let session = state
        .stock_take_service()
        .cancel(caller.tenant_id, id)
        .await?;
    let items = state
        .stock_take_service()
        .get(caller.tenant_id, session.id)
        .await?
        .items;

    Ok((StatusCode::OK, Json(StockTakeView::new(session, items))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_batches_must_not_be_empty() {
        let empty = RecordCountsRequest { counts: vec![] };
        assert!(empty.validate().is_err());

        let one = RecordCountsRequest {
            counts: vec![CountLine {
                product_id: Uuid::new_v4(),
                variant_id: None,
                counted_quantity: 3,
                notes: None,
            }],
        };
        assert!(one.validate().is_ok());
    }
}
