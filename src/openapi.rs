use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Ledger API",
        version = "0.1.0",
        description = r#"
# Stock Ledger API

An append-only inventory ledger with per-location stock tracking and
physical-count reconciliation.

- **Movements**: every stock change is an immutable `stock_movements` row;
  current quantities are derived state.
- **Transfers**: atomic two-location moves recorded as a single movement.
- **Stock takes**: snapshot a location, record physical counts, finalize
  into correction movements.

## Caller identity

Every request carries the tenant and acting user in headers:

```
X-Tenant-Id: <uuid>
X-Actor-Id: <uuid>
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "stock", description = "Movements, transfers and stock levels"),
        (name = "stock-takes", description = "Physical count sessions")
    ),
    paths(
        crate::handlers::stock::record_movement,
        crate::handlers::stock::transfer_stock,
        crate::handlers::stock::set_level,
        crate::handlers::stock::get_levels,
        crate::handlers::stock::list_movements,

        crate::handlers::stock_takes::open_stock_take,
        crate::handlers::stock_takes::get_stock_take,
        crate::handlers::stock_takes::record_counts,
        crate::handlers::stock_takes::finalize_stock_take,
        crate::handlers::stock_takes::cancel_stock_take,
    ),
    components(
        schemas(
            crate::entities::stock_movement::MovementKind,
            crate::entities::stock_take_session::StockTakeStatus,

            crate::handlers::stock::RecordMovementRequest,
            crate::handlers::stock::TransferRequest,
            crate::handlers::stock::SetLevelRequest,
            crate::handlers::stock::MovementRecord,
            crate::handlers::stock::StockLevel,
            crate::handlers::stock::StockLevelsResponse,
            crate::handlers::stock::SetLevelResponse,
            crate::PaginatedResponse<crate::handlers::stock::MovementRecord>,

            crate::handlers::stock_takes::OpenStockTakeRequest,
            crate::handlers::stock_takes::CountLine,
            crate::handlers::stock_takes::RecordCountsRequest,
            crate::handlers::stock_takes::StockTakeItemView,
            crate::handlers::stock_takes::StockTakeView,
            crate::handlers::stock_takes::FinalizeResponse,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_all_routes() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Stock Ledger API"));
        assert!(json.contains("/api/v1/stock/movements"));
        assert!(json.contains("/api/v1/stock-takes/{id}/finalize"));
    }
}
