use crate::errors::ServiceError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub mod stock;
pub mod stock_takes;

/// Caller identity propagated by the API gateway. Both headers are required
/// on every write; `tenant_id` also scopes every read.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, ServiceError> {
    let raw = parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::ValidationError(format!("missing {} header", name)))?;
    raw.parse()
        .map_err(|_| ServiceError::ValidationError(format!("{} header is not a valid UUID", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller {
            tenant_id: header_uuid(parts, "x-tenant-id")?,
            actor_id: header_uuid(parts, "x-actor-id")?,
        })
    }
}
