//! Requester identity. Authentication lives upstream; the gateway injects
//! the authenticated user id as a header this extractor trusts.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common_http_errors::ApiError;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";

#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if value.is_empty() {
            return Err(ApiError::Forbidden {
                code: "missing_identity",
                trace_id: None,
            });
        }
        let user_id = Uuid::parse_str(value).map_err(|_| ApiError::BadRequest {
            code: "invalid_user_id",
            trace_id: None,
            message: Some(format!("{USER_ID_HEADER} header is not a UUID")),
        })?;
        Ok(UserId(user_id))
    }
}
