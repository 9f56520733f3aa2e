use common_http_errors::ApiError;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use uuid::Uuid;

#[test]
fn forbidden_variant() {
    let err = ApiError::Forbidden { code: "not_hold_owner", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "not_hold_owner");
}

#[test]
fn bad_request_variant() {
    let err = ApiError::BadRequest { code: "insufficient_inventory", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "insufficient_inventory");
}

#[test]
fn not_found_variant() {
    let err = ApiError::NotFound { code: "hold_not_found", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "hold_not_found");
}

#[test]
fn internal_variant() {
    let trace = Some(Uuid::new_v4());
    let err = ApiError::Internal { trace_id: trace, message: Some("boom".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
}
