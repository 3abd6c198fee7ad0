use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use ledge_engine::EngineError;
use ledge_store::StoreError;

/// Error surface of the HTTP handlers; maps collaborator errors to codes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Store(StoreError),
    Engine(EngineError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Store(StoreError::NotFound(msg))
            | ApiError::Engine(EngineError::Store(StoreError::NotFound(msg))) => {
                (StatusCode::NOT_FOUND, msg.clone())
            }
            ApiError::Store(StoreError::Conflict(msg))
            | ApiError::Engine(EngineError::Store(StoreError::Conflict(msg))) => {
                (StatusCode::CONFLICT, msg.clone())
            }
            ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Engine(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::from(StoreError::NotFound("alert x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let resp = ApiError::from(StoreError::Conflict("dup".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_store_errors_map_to_500() {
        let resp = ApiError::from(StoreError::Database("locked".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let resp = ApiError::BadRequest("bad status".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
