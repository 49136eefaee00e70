//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::ShopError;

/// `{"error": code, "message": text}` with the given status.
pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": code, "message": message.into() }))).into_response()
}

impl ShopError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::InsufficientStock { product_info_id, requested, available } => (
                status,
                Json(json!({
                    "error": self.kind(),
                    "message": self.to_string(),
                    "product_info": product_info_id,
                    "requested": requested,
                    "available": available,
                })),
            )
                .into_response(),
            Self::Storage(detail) => {
                tracing::error!(error = %detail, "storage failure");
                json_error(status, self.kind(), "internal storage error")
            }
            _ => json_error(status, self.kind(), self.to_string()),
        }
    }
}
