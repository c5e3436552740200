use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::query::InvalidColumn;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid column")]
    InvalidColumn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<InvalidColumn> for ApiError {
    fn from(_: InvalidColumn) -> Self {
        ApiError::InvalidColumn
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidColumn => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Lookup failed");
        }

        // Driver text is returned as-is; this service is a lab, not a hardened API.
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
