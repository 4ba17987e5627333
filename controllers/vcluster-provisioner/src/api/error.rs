//! HTTP mapping of provisioning errors

use crate::error::ProvisionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use host_client::ClientError;
use tracing::error;

impl ProvisionError {
    /// Status code a request failing with this error answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Input(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) | Self::Client(ClientError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
