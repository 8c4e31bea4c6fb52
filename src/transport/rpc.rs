//! The RPC envelope every endpoint under `transport::http` answers with
//! (spec §7): a tagged union of `{success, data}` or `{success, error}`,
//! never a bare HTTP status code standing in for the outcome.

use {
    crate::domain::error::ServiceError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Serialize,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcError {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    /// Sub-error detail strings, per the `error{code, message, details[]}`
    /// shape (spec §6). Empty for error kinds with nothing further to
    /// itemize beyond `message`.
    pub details: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Maps a `ServiceError` to both an RPC error body and the HTTP status the
/// transport layer answers with — the error *kind* decides the status, the
/// RPC error code is what callers are expected to branch on (spec §7).
pub struct RpcFailure(pub ServiceError);

impl From<ServiceError> for RpcFailure {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for RpcFailure {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match err.code() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "INVALID_ARGUMENT" => StatusCode::BAD_REQUEST,
            "FAILED_PRECONDITION" | "ALREADY_EXISTS" | "ABORTED" => StatusCode::CONFLICT,
            "DEADLINE_EXCEEDED" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "internal error surfaced to rpc caller");
        }

        let body = RpcResponse::<()> {
            success: false,
            data: None,
            error: Some(RpcError {
                code: err.code(),
                message: err.to_string(),
                retryable: err.retryable(),
                details: err.details(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<RpcResponse<T>> {
    Json(RpcResponse {
        success: true,
        data: Some(data),
        error: None,
    })
}
