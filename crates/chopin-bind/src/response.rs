//! The result collaborator: what happens with a handler's data or error.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::BindError;

/// Receives `(data, None)` on success or `(None, Some(error))` on failure.
pub type ResponseFn = Arc<dyn Fn(&Context, Option<Value>, Option<BindError>) + Send + Sync>;

static RESPONSE: ArcSwapOption<ResponseFn> = ArcSwapOption::const_empty();

/// Install the process-wide result collaborator.
///
/// Set it once during startup, before traffic begins. Without one, results
/// are dropped.
pub fn set_global_response<F>(response: F)
where
    F: Fn(&Context, Option<Value>, Option<BindError>) + Send + Sync + 'static,
{
    let response: ResponseFn = Arc::new(response);
    RESPONSE.store(Some(Arc::new(response)));
}

pub fn global_response() -> Option<ResponseFn> {
    RESPONSE.load_full().map(|response| ResponseFn::clone(&response))
}

/// Standard API response wrapper.
///
/// ```json
/// {
///   "success": true,
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: Option<T>) -> Self {
        ApiResponse {
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ErrorDetail {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<&BindError> for ApiResponse<()> {
    fn from(err: &BindError) -> Self {
        ApiResponse::error(err.error_code(), err.to_string())
    }
}

/// Ready-made result collaborator writing an [`ApiResponse`] envelope.
///
/// ```rust,ignore
/// set_global_response(json_envelope);
/// ```
pub fn json_envelope(ctx: &Context, data: Option<Value>, error: Option<BindError>) {
    let written = match error {
        Some(err) => ctx
            .writer()
            .write_json(err.status_code(), &ApiResponse::<()>::from(&err)),
        None => ctx
            .writer()
            .write_json(StatusCode::OK, &ApiResponse::success(data)),
    };
    if let Err(err) = written {
        tracing::error!(error = %err, "failed to write response envelope");
        ctx.writer().set_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
