//! Mounting registered handlers on an axum router.

use axum::body::{to_bytes, Body};
use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{DefaultBodyLimit, RawPathParams, Request as HttpRequest};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter};

use crate::config::Settings;
use crate::context::Context;
use crate::dispatch::RequestHandler;
use crate::error::BindError;
use crate::multipart;
use crate::response::ApiResponse;
use crate::writer::ResponseWriter;

impl Context {
    /// Read an axum request into a context.
    ///
    /// The body is buffered up to `settings.max_body_bytes`; multipart
    /// bodies are parsed here so parse failures surface when a file or form
    /// argument is bound.
    pub async fn from_request(
        request: HttpRequest,
        params: Vec<(String, String)>,
        settings: &Settings,
    ) -> Result<Self, BindError> {
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, settings.max_body_bytes)
            .await
            .map_err(|err| BindError::InvalidRequest(err.to_string()))?;

        let content_type = parts
            .headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
            .map(str::to_string);
        let multipart = match content_type {
            Some(content_type) => Some(multipart::parse(&content_type, &parts.extensions, body.clone()).await),
            None => None,
        };

        Context::from_parts(parts, body, params, multipart)
    }
}

impl ResponseWriter {
    /// Turn everything written so far into an HTTP response.
    pub fn to_response(&self) -> Response {
        let (status, headers, body) = self.take();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl RequestHandler {
    /// Serve one axum request.
    pub async fn call(&self, request: HttpRequest, params: Vec<(String, String)>) -> Response {
        let ctx = match Context::from_request(request, params, self.settings()).await {
            Ok(ctx) => ctx,
            Err(err) => return err.into_response(),
        };
        self.handle(&ctx);
        ctx.writer().to_response()
    }

    /// Route accepting any method.
    ///
    /// ```rust,ignore
    /// let app = Router::new().route("/users/{id}", handler.into_route());
    /// ```
    pub fn into_route<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let limit = self.settings().max_body_bytes;
        any(
            move |params: Result<RawPathParams, RawPathParamsRejection>, request: HttpRequest| {
                let handler = self.clone();
                async move {
                    let params = params
                        .map(|params| {
                            params
                                .iter()
                                .map(|(name, value)| (name.to_string(), value.to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                    handler.call(request, params).await
                }
            },
        )
        .layer(DefaultBodyLimit::max(limit))
    }
}

impl IntoResponse for BindError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::<()>::from(&self);
        match serde_json::to_vec(&body) {
            Ok(bytes) => (
                status,
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                bytes,
            )
                .into_response(),
            Err(_) => (status, "Internal Server Error").into_response(),
        }
    }
}
