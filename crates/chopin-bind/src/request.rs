//! The request and context handles a handler may take as its first argument.

use std::sync::Arc;

use axum::http::{header, Extensions, HeaderMap, Method, Uri, Version};
use bytes::Bytes;

use crate::reflect::{HandleKind, Reflect, TypeShape};

struct RequestParts {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

/// Read-only view of the incoming request, body included.
///
/// Cheap to clone; every clone shares the same parts.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestParts>,
}

impl Request {
    pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Bytes) -> Self {
        Request {
            inner: Arc::new(RequestParts {
                method,
                uri,
                version,
                headers,
                body,
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn version(&self) -> Version {
        self.inner.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// First value of header `name`, if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name)?.to_str().ok()
    }

    /// Lower-cased media type without parameters, e.g. `application/json`.
    pub fn media_type(&self) -> Option<String> {
        let value = self.inner.headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = value.split(';').next().unwrap_or_default().trim();
        Some(essence.to_ascii_lowercase())
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.inner.method)
            .field("uri", &self.inner.uri)
            .field("body_len", &self.inner.body.len())
            .finish()
    }
}

impl Reflect for Request {
    fn shape() -> TypeShape {
        TypeShape::Handle(HandleKind::Request)
    }
}

struct ContextParts {
    method: Method,
    path: String,
    extensions: Extensions,
}

/// Request-scoped context: method, path and the extensions middleware
/// attached to the request.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextParts>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, extensions: Extensions) -> Self {
        RequestContext {
            inner: Arc::new(ContextParts {
                method,
                path: path.into(),
                extensions,
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// A value inserted by middleware, e.g. an authenticated user.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.inner.extensions.get::<T>()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.inner.method)
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl Reflect for RequestContext {
    fn shape() -> TypeShape {
        TypeShape::Handle(HandleKind::Context)
    }
}
