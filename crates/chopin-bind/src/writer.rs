//! Response writer handle shared between the handler and the result
//! collaborator.

use std::io;
use std::sync::Arc;

use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::BindError;
use crate::reflect::{HandleKind, Reflect, TypeShape};

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Buffered response. Handlers that take a writer own the response; it is
/// turned into the HTTP response once the handler returns.
#[derive(Clone, Debug, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: StatusCode) {
        self.state.lock().status = Some(status);
    }

    /// Status set so far, `200 OK` if none.
    pub fn status(&self) -> StatusCode {
        self.state.lock().status.unwrap_or(StatusCode::OK)
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.state.lock().headers.insert(name, value);
    }

    pub fn header(&self, name: &str) -> Option<HeaderValue> {
        self.state.lock().headers.get(name).cloned()
    }

    pub fn write_bytes(&self, bytes: &[u8]) {
        self.state.lock().body.extend_from_slice(bytes);
    }

    pub fn write_str(&self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Replace the body with `value` serialized as JSON.
    pub fn write_json<T: Serialize + ?Sized>(&self, status: StatusCode, value: &T) -> Result<(), BindError> {
        let body = serde_json::to_vec(value).map_err(BindError::Serialize)?;
        let mut state = self.state.lock();
        state.status = Some(status);
        state
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        state.body = body;
        Ok(())
    }

    /// Copy of the body written so far.
    pub fn body(&self) -> Vec<u8> {
        self.state.lock().body.clone()
    }

    /// True once a status or any body bytes were written.
    pub fn is_written(&self) -> bool {
        let state = self.state.lock();
        state.status.is_some() || !state.body.is_empty()
    }

    pub(crate) fn take(&self) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut state = self.state.lock();
        let status = state.status.unwrap_or(StatusCode::OK);
        (
            status,
            std::mem::take(&mut state.headers),
            std::mem::take(&mut state.body),
        )
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Reflect for ResponseWriter {
    fn shape() -> TypeShape {
        TypeShape::Handle(HandleKind::ResponseWriter)
    }
}
