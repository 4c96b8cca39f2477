//! Everything a handler module usually needs.
//!
//! ```rust,ignore
//! use chopin_bind::prelude::*;
//! ```

// ── Registration ───────────────────────────────────────────────
pub use crate::{register, set_global_field_matcher, set_global_response, try_register};
pub use crate::{BindOptions, Dispatch, RequestHandler};

// ── Handler arguments ──────────────────────────────────────────
pub use crate::Bindable;
pub use crate::{FileHeader, MultipartForm, Request, RequestContext, ResponseWriter};

// ── Results ────────────────────────────────────────────────────
pub use crate::{json_envelope, ApiResponse, BindError, ConfigError};
pub use crate::{Context, Settings};

// ── Router & HTTP types ────────────────────────────────────────
pub use axum::http::{HeaderMap, Method, StatusCode};
pub use axum::Router;

// ── Serde (every bindable struct needs these) ──────────────────
pub use serde::{Deserialize, Serialize};
