//! Signature-driven argument binding for HTTP handlers.
//!
//! A plain function is registered once; its parameter types decide where
//! each argument comes from:
//!
//! ```rust,ignore
//! use chopin_bind::prelude::*;
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Bindable)]
//! pub struct User {
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! fn get_user(_ctx: RequestContext, id: i64) -> Result<User, BindError> {
//!     Ok(User { id, name: "ada".into() })
//! }
//!
//! set_global_response(json_envelope);
//! let app = Router::new().route(
//!     "/users/{id}",
//!     register(get_user, BindOptions::new().path_names(["id"])).into_route(),
//! );
//! ```
//!
//! Unsupported signatures and names that cannot feed the declared argument
//! are rejected by [`register`] before any request is served.

extern crate self as chopin_bind;

pub mod binder;
pub mod binding;
pub mod classify;
pub mod coerce;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod multipart;
pub mod reflect;
pub mod request;
pub mod response;
mod service;
pub mod writer;

pub mod prelude;

pub use binder::{bind, BoundValue};
pub use binding::{
    default_field_matcher, global_field_matcher, set_global_field_matcher, BindOptions, BindingConfig,
    FieldMatcher,
};
pub use chopin_bind_macros::Bindable;
pub use classify::{classify, ArgumentDescriptor, ArgumentKind};
pub use coerce::{coerce_scalar, coerce_slice, ScalarValue};
pub use config::Settings;
pub use context::{Context, ContextBuilder, RequestSource};
pub use dispatch::{register, try_register, validate_return, Dispatch, RequestHandler};
pub use error::{BindError, BoxError, ConfigError};
pub use invoke::{ArgValue, Argument, BindingFn, HandlerReturn, OutputRole, Outcome};
pub use multipart::{FileHeader, MultipartForm};
pub use reflect::{
    BindStruct, FieldShape, HandleKind, Reflect, ScalarKind, StructKind, StructShape, StructValue, TypeShape,
};
pub use request::{Request, RequestContext};
pub use response::{global_response, json_envelope, set_global_response, ApiResponse, ResponseFn};
pub use writer::ResponseWriter;
