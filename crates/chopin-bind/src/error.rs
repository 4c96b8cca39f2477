use axum::http::StatusCode;
use thiserror::Error;

use crate::reflect::ScalarKind;

/// Boxed error returned by user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registration-time error.
///
/// Raised while a handler signature or its binding options are validated.
/// These are programmer mistakes: [`crate::register`] aborts on them, and
/// [`crate::try_register`] hands them back so startup code can fail loudly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "expected handler args Request|RequestContext [ResponseWriter] Struct|Box<Struct>|Vec<scalar>|scalar, but got ({0})"
    )]
    ArgumentCount(String),

    #[error("expected first handler arg Request or RequestContext, but got {0}")]
    FirstArgument(String),

    #[error("second arg must be one of ResponseWriter|Struct|Box<Struct>|Vec<scalar>|scalar, but got {0}")]
    SecondArgument(String),

    #[error("second arg must be ResponseWriter when the handler takes three args, but got {0}")]
    WriterRequired(String),

    #[error("third arg must be one of Struct|Box<Struct>|Vec<scalar>|scalar, but got {0}")]
    ThirdArgument(String),

    #[error("expected Box of a struct, but got {0}")]
    PointerToNonStruct(String),

    #[error("only scalar element slices are supported, but this slice element type is {0}")]
    UnsupportedSliceElement(String),

    #[error("unsupported arg type {0}")]
    UnsupportedType(String),

    #[error("struct {ty} field {field} not found")]
    FieldNotFound { ty: String, field: String },

    #[error("struct {ty} field {field} can't be set, it must be a public scalar field")]
    FieldNotSettable { ty: String, field: String },

    #[error("a Vec<scalar> arg must set a query name")]
    SliceRequiresQueryName,

    #[error("a scalar arg must set one of query name, path names, header names or cookie names")]
    ScalarRequiresName,

    #[error("handler must return Result<(), E> or Result<T, E>, but it returns {0} values")]
    ReturnArity(usize),

    #[error("a handler returning one value must return an error")]
    SingleReturnNotError,

    #[error("a handler returning two values must return (data, error)")]
    PairReturn,
}

/// Per-request binding or invocation error.
///
/// Reported to the result collaborator as `(None, Some(error))`; never
/// crashes the process.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("can't convert {value:?} to {kind}: {reason}")]
    Coerce {
        kind: ScalarKind,
        value: String,
        reason: String,
    },

    #[error("type {0} can't be set from a request string")]
    Unsettable(String),

    #[error("try to bind {0}, but it is absent from query, form, path, header and cookie")]
    Missing(String),

    #[error("{source_kind} {name:?} is absent from the request")]
    MissingSource { source_kind: &'static str, name: String },

    #[error("struct {ty} has no field {field}")]
    UnknownField { ty: String, field: String },

    #[error("no uploaded file named {0:?}")]
    MissingFile(String),

    #[error("request Content-Type isn't multipart/form-data")]
    NotMultipart,

    #[error("invalid multipart body: {0}")]
    Multipart(String),

    #[error("invalid request body: {0}")]
    Body(#[source] serde_json::Error),

    #[error("request body must be a JSON object, got {0}")]
    BodyShape(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} args are never bound from the request")]
    NotBindable(String),

    #[error("expected {expected} argument, got {found}")]
    ArgumentMismatch { expected: String, found: String },

    #[error("failed to serialize handler result: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{0}")]
    Handler(#[source] BoxError),
}

impl BindError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BindError::Coerce { .. } => StatusCode::BAD_REQUEST,
            BindError::Missing(_) => StatusCode::BAD_REQUEST,
            BindError::MissingSource { .. } => StatusCode::BAD_REQUEST,
            BindError::MissingFile(_) => StatusCode::BAD_REQUEST,
            BindError::NotMultipart => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BindError::Multipart(_) => StatusCode::BAD_REQUEST,
            BindError::Body(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BindError::BodyShape(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BindError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BindError::Unsettable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BindError::UnknownField { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            BindError::NotBindable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BindError::ArgumentMismatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            BindError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BindError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            BindError::Coerce { .. } => "INVALID_VALUE",
            BindError::Missing(_) => "MISSING_VALUE",
            BindError::MissingSource { .. } => "MISSING_VALUE",
            BindError::MissingFile(_) => "MISSING_FILE",
            BindError::NotMultipart => "NOT_MULTIPART",
            BindError::Multipart(_) => "INVALID_MULTIPART",
            BindError::Body(_) => "INVALID_BODY",
            BindError::BodyShape(_) => "INVALID_BODY",
            BindError::InvalidRequest(_) => "BAD_REQUEST",
            BindError::Unsettable(_) => "BINDING_ERROR",
            BindError::UnknownField { .. } => "BINDING_ERROR",
            BindError::NotBindable(_) => "BINDING_ERROR",
            BindError::ArgumentMismatch { .. } => "BINDING_ERROR",
            BindError::Serialize(_) => "INTERNAL_ERROR",
            BindError::Handler(_) => "HANDLER_ERROR",
        }
    }

    /// True when the error came from the request rather than the handler.
    pub fn is_binding(&self) -> bool {
        !matches!(self, BindError::Handler(_) | BindError::Serialize(_))
    }

    /// Wrap a handler error, unwrapping it if it already is a `BindError`.
    pub fn from_handler(err: impl Into<BoxError>) -> Self {
        match err.into().downcast::<BindError>() {
            Ok(bind) => *bind,
            Err(other) => BindError::Handler(other),
        }
    }
}
