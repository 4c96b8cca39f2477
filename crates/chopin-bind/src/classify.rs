//! Maps a parameter's declared type to one of the nine argument kinds.

use std::fmt;

use crate::error::ConfigError;
use crate::reflect::{HandleKind, ScalarKind, StructKind, StructShape, TypeShape};

/// How a handler parameter is produced at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    Request,
    ResponseWriter,
    Context,
    BindableStruct,
    BindableStructPointer,
    FileHeader,
    MultipartForm,
    Scalar,
    ScalarSlice,
}

impl ArgumentKind {
    /// Legal in the first position.
    pub fn is_first_kind(self) -> bool {
        matches!(self, ArgumentKind::Request | ArgumentKind::Context)
    }

    /// Resolved by the binder from request data.
    pub fn is_bindable(self) -> bool {
        matches!(
            self,
            ArgumentKind::BindableStruct
                | ArgumentKind::BindableStructPointer
                | ArgumentKind::FileHeader
                | ArgumentKind::MultipartForm
                | ArgumentKind::Scalar
                | ArgumentKind::ScalarSlice
        )
    }
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgumentKind::Request => "request",
            ArgumentKind::ResponseWriter => "response writer",
            ArgumentKind::Context => "context",
            ArgumentKind::BindableStruct => "struct",
            ArgumentKind::BindableStructPointer => "boxed struct",
            ArgumentKind::FileHeader => "file header",
            ArgumentKind::MultipartForm => "multipart form",
            ArgumentKind::Scalar => "scalar",
            ArgumentKind::ScalarSlice => "scalar slice",
        };
        f.write_str(name)
    }
}

/// A classified parameter. Built once per parameter at registration.
#[derive(Debug, Clone)]
pub struct ArgumentDescriptor {
    shape: TypeShape,
    kind: ArgumentKind,
}

impl ArgumentDescriptor {
    pub fn kind(&self) -> ArgumentKind {
        self.kind
    }

    /// The declared type.
    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    /// The declared type with one level of `Box` removed.
    pub fn underlying(&self) -> &TypeShape {
        match &self.shape {
            TypeShape::Pointer(inner) => inner,
            shape => shape,
        }
    }

    pub fn struct_shape(&self) -> Option<&StructShape> {
        self.underlying().as_struct()
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.kind {
            ArgumentKind::Scalar => self.shape.scalar_kind(),
            _ => None,
        }
    }

    /// Element kind of a `Vec<scalar>` parameter.
    pub fn element_kind(&self) -> Option<ScalarKind> {
        match (&self.shape, self.kind) {
            (TypeShape::Slice(elem), ArgumentKind::ScalarSlice) => elem.scalar_kind(),
            _ => None,
        }
    }
}

/// Classify a declared parameter type.
///
/// Depends only on the type, never on a value. Unsupported shapes are
/// configuration errors.
pub fn classify(shape: &TypeShape) -> Result<ArgumentDescriptor, ConfigError> {
    let kind = match shape {
        TypeShape::Handle(HandleKind::Request) => ArgumentKind::Request,
        TypeShape::Handle(HandleKind::ResponseWriter) => ArgumentKind::ResponseWriter,
        TypeShape::Handle(HandleKind::Context) => ArgumentKind::Context,
        TypeShape::Pointer(inner) => match inner.as_ref() {
            TypeShape::Struct(s) => match s.kind() {
                StructKind::FileHeader => ArgumentKind::FileHeader,
                StructKind::MultipartForm => ArgumentKind::MultipartForm,
                StructKind::Bindable => ArgumentKind::BindableStructPointer,
            },
            other => return Err(ConfigError::PointerToNonStruct(other.to_string())),
        },
        TypeShape::Struct(s) => match s.kind() {
            StructKind::FileHeader => ArgumentKind::FileHeader,
            StructKind::MultipartForm => ArgumentKind::MultipartForm,
            StructKind::Bindable => ArgumentKind::BindableStruct,
        },
        TypeShape::Slice(elem) => match elem.as_ref() {
            TypeShape::Scalar(_) => ArgumentKind::ScalarSlice,
            other => return Err(ConfigError::UnsupportedSliceElement(other.to_string())),
        },
        TypeShape::Scalar(_) => ArgumentKind::Scalar,
        other => return Err(ConfigError::UnsupportedType(other.to_string())),
    };
    Ok(ArgumentDescriptor {
        shape: shape.clone(),
        kind,
    })
}
