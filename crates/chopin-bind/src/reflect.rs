//! Compile-time type descriptions standing in for runtime reflection.
//!
//! Every type that can appear as a handler parameter, or as a field of a
//! bindable struct, implements [`Reflect`]. The resulting [`TypeShape`] is
//! inspected once at registration; the request path never looks at it again
//! except through the cached [`crate::ArgumentDescriptor`].

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::BindError;

/// Primitive kinds a request string can be coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    String,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::Isize => "isize",
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::Usize => "usize",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::String => "String",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three request-scoped handles a handler may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Request,
    ResponseWriter,
    Context,
}

/// Which struct family a [`StructShape`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    /// A user struct deriving [`crate::Bindable`].
    Bindable,
    /// [`crate::FileHeader`].
    FileHeader,
    /// [`crate::MultipartForm`].
    MultipartForm,
}

type Construct = fn(&Map<String, Value>) -> Result<Box<dyn StructValue>, BindError>;

/// Description of a struct type.
#[derive(Clone)]
pub struct StructShape {
    name: &'static str,
    kind: StructKind,
    fields: fn() -> Vec<FieldShape>,
    construct: Option<Construct>,
}

impl StructShape {
    /// Shape of a user struct.
    pub fn of<T: BindStruct>() -> Self {
        StructShape {
            name: T::struct_name(),
            kind: StructKind::Bindable,
            fields: T::fields,
            construct: Some(construct::<T>),
        }
    }

    /// Shape of one of the well-known upload types.
    pub(crate) fn well_known(name: &'static str, kind: StructKind) -> Self {
        StructShape {
            name,
            kind,
            fields: Vec::new,
            construct: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> StructKind {
        self.kind
    }

    pub fn fields(&self) -> Vec<FieldShape> {
        (self.fields)()
    }

    /// Build a fresh value from a body map. Fields absent from the map keep
    /// their `Default` value.
    pub fn construct(&self, body: &Map<String, Value>) -> Result<Box<dyn StructValue>, BindError> {
        match self.construct {
            Some(construct) => construct(body),
            None => Err(BindError::Unsettable(self.name.to_string())),
        }
    }
}

impl fmt::Debug for StructShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructShape")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn construct<T: BindStruct>(body: &Map<String, Value>) -> Result<Box<dyn StructValue>, BindError> {
    Ok(Box::new(T::from_body(body)?))
}

/// One named field of a bindable struct.
#[derive(Debug, Clone, Copy)]
pub struct FieldShape {
    name: &'static str,
    settable: bool,
    shape: fn() -> TypeShape,
}

impl FieldShape {
    pub fn new(name: &'static str, settable: bool, shape: fn() -> TypeShape) -> Self {
        FieldShape {
            name,
            settable,
            shape,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Public fields are settable.
    pub fn is_public(&self) -> bool {
        self.settable
    }

    pub fn shape(&self) -> TypeShape {
        (self.shape)()
    }

    /// Scalar kind of a `T` or `Option<T>` field.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.shape() {
            TypeShape::Scalar(kind) => Some(kind),
            TypeShape::Optional(inner) => inner.scalar_kind(),
            _ => None,
        }
    }

    /// Public and scalar: a request string can overwrite it.
    pub fn is_settable(&self) -> bool {
        self.settable && self.scalar_kind().is_some()
    }
}

/// Structural description of a type.
#[derive(Debug, Clone)]
pub enum TypeShape {
    Handle(HandleKind),
    Struct(StructShape),
    /// `Box<T>`.
    Pointer(Box<TypeShape>),
    /// `Vec<T>`.
    Slice(Box<TypeShape>),
    Scalar(ScalarKind),
    /// `Option<T>`, meaningful for struct fields only.
    Optional(Box<TypeShape>),
    Other(&'static str),
}

impl TypeShape {
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            TypeShape::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructShape> {
        match self {
            TypeShape::Struct(shape) => Some(shape),
            _ => None,
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Handle(HandleKind::Request) => f.write_str("Request"),
            TypeShape::Handle(HandleKind::ResponseWriter) => f.write_str("ResponseWriter"),
            TypeShape::Handle(HandleKind::Context) => f.write_str("RequestContext"),
            TypeShape::Struct(shape) => f.write_str(shape.name),
            TypeShape::Pointer(inner) => write!(f, "Box<{inner}>"),
            TypeShape::Slice(elem) => write!(f, "Vec<{elem}>"),
            TypeShape::Scalar(kind) => f.write_str(kind.name()),
            TypeShape::Optional(inner) => write!(f, "Option<{inner}>"),
            TypeShape::Other(name) => f.write_str(name),
        }
    }
}

/// Types that can describe their own shape.
pub trait Reflect {
    fn shape() -> TypeShape;
}

/// A struct whose fields can be filled from a request.
///
/// Implemented by `#[derive(Bindable)]`; implementing it by hand is possible
/// but the derive keeps the field table and setters in sync.
pub trait BindStruct: Default + Serialize + DeserializeOwned + Send + 'static {
    fn struct_name() -> &'static str;

    fn fields() -> Vec<FieldShape>;

    /// Coerce `raw` into the field called `name`.
    fn set_field(&mut self, name: &str, raw: &str) -> Result<(), BindError>;

    /// Deserialize from a body map, falling back to `Default` for every
    /// field the map does not mention.
    fn from_body(body: &Map<String, Value>) -> Result<Self, BindError> {
        let mut merged = match serde_json::to_value(Self::default()).map_err(BindError::Serialize)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in body {
            merged.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(merged)).map_err(BindError::Body)
    }
}

/// Object-safe view of a bound struct value.
pub trait StructValue: Send {
    fn assign(&mut self, field: &str, raw: &str) -> Result<(), BindError>;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: BindStruct> StructValue for T {
    fn assign(&mut self, field: &str, raw: &str) -> Result<(), BindError> {
        BindStruct::set_field(self, field, raw)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

macro_rules! impl_reflect_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

impl_reflect_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    String => String,
}

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::Slice(Box::new(T::shape()))
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> TypeShape {
        TypeShape::Pointer(Box::new(T::shape()))
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::Optional(Box::new(T::shape()))
    }
}

impl Reflect for Value {
    fn shape() -> TypeShape {
        TypeShape::Other("serde_json::Value")
    }
}

impl Reflect for char {
    fn shape() -> TypeShape {
        TypeShape::Other("char")
    }
}

impl Reflect for () {
    fn shape() -> TypeShape {
        TypeShape::Other("()")
    }
}
