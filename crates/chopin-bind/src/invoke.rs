//! Typed adapters between dynamically collected arguments and the
//! registered function.
//!
//! The dispatcher gathers one [`ArgValue`] per declared parameter. A
//! [`BindingFn`] impl, generated for every arity, converts each value into
//! its parameter type through [`Argument`] and calls the function; the
//! result is described by [`HandlerReturn`].

use std::any::TypeId;
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use crate::binder::BoundValue;
use crate::coerce::ScalarValue;
use crate::error::{BindError, BoxError};
use crate::multipart::{FileHeader, MultipartForm};
use crate::reflect::{BindStruct, Reflect, TypeShape};
use crate::request::{Request, RequestContext};
use crate::writer::ResponseWriter;

/// One collected argument.
#[derive(Debug)]
pub enum ArgValue {
    Request(Request),
    Context(RequestContext),
    Writer(ResponseWriter),
    Bound(BoundValue),
}

impl ArgValue {
    fn describe(&self) -> &'static str {
        match self {
            ArgValue::Request(_) => "Request",
            ArgValue::Context(_) => "RequestContext",
            ArgValue::Writer(_) => "ResponseWriter",
            ArgValue::Bound(BoundValue::Scalar(_)) => "scalar",
            ArgValue::Bound(BoundValue::Slice(_)) => "slice",
            ArgValue::Bound(BoundValue::Struct(_)) => "struct",
            ArgValue::Bound(BoundValue::File(_)) => "FileHeader",
            ArgValue::Bound(BoundValue::Form(_)) => "MultipartForm",
        }
    }

    fn mismatch<T: Reflect>(&self) -> BindError {
        BindError::ArgumentMismatch {
            expected: T::shape().to_string(),
            found: self.describe().to_string(),
        }
    }

    /// Take the bound struct out, checking it is a `T`.
    pub fn into_struct<T: BindStruct + Reflect>(self) -> Result<T, BindError> {
        match self {
            ArgValue::Bound(BoundValue::Struct(value)) => match value.into_any().downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(_) => Err(BindError::ArgumentMismatch {
                    expected: T::shape().to_string(),
                    found: "another struct".to_string(),
                }),
            },
            other => Err(other.mismatch::<T>()),
        }
    }
}

/// A type a handler may declare as a parameter.
pub trait Argument: Reflect + Sized + Send + 'static {
    fn from_arg(value: ArgValue) -> Result<Self, BindError>;
}

impl Argument for Request {
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        match value {
            ArgValue::Request(request) => Ok(request),
            other => Err(other.mismatch::<Self>()),
        }
    }
}

impl Argument for RequestContext {
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        match value {
            ArgValue::Context(context) => Ok(context),
            other => Err(other.mismatch::<Self>()),
        }
    }
}

impl Argument for ResponseWriter {
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        match value {
            ArgValue::Writer(writer) => Ok(writer),
            other => Err(other.mismatch::<Self>()),
        }
    }
}

impl Argument for FileHeader {
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        match value {
            ArgValue::Bound(BoundValue::File(file)) => Ok(file),
            other => Err(other.mismatch::<Self>()),
        }
    }
}

impl Argument for MultipartForm {
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        match value {
            ArgValue::Bound(BoundValue::Form(form)) => Ok(form),
            other => Err(other.mismatch::<Self>()),
        }
    }
}

impl<T: Argument> Argument for Box<T> {
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        T::from_arg(value).map(Box::new)
    }
}

/// Scalars that can be taken out of a [`ScalarValue`].
pub trait FromScalar: Sized {
    fn from_scalar(value: ScalarValue) -> Option<Self>;
}

macro_rules! impl_scalar_argument {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromScalar for $ty {
                fn from_scalar(value: ScalarValue) -> Option<Self> {
                    match value {
                        ScalarValue::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl Argument for $ty {
                fn from_arg(value: ArgValue) -> Result<Self, BindError> {
                    match value {
                        ArgValue::Bound(BoundValue::Scalar(scalar)) => {
                            let found = scalar.kind().to_string();
                            <$ty>::from_scalar(scalar).ok_or_else(|| BindError::ArgumentMismatch {
                                expected: <$ty as Reflect>::shape().to_string(),
                                found,
                            })
                        }
                        other => Err(other.mismatch::<Self>()),
                    }
                }
            }
        )*
    };
}

impl_scalar_argument! {
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

impl<T> Argument for Vec<T>
where
    T: FromScalar + Reflect + Send + 'static,
{
    fn from_arg(value: ArgValue) -> Result<Self, BindError> {
        match value {
            ArgValue::Bound(BoundValue::Slice(values)) => values
                .into_iter()
                .map(|scalar| {
                    let found = scalar.kind().to_string();
                    T::from_scalar(scalar).ok_or_else(|| BindError::ArgumentMismatch {
                        expected: T::shape().to_string(),
                        found,
                    })
                })
                .collect(),
            other => Err(other.mismatch::<Self>()),
        }
    }
}

/// Role of one declared output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRole {
    Data,
    Error,
}

/// What a handler call produced.
#[derive(Debug, Default)]
pub struct Outcome {
    pub data: Option<Value>,
    pub error: Option<BindError>,
}

impl Outcome {
    fn failed(error: BindError) -> Self {
        Outcome {
            data: None,
            error: Some(error),
        }
    }
}

/// A type a handler may return.
///
/// `Result<(), E>` declares a single error output, `Result<T, E>` a
/// `(data, error)` pair. Other returns are described so registration can
/// reject them.
pub trait HandlerReturn: Send + 'static {
    fn outputs() -> Vec<OutputRole>;

    fn into_outcome(self) -> Outcome;
}

impl HandlerReturn for () {
    fn outputs() -> Vec<OutputRole> {
        Vec::new()
    }

    fn into_outcome(self) -> Outcome {
        Outcome::default()
    }
}

impl HandlerReturn for String {
    fn outputs() -> Vec<OutputRole> {
        vec![OutputRole::Data]
    }

    fn into_outcome(self) -> Outcome {
        Outcome {
            data: Some(Value::String(self)),
            error: None,
        }
    }
}

impl HandlerReturn for Value {
    fn outputs() -> Vec<OutputRole> {
        vec![OutputRole::Data]
    }

    fn into_outcome(self) -> Outcome {
        Outcome {
            data: Some(self),
            error: None,
        }
    }
}

impl<T, E> HandlerReturn for Result<T, E>
where
    T: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn outputs() -> Vec<OutputRole> {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            vec![OutputRole::Error]
        } else if TypeId::of::<T>() == TypeId::of::<E>() {
            vec![OutputRole::Error, OutputRole::Error]
        } else {
            vec![OutputRole::Data, OutputRole::Error]
        }
    }

    fn into_outcome(self) -> Outcome {
        match self {
            Ok(_) if TypeId::of::<T>() == TypeId::of::<()>() => Outcome::default(),
            Ok(data) => match serde_json::to_value(&data) {
                Ok(Value::Null) => Outcome::default(),
                Ok(value) => Outcome {
                    data: Some(value),
                    error: None,
                },
                Err(err) => Outcome::failed(BindError::Serialize(err)),
            },
            Err(err) => Outcome::failed(BindError::from_handler(err)),
        }
    }
}

/// A function that can be registered as a handler.
///
/// Implemented for every `Fn` of up to four [`Argument`]s returning a
/// [`HandlerReturn`]; registration then rejects the arities it does not
/// support.
pub trait BindingFn<Args>: Send + Sync + 'static {
    type Output: HandlerReturn;

    /// Declared parameter types, in order.
    fn parameters() -> Vec<TypeShape>;

    fn call(&self, args: Vec<ArgValue>) -> Result<Self::Output, BindError>;
}

fn next_arg<T: Argument>(args: &mut impl Iterator<Item = ArgValue>) -> Result<T, BindError> {
    match args.next() {
        Some(value) => T::from_arg(value),
        None => Err(BindError::ArgumentMismatch {
            expected: T::shape().to_string(),
            found: "nothing".to_string(),
        }),
    }
}

macro_rules! impl_binding_fn {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($ty,)*> BindingFn<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: HandlerReturn,
            $($ty: Argument,)*
        {
            type Output = R;

            fn parameters() -> Vec<TypeShape> {
                vec![$(<$ty as Reflect>::shape()),*]
            }

            fn call(&self, args: Vec<ArgValue>) -> Result<R, BindError> {
                let mut args = args.into_iter();
                $(
                    let $ty = next_arg::<$ty>(&mut args)?;
                )*
                Ok(self($($ty),*))
            }
        }
    };
}

impl_binding_fn!();
impl_binding_fn!(T1);
impl_binding_fn!(T1, T2);
impl_binding_fn!(T1, T2, T3);
impl_binding_fn!(T1, T2, T3, T4);

/// Type-erased registered function.
pub(crate) trait Invoke: Send + Sync {
    fn invoke(&self, args: Vec<ArgValue>) -> Outcome;
}

pub(crate) struct Target<F, Args> {
    function: F,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> Target<F, Args> {
    pub(crate) fn new(function: F) -> Self {
        Target {
            function,
            _args: PhantomData,
        }
    }
}

impl<F, Args> Invoke for Target<F, Args>
where
    F: BindingFn<Args>,
    Args: 'static,
{
    fn invoke(&self, args: Vec<ArgValue>) -> Outcome {
        match self.function.call(args) {
            Ok(output) => output.into_outcome(),
            Err(err) => Outcome::failed(err),
        }
    }
}
