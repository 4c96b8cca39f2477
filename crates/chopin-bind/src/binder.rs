//! Request-time resolution of one bindable argument.

use std::fmt;

use crate::binding::BindingConfig;
use crate::classify::{ArgumentDescriptor, ArgumentKind};
use crate::coerce::{coerce_scalar, coerce_slice, ScalarValue};
use crate::context::RequestSource;
use crate::error::BindError;
use crate::multipart::{FileHeader, MultipartForm};
use crate::reflect::{FieldShape, StructValue};

/// A value produced by [`bind`], converted into the declared parameter type
/// right before the call.
pub enum BoundValue {
    Scalar(ScalarValue),
    Slice(Vec<ScalarValue>),
    Struct(Box<dyn StructValue>),
    File(FileHeader),
    Form(MultipartForm),
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            BoundValue::Slice(values) => f.debug_tuple("Slice").field(values).finish(),
            BoundValue::Struct(_) => f.write_str("Struct(..)"),
            BoundValue::File(file) => f.debug_tuple("File").field(&file.filename()).finish(),
            BoundValue::Form(_) => f.write_str("Form(..)"),
        }
    }
}

/// Resolve `descriptor` from `source`.
///
/// Scalars look in query, post-form, path, header and cookie, in that
/// order, and take the first value found. Slices look in the query array,
/// then the post-form array. Structs are decoded from the body, then the
/// configured path, header and cookie names overwrite their fields; each of
/// those names must be present in the request.
pub fn bind<S>(source: &S, descriptor: &ArgumentDescriptor, config: &BindingConfig) -> Result<BoundValue, BindError>
where
    S: RequestSource + ?Sized,
{
    match descriptor.kind() {
        ArgumentKind::FileHeader => {
            let name = config.file_name().unwrap_or_default();
            source.form_file(name).map(BoundValue::File)
        }
        ArgumentKind::MultipartForm => source.multipart_form().map(BoundValue::Form),
        ArgumentKind::BindableStruct | ArgumentKind::BindableStructPointer => {
            bind_struct(source, descriptor, config)
        }
        ArgumentKind::Scalar => {
            let Some(kind) = descriptor.scalar_kind() else {
                return Err(BindError::Unsettable(descriptor.shape().to_string()));
            };
            let raw = scalar_source(source, config)
                .ok_or_else(|| BindError::Missing(descriptor.shape().to_string()))?;
            coerce_scalar(kind, raw).map(BoundValue::Scalar)
        }
        ArgumentKind::ScalarSlice => {
            let Some(kind) = descriptor.element_kind() else {
                return Err(BindError::Unsettable(descriptor.shape().to_string()));
            };
            let name = config.query_name().unwrap_or_default();
            let raw = source
                .query_array(name)
                .or_else(|| source.post_form_array(name))
                .ok_or_else(|| BindError::Missing(descriptor.shape().to_string()))?;
            coerce_slice(kind, raw).map(BoundValue::Slice)
        }
        ArgumentKind::Request | ArgumentKind::ResponseWriter | ArgumentKind::Context => {
            Err(BindError::NotBindable(descriptor.kind().to_string()))
        }
    }
}

fn scalar_source<'a, S>(source: &'a S, config: &BindingConfig) -> Option<&'a str>
where
    S: RequestSource + ?Sized,
{
    let query = config
        .query_name()
        .and_then(|name| source.query(name).or_else(|| source.post_form(name)));
    query
        .or_else(|| first_present(config.path_names(), |name| source.param(name)))
        .or_else(|| first_present(config.header_names(), |name| source.header(name)))
        .or_else(|| first_present(config.cookie_names(), |name| source.cookie(name)))
}

/// Only the first configured name is consulted; empty counts as absent.
fn first_present<'a>(names: &[String], lookup: impl FnOnce(&str) -> Option<&'a str>) -> Option<&'a str> {
    let name = names.first()?;
    lookup(name).filter(|value| !value.is_empty())
}

fn bind_struct<S>(source: &S, descriptor: &ArgumentDescriptor, config: &BindingConfig) -> Result<BoundValue, BindError>
where
    S: RequestSource + ?Sized,
{
    let Some(shape) = descriptor.struct_shape() else {
        return Err(BindError::Unsettable(descriptor.shape().to_string()));
    };
    let fields = shape.fields();
    let body = source.bind_body(&fields)?;
    let mut value = shape.construct(&body)?;

    let ty = shape.name();
    let target = value.as_mut();
    overwrite(target, config, &fields, ty, "path parameter", config.path_names(), |name| {
        source.param(name)
    })?;
    overwrite(target, config, &fields, ty, "header", config.header_names(), |name| {
        source.header(name)
    })?;
    overwrite(target, config, &fields, ty, "cookie", config.cookie_names(), |name| {
        source.cookie(name)
    })?;
    Ok(BoundValue::Struct(value))
}

/// Coerce each configured value into the matching field. A name absent
/// from the request fails the bind; an empty value leaves the field as
/// decoded from the body.
fn overwrite<'s>(
    value: &mut dyn StructValue,
    config: &BindingConfig,
    fields: &[FieldShape],
    ty: &str,
    source_kind: &'static str,
    names: &[String],
    lookup: impl Fn(&str) -> Option<&'s str>,
) -> Result<(), BindError> {
    for name in names {
        let raw = lookup(name).ok_or_else(|| BindError::MissingSource {
            source_kind,
            name: name.to_string(),
        })?;
        if raw.is_empty() {
            continue;
        }
        let field = config
            .find_field(fields, name)
            .ok_or_else(|| BindError::UnknownField {
                ty: ty.to_string(),
                field: name.to_string(),
            })?;
        value.assign(field.name(), raw)?;
    }
    Ok(())
}
