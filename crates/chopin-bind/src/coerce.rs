//! String to typed value coercion for scalars and scalar slices.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::Value;

use crate::error::BindError;
use crate::reflect::{Reflect, ScalarKind, TypeShape};

/// A coerced primitive, tagged with the kind it was parsed as.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    String(String),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::I8(_) => ScalarKind::I8,
            ScalarValue::I16(_) => ScalarKind::I16,
            ScalarValue::I32(_) => ScalarKind::I32,
            ScalarValue::I64(_) => ScalarKind::I64,
            ScalarValue::Isize(_) => ScalarKind::Isize,
            ScalarValue::U8(_) => ScalarKind::U8,
            ScalarValue::U16(_) => ScalarKind::U16,
            ScalarValue::U32(_) => ScalarKind::U32,
            ScalarValue::U64(_) => ScalarKind::U64,
            ScalarValue::Usize(_) => ScalarKind::Usize,
            ScalarValue::F32(_) => ScalarKind::F32,
            ScalarValue::F64(_) => ScalarKind::F64,
            ScalarValue::String(_) => ScalarKind::String,
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            ScalarValue::Bool(v) => Value::from(v),
            ScalarValue::I8(v) => Value::from(v),
            ScalarValue::I16(v) => Value::from(v),
            ScalarValue::I32(v) => Value::from(v),
            ScalarValue::I64(v) => Value::from(v),
            ScalarValue::Isize(v) => Value::from(v),
            ScalarValue::U8(v) => Value::from(v),
            ScalarValue::U16(v) => Value::from(v),
            ScalarValue::U32(v) => Value::from(v),
            ScalarValue::U64(v) => Value::from(v),
            ScalarValue::Usize(v) => Value::from(v),
            ScalarValue::F32(v) => Value::from(v),
            ScalarValue::F64(v) => Value::from(v),
            ScalarValue::String(v) => Value::from(v),
        }
    }
}

/// Parse `raw` as `kind`.
pub fn coerce_scalar(kind: ScalarKind, raw: &str) -> Result<ScalarValue, BindError> {
    let value = match kind {
        ScalarKind::Bool => ScalarValue::Bool(parse_bool(raw)?),
        ScalarKind::I8 => ScalarValue::I8(parse_int(kind, raw)?),
        ScalarKind::I16 => ScalarValue::I16(parse_int(kind, raw)?),
        ScalarKind::I32 => ScalarValue::I32(parse_int(kind, raw)?),
        ScalarKind::I64 => ScalarValue::I64(parse_int(kind, raw)?),
        ScalarKind::Isize => ScalarValue::Isize(parse_int(kind, raw)?),
        ScalarKind::U8 => ScalarValue::U8(parse_int(kind, raw)?),
        ScalarKind::U16 => ScalarValue::U16(parse_int(kind, raw)?),
        ScalarKind::U32 => ScalarValue::U32(parse_int(kind, raw)?),
        ScalarKind::U64 => ScalarValue::U64(parse_int(kind, raw)?),
        ScalarKind::Usize => ScalarValue::Usize(parse_int(kind, raw)?),
        ScalarKind::F32 => ScalarValue::F32(parse_with(kind, raw, raw)?),
        ScalarKind::F64 => ScalarValue::F64(parse_with(kind, raw, raw)?),
        ScalarKind::String => ScalarValue::String(raw.to_string()),
    };
    Ok(value)
}

/// Parse every element of `raw` as `kind`. One bad element fails the whole
/// slice.
pub fn coerce_slice<S: AsRef<str>>(kind: ScalarKind, raw: &[S]) -> Result<Vec<ScalarValue>, BindError> {
    raw.iter().map(|item| coerce_scalar(kind, item.as_ref())).collect()
}

/// Decode a raw request string into a struct field of type `T`.
///
/// Used by the code `#[derive(Bindable)]` generates. The coerced value is
/// handed to `T` directly, so non-finite floats survive.
pub fn decode_field<T: Reflect + DeserializeOwned>(field: &str, raw: &str) -> Result<T, BindError> {
    let kind = match T::shape() {
        TypeShape::Scalar(kind) => kind,
        TypeShape::Optional(inner) => match inner.scalar_kind() {
            Some(kind) => kind,
            None => return Err(BindError::Unsettable(format!("{field}: Option<{inner}>"))),
        },
        other => return Err(BindError::Unsettable(format!("{field}: {other}"))),
    };
    T::deserialize(coerce_scalar(kind, raw)?).map_err(|err| BindError::Coerce {
        kind,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

impl<'de> Deserializer<'de> for ScalarValue {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self {
            ScalarValue::Bool(v) => visitor.visit_bool(v),
            ScalarValue::I8(v) => visitor.visit_i8(v),
            ScalarValue::I16(v) => visitor.visit_i16(v),
            ScalarValue::I32(v) => visitor.visit_i32(v),
            ScalarValue::I64(v) => visitor.visit_i64(v),
            ScalarValue::Isize(v) => visitor.visit_i64(v as i64),
            ScalarValue::U8(v) => visitor.visit_u8(v),
            ScalarValue::U16(v) => visitor.visit_u16(v),
            ScalarValue::U32(v) => visitor.visit_u32(v),
            ScalarValue::U64(v) => visitor.visit_u64(v),
            ScalarValue::Usize(v) => visitor.visit_u64(v as u64),
            ScalarValue::F32(v) => visitor.visit_f32(v),
            ScalarValue::F64(v) => visitor.visit_f64(v),
            ScalarValue::String(v) => visitor.visit_string(v),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct enum
        identifier ignored_any
    }
}

fn parse_bool(raw: &str) -> Result<bool, BindError> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(BindError::Coerce {
            kind: ScalarKind::Bool,
            value: raw.to_string(),
            reason: "invalid syntax".to_string(),
        }),
    }
}

fn parse_int<T>(kind: ScalarKind, raw: &str) -> Result<T, BindError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_with(kind, raw, trim_zero_decimal(raw))
}

fn parse_with<T>(kind: ScalarKind, raw: &str, text: &str) -> Result<T, BindError>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse::<T>().map_err(|err| BindError::Coerce {
        kind,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

/// `"10.00"` parses as an integer; `"10."` and `"10.5"` do not.
fn trim_zero_decimal(raw: &str) -> &str {
    let Some((whole, fraction)) = raw.split_once('.') else {
        return raw;
    };
    if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') {
        whole
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_vocabulary() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(coerce_scalar(ScalarKind::Bool, raw).unwrap(), ScalarValue::Bool(true));
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(coerce_scalar(ScalarKind::Bool, raw).unwrap(), ScalarValue::Bool(false));
        }
        assert!(coerce_scalar(ScalarKind::Bool, "yes").is_err());
        assert!(coerce_scalar(ScalarKind::Bool, "").is_err());
    }

    #[test]
    fn test_signed_widths() {
        assert_eq!(coerce_scalar(ScalarKind::I8, "-128").unwrap(), ScalarValue::I8(-128));
        assert_eq!(coerce_scalar(ScalarKind::I16, "300").unwrap(), ScalarValue::I16(300));
        assert_eq!(coerce_scalar(ScalarKind::I32, "42").unwrap(), ScalarValue::I32(42));
        assert_eq!(
            coerce_scalar(ScalarKind::I64, "-9000000000").unwrap(),
            ScalarValue::I64(-9_000_000_000)
        );
        assert_eq!(coerce_scalar(ScalarKind::Isize, "7").unwrap(), ScalarValue::Isize(7));
    }

    #[test]
    fn test_unsigned_widths() {
        assert_eq!(coerce_scalar(ScalarKind::U8, "255").unwrap(), ScalarValue::U8(255));
        assert_eq!(coerce_scalar(ScalarKind::U16, "65535").unwrap(), ScalarValue::U16(65535));
        assert_eq!(coerce_scalar(ScalarKind::U32, "1").unwrap(), ScalarValue::U32(1));
        assert_eq!(
            coerce_scalar(ScalarKind::U64, "18446744073709551615").unwrap(),
            ScalarValue::U64(u64::MAX)
        );
        assert_eq!(coerce_scalar(ScalarKind::Usize, "0").unwrap(), ScalarValue::Usize(0));
    }

    #[test]
    fn test_integer_overflow_is_rejected() {
        assert!(coerce_scalar(ScalarKind::I8, "128").is_err());
        assert!(coerce_scalar(ScalarKind::U8, "256").is_err());
        assert!(coerce_scalar(ScalarKind::U32, "-1").is_err());
    }

    #[test]
    fn test_zero_decimal_integers() {
        assert_eq!(coerce_scalar(ScalarKind::I32, "10.0").unwrap(), ScalarValue::I32(10));
        assert_eq!(coerce_scalar(ScalarKind::U16, "8.000").unwrap(), ScalarValue::U16(8));
        assert!(coerce_scalar(ScalarKind::I32, "10.5").is_err());
        assert!(coerce_scalar(ScalarKind::I32, "10.").is_err());
    }

    #[test]
    fn test_floats() {
        assert_eq!(coerce_scalar(ScalarKind::F64, "3.25").unwrap(), ScalarValue::F64(3.25));
        assert_eq!(coerce_scalar(ScalarKind::F32, "-0.5").unwrap(), ScalarValue::F32(-0.5));
        assert_eq!(coerce_scalar(ScalarKind::F64, "12").unwrap(), ScalarValue::F64(12.0));
        assert!(coerce_scalar(ScalarKind::F64, "pi").is_err());
    }

    #[test]
    fn test_string_is_taken_verbatim() {
        assert_eq!(
            coerce_scalar(ScalarKind::String, " spaced ").unwrap(),
            ScalarValue::String(" spaced ".to_string())
        );
        assert_eq!(
            coerce_scalar(ScalarKind::String, "").unwrap(),
            ScalarValue::String(String::new())
        );
    }

    #[test]
    fn test_coerce_error_reports_kind_and_value() {
        let err = coerce_scalar(ScalarKind::I64, "abc").unwrap_err();
        match err {
            BindError::Coerce { kind, value, .. } => {
                assert_eq!(kind, ScalarKind::I64);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_slice_keeps_order_and_length() {
        let values = coerce_slice(ScalarKind::U32, &["3", "1", "2"]).unwrap();
        assert_eq!(
            values,
            vec![ScalarValue::U32(3), ScalarValue::U32(1), ScalarValue::U32(2)]
        );
    }

    #[test]
    fn test_slice_fails_on_one_bad_element() {
        let raw = vec!["1".to_string(), "two".to_string(), "3".to_string()];
        assert!(coerce_slice(ScalarKind::I32, &raw).is_err());
    }

    #[test]
    fn test_empty_slice() {
        let raw: [&str; 0] = [];
        assert!(coerce_slice(ScalarKind::Bool, &raw).unwrap().is_empty());
    }

    #[test]
    fn test_decode_field_scalar_and_optional() {
        assert_eq!(decode_field::<u16>("port", "8080").unwrap(), 8080);
        assert_eq!(decode_field::<Option<bool>>("admin", "t").unwrap(), Some(true));
        assert_eq!(decode_field::<String>("name", "ada").unwrap(), "ada");
    }

    #[test]
    fn test_decode_field_keeps_non_finite_floats() {
        assert!(decode_field::<f64>("ratio", "NaN").unwrap().is_nan());
        assert_eq!(decode_field::<f32>("ratio", "-inf").unwrap(), f32::NEG_INFINITY);
        assert_eq!(
            decode_field::<Option<f64>>("ratio", "infinity").unwrap(),
            Some(f64::INFINITY)
        );
    }

    #[test]
    fn test_decode_field_rejects_non_scalar() {
        let err = decode_field::<Vec<String>>("tags", "a").unwrap_err();
        assert!(matches!(err, BindError::Unsettable(_)));
    }
}
