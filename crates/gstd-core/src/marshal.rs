// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property value marshalling.
//!
//! A [`MarshallerRegistry`] maps each [`TypeTag`] to a parser (wire literal to
//! engine [`Value`]) and a formatter (engine value to JSON). Parsers validate
//! fully before anything touches the engine; a failed parse is always
//! [`ReturnCode::BadValue`]. A value type with no registered marshaller is
//! [`ReturnCode::MissingInitialization`].

use std::collections::HashMap;

use gstd_proto::ReturnCode;
use serde_json::{json, Value as Json};

use crate::engine::{EnumType, TypeTag, Value, ValueType};

/// Literal to value.
pub type ParseFn = fn(&MarshallerRegistry, &ValueType, &str) -> Result<Value, ReturnCode>;
/// Value to JSON.
pub type FormatFn = fn(&MarshallerRegistry, &ValueType, &Value) -> Json;

/// Parser/formatter pair for one type tag.
#[derive(Clone, Copy)]
pub struct Marshaller {
    /// Parse a wire literal.
    pub parse: ParseFn,
    /// Render a value as JSON.
    pub format: FormatFn,
}

/// Type tag to marshaller table.
#[derive(Clone, Default)]
pub struct MarshallerRegistry {
    table: HashMap<TypeTag, Marshaller>,
}

impl MarshallerRegistry {
    /// Registry with no marshallers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry covering every built-in tag.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(
            TypeTag::Int,
            Marshaller {
                parse: parse_int,
                format: format_scalar,
            },
        );
        registry.register(
            TypeTag::UInt,
            Marshaller {
                parse: parse_uint,
                format: format_scalar,
            },
        );
        registry.register(
            TypeTag::Double,
            Marshaller {
                parse: parse_double,
                format: format_scalar,
            },
        );
        registry.register(
            TypeTag::Bool,
            Marshaller {
                parse: parse_bool,
                format: format_scalar,
            },
        );
        registry.register(
            TypeTag::String,
            Marshaller {
                parse: parse_string,
                format: format_scalar,
            },
        );
        registry.register(
            TypeTag::Enum,
            Marshaller {
                parse: parse_enum,
                format: format_enum,
            },
        );
        registry.register(
            TypeTag::Array,
            Marshaller {
                parse: parse_array,
                format: format_array,
            },
        );
        registry
    }

    /// Install or replace the marshaller for `tag`.
    pub fn register(&mut self, tag: TypeTag, marshaller: Marshaller) {
        self.table.insert(tag, marshaller);
    }

    /// Marshaller for a value type.
    pub fn lookup(&self, ty: &ValueType) -> Result<&Marshaller, ReturnCode> {
        ty.tag()
            .and_then(|tag| self.table.get(&tag))
            .ok_or(ReturnCode::MissingInitialization)
    }

    /// Parse `literal` as a value of type `ty`.
    pub fn parse(&self, ty: &ValueType, literal: &str) -> Result<Value, ReturnCode> {
        let marshaller = self.lookup(ty)?;
        (marshaller.parse)(self, ty, literal)
    }

    /// JSON form of `value`. Types without a marshaller use
    /// [`describe_value`].
    pub fn format(&self, ty: &ValueType, value: &Value) -> Json {
        match self.lookup(ty) {
            Ok(marshaller) => (marshaller.format)(self, ty, value),
            Err(_) => describe_value(value),
        }
    }
}

/// Type-agnostic JSON form of a value.
///
/// Enums render as their ordinal, objects as their name, opaque values as
/// their display form. Non-finite doubles become `null`.
pub fn describe_value(value: &Value) -> Json {
    match value {
        Value::Int(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::String(v) => json!(v),
        Value::Enum(v) => json!(v),
        Value::Array(items) => Json::Array(items.iter().map(describe_value).collect()),
        Value::Object { name, .. } => json!(name),
        Value::Opaque { repr, .. } => json!(repr),
    }
}

/// Engine type name of a value, for signal argument reports.
pub fn value_type_name(value: &Value) -> String {
    match value {
        Value::Int(_) => "gint64".into(),
        Value::UInt(_) => "guint64".into(),
        Value::Double(_) => "gdouble".into(),
        Value::Bool(_) => "gboolean".into(),
        Value::String(_) => "gchararray".into(),
        Value::Enum(_) => "GEnum".into(),
        Value::Array(_) => "GstValueArray".into(),
        Value::Object { type_name, .. } | Value::Opaque { type_name, .. } => type_name.clone(),
    }
}

fn parse_int(_: &MarshallerRegistry, ty: &ValueType, literal: &str) -> Result<Value, ReturnCode> {
    let ValueType::Int { min, max, .. } = ty else {
        return Err(ReturnCode::BadValue);
    };
    let v: i64 = literal.parse().map_err(|_| ReturnCode::BadValue)?;
    if (*min..=*max).contains(&v) {
        Ok(Value::Int(v))
    } else {
        Err(ReturnCode::BadValue)
    }
}

fn parse_uint(_: &MarshallerRegistry, ty: &ValueType, literal: &str) -> Result<Value, ReturnCode> {
    let ValueType::UInt { min, max, .. } = ty else {
        return Err(ReturnCode::BadValue);
    };
    let v: u64 = literal.parse().map_err(|_| ReturnCode::BadValue)?;
    if (*min..=*max).contains(&v) {
        Ok(Value::UInt(v))
    } else {
        Err(ReturnCode::BadValue)
    }
}

fn parse_double(
    _: &MarshallerRegistry,
    ty: &ValueType,
    literal: &str,
) -> Result<Value, ReturnCode> {
    let ValueType::Double { min, max } = ty else {
        return Err(ReturnCode::BadValue);
    };
    let v: f64 = literal.parse().map_err(|_| ReturnCode::BadValue)?;
    if v.is_finite() && *min <= v && v <= *max {
        Ok(Value::Double(v))
    } else {
        Err(ReturnCode::BadValue)
    }
}

/// Boolean literal, case-insensitive.
pub fn parse_bool_token(literal: &str) -> Option<bool> {
    match literal.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_bool(_: &MarshallerRegistry, _: &ValueType, literal: &str) -> Result<Value, ReturnCode> {
    parse_bool_token(literal)
        .map(Value::Bool)
        .ok_or(ReturnCode::BadValue)
}

fn parse_string(
    _: &MarshallerRegistry,
    _: &ValueType,
    literal: &str,
) -> Result<Value, ReturnCode> {
    Ok(Value::String(literal.to_string()))
}

fn parse_enum(_: &MarshallerRegistry, ty: &ValueType, literal: &str) -> Result<Value, ReturnCode> {
    let ValueType::Enum(enum_type) = ty else {
        return Err(ReturnCode::BadValue);
    };
    enum_from_literal(enum_type, literal)
        .map(Value::Enum)
        .ok_or(ReturnCode::BadValue)
}

fn enum_from_literal(enum_type: &EnumType, literal: &str) -> Option<i32> {
    if let Some(v) = enum_type.values.iter().find(|v| v.nick == literal) {
        return Some(v.value);
    }
    if let Some(v) = enum_type.values.iter().find(|v| v.name == literal) {
        return Some(v.value);
    }
    let ordinal: i32 = literal.parse().ok()?;
    enum_type.by_value(ordinal).map(|v| v.value)
}

fn parse_array(
    registry: &MarshallerRegistry,
    ty: &ValueType,
    literal: &str,
) -> Result<Value, ReturnCode> {
    let ValueType::Array(elem) = ty else {
        return Err(ReturnCode::BadValue);
    };
    let inner = literal.trim();
    let inner = match (inner.strip_prefix('<'), inner.ends_with('>')) {
        (Some(rest), true) => &rest[..rest.len() - 1],
        (None, false) => inner,
        _ => return Err(ReturnCode::BadValue),
    };
    if inner.trim().is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    split_top_level(inner)?
        .into_iter()
        .map(|item| registry.parse(elem, item.trim()))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Split on commas that are not nested inside `<...>`.
fn split_top_level(s: &str) -> Result<Vec<&str>, ReturnCode> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1).ok_or(ReturnCode::BadValue)?,
            ',' if depth == 0 => {
                parts.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ReturnCode::BadValue);
    }
    parts.push(&s[start..]);
    Ok(parts)
}

fn format_scalar(_: &MarshallerRegistry, _: &ValueType, value: &Value) -> Json {
    describe_value(value)
}

fn format_enum(_: &MarshallerRegistry, ty: &ValueType, value: &Value) -> Json {
    match (ty, value) {
        (ValueType::Enum(enum_type), Value::Enum(v)) => enum_type
            .by_value(*v)
            .map_or_else(|| json!(v), |ev| json!(ev.nick)),
        _ => describe_value(value),
    }
}

fn format_array(registry: &MarshallerRegistry, ty: &ValueType, value: &Value) -> Json {
    match (ty, value) {
        (ValueType::Array(elem), Value::Array(items)) => {
            Json::Array(items.iter().map(|i| registry.format(elem, i)).collect())
        }
        _ => describe_value(value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::EnumValue;

    fn pattern() -> ValueType {
        ValueType::Enum(EnumType {
            name: "Pattern".into(),
            values: vec![
                EnumValue {
                    value: 0,
                    name: "SMPTE 100% color bars".into(),
                    nick: "smpte".into(),
                },
                EnumValue {
                    value: 18,
                    name: "Moving ball".into(),
                    nick: "ball".into(),
                },
            ],
        })
    }

    #[test]
    fn integers_are_strict_and_range_checked() {
        let r = MarshallerRegistry::standard();
        let ty = ValueType::Int {
            min: -1,
            max: 100,
            wide: false,
        };
        assert_eq!(r.parse(&ty, "+42"), Ok(Value::Int(42)));
        assert_eq!(r.parse(&ty, "-1"), Ok(Value::Int(-1)));
        assert_eq!(r.parse(&ty, "101"), Err(ReturnCode::BadValue));
        assert_eq!(r.parse(&ty, "12abc"), Err(ReturnCode::BadValue));
        assert_eq!(r.parse(&ty, " 12"), Err(ReturnCode::BadValue));
        assert_eq!(r.parse(&ValueType::uint(), "-3"), Err(ReturnCode::BadValue));
        assert_eq!(
            r.parse(&ValueType::uint(), "4294967296"),
            Err(ReturnCode::BadValue)
        );
    }

    #[test]
    fn doubles_must_be_finite_and_in_range() {
        let r = MarshallerRegistry::standard();
        let ty = ValueType::Double { min: 0.0, max: 1.0 };
        assert_eq!(r.parse(&ty, "0.5"), Ok(Value::Double(0.5)));
        assert_eq!(r.parse(&ty, "1.5"), Err(ReturnCode::BadValue));
        assert_eq!(r.parse(&ty, "NaN"), Err(ReturnCode::BadValue));
        assert_eq!(r.parse(&ty, "inf"), Err(ReturnCode::BadValue));
    }

    #[test]
    fn booleans_accept_the_token_set() {
        let r = MarshallerRegistry::standard();
        for t in ["true", "YES", "On", "1"] {
            assert_eq!(r.parse(&ValueType::Bool, t), Ok(Value::Bool(true)));
        }
        for t in ["false", "no", "OFF", "0"] {
            assert_eq!(r.parse(&ValueType::Bool, t), Ok(Value::Bool(false)));
        }
        assert_eq!(r.parse(&ValueType::Bool, "maybe"), Err(ReturnCode::BadValue));
    }

    #[test]
    fn enums_match_nick_then_name_then_ordinal() {
        let r = MarshallerRegistry::standard();
        let ty = pattern();
        assert_eq!(r.parse(&ty, "ball"), Ok(Value::Enum(18)));
        assert_eq!(r.parse(&ty, "SMPTE 100% color bars"), Ok(Value::Enum(0)));
        assert_eq!(r.parse(&ty, "18"), Ok(Value::Enum(18)));
        assert_eq!(r.parse(&ty, "7"), Err(ReturnCode::BadValue));
        assert_eq!(r.format(&ty, &Value::Enum(18)), json!("ball"));
    }

    #[test]
    fn arrays_parse_both_forms_and_nest() {
        let r = MarshallerRegistry::standard();
        let ints = ValueType::Array(Box::new(ValueType::int()));
        assert_eq!(
            r.parse(&ints, "<1, 2, 3>"),
            Ok(Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(
            r.parse(&ints, "4,5"),
            Ok(Value::Array(vec![Value::Int(4), Value::Int(5)]))
        );
        assert_eq!(r.parse(&ints, "<>"), Ok(Value::Array(vec![])));
        assert_eq!(r.parse(&ints, "<1, x>"), Err(ReturnCode::BadValue));
        assert_eq!(r.parse(&ints, "<1, 2"), Err(ReturnCode::BadValue));

        let matrix = ValueType::Array(Box::new(ints));
        let parsed = r.parse(&matrix, "<<1, 0>, <0, 1>>").unwrap();
        assert_eq!(r.format(&matrix, &parsed), json!([[1, 0], [0, 1]]));
    }

    #[test]
    fn unregistered_types_are_missing_initialization() {
        let r = MarshallerRegistry::standard();
        let caps = ValueType::Other("GstCaps".into());
        assert_eq!(r.parse(&caps, "ANY"), Err(ReturnCode::MissingInitialization));
        assert_eq!(
            MarshallerRegistry::empty().parse(&ValueType::Bool, "true"),
            Err(ReturnCode::MissingInitialization)
        );
        let opaque = Value::Opaque {
            type_name: "GstCaps".into(),
            repr: "ANY".into(),
        };
        assert_eq!(r.format(&caps, &opaque), json!("ANY"));
    }
}
