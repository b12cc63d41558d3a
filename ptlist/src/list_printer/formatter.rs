//! Rendering of one content struct as `[field:value]` tokens

use crate::value::ValueObject;
use ptlist_types::BasicType;
use std::fmt::Write;

/// How a field's value is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Pointer,
    Other,
}

impl FieldKind {
    pub fn of(value: &ValueObject<'_>) -> Self {
        match value.basic_type() {
            BasicType::Int | BasicType::UnsignedInt | BasicType::Long | BasicType::UnsignedLong => {
                FieldKind::Integer
            }
            BasicType::Float | BasicType::Double => FieldKind::Float,
            _ if value.is_pointer() => FieldKind::Pointer,
            _ => FieldKind::Other,
        }
    }
}

/// Value part of a field token
///
/// Absent values (no float text, a pointer without a summary) render empty.
pub fn field_value(value: &ValueObject<'_>) -> String {
    match FieldKind::of(value) {
        FieldKind::Integer => value.value_as_signed().to_string(),
        FieldKind::Float => match value.value_text() {
            Some(text) => match text.trim().parse::<f64>() {
                Ok(number) => float_repr(number),
                Err(_) => text,
            },
            None => String::new(),
        },
        FieldKind::Pointer => value.summary().unwrap_or_default(),
        FieldKind::Other => value.value_text().unwrap_or_default(),
    }
}

/// Shortest round-trip form of `number`, with a signed two-digit exponent
/// (`1e+16`, `1e-05`) and lowercase `nan`
pub fn float_repr(number: f64) -> String {
    if number.is_nan() {
        return "nan".to_string();
    }
    let text = format!("{number:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

/// Tokens for every resolvable field of `content`, in `fields` order
pub fn format_node(content: &ValueObject<'_>, fields: &[String]) -> String {
    let mut line = String::new();
    for field in fields {
        let Some(child) = content.child_member(field) else {
            continue;
        };
        let _ = write!(line, "[{}:{}]", field, field_value(&child));
    }
    line.trim().to_string()
}
