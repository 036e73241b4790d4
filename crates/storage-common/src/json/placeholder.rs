use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// The five literals written in place of an absent value.
///
/// Each variant is a stateless serializer that ignores its input and always
/// writes the same output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `-1`
    NegativeOne,
    /// `false`
    False,
    /// `""`
    EmptyString,
    /// `[]`
    EmptyArray,
    /// `{}`
    EmptyObject,
}

impl Serialize for Placeholder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Placeholder::NegativeOne => serializer.serialize_i32(-1),
            Placeholder::False => serializer.serialize_bool(false),
            Placeholder::EmptyString => serializer.serialize_str(""),
            Placeholder::EmptyArray => serializer.serialize_seq(Some(0))?.end(),
            Placeholder::EmptyObject => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

/// What to write when a value is absent.
#[derive(Debug, Clone, PartialEq)]
pub enum NullSerializer {
    Placeholder(Placeholder),
    /// A fixed JSON value, written as-is. `Value::Null` keeps the null token.
    Literal(serde_json::Value),
}

/// Fallback for nulls that no field plan covers.
pub static DEFAULT_NULL_SERIALIZER: NullSerializer =
    NullSerializer::Placeholder(Placeholder::EmptyString);

impl From<Placeholder> for NullSerializer {
    fn from(placeholder: Placeholder) -> Self {
        NullSerializer::Placeholder(placeholder)
    }
}

impl From<serde_json::Value> for NullSerializer {
    fn from(value: serde_json::Value) -> Self {
        NullSerializer::Literal(value)
    }
}

impl Serialize for NullSerializer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NullSerializer::Placeholder(placeholder) => placeholder.serialize(serializer),
            NullSerializer::Literal(value) => value.serialize(serializer),
        }
    }
}
