//! JSON serialization with null-safe output.
//!
//! Outgoing JSON never contains a bare `null` for a field: an absent value is
//! written as a placeholder picked from the field's declared type (see
//! [`policy`]). Deserialization is plain `serde_json` and ignores unknown
//! properties.
//!
//! [`JsonMapper`] is the configured encoder. [`JsonMapper::shared`] returns
//! the process-wide instance the free functions in this module delegate to.

pub mod datetime;
pub mod declared;
pub mod placeholder;
pub mod plan;
pub mod policy;
pub mod ser;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::{Map, Value};

pub use declared::{Composite, DeclaredType, Described, TypeKind};
pub use placeholder::{NullSerializer, Placeholder, DEFAULT_NULL_SERIALIZER};
pub use plan::{FieldDescriptor, PlanCache, SerializationPlan};
pub use policy::{apply_to, classify, placeholder_for, TypeCategory};
pub use ser::NullSafeSerializer;

use crate::config::{CommonConfig, JsonConfig};
use crate::errors::Result;

/// Configured JSON encoder.
///
/// Build it once and share it; the only interior state is the memoized plan
/// cache.
#[derive(Debug, Default)]
pub struct JsonMapper {
    plans: PlanCache,
    pretty: bool,
}

static SHARED: OnceLock<JsonMapper> = OnceLock::new();

impl JsonMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> JsonMapperBuilder {
        JsonMapperBuilder::default()
    }

    pub fn from_config(config: &JsonConfig) -> Self {
        Self::builder().pretty(config.pretty).build()
    }

    /// The process-wide mapper, built from [`CommonConfig::get`] on first use.
    pub fn shared() -> &'static JsonMapper {
        SHARED.get_or_init(|| JsonMapper::from_config(&CommonConfig::get().json))
    }

    pub fn plans(&self) -> &PlanCache {
        &self.plans
    }

    /// Plan `T` and every struct reachable from it.
    pub fn register<T: Composite>(&self) -> std::sync::Arc<SerializationPlan> {
        self.plans.plan::<T>()
    }

    /// Serialize with the configured layout (compact unless `pretty`).
    pub fn to_json<T>(&self, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize + Described,
    {
        let bytes = self.to_json_bytes(value)?;
        Ok(String::from_utf8(bytes).map_err(anyhow::Error::from)?)
    }

    pub fn to_json_pretty<T>(&self, value: &T) -> Result<String>
    where
        T: ?Sized + Serialize + Described,
    {
        let mut out = Vec::with_capacity(128);
        self.write_with(&mut out, PrettyFormatter::new(), value)?;
        Ok(String::from_utf8(out).map_err(anyhow::Error::from)?)
    }

    pub fn to_json_bytes<T>(&self, value: &T) -> Result<Vec<u8>>
    where
        T: ?Sized + Serialize + Described,
    {
        let mut out = Vec::with_capacity(128);
        self.to_writer(&mut out, value)?;
        Ok(out)
    }

    pub fn to_writer<W, T>(&self, writer: W, value: &T) -> Result<()>
    where
        W: Write,
        T: ?Sized + Serialize + Described,
    {
        if self.pretty {
            self.write_with(writer, PrettyFormatter::new(), value)
        } else {
            self.write_with(writer, CompactFormatter, value)
        }
    }

    /// Serialize into a `serde_json::Value` tree.
    pub fn to_value<T>(&self, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize + Described,
    {
        self.plans.register::<T>();
        let serializer = NullSafeSerializer::new(serde_json::value::Serializer, &self.plans)
            .with_declared(T::declared_type());
        Ok(value.serialize(serializer)?)
    }

    fn write_with<W, F, T>(&self, writer: W, formatter: F, value: &T) -> Result<()>
    where
        W: Write,
        F: Formatter,
        T: ?Sized + Serialize + Described,
    {
        self.plans.register::<T>();
        let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
        value.serialize(
            NullSafeSerializer::new(&mut ser, &self.plans).with_declared(T::declared_type()),
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct JsonMapperBuilder {
    pretty: bool,
    registrations: Vec<DeclaredType>,
}

impl JsonMapperBuilder {
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Plan `T` eagerly when the mapper is built.
    pub fn register<T: Composite>(mut self) -> Self {
        self.registrations.push(T::declared_type());
        self
    }

    pub fn build(self) -> JsonMapper {
        let plans = PlanCache::new();
        for declared in &self.registrations {
            plans.ensure(declared);
        }
        JsonMapper {
            plans,
            pretty: self.pretty,
        }
    }
}

// ── shared-mapper shortcuts ──────────────────────────────────────────

/// Serialize with the shared mapper, logging and swallowing failures.
pub fn to_json<T>(value: &T) -> Option<String>
where
    T: ?Sized + Serialize + Described,
{
    match JsonMapper::shared().to_json(value) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize {}: {}", std::any::type_name::<T>(), e);
            None
        }
    }
}

pub fn to_json_bytes<T>(value: &T) -> Result<Vec<u8>>
where
    T: ?Sized + Serialize + Described,
{
    JsonMapper::shared().to_json_bytes(value)
}

pub fn to_json_pretty<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize + Described,
{
    JsonMapper::shared().to_json_pretty(value)
}

pub fn to_value<T>(value: &T) -> Result<Value>
where
    T: ?Sized + Serialize + Described,
{
    JsonMapper::shared().to_value(value)
}

// ── deserialization ──────────────────────────────────────────────────

pub fn parse<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(Into::into)
}

pub fn parse_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(Into::into)
}

pub fn parse_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    serde_json::from_reader(reader).map_err(Into::into)
}

/// Parse a JSON array. Input that does not start with `[` is treated as the
/// body of one, so `{"a":1},{"a":2}` parses as two elements.
pub fn parse_array<T: DeserializeOwned>(json: &str) -> Result<Vec<T>> {
    if json.starts_with('[') {
        parse(json)
    } else {
        parse(&format!("[{json}]"))
    }
}

pub fn parse_map(json: &str) -> Result<Map<String, Value>> {
    parse(json)
}

pub fn parse_map_of<T: DeserializeOwned>(json: &str) -> Result<HashMap<String, T>> {
    parse(json)
}

/// Convert an already-parsed JSON tree into a typed value.
pub fn to_pojo<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(Into::into)
}

pub fn to_json_node(json: &str) -> Result<Value> {
    parse(json)
}

pub fn to_json_node_slice(bytes: &[u8]) -> Result<Value> {
    parse_slice(bytes)
}

pub fn to_json_node_reader<R: Read>(reader: R) -> Result<Value> {
    parse_reader(reader)
}
