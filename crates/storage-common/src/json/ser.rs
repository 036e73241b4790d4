//! `serde::Serializer` adapter that writes placeholders for absent values.
//!
//! Present values are forwarded to the wrapped serializer untouched. The
//! adapter carries the declared type of the value it is writing: a struct
//! takes the plan built for that type, and each field hands its own declared
//! type on to the value below it. Every absent value outside a planned field
//! (map values, sequence elements, the root) uses the global default.
//!
//! Where nothing declares the type, as inside enum variants, a struct falls
//! back to the plan registered under its serde name, if exactly one is.

use std::sync::Arc;

use serde::ser::{
    Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};

use serde_json::Value;

use super::declared::DeclaredType;
use super::placeholder::{NullSerializer, DEFAULT_NULL_SERIALIZER};
use super::plan::{PlanCache, SerializationPlan};

pub struct NullSafeSerializer<'a, S> {
    inner: S,
    plans: &'a PlanCache,
    on_null: &'a NullSerializer,
    declared: Option<DeclaredType>,
}

impl<'a, S> NullSafeSerializer<'a, S> {
    pub fn new(inner: S, plans: &'a PlanCache) -> Self {
        Self {
            inner,
            plans,
            on_null: &DEFAULT_NULL_SERIALIZER,
            declared: None,
        }
    }

    /// Declare the type of the root value, usually `T::declared_type()`.
    pub fn with_declared(mut self, declared: DeclaredType) -> Self {
        self.declared = Some(declared);
        self
    }
}

/// A value serialized through [`NullSafeSerializer`] with a given null rule.
struct Guarded<'a, T: ?Sized> {
    value: &'a T,
    plans: &'a PlanCache,
    on_null: &'a NullSerializer,
    declared: Option<DeclaredType>,
}

impl<T: ?Sized + Serialize> Serialize for Guarded<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(NullSafeSerializer {
            inner: serializer,
            plans: self.plans,
            on_null: self.on_null,
            declared: self.declared,
        })
    }
}

fn guarded<'a, T: ?Sized>(
    value: &'a T,
    plans: &'a PlanCache,
    declared: Option<DeclaredType>,
) -> Guarded<'a, T> {
    Guarded {
        value,
        plans,
        on_null: &DEFAULT_NULL_SERIALIZER,
        declared,
    }
}

/// The null rule and declared type for `key` in a planned struct.
fn field_slot<'p>(
    plan: &'p SerializationPlan,
    key: Option<&str>,
) -> (&'p NullSerializer, Option<DeclaredType>) {
    match key.and_then(|key| plan.field(key)) {
        Some(field) => (
            field
                .null_serializer()
                .unwrap_or(&DEFAULT_NULL_SERIALIZER),
            Some(*field.declared_type()),
        ),
        None => (&DEFAULT_NULL_SERIALIZER, None),
    }
}

// serde's flatten support writes struct fields as map entries with string
// keys; anything else is not a field name.
fn key_name<K: ?Sized + Serialize>(key: &K) -> Option<String> {
    match key.serialize(serde_json::value::Serializer) {
        Ok(Value::String(name)) => Some(name),
        _ => None,
    }
}

impl<'a, S: Serializer> Serializer for NullSafeSerializer<'a, S> {
    type Ok = S::Ok;
    type Error = S::Error;
    type SerializeSeq = Compound<'a, S::SerializeSeq>;
    type SerializeTuple = Compound<'a, S::SerializeTuple>;
    type SerializeTupleStruct = Compound<'a, S::SerializeTupleStruct>;
    type SerializeTupleVariant = Compound<'a, S::SerializeTupleVariant>;
    type SerializeMap = Compound<'a, S::SerializeMap>;
    type SerializeStruct = Compound<'a, S::SerializeStruct>;
    type SerializeStructVariant = Compound<'a, S::SerializeStructVariant>;

    fn serialize_bool(self, v: bool) -> Result<S::Ok, S::Error> {
        self.inner.serialize_bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i8(v)
    }

    fn serialize_i16(self, v: i16) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i16(v)
    }

    fn serialize_i32(self, v: i32) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i32(v)
    }

    fn serialize_i64(self, v: i64) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i64(v)
    }

    fn serialize_i128(self, v: i128) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u8(v)
    }

    fn serialize_u16(self, v: u16) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u16(v)
    }

    fn serialize_u32(self, v: u32) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u32(v)
    }

    fn serialize_u64(self, v: u64) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u64(v)
    }

    fn serialize_u128(self, v: u128) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u128(v)
    }

    fn serialize_f32(self, v: f32) -> Result<S::Ok, S::Error> {
        self.inner.serialize_f32(v)
    }

    fn serialize_f64(self, v: f64) -> Result<S::Ok, S::Error> {
        self.inner.serialize_f64(v)
    }

    fn serialize_char(self, v: char) -> Result<S::Ok, S::Error> {
        self.inner.serialize_char(v)
    }

    fn serialize_str(self, v: &str) -> Result<S::Ok, S::Error> {
        self.inner.serialize_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<S::Ok, S::Error> {
        self.inner.serialize_bytes(v)
    }

    fn serialize_none(self) -> Result<S::Ok, S::Error> {
        self.on_null.serialize(self.inner)
    }

    fn serialize_some<T>(self, value: &T) -> Result<S::Ok, S::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    // `serde_json::Value::Null` arrives here.
    fn serialize_unit(self) -> Result<S::Ok, S::Error> {
        self.on_null.serialize(self.inner)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<S::Ok, S::Error> {
        self.inner.serialize_unit_struct(name)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<S::Ok, S::Error> {
        self.inner.serialize_unit_variant(name, variant_index, variant)
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<S::Ok, S::Error>
    where
        T: ?Sized + Serialize,
    {
        // A newtype stands in for its field, so it keeps this slot's rule.
        let value = Guarded {
            value,
            plans: self.plans,
            on_null: self.on_null,
            declared: self.declared,
        };
        self.inner.serialize_newtype_struct(name, &value)
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<S::Ok, S::Error>
    where
        T: ?Sized + Serialize,
    {
        self.inner.serialize_newtype_variant(
            name,
            variant_index,
            variant,
            &guarded(value, self.plans, None),
        )
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, S::Error> {
        let element = self.element();
        let inner = self.inner.serialize_seq(len)?;
        Ok(Compound::new(inner, self.plans, None, element))
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, S::Error> {
        let element = self.element();
        let inner = self.inner.serialize_tuple(len)?;
        Ok(Compound::new(inner, self.plans, None, element))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, S::Error> {
        let inner = self.inner.serialize_tuple_struct(name, len)?;
        Ok(Compound::new(inner, self.plans, None, None))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, S::Error> {
        let inner = self
            .inner
            .serialize_tuple_variant(name, variant_index, variant, len)?;
        Ok(Compound::new(inner, self.plans, None, None))
    }

    // A struct with flattened fields arrives here instead of `serialize_struct`.
    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, S::Error> {
        let plan = self.declared.and_then(|declared| self.plans.plan_of(&declared));
        let element = self.element();
        let inner = self.inner.serialize_map(len)?;
        Ok(Compound::new(inner, self.plans, plan, element))
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, S::Error> {
        let plan = match self.declared.filter(DeclaredType::is_composite) {
            Some(declared) => self.plans.plan_of(&declared),
            None => self.plans.get_by_name(name),
        };
        let inner = self.inner.serialize_struct(name, len)?;
        Ok(Compound::new(inner, self.plans, plan, None))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, S::Error> {
        let inner = self
            .inner
            .serialize_struct_variant(name, variant_index, variant, len)?;
        Ok(Compound::new(inner, self.plans, None, None))
    }

    fn is_human_readable(&self) -> bool {
        self.inner.is_human_readable()
    }
}

impl<S> NullSafeSerializer<'_, S> {
    fn element(&self) -> Option<DeclaredType> {
        self.declared.and_then(|declared| declared.element())
    }
}

/// Wraps the inner serializer's compound state so nested values stay guarded.
pub struct Compound<'a, C> {
    inner: C,
    plans: &'a PlanCache,
    plan: Option<Arc<SerializationPlan>>,
    element: Option<DeclaredType>,
    pending_key: Option<String>,
}

impl<'a, C> Compound<'a, C> {
    fn new(
        inner: C,
        plans: &'a PlanCache,
        plan: Option<Arc<SerializationPlan>>,
        element: Option<DeclaredType>,
    ) -> Self {
        Self {
            inner,
            plans,
            plan,
            element,
            pending_key: None,
        }
    }
}

impl<C: SerializeSeq> SerializeSeq for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        self.inner
            .serialize_element(&guarded(value, self.plans, self.element))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTuple> SerializeTuple for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        self.inner
            .serialize_element(&guarded(value, self.plans, self.element))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTupleStruct> SerializeTupleStruct for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        self.inner.serialize_field(&guarded(value, self.plans, None))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTupleVariant> SerializeTupleVariant for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        self.inner.serialize_field(&guarded(value, self.plans, None))
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeMap> SerializeMap for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    // Keys are forwarded as-is; a null key stays the inner serializer's call.
    fn serialize_key<T>(&mut self, key: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        if self.plan.is_some() {
            self.pending_key = key_name(key);
        }
        self.inner.serialize_key(key)
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        let key = self.pending_key.take();
        let (on_null, declared) = match self.plan.as_deref() {
            Some(plan) => field_slot(plan, key.as_deref()),
            None => (&DEFAULT_NULL_SERIALIZER, self.element),
        };
        let value = Guarded {
            value,
            plans: self.plans,
            on_null,
            declared,
        };
        self.inner.serialize_value(&value)
    }

    fn serialize_entry<K, V>(&mut self, key: &K, value: &V) -> Result<(), C::Error>
    where
        K: ?Sized + Serialize,
        V: ?Sized + Serialize,
    {
        let (on_null, declared) = match self.plan.as_deref() {
            Some(plan) => field_slot(plan, key_name(key).as_deref()),
            None => (&DEFAULT_NULL_SERIALIZER, self.element),
        };
        let value = Guarded {
            value,
            plans: self.plans,
            on_null,
            declared,
        };
        self.inner.serialize_entry(key, &value)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeStruct> SerializeStruct for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        let (on_null, declared) = match self.plan.as_deref() {
            Some(plan) => field_slot(plan, Some(key)),
            None => (&DEFAULT_NULL_SERIALIZER, None),
        };
        let value = Guarded {
            value,
            plans: self.plans,
            on_null,
            declared,
        };
        self.inner.serialize_field(key, &value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), C::Error> {
        self.inner.skip_field(key)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeStructVariant> SerializeStructVariant for Compound<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), C::Error>
    where
        T: ?Sized + Serialize,
    {
        self.inner.serialize_field(key, &guarded(value, self.plans, None))
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), C::Error> {
        self.inner.skip_field(key)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}
