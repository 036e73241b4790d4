//! Static type descriptions used to pick null placeholders.
//!
//! A `null` carries no runtime type, so the placeholder for an absent field
//! is chosen from the field's *declared* type. [`Described`] supplies that
//! description for std, `chrono` and `serde_json` types; user structs get it
//! from [`describe!`](crate::describe) or a hand-written [`Composite`] impl.

use std::any::type_name;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, LinkedList, VecDeque};
use std::num::{
    NonZeroI16, NonZeroI32, NonZeroI64, NonZeroI8, NonZeroIsize, NonZeroU16, NonZeroU32,
    NonZeroU64, NonZeroU8, NonZeroUsize,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use super::plan::FieldDescriptor;

/// A family a declared type belongs to ("is, or is a subtype of").
///
/// A type may belong to several families; the policy decides which one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Number,
    Boolean,
    Character,
    Text,
    Sequence,
    OffsetDateTime,
    Temporal,
}

impl TypeKind {
    pub const ALL: [TypeKind; 7] = [
        TypeKind::Number,
        TypeKind::Boolean,
        TypeKind::Character,
        TypeKind::Text,
        TypeKind::Sequence,
        TypeKind::OffsetDateTime,
        TypeKind::Temporal,
    ];
}

const NUMBER: &[TypeKind] = &[TypeKind::Number];
const BOOLEAN: &[TypeKind] = &[TypeKind::Boolean];
const CHARACTER: &[TypeKind] = &[TypeKind::Character];
const TEXT: &[TypeKind] = &[TypeKind::Text];
const SEQUENCE: &[TypeKind] = &[TypeKind::Sequence];
const OFFSET_DATE_TIME: &[TypeKind] = &[TypeKind::OffsetDateTime, TypeKind::Temporal];
const TEMPORAL: &[TypeKind] = &[TypeKind::Temporal];

/// Static description of a declared field type.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredType {
    name: &'static str,
    type_name: &'static str,
    kinds: &'static [TypeKind],
    array: bool,
    element: Option<fn() -> DeclaredType>,
    fields: Option<fn() -> Vec<FieldDescriptor>>,
}

impl DeclaredType {
    /// A leaf type belonging to the given families.
    pub const fn scalar(name: &'static str, kinds: &'static [TypeKind]) -> Self {
        Self {
            name,
            type_name: name,
            kinds,
            array: false,
            element: None,
            fields: None,
        }
    }

    /// A type outside every known family.
    pub const fn other(name: &'static str) -> Self {
        Self::scalar(name, &[])
    }

    /// A fixed-size array or slice of `element`.
    pub const fn array(name: &'static str, element: fn() -> DeclaredType) -> Self {
        Self {
            name,
            type_name: name,
            kinds: &[],
            array: true,
            element: Some(element),
            fields: None,
        }
    }

    /// A growable sequence or set of `element`.
    pub const fn sequence(name: &'static str, element: fn() -> DeclaredType) -> Self {
        Self {
            name,
            type_name: name,
            kinds: SEQUENCE,
            array: false,
            element: Some(element),
            fields: None,
        }
    }

    /// The struct `T`, planned field by field.
    ///
    /// Plans are keyed by the Rust type, so `T::NAME` only matters for
    /// values whose declared type is unknown at the point they serialize.
    pub fn composite<T: Composite>() -> Self {
        Self {
            name: T::NAME,
            type_name: type_name::<T>(),
            kinds: &[],
            array: false,
            element: None,
            fields: Some(T::fields),
        }
    }

    /// Attach the type of contained values (map values, for instance) so
    /// nested structs are planned together with the outer type.
    pub const fn with_element(mut self, element: fn() -> DeclaredType) -> Self {
        self.element = Some(element);
        self
    }

    /// Mark the type as an array type, keeping its families.
    pub const fn as_array(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Rust type this description was taken from.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kinds(&self) -> &'static [TypeKind] {
        self.kinds
    }

    pub fn is(&self, kind: TypeKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    pub fn is_composite(&self) -> bool {
        self.fields.is_some()
    }

    pub fn element(&self) -> Option<DeclaredType> {
        self.element.map(|element| element())
    }

    pub(crate) fn fields_fn(&self) -> Option<fn() -> Vec<FieldDescriptor>> {
        self.fields
    }
}

/// Types that can describe their declared shape without a value.
pub trait Described {
    fn declared_type() -> DeclaredType;
}

/// A struct with a field-by-field serialization plan.
///
/// Each field name must be the serialized key. `NAME` should be the name the
/// type's `Serialize` impl passes to `serialize_struct`; it is only used to
/// find a plan when the value sits where no declared type is known, such as
/// inside an enum variant.
pub trait Composite: Described {
    const NAME: &'static str;

    fn fields() -> Vec<FieldDescriptor>;
}

macro_rules! impl_scalar {
    ($kinds:expr => $($t:ty),* $(,)?) => {
        $(
            impl Described for $t {
                fn declared_type() -> DeclaredType {
                    DeclaredType::scalar(type_name::<$t>(), $kinds)
                }
            }
        )*
    };
}

impl_scalar!(NUMBER =>
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize,
    f32, f64,
    NonZeroI8, NonZeroI16, NonZeroI32, NonZeroI64, NonZeroIsize,
    NonZeroU8, NonZeroU16, NonZeroU32, NonZeroU64, NonZeroUsize,
    serde_json::Number,
);
impl_scalar!(BOOLEAN => bool);
impl_scalar!(CHARACTER => char);
impl_scalar!(TEXT => String, str, Path, PathBuf);
impl_scalar!(TEMPORAL => NaiveDateTime, NaiveDate, NaiveTime, SystemTime);

impl<Tz: TimeZone> Described for DateTime<Tz> {
    fn declared_type() -> DeclaredType {
        DeclaredType::scalar(type_name::<Self>(), OFFSET_DATE_TIME)
    }
}

impl Described for serde_json::Value {
    fn declared_type() -> DeclaredType {
        DeclaredType::other(type_name::<Self>())
    }
}

impl Described for serde_json::Map<String, serde_json::Value> {
    fn declared_type() -> DeclaredType {
        DeclaredType::other(type_name::<Self>())
    }
}

macro_rules! impl_transparent {
    ($($wrapper:ident),*) => {
        $(
            impl<T: ?Sized + Described> Described for $wrapper<T> {
                fn declared_type() -> DeclaredType {
                    T::declared_type()
                }
            }
        )*
    };
}

impl_transparent!(Box, Rc, Arc);

impl<T: Described> Described for Option<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }
}

impl<T: ?Sized + Described> Described for &T {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }
}

impl<T: ?Sized + Described + ToOwned> Described for Cow<'_, T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }
}

macro_rules! impl_sequence {
    ($($seq:ident),*) => {
        $(
            impl<T: Described> Described for $seq<T> {
                fn declared_type() -> DeclaredType {
                    DeclaredType::sequence(type_name::<Self>(), T::declared_type)
                }
            }
        )*
    };
}

impl_sequence!(Vec, VecDeque, LinkedList, BinaryHeap, BTreeSet);

impl<T: Described, S> Described for HashSet<T, S> {
    fn declared_type() -> DeclaredType {
        DeclaredType::sequence(type_name::<Self>(), T::declared_type)
    }
}

impl<T: Described, const N: usize> Described for [T; N] {
    fn declared_type() -> DeclaredType {
        DeclaredType::array(type_name::<Self>(), T::declared_type)
    }
}

impl<T: Described> Described for [T] {
    fn declared_type() -> DeclaredType {
        DeclaredType::array(type_name::<Self>(), T::declared_type)
    }
}

impl<K, V: Described, S> Described for HashMap<K, V, S> {
    fn declared_type() -> DeclaredType {
        DeclaredType::other(type_name::<Self>()).with_element(V::declared_type)
    }
}

impl<K, V: Described> Described for BTreeMap<K, V> {
    fn declared_type() -> DeclaredType {
        DeclaredType::other(type_name::<Self>()).with_element(V::declared_type)
    }
}

/// Implements [`Composite`] and [`Described`] for a plain struct.
///
/// Fields are listed with their declared types. `field as "key"` sets the
/// serialized key when serde renames the field, `Type as "Name"` sets the
/// struct name when serde renames the container, and `=> rule` attaches an
/// explicit null rule that the blanket policy never overrides. Mark a
/// `#[serde(flatten)]` field with `#[flatten]` so its keys are planned with
/// the outer struct.
///
/// ```
/// use serde::Serialize;
/// use storage_common::describe;
/// use storage_common::json::Placeholder;
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "camelCase")]
/// struct FileEntry {
///     name: Option<String>,
///     byte_size: Option<u64>,
///     parent: Option<u64>,
/// }
///
/// describe!(FileEntry {
///     name: Option<String>,
///     byte_size as "byteSize": Option<u64>,
///     parent: Option<u64> => Placeholder::EmptyObject,
/// });
///
/// let entry = FileEntry { name: None, byte_size: None, parent: None };
/// let json = storage_common::json::JsonMapper::new().to_json(&entry).unwrap();
/// assert_eq!(json, r#"{"name":"","byteSize":-1,"parent":{}}"#);
/// ```
#[macro_export]
macro_rules! describe {
    (
        $ty:ident $(as $rename:literal)? {
            $( $(#[$flag:ident])? $field:ident $(as $key:literal)? : $fty:ty $(=> $rule:expr)? ),* $(,)?
        }
    ) => {
        impl $crate::json::Composite for $ty {
            const NAME: &'static str = $crate::__describe_pick!(stringify!($ty) $(, $rename)?);

            fn fields() -> ::std::vec::Vec<$crate::json::FieldDescriptor> {
                ::std::vec![
                    $({
                        let field = $crate::json::FieldDescriptor::new(
                            $crate::__describe_pick!(stringify!($field) $(, $key)?),
                            <$fty as $crate::json::Described>::declared_type(),
                        );
                        $( let field = field.with_null_serializer($rule); )?
                        $( let field = field.$flag(); )?
                        field
                    }),*
                ]
            }
        }

        impl $crate::json::Described for $ty {
            fn declared_type() -> $crate::json::DeclaredType {
                $crate::json::DeclaredType::composite::<$ty>()
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __describe_pick {
    ($default:expr) => {
        $default
    };
    ($default:expr, $override:expr) => {
        $override
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local, Utc};

    #[test]
    fn test_numbers_are_numbers() {
        assert!(i32::declared_type().is(TypeKind::Number));
        assert!(f64::declared_type().is(TypeKind::Number));
        assert!(NonZeroU64::declared_type().is(TypeKind::Number));
        assert!(serde_json::Number::declared_type().is(TypeKind::Number));
    }

    #[test]
    fn test_wrappers_are_transparent() {
        let declared = <Option<Box<Arc<String>>>>::declared_type();
        assert!(declared.is(TypeKind::Text));
        assert_eq!(declared.name(), type_name::<String>());
        assert!(<Cow<'_, str>>::declared_type().is(TypeKind::Text));
    }

    #[test]
    fn test_zoned_date_times_are_offset_aware() {
        for declared in [
            DateTime::<FixedOffset>::declared_type(),
            DateTime::<Utc>::declared_type(),
            DateTime::<Local>::declared_type(),
        ] {
            assert!(declared.is(TypeKind::OffsetDateTime));
            assert!(declared.is(TypeKind::Temporal));
        }
        assert!(!NaiveDateTime::declared_type().is(TypeKind::OffsetDateTime));
        assert!(NaiveDate::declared_type().is(TypeKind::Temporal));
    }

    #[test]
    fn test_arrays_and_sequences_carry_elements() {
        let array = <[u8; 4]>::declared_type();
        assert!(array.is_array());
        assert!(!array.is(TypeKind::Sequence));
        assert!(array.element().unwrap().is(TypeKind::Number));

        let list = <Vec<String>>::declared_type();
        assert!(!list.is_array());
        assert!(list.is(TypeKind::Sequence));
        assert!(list.element().unwrap().is(TypeKind::Text));
    }

    #[test]
    fn test_maps_are_other_with_value_element() {
        let map = <HashMap<String, bool>>::declared_type();
        assert!(map.kinds().is_empty());
        assert!(!map.is_array());
        assert!(map.element().unwrap().is(TypeKind::Boolean));
        assert!(serde_json::Value::declared_type().kinds().is_empty());
    }

    struct Folder;

    describe!(Folder as "Directory" {
        id: Option<u64>,
        display_name as "displayName": Option<String>,
        children: Option<Vec<u64>> => serde_json::Value::Null,
    });

    #[test]
    fn test_describe_macro_builds_fields() {
        assert_eq!(<Folder as Composite>::NAME, "Directory");

        let fields = <Folder as Composite>::fields();
        let names: Vec<_> = fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["id", "displayName", "children"]);

        assert!(fields[0].declared_type().is(TypeKind::Number));
        assert!(!fields[0].has_null_serializer());
        assert!(fields[2].has_null_serializer());

        let declared = Folder::declared_type();
        assert!(declared.is_composite());
        assert_eq!(declared.name(), "Directory");
        assert_eq!(declared.type_name(), type_name::<Folder>());
    }

    struct Envelope<T>(Option<T>);

    impl<T: Described> Composite for Envelope<T> {
        const NAME: &'static str = "Envelope";

        fn fields() -> Vec<FieldDescriptor> {
            vec![FieldDescriptor::new("data", T::declared_type())]
        }
    }

    impl<T: Described> Described for Envelope<T> {
        fn declared_type() -> DeclaredType {
            DeclaredType::composite::<Self>()
        }
    }

    #[test]
    fn test_generic_composites_have_distinct_identities() {
        let numbers = <Envelope<u64>>::declared_type();
        let labels = <Envelope<String>>::declared_type();
        assert_eq!(numbers.name(), labels.name());
        assert_ne!(numbers.type_name(), labels.type_name());
    }

    struct Part;
    struct Whole;

    describe!(Part {
        size: Option<u64>,
    });

    describe!(Whole {
        label: Option<String>,
        #[flatten]
        part: Part,
    });

    #[test]
    fn test_describe_macro_marks_flattened_fields() {
        let fields = <Whole as Composite>::fields();
        assert!(!fields[0].is_flattened());
        assert!(fields[1].is_flattened());
    }
}
