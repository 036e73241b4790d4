//! Null substitution policy.
//!
//! Every field without an explicit null rule gets a placeholder picked from
//! its declared type: numbers become `-1`, booleans `false`, text, characters
//! and date-times `""`, arrays and sequences `[]`, anything else `{}`.

use super::declared::{DeclaredType, TypeKind};
use super::placeholder::{NullSerializer, Placeholder};
use super::plan::FieldDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Number,
    Boolean,
    String,
    Collection,
    Object,
}

/// Classify a declared type. First match wins, `Object` is the catch-all.
pub fn classify(declared: &DeclaredType) -> TypeCategory {
    if declared.is(TypeKind::Number) {
        TypeCategory::Number
    } else if declared.is(TypeKind::Boolean) {
        TypeCategory::Boolean
    } else if declared.is(TypeKind::Character) || declared.is(TypeKind::Text) {
        // No dedicated character placeholder.
        TypeCategory::String
    } else if declared.is_array() || declared.is(TypeKind::Sequence) {
        TypeCategory::Collection
    } else if declared.is(TypeKind::OffsetDateTime) || declared.is(TypeKind::Temporal) {
        TypeCategory::String
    } else {
        TypeCategory::Object
    }
}

pub fn placeholder_for(category: TypeCategory) -> Placeholder {
    match category {
        TypeCategory::Number => Placeholder::NegativeOne,
        TypeCategory::Boolean => Placeholder::False,
        TypeCategory::String => Placeholder::EmptyString,
        TypeCategory::Collection => Placeholder::EmptyArray,
        TypeCategory::Object => Placeholder::EmptyObject,
    }
}

/// Attach a placeholder to every field that has no null rule yet.
///
/// Fields with an explicit rule are left alone, which also makes a second
/// pass over the same fields a no-op.
pub fn apply_to(fields: &mut [FieldDescriptor]) {
    for field in fields.iter_mut() {
        if field.has_null_serializer() {
            continue;
        }
        let placeholder = placeholder_for(classify(field.declared_type()));
        field.assign_null_serializer(NullSerializer::Placeholder(placeholder));
    }
}
