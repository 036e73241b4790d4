use std::any::type_name;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use super::declared::{Composite, DeclaredType, Described};
use super::placeholder::{NullSerializer, DEFAULT_NULL_SERIALIZER};
use super::policy;

/// One serializable field of a composite type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    declared: DeclaredType,
    null_serializer: Option<NullSerializer>,
    flattened: bool,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, declared: DeclaredType) -> Self {
        Self {
            name,
            declared,
            null_serializer: None,
            flattened: false,
        }
    }

    /// Attach an explicit null rule. Explicit rules take precedence over the
    /// blanket placeholder policy.
    pub fn with_null_serializer(mut self, rule: impl Into<NullSerializer>) -> Self {
        self.null_serializer = Some(rule.into());
        self
    }

    /// Mark the field as `#[serde(flatten)]`: its own fields are written
    /// under the outer struct's keys.
    pub fn flatten(mut self) -> Self {
        self.flattened = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn declared_type(&self) -> &DeclaredType {
        &self.declared
    }

    pub fn null_serializer(&self) -> Option<&NullSerializer> {
        self.null_serializer.as_ref()
    }

    pub fn has_null_serializer(&self) -> bool {
        self.null_serializer.is_some()
    }

    pub fn assign_null_serializer(&mut self, rule: NullSerializer) {
        self.null_serializer = Some(rule);
    }

    pub fn is_flattened(&self) -> bool {
        self.flattened
    }
}

/// Field plans of one composite type, with null rules already assigned.
#[derive(Debug)]
pub struct SerializationPlan {
    name: &'static str,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl SerializationPlan {
    /// Build a plan for `declared`, running the null substitution policy over
    /// `fields`. Flattened composite fields are replaced by their own fields.
    pub fn build(declared: &DeclaredType, fields: Vec<FieldDescriptor>) -> Self {
        let mut seen = HashSet::from([declared.type_name()]);
        let mut fields = inline_flattened(fields, &mut seen);
        policy::apply_to(&mut fields);
        tracing::debug!(
            name = declared.name(),
            type_name = declared.type_name(),
            fields = fields.len(),
            "built serialization plan"
        );
        Self {
            name: declared.name(),
            type_name: declared.type_name(),
            fields,
        }
    }

    /// The name the struct serializes under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The rule for an absent value under `name`; unknown keys get the
    /// global default.
    pub fn null_serializer_for(&self, name: &str) -> &NullSerializer {
        self.field(name)
            .and_then(FieldDescriptor::null_serializer)
            .unwrap_or(&DEFAULT_NULL_SERIALIZER)
    }
}

fn inline_flattened(
    fields: Vec<FieldDescriptor>,
    seen: &mut HashSet<&'static str>,
) -> Vec<FieldDescriptor> {
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let inner = field
            .declared
            .fields_fn()
            .filter(|_| field.flattened && seen.insert(field.declared.type_name()));
        match inner {
            Some(inner) => out.extend(inline_flattened(inner(), seen)),
            None => out.push(field),
        }
    }
    out
}

#[derive(Debug, Default)]
struct PlanIndex {
    by_type: HashMap<&'static str, Arc<SerializationPlan>>,
    // `None` once two types share a name.
    by_name: HashMap<&'static str, Option<Arc<SerializationPlan>>>,
}

impl PlanIndex {
    fn insert(&mut self, plan: Arc<SerializationPlan>) -> Arc<SerializationPlan> {
        match self.by_type.entry(plan.type_name()) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&plan));
                self.by_name
                    .entry(plan.name())
                    .and_modify(|named| *named = None)
                    .or_insert_with(|| Some(Arc::clone(&plan)));
                plan
            }
        }
    }
}

/// Compute-once cache of serialization plans keyed by Rust type.
///
/// Concurrent first use of a type may build its plan twice, but only the
/// first inserted plan is kept and handed out.
#[derive(Debug, Default)]
pub struct PlanCache {
    index: RwLock<PlanIndex>,
    roots: RwLock<HashSet<&'static str>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the plan already built for `declared`.
    pub fn get(&self, declared: &DeclaredType) -> Option<Arc<SerializationPlan>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_type
            .get(declared.type_name())
            .cloned()
    }

    /// Look up a plan by the name its struct serializes under. Names shared
    /// by more than one planned type resolve to nothing.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<SerializationPlan>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(name)
            .cloned()
            .flatten()
    }

    pub fn len(&self) -> usize {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_type
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plan every composite type reachable from `T`, once per `T`.
    pub fn register<T: ?Sized + Described>(&self) {
        let root = type_name::<T>();
        if self
            .roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(root)
        {
            return;
        }

        self.ensure(&T::declared_type());
        self.roots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(root);
    }

    /// Plan `T` and its reachable composites, returning the plan for `T`.
    pub fn plan<T: Composite>(&self) -> Arc<SerializationPlan> {
        self.register::<T>();
        self.plan_for(&DeclaredType::composite::<T>(), T::fields)
    }

    /// The plan for `declared`, built on first use. `None` for anything that
    /// is not a composite.
    pub fn plan_of(&self, declared: &DeclaredType) -> Option<Arc<SerializationPlan>> {
        let fields = declared.fields_fn()?;
        Some(self.plan_for(declared, fields))
    }

    /// Plan every composite type reachable from `declared`.
    pub fn ensure(&self, declared: &DeclaredType) {
        let mut visited = HashSet::new();
        self.walk(declared, &mut visited);
    }

    fn walk(&self, declared: &DeclaredType, visited: &mut HashSet<&'static str>) {
        if let Some(fields) = declared.fields_fn() {
            if !visited.insert(declared.type_name()) {
                return;
            }
            let plan = self.plan_for(declared, fields);
            for field in plan.fields() {
                self.walk(field.declared_type(), visited);
            }
        }
        if let Some(element) = declared.element() {
            self.walk(&element, visited);
        }
    }

    fn plan_for(
        &self,
        declared: &DeclaredType,
        fields: fn() -> Vec<FieldDescriptor>,
    ) -> Arc<SerializationPlan> {
        if let Some(plan) = self.get(declared) {
            return plan;
        }

        let built = Arc::new(SerializationPlan::build(declared, fields()));
        self.write().insert(built)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PlanIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}
