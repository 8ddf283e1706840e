//! Persistent classes and the model that holds them.
//!
//! A [`Model`] is built once from a list of [`ClassDescriptor`]s, validated,
//! and then treated as read-only. Query nodes carry a [`ClassType`], which
//! may name several classes at once (an object implementing multiple
//! persistent interfaces); [`decompose_class`] resolves such a type into the
//! descriptors whose tables have to be joined to form one logical row.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use objstore_core::{ObjectStoreError, ObjectStoreResult};
use serde::{Deserialize, Serialize};

use super::fields::{AttributeType, FieldDescriptor, RelationType};
use super::naming;

/// The name of the identity column every persistent class carries.
pub const ID_FIELD: &str = "id";

/// The runtime type of a query node: one or more persistent class names.
///
/// Names are kept sorted and deduplicated, so two types naming the same
/// classes in a different order are equal and decompose identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct ClassType(BTreeSet<String>);

impl ClassType {
    /// A type naming a single class.
    pub fn new(name: impl Into<String>) -> Self {
        Self(BTreeSet::from([name.into()]))
    }

    /// A type naming every class in `names`.
    ///
    /// # Panics
    ///
    /// Panics if `names` is empty.
    pub fn composite<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        assert!(!set.is_empty(), "a class type must name at least one class");
        Self(set)
    }

    /// The class names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `true` if more than one class is named.
    pub fn is_composite(&self) -> bool {
        self.0.len() > 1
    }
}

impl From<&str> for ClassType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl TryFrom<BTreeSet<String>> for ClassType {
    type Error = ObjectStoreError;

    fn try_from(names: BTreeSet<String>) -> Result<Self, Self::Error> {
        if names.is_empty() {
            return Err(ObjectStoreError::MetadataError(
                "a class type must name at least one class".to_string(),
            ));
        }
        Ok(Self(names))
    }
}

impl From<ClassType> for BTreeSet<String> {
    fn from(class_type: ClassType) -> Self {
        class_type.0
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        write!(f, "{}", names.join(" + "))
    }
}

/// Describes one persistent class: its name, the classes it extends and the
/// fields it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    name: String,
    #[serde(default, rename = "extends")]
    superclasses: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
    #[serde(skip)]
    all_fields: Vec<FieldDescriptor>,
}

impl ClassDescriptor {
    /// Creates a descriptor. Inherited fields are resolved when the
    /// descriptor is added to a [`Model`].
    pub fn new(name: impl Into<String>, superclasses: Vec<&str>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            superclasses: superclasses.into_iter().map(str::to_string).collect(),
            fields,
            all_fields: Vec::new(),
        }
    }

    /// The fully qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The names of the directly extended classes.
    pub fn superclasses(&self) -> &[String] {
        &self.superclasses
    }

    /// The fields declared on this class itself.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Declared and inherited fields, including the implicit `id` attribute.
    pub fn all_field_descriptors(&self) -> &[FieldDescriptor] {
        &self.all_fields
    }

    /// Looks a field up among declared and inherited fields.
    pub fn field_descriptor_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.all_fields.iter().find(|f| f.name() == name)
    }

    /// The table backing this class.
    pub fn table_name(&self) -> String {
        naming::table_name(self)
    }
}

#[derive(Deserialize)]
struct ModelDescription {
    name: String,
    classes: Vec<ClassDescriptor>,
}

/// Identifies one built [`Model`] for the lifetime of the process.
///
/// Clones share the id of the model they were cloned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A validated set of persistent classes.
#[derive(Debug, Clone)]
pub struct Model {
    id: ModelId,
    name: String,
    classes: BTreeMap<String, ClassDescriptor>,
}

impl Model {
    /// Builds a model, resolving inherited fields.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::MetadataError`] if a class is declared
    /// twice, extends or references a class that is not part of the model,
    /// names a reverse field that is not a relationship on the other side,
    /// or takes part in an inheritance cycle.
    pub fn new(name: impl Into<String>, classes: Vec<ClassDescriptor>) -> ObjectStoreResult<Self> {
        let mut by_name = BTreeMap::new();
        for cld in classes {
            if by_name.contains_key(&cld.name) {
                return Err(ObjectStoreError::MetadataError(format!(
                    "class {} is declared more than once",
                    cld.name
                )));
            }
            by_name.insert(cld.name.clone(), cld);
        }

        for cld in by_name.values() {
            for sup in &cld.superclasses {
                if !by_name.contains_key(sup) {
                    return Err(ObjectStoreError::MetadataError(format!(
                        "class {} extends {sup}, which is not in the model",
                        cld.name
                    )));
                }
            }
        }

        let mut resolved = HashMap::new();
        let names: Vec<String> = by_name.keys().cloned().collect();
        for name in &names {
            resolve_all_fields(name, &by_name, &mut resolved, &mut Vec::new())?;
        }
        for (name, all_fields) in resolved {
            if let Some(cld) = by_name.get_mut(&name) {
                cld.all_fields = all_fields;
            }
        }

        let model = Self {
            id: ModelId::next(),
            name: name.into(),
            classes: by_name,
        };
        model.validate_relationships()?;
        Ok(model)
    }

    /// Parses and builds a model from its JSON description:
    ///
    /// ```json
    /// {"name": "company", "classes": [
    ///     {"name": "Employee", "fields": [
    ///         {"kind": "attribute", "name": "name", "type": "string"}]}]}
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::SerializationError`] for malformed JSON and
    /// any error [`Model::new`] reports.
    pub fn from_json_str(json: &str) -> ObjectStoreResult<Self> {
        let description: ModelDescription = serde_json::from_str(json)
            .map_err(|e| ObjectStoreError::SerializationError(format!("invalid model: {e}")))?;
        Self::new(description.name, description.classes)
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This model's identity; two separately built models never share one,
    /// even when their names and classes match.
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// All classes, ordered by name.
    pub fn class_descriptors(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }

    /// Looks a class up by its fully qualified name.
    pub fn class_descriptor_by_name(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    /// Returns every field of every class in `class_type`, keyed by field
    /// name. When two components declare the same name, the component that
    /// sorts first wins.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::ClassNotInModel`] if a component is unknown.
    pub fn field_descriptors_for_class(
        &self,
        class_type: &ClassType,
    ) -> ObjectStoreResult<BTreeMap<&str, &FieldDescriptor>> {
        let mut fields = BTreeMap::new();
        for cld in decompose_class(self, class_type)? {
            for field in cld.all_field_descriptors() {
                fields.entry(field.name()).or_insert(field);
            }
        }
        Ok(fields)
    }

    /// Returns `true` if an instance of `sub` is also an instance of `sup`,
    /// i.e. every class named by `sup` is a component of `sub` or an
    /// ancestor of one.
    pub fn is_assignable(&self, sub: &ClassType, sup: &ClassType) -> bool {
        sup.names()
            .all(|wanted| sub.names().any(|have| self.is_subclass_of(have, wanted)))
    }

    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        if class == ancestor {
            return true;
        }
        self.classes.get(class).is_some_and(|cld| {
            cld.superclasses
                .iter()
                .any(|sup| self.is_subclass_of(sup, ancestor))
        })
    }

    /// The class declaring `field`: `cld` itself or the nearest ancestor.
    pub fn declaring_class<'a>(
        &'a self,
        cld: &'a ClassDescriptor,
        field: &str,
    ) -> Option<&'a ClassDescriptor> {
        if cld.fields.iter().any(|f| f.name() == field) {
            return Some(cld);
        }
        cld.superclasses
            .iter()
            .filter_map(|sup| self.classes.get(sup))
            .find_map(|sup| self.declaring_class(sup, field))
    }

    /// The field on the other side of a relationship, if one is declared.
    pub fn reverse_descriptor(&self, field: &FieldDescriptor) -> Option<&FieldDescriptor> {
        let target = self.classes.get(field.referenced_type()?)?;
        target.field_descriptor_by_name(field.reverse()?)
    }

    /// How a relationship is stored. `None` for attributes.
    ///
    /// A collection whose reverse is a reference is held by a foreign key on
    /// the element table; any other collection needs an indirection table.
    pub fn relation_type(&self, field: &FieldDescriptor) -> Option<RelationType> {
        match field {
            FieldDescriptor::Attribute { .. } => None,
            FieldDescriptor::Reference { .. } => Some(RelationType::ToOne),
            FieldDescriptor::Collection { .. } => {
                match self.reverse_descriptor(field) {
                    Some(reverse) if reverse.is_reference() => Some(RelationType::OneToMany),
                    _ => Some(RelationType::ManyToMany),
                }
            }
        }
    }

    fn validate_relationships(&self) -> ObjectStoreResult<()> {
        for cld in self.classes.values() {
            for field in &cld.fields {
                let Some(target) = field.referenced_type() else {
                    continue;
                };
                if !self.classes.contains_key(target) {
                    return Err(ObjectStoreError::MetadataError(format!(
                        "field {}.{} references {target}, which is not in the model",
                        cld.name,
                        field.name()
                    )));
                }
                if let Some(reverse) = field.reverse() {
                    let valid = self
                        .reverse_descriptor(field)
                        .is_some_and(|r| r.referenced_type().is_some());
                    if !valid {
                        return Err(ObjectStoreError::MetadataError(format!(
                            "field {}.{} names reverse {target}.{reverse}, which is not a relationship",
                            cld.name,
                            field.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn resolve_all_fields(
    name: &str,
    classes: &BTreeMap<String, ClassDescriptor>,
    resolved: &mut HashMap<String, Vec<FieldDescriptor>>,
    stack: &mut Vec<String>,
) -> ObjectStoreResult<Vec<FieldDescriptor>> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }
    if stack.iter().any(|n| n == name) {
        return Err(ObjectStoreError::MetadataError(format!(
            "inheritance cycle through {name}"
        )));
    }
    let cld = classes
        .get(name)
        .ok_or_else(|| ObjectStoreError::MetadataError(format!("{name} is not in the model")))?;

    stack.push(name.to_string());
    let mut fields: Vec<FieldDescriptor> = Vec::new();
    for sup in &cld.superclasses {
        for inherited in resolve_all_fields(sup, classes, resolved, stack)? {
            if !fields.iter().any(|f| f.name() == inherited.name()) {
                fields.push(inherited);
            }
        }
    }
    for own in &cld.fields {
        match fields.iter().position(|f| f.name() == own.name()) {
            Some(pos) => fields[pos] = own.clone(),
            None => fields.push(own.clone()),
        }
    }
    if !fields.iter().any(|f| f.name() == ID_FIELD) {
        fields.insert(0, FieldDescriptor::attribute(ID_FIELD, AttributeType::Integer));
    }
    stack.pop();

    resolved.insert(name.to_string(), fields.clone());
    Ok(fields)
}

/// Resolves a class type into the descriptors of its components, in sorted
/// name order.
///
/// # Errors
///
/// Returns [`ObjectStoreError::ClassNotInModel`] naming the first component
/// the model does not know.
pub fn decompose_class<'m>(
    model: &'m Model,
    class_type: &ClassType,
) -> ObjectStoreResult<Vec<&'m ClassDescriptor>> {
    class_type
        .names()
        .map(|name| {
            model
                .class_descriptor_by_name(name)
                .ok_or_else(|| ObjectStoreError::ClassNotInModel(name.to_string()))
        })
        .collect()
}
