//! Field descriptors of the metadata model.
//!
//! Every persistent class declares attributes (scalar columns), references
//! (a single foreign-key column) and collections (no column on the owning
//! table). [`FieldDescriptor`] captures one such declaration and
//! [`AttributeType`] the logical type of an attribute.

use serde::{Deserialize, Serialize};

use super::naming;
use crate::value::Value;

/// The logical type of an attribute.
///
/// This is also the type vocabulary used by `Cast` expressions and by bag
/// constraints to decide which candidate values are comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// true / false.
    Boolean,
    /// 16-bit integer.
    Short,
    /// 32-bit integer. Object ids have this type.
    Integer,
    /// 64-bit integer.
    Long,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Arbitrary-precision decimal.
    BigDecimal,
    /// Text.
    String,
    /// A timestamp, stored as milliseconds since the epoch.
    Date,
}

impl AttributeType {
    /// Returns `true` for the integral and floating-point types.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean | Self::String | Self::Date)
    }

    /// Returns `true` for the integral types.
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Short | Self::Integer | Self::Long)
    }

    /// Returns `true` if `value` can be compared against a column of this type.
    ///
    /// Integers match every integral type, floats every non-integral numeric
    /// type. Pre-rendered SQL is accepted everywhere; `NULL` and objects never.
    pub const fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Null | Value::Object(_) => false,
            Value::Unknown(_) => true,
            Value::Bool(_) => matches!(self, Self::Boolean),
            Value::Int(_) => self.is_integral(),
            Value::Float(_) => matches!(self, Self::Float | Self::Double | Self::BigDecimal),
            Value::String(_) => matches!(self, Self::String),
            Value::Date(_) | Value::DateTime(_) | Value::DateTimeTz(_) => {
                matches!(self, Self::Date)
            }
        }
    }
}

/// Explicit names for the indirection table backing a many-to-many collection.
///
/// When absent the names are derived by [`naming`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectionTable {
    /// The table name.
    pub table: String,
    /// The column holding the owning object's id.
    pub inward_column: String,
    /// The column holding the referenced object's id.
    pub outward_column: String,
}

/// One field declared by a persistent class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDescriptor {
    /// A scalar column.
    Attribute {
        /// The field name.
        name: String,
        /// The logical type of the column.
        #[serde(rename = "type")]
        attribute_type: AttributeType,
    },
    /// A to-one relationship, stored as a foreign-key column on the owner.
    Reference {
        /// The field name.
        name: String,
        /// The class the reference points at.
        referenced_type: String,
        /// The name of the field on the referenced class pointing back, if any.
        #[serde(default)]
        reverse: Option<String>,
    },
    /// A to-many relationship.
    Collection {
        /// The field name.
        name: String,
        /// The element class.
        referenced_type: String,
        /// The name of the field on the element class pointing back, if any.
        #[serde(default)]
        reverse: Option<String>,
        /// Overrides for the derived indirection table names.
        #[serde(default)]
        indirection: Option<IndirectionTable>,
    },
}

impl FieldDescriptor {
    /// Creates an attribute descriptor.
    pub fn attribute(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self::Attribute {
            name: name.into(),
            attribute_type,
        }
    }

    /// Creates a reference descriptor.
    pub fn reference(
        name: impl Into<String>,
        referenced_type: impl Into<String>,
        reverse: Option<&str>,
    ) -> Self {
        Self::Reference {
            name: name.into(),
            referenced_type: referenced_type.into(),
            reverse: reverse.map(str::to_string),
        }
    }

    /// Creates a collection descriptor with derived indirection names.
    pub fn collection(
        name: impl Into<String>,
        referenced_type: impl Into<String>,
        reverse: Option<&str>,
    ) -> Self {
        Self::Collection {
            name: name.into(),
            referenced_type: referenced_type.into(),
            reverse: reverse.map(str::to_string),
            indirection: None,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        match self {
            Self::Attribute { name, .. }
            | Self::Reference { name, .. }
            | Self::Collection { name, .. } => name,
        }
    }

    /// Returns the attribute type, or `None` for relationships.
    pub const fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Self::Attribute { attribute_type, .. } => Some(*attribute_type),
            _ => None,
        }
    }

    /// Returns the class a relationship points at.
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            Self::Attribute { .. } => None,
            Self::Reference {
                referenced_type, ..
            }
            | Self::Collection {
                referenced_type, ..
            } => Some(referenced_type),
        }
    }

    /// Returns the name of the reverse field, if declared.
    pub fn reverse(&self) -> Option<&str> {
        match self {
            Self::Attribute { .. } => None,
            Self::Reference { reverse, .. } | Self::Collection { reverse, .. } => {
                reverse.as_deref()
            }
        }
    }

    /// Returns `true` for to-one references.
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    /// Returns `true` for collections.
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }

    /// Returns the physical column name, or `None` if the field has no
    /// column on its owner's table (collections).
    pub fn column_name(&self) -> Option<String> {
        match self {
            Self::Attribute { name, .. } => Some(naming::sql_compatible_name(name)),
            Self::Reference { name, .. } => Some(format!("{}Id", naming::sql_compatible_name(name))),
            Self::Collection { .. } => None,
        }
    }
}

/// How a relationship is represented in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationType {
    /// A foreign-key column on the owner's table.
    ToOne,
    /// A to-many collection whose elements carry a foreign key back to the owner.
    OneToMany,
    /// A to-many collection stored in an indirection table.
    ManyToMany,
}
