//! Literal values that appear in queries.
//!
//! The [`Value`] enum covers the scalar types the metadata model knows about,
//! persisted objects (which compare by their row id), and pre-rendered SQL
//! text. How a value is spelled in SQL is a platform concern, see
//! [`Platform::literal`](crate::platform::Platform::literal).

use std::fmt;

use crate::metadata::{AttributeType, ClassType};

/// A reference to an object that has been (or may be) stored in the database.
///
/// Only the identity matters to the SQL generator: an object renders as its
/// id, and is rejected if it has none.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PersistedObject {
    /// The runtime type of the object.
    pub class_type: ClassType,
    /// The row id, or `None` if the object was never stored.
    pub id: Option<i64>,
}

impl PersistedObject {
    /// Creates a reference to a stored object.
    pub fn new(class_type: impl Into<ClassType>, id: i64) -> Self {
        Self {
            class_type: class_type.into(),
            id: Some(id),
        }
    }

    /// Creates a reference to an object that has no id yet.
    pub fn transient(class_type: impl Into<ClassType>) -> Self {
        Self {
            class_type: class_type.into(),
            id: None,
        }
    }
}

/// A literal value used as a constraint operand, select item or bag member.
///
/// # Examples
///
/// ```
/// use objstore_sql::value::Value;
///
/// let v = Value::from(42_i64);
/// assert_eq!(v, Value::Int(42));
///
/// let v = Value::from("hello");
/// assert_eq!(v, Value::String("hello".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A date without time.
    Date(chrono::NaiveDate),
    /// A date and time without timezone (treated as UTC).
    DateTime(chrono::NaiveDateTime),
    /// A date and time with UTC timezone.
    DateTimeTz(chrono::DateTime<chrono::Utc>),
    /// A persisted object, compared by id.
    Object(PersistedObject),
    /// Text that is already valid SQL and is emitted verbatim.
    Unknown(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) | Self::Unknown(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::DateTimeTz(dt) => write!(f, "{dt}"),
            Self::Object(obj) => match obj.id {
                Some(id) => write!(f, "{}:{id}", obj.class_type),
                None => write!(f, "{}:<unsaved>", obj.class_type),
            },
        }
    }
}

// ── From implementations ───────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<chrono::NaiveDate> for Value {
    fn from(v: chrono::NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Self::DateTimeTz(v)
    }
}

impl From<PersistedObject> for Value {
    fn from(v: PersistedObject) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Self::Null,
        }
    }
}

impl Value {
    /// Returns `true` if this value is `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the attribute type this value naturally has, if any.
    ///
    /// `Null`, objects and pre-rendered SQL have no attribute type.
    pub const fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Self::Bool(_) => Some(AttributeType::Boolean),
            Self::Int(_) => Some(AttributeType::Long),
            Self::Float(_) => Some(AttributeType::Double),
            Self::String(_) => Some(AttributeType::String),
            Self::Date(_) | Self::DateTime(_) | Self::DateTimeTz(_) => Some(AttributeType::Date),
            Self::Null | Self::Object(_) | Self::Unknown(_) => None,
        }
    }

    /// Milliseconds since the Unix epoch for temporal values.
    ///
    /// Dates are taken at midnight UTC.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Self::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis()),
            Self::DateTime(dt) => Some(dt.and_utc().timestamp_millis()),
            Self::DateTimeTz(dt) => Some(dt.timestamp_millis()),
            _ => None,
        }
    }
}
