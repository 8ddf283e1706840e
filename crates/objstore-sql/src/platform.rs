//! Database platforms and their dialect differences.
//!
//! The generator emits one SQL dialect with two platform-specific pieces:
//! the column type names used by casts, and the spelling of literals.

use std::fmt;
use std::str::FromStr;

use objstore_core::{ObjectStoreError, ObjectStoreResult};

use crate::metadata::AttributeType;
use crate::value::Value;

/// The database platform SQL is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    /// PostgreSQL.
    #[default]
    PostgreSQL,
    /// MySQL.
    MySQL,
    /// SQLite.
    SQLite,
}

impl Platform {
    /// The vendor name, as accepted by [`FromStr`].
    pub const fn vendor(self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// The column type a logical type is stored as on this platform.
    ///
    /// # Examples
    ///
    /// ```
    /// use objstore_sql::metadata::AttributeType;
    /// use objstore_sql::platform::Platform;
    ///
    /// assert_eq!(Platform::PostgreSQL.sql_type_for(AttributeType::Long), "BIGINT");
    /// assert_eq!(Platform::SQLite.sql_type_for(AttributeType::Long), "INTEGER");
    /// ```
    pub const fn sql_type_for(self, attribute_type: AttributeType) -> &'static str {
        use AttributeType as T;
        match self {
            Self::PostgreSQL => match attribute_type {
                T::Boolean => "BOOLEAN",
                T::Short => "SMALLINT",
                T::Integer => "INTEGER",
                T::Long | T::Date => "BIGINT",
                T::Float => "REAL",
                T::Double => "DOUBLE PRECISION",
                T::BigDecimal => "NUMERIC",
                T::String => "TEXT",
            },
            Self::MySQL => match attribute_type {
                T::Boolean => "TINYINT",
                T::Short => "SMALLINT",
                T::Integer => "INTEGER",
                T::Long | T::Date => "BIGINT",
                T::Float => "FLOAT",
                T::Double => "DOUBLE",
                T::BigDecimal => "DECIMAL",
                T::String => "TEXT",
            },
            Self::SQLite => match attribute_type {
                T::Boolean | T::Short | T::Integer | T::Long | T::Date => "INTEGER",
                T::Float | T::Double => "REAL",
                T::BigDecimal => "NUMERIC",
                T::String => "TEXT",
            },
        }
    }

    /// Renders a value as an SQL literal.
    ///
    /// Temporal values become milliseconds since the epoch, persisted objects
    /// their id, and [`Value::Unknown`] is emitted verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::ObjectWithoutId`] for an object that has
    /// no id.
    pub fn literal(self, value: &Value) -> ObjectStoreResult<String> {
        let sql = match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match (self, b) {
                (Self::PostgreSQL, true) => "'true'".to_string(),
                (Self::PostgreSQL, false) => "'false'".to_string(),
                (_, true) => "1".to_string(),
                (_, false) => "0".to_string(),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_finite() => f.to_string(),
            Value::Float(f) if f.is_nan() => "'NaN'".to_string(),
            Value::Float(f) if f.is_sign_positive() => "'Infinity'".to_string(),
            Value::Float(_) => "'-Infinity'".to_string(),
            Value::String(s) => self.quote_string(s),
            Value::Date(_) | Value::DateTime(_) | Value::DateTimeTz(_) => value
                .epoch_millis()
                .map_or_else(|| "NULL".to_string(), |ms| ms.to_string()),
            Value::Object(obj) => obj
                .id
                .ok_or_else(|| ObjectStoreError::ObjectWithoutId(obj.class_type.to_string()))?
                .to_string(),
            Value::Unknown(sql) => sql.clone(),
        };
        Ok(sql)
    }

    fn quote_string(self, s: &str) -> String {
        let escaped = match self {
            Self::MySQL => s.replace('\\', "\\\\").replace('\'', "''"),
            Self::PostgreSQL | Self::SQLite => s.replace('\'', "''"),
        };
        format!("'{escaped}'")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.vendor())
    }
}

impl FromStr for Platform {
    type Err = ObjectStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::PostgreSQL),
            "mysql" => Ok(Self::MySQL),
            "sqlite" | "sqlite3" => Ok(Self::SQLite),
            other => Err(ObjectStoreError::ConfigurationError(format!(
                "unknown database platform: {other}"
            ))),
        }
    }
}
