//! Table and column naming rules.
//!
//! Persistent classes map to tables named after the unqualified class name,
//! attributes to columns named after the field, references to `<field>Id`
//! columns. Names that collide with SQL keywords get an `intermine_` prefix.

use super::fields::{FieldDescriptor, IndirectionTable};
use super::model::ClassDescriptor;

const RESERVED_PREFIX: &str = "intermine_";

/// SQL keywords that cannot be used as bare identifiers.
const RESERVED_WORDS: &[&str] = &[
    "ALL", "ANALYSE", "ANALYZE", "AND", "ANY", "ARRAY", "AS", "ASC", "ASYMMETRIC", "BETWEEN",
    "BINARY", "BOTH", "CASE", "CAST", "CHECK", "COLLATE", "COLUMN", "CONSTRAINT", "CREATE",
    "CROSS", "CURRENT_DATE", "CURRENT_ROLE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "CURRENT_USER", "DEFAULT", "DEFERRABLE", "DELETE", "DESC", "DISTINCT", "DO", "DROP", "ELSE",
    "END", "EXCEPT", "EXISTS", "FALSE", "FOR", "FOREIGN", "FROM", "FULL", "GRANT", "GROUP",
    "HAVING", "ILIKE", "IN", "INITIALLY", "INNER", "INSERT", "INTERSECT", "INTO", "IS",
    "ISNULL", "JOIN", "KEY", "LEADING", "LEFT", "LIKE", "LIMIT", "LOCALTIME", "LOCALTIMESTAMP",
    "NATURAL", "NEW", "NOT", "NOTNULL", "NULL", "OBJECT", "OFF", "OFFSET", "OLD", "ON", "ONLY",
    "OR", "ORDER", "OUTER", "OVERLAPS", "PLACING", "PRIMARY", "REFERENCES", "RIGHT", "SELECT",
    "SESSION_USER", "SET", "SIMILAR", "SOME", "SYMMETRIC", "TABLE", "THEN", "TO", "TRAILING",
    "TRUE", "UNION", "UNIQUE", "UPDATE", "USER", "USING", "VALUES", "VERBOSE", "WHEN", "WHERE",
];

/// Returns `name` unchanged unless it is an SQL keyword, in which case it is
/// prefixed with `intermine_`.
///
/// # Examples
///
/// ```
/// use objstore_sql::metadata::naming::sql_compatible_name;
///
/// assert_eq!(sql_compatible_name("name"), "name");
/// assert_eq!(sql_compatible_name("order"), "intermine_order");
/// ```
pub fn sql_compatible_name(name: &str) -> String {
    let upper = name.to_uppercase();
    if RESERVED_WORDS.contains(&upper.as_str()) {
        format!("{RESERVED_PREFIX}{name}")
    } else {
        name.to_string()
    }
}

/// Strips any package qualification from a class name.
pub fn unqualified_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

/// Upper-cases the first character.
pub fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns the table name backing a class.
pub fn table_name(cld: &ClassDescriptor) -> String {
    sql_compatible_name(unqualified_name(cld.name()))
}

/// Returns the indirection table and its columns for a many-to-many collection
/// declared on `owner`.
///
/// Explicit names in the model win. Otherwise the outward column (element
/// ids) is the capitalised collection name, the inward column (owner ids) the
/// capitalised reverse field name or owner class name, and the table is the
/// two column names concatenated in lexical order, so both ends of a
/// bidirectional relationship share one table.
///
/// Returns `None` for anything other than a collection.
pub fn indirection_table(owner: &ClassDescriptor, field: &FieldDescriptor) -> Option<IndirectionTable> {
    let FieldDescriptor::Collection {
        name,
        reverse,
        indirection,
        ..
    } = field
    else {
        return None;
    };
    if let Some(explicit) = indirection {
        return Some(explicit.clone());
    }

    let outward_column = capitalise(&sql_compatible_name(name));
    let inward_column = capitalise(&sql_compatible_name(
        reverse
            .as_deref()
            .unwrap_or_else(|| unqualified_name(owner.name())),
    ));
    let table = if inward_column < outward_column {
        format!("{inward_column}{outward_column}")
    } else {
        format!("{outward_column}{inward_column}")
    };
    Some(IndirectionTable {
        table,
        inward_column,
        outward_column,
    })
}
