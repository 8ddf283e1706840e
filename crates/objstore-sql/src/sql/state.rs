//! Per-translation bookkeeping.
//!
//! A [`Translator`] is created for every (sub)query compiled and dropped when
//! its SQL has been assembled. It accumulates FROM and WHERE fragments, the
//! extra select items ORDER BY needs, a counter for synthetic aliases, and
//! which table alias holds each field of each FROM source.

use std::collections::HashMap;

use objstore_core::{ObjectStoreError, ObjectStoreResult};

use crate::metadata::Model;
use crate::platform::Platform;
use crate::query::{NodeId, Query, QueryClass};

/// Where the columns of one FROM source live.
#[derive(Debug, Clone)]
pub(super) enum FieldAliases {
    /// A class: each field maps to the alias of the component table that
    /// declares it.
    PerField {
        class: String,
        fields: HashMap<String, String>,
    },
    /// A subquery: every column is read from the derived table.
    Constant(String),
}

/// Text and counters accumulated while compiling one query.
#[derive(Debug, Default)]
pub(super) struct TranslationState {
    from: Vec<String>,
    where_parts: Vec<String>,
    synthetic_select: Vec<String>,
    counter: usize,
    field_aliases: HashMap<NodeId, FieldAliases>,
}

impl TranslationState {
    pub(super) fn add_to_from(&mut self, table: String) {
        self.from.push(table);
    }

    pub(super) fn add_to_where(&mut self, condition: String) {
        self.where_parts.push(condition);
    }

    pub(super) fn add_synthetic_select(&mut self, item: String) {
        if !self.synthetic_select.contains(&item) {
            self.synthetic_select.push(item);
        }
    }

    pub(super) fn synthetic_select(&self) -> &[String] {
        &self.synthetic_select
    }

    /// `indirect0`, `indirect1`, ...
    pub(super) fn next_indirect_alias(&mut self) -> String {
        let alias = format!("indirect{}", self.counter);
        self.counter += 1;
        alias
    }

    /// `orderbyfield0`, `orderbyfield1`, ... sharing the counter with the
    /// indirection table aliases.
    pub(super) fn next_order_by_alias(&mut self) -> String {
        let alias = format!("orderbyfield{}", self.counter);
        self.counter += 1;
        alias
    }

    pub(super) fn set_field_aliases(&mut self, from: NodeId, aliases: FieldAliases) {
        self.field_aliases.insert(from, aliases);
    }

    /// ` FROM a, b`, or nothing.
    pub(super) fn from_clause(&self) -> String {
        if self.from.is_empty() {
            String::new()
        } else {
            format!(" FROM {}", self.from.join(", "))
        }
    }

    /// ` WHERE a AND b`, or nothing.
    pub(super) fn where_clause(&self) -> String {
        if self.where_parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_parts.join(" AND "))
        }
    }
}

/// Compiles one query. The clause-building methods live in the sibling
/// modules: FROM in `from`, constraints in `constraint`, expressions in
/// `expression`, and SELECT, GROUP BY and ORDER BY in `clauses`.
pub(super) struct Translator<'a> {
    pub(super) model: &'a Model,
    pub(super) platform: Platform,
    pub(super) query: &'a Query,
    pub(super) state: TranslationState,
}

impl<'a> Translator<'a> {
    pub(super) fn new(model: &'a Model, platform: Platform, query: &'a Query) -> Self {
        Self {
            model,
            platform,
            query,
            state: TranslationState::default(),
        }
    }

    /// The alias of a FROM source or selected class.
    ///
    /// # Panics
    ///
    /// Panics if the node does not belong to the query being compiled.
    pub(super) fn alias_of(&self, id: NodeId) -> &'a str {
        let query = self.query;
        query
            .alias_of(id)
            .unwrap_or_else(|| panic!("node {id:?} has no alias in query {:?}", query.id()))
    }

    /// `alias.id`.
    pub(super) fn class_id(&self, qc: &QueryClass) -> String {
        format!("{}.id", self.alias_of(qc.id()))
    }

    /// The table alias holding `field` of a FROM source.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::FieldNotInModel`] if the source is a class
    /// without that field.
    ///
    /// # Panics
    ///
    /// Panics if the source is not in the FROM list of the query being
    /// compiled.
    pub(super) fn field_alias(&self, from: NodeId, field: &str) -> ObjectStoreResult<String> {
        match self.state.field_aliases.get(&from) {
            Some(FieldAliases::Constant(alias)) => Ok(alias.clone()),
            Some(FieldAliases::PerField { class, fields }) => {
                fields
                    .get(field)
                    .cloned()
                    .ok_or_else(|| ObjectStoreError::FieldNotInModel {
                        class: class.clone(),
                        field: field.to_string(),
                    })
            }
            None => panic!(
                "node {from:?} is not in the FROM list of query {:?}",
                self.query.id()
            ),
        }
    }
}

/// Double-quotes `alias` + `suffix` unless `alias` is all lower case.
pub(super) fn quote_alias(alias: &str, suffix: &str) -> String {
    if alias == alias.to_lowercase() {
        format!("{alias}{suffix}")
    } else {
        format!("\"{alias}{suffix}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_shared() {
        let mut state = TranslationState::default();
        assert_eq!(state.next_indirect_alias(), "indirect0");
        assert_eq!(state.next_order_by_alias(), "orderbyfield1");
        assert_eq!(state.next_indirect_alias(), "indirect2");
    }

    #[test]
    fn test_clauses_empty_and_joined() {
        let mut state = TranslationState::default();
        assert_eq!(state.from_clause(), "");
        assert_eq!(state.where_clause(), "");
        state.add_to_from("Employee AS a1_".into());
        state.add_to_from("Manager AS a1__1".into());
        state.add_to_where("a1_.id = a1__1.id".into());
        state.add_to_where("true".into());
        assert_eq!(state.from_clause(), " FROM Employee AS a1_, Manager AS a1__1");
        assert_eq!(state.where_clause(), " WHERE a1_.id = a1__1.id AND true");
    }

    #[test]
    fn test_synthetic_select_deduplicates() {
        let mut state = TranslationState::default();
        state.add_synthetic_select("x AS orderbyfield0".into());
        state.add_synthetic_select("x AS orderbyfield0".into());
        assert_eq!(state.synthetic_select().len(), 1);
    }

    #[test]
    fn test_quote_alias() {
        assert_eq!(quote_alias("a1_", ""), "a1_");
        assert_eq!(quote_alias("a1_", "id"), "a1_id");
        assert_eq!(quote_alias("Emp", ""), "\"Emp\"");
        assert_eq!(quote_alias("Emp", "name"), "\"Empname\"");
    }
}
