//! FROM clause construction.
//!
//! A class source becomes one table per component of its type. The first
//! table takes the source alias, the others `<alias>_1`, `<alias>_2`, ...,
//! each joined to its predecessor on `id`. A subquery source becomes a
//! parenthesised derived table.

use std::collections::HashMap;

use objstore_core::ObjectStoreResult;

use super::clauses::{translate, OutputShape};
use super::state::{FieldAliases, Translator};
use crate::metadata::decompose_class;
use crate::query::{FromElement, Query, QueryClass};

impl Translator<'_> {
    pub(super) fn build_from(&mut self) -> ObjectStoreResult<()> {
        let query = self.query;
        for from in query.from_elements() {
            match from {
                FromElement::Class(qc) => self.add_class(qc)?,
                FromElement::Subquery(subquery) => self.add_subquery(subquery)?,
            }
        }
        Ok(())
    }

    fn add_class(&mut self, qc: &QueryClass) -> ObjectStoreResult<()> {
        let model = self.model;
        let base = self.alias_of(qc.id());
        let components = decompose_class(model, qc.class_type())?;

        let mut aliases: Vec<String> = Vec::with_capacity(components.len());
        for (sequence, cld) in components.iter().enumerate() {
            let alias = if sequence == 0 {
                base.to_string()
            } else {
                format!("{base}_{sequence}")
            };
            self.state
                .add_to_from(format!("{} AS {alias}", cld.table_name()));
            if let Some(previous) = aliases.last() {
                self.state
                    .add_to_where(format!("{previous}.id = {alias}.id"));
            }
            aliases.push(alias);
        }

        let mut fields = HashMap::new();
        for name in model.field_descriptors_for_class(qc.class_type())?.keys() {
            let owner = components
                .iter()
                .zip(&aliases)
                .find(|(cld, _)| cld.field_descriptor_by_name(name).is_some());
            if let Some((_, alias)) = owner {
                fields.insert((*name).to_string(), alias.clone());
            }
        }
        self.state.set_field_aliases(
            qc.id(),
            FieldAliases::PerField {
                class: qc.class_type().to_string(),
                fields,
            },
        );
        Ok(())
    }

    fn add_subquery(&mut self, subquery: &Query) -> ObjectStoreResult<()> {
        let alias = self.alias_of(subquery.id());
        let sql = translate(self.model, self.platform, subquery, None, OutputShape::SubqueryFrom)?;
        self.state.add_to_from(format!("({sql}) AS {alias}"));
        self.state
            .set_field_aliases(subquery.id(), FieldAliases::Constant(alias.to_string()));
        Ok(())
    }
}
