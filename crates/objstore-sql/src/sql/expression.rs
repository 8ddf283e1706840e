//! Expression compilation.

use objstore_core::ObjectStoreResult;

use super::state::Translator;
use crate::metadata::naming::sql_compatible_name;
use crate::query::{AggregateOp, QueryEvaluable, QueryField};

impl Translator<'_> {
    /// Compiles a scalar or aggregate expression.
    ///
    /// # Panics
    ///
    /// Panics on an aggregate other than `COUNT` without an operand, and on a
    /// field of a source outside this query.
    pub(super) fn evaluable(&self, e: &QueryEvaluable) -> ObjectStoreResult<String> {
        let sql = match e {
            QueryEvaluable::Field(field) => self.field(field)?,
            QueryEvaluable::Arithmetic { op, left, right } => format!(
                "({} {} {})",
                self.evaluable(left)?,
                op.symbol(),
                self.evaluable(right)?
            ),
            QueryEvaluable::Substring {
                base,
                start,
                length,
            } => match length {
                Some(length) => format!(
                    "SUBSTR({}, {}, {})",
                    self.evaluable(base)?,
                    self.evaluable(start)?,
                    self.evaluable(length)?
                ),
                None => format!(
                    "SUBSTR({}, {})",
                    self.evaluable(base)?,
                    self.evaluable(start)?
                ),
            },
            QueryEvaluable::IndexOf { haystack, needle } => format!(
                "STRPOS({}, {})",
                self.evaluable(haystack)?,
                self.evaluable(needle)?
            ),
            QueryEvaluable::Aggregate {
                op: AggregateOp::Count,
                ..
            } => "COUNT(*)".to_string(),
            QueryEvaluable::Aggregate {
                op,
                operand: Some(operand),
            } => format!("{}({})", op.sql_name(), self.evaluable(operand)?),
            QueryEvaluable::Aggregate { op, operand: None } => {
                panic!("{} requires an operand", op.sql_name())
            }
            QueryEvaluable::Value(value) => self.platform.literal(value)?,
            QueryEvaluable::Cast { inner, target } => format!(
                "({})::{}",
                self.evaluable(inner)?,
                self.platform.sql_type_for(*target)
            ),
        };
        Ok(sql)
    }

    /// `alias.column`, where a subquery column of a selected class appends
    /// the attribute to the class alias.
    fn field(&self, field: &QueryField) -> ObjectStoreResult<String> {
        let alias = self.field_alias(field.from_element().id(), field.field_name())?;
        let second = field
            .second_field_name()
            .map(sql_compatible_name)
            .unwrap_or_default();
        Ok(format!(
            "{alias}.{}{second}",
            sql_compatible_name(field.field_name())
        ))
    }
}
