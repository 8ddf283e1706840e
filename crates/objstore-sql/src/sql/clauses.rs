//! SELECT, GROUP BY and ORDER BY assembly, and the translation entry point
//! that strings all clauses together.

use std::collections::BTreeMap;

use objstore_core::ObjectStoreResult;

use super::state::{quote_alias, Translator};
use crate::metadata::Model;
use crate::platform::Platform;
use crate::query::{Constraint, Query, QueryClass, QueryEvaluable, QueryNode, SelectItem};

/// The form a query is compiled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputShape {
    /// A top-level query: objects as `OBJECT` plus `id`, expressions aliased,
    /// with ORDER BY.
    Normal,
    /// A derived table in FROM: objects expanded to every column, each
    /// aliased `<alias><column>`.
    SubqueryFrom,
    /// The operand of `IN (...)`: objects reduced to their id, nothing aliased.
    IdOnly,
    /// Objects expanded to every column without aliases, as GROUP BY needs.
    NoAliasesAllFields,
}

impl OutputShape {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::SubqueryFrom => "subquery_from",
            Self::IdOnly => "id_only",
            Self::NoAliasesAllFields => "no_aliases_all_fields",
        }
    }
}

/// Compiles `query` into SQL without LIMIT or OFFSET.
///
/// `offset` is an extra condition ANDed onto the query's own constraint.
pub(crate) fn translate(
    model: &Model,
    platform: Platform,
    query: &Query,
    offset: Option<&Constraint>,
    shape: OutputShape,
) -> ObjectStoreResult<String> {
    let mut t = Translator::new(model, platform, query);
    t.build_from()?;
    if let Some(constraint) = query.constraint() {
        t.add_where(constraint)?;
    }
    if let Some(constraint) = offset {
        t.add_where(constraint)?;
    }
    // ORDER BY first: it registers the extra select items
    let order_by = if shape == OutputShape::Normal {
        t.order_by()?
    } else {
        String::new()
    };
    let select = t.select(shape)?;
    let group_by = t.group_by()?;

    let sql = format!(
        "SELECT {}{select}{}{}{group_by}{order_by}",
        if query.is_distinct() { "DISTINCT " } else { "" },
        t.state.from_clause(),
        t.state.where_clause(),
    );
    tracing::debug!("Translated query {:?} as {}: {sql}", query.id(), shape.name());
    Ok(sql)
}

impl Translator<'_> {
    /// Projects a class in the given shape.
    pub(super) fn class_projection(
        &self,
        qc: &QueryClass,
        shape: OutputShape,
    ) -> ObjectStoreResult<String> {
        let alias = self.alias_of(qc.id());
        match shape {
            OutputShape::IdOnly => Ok(self.class_id(qc)),
            OutputShape::Normal => Ok(format!(
                "{alias}.OBJECT AS {}, {alias}.id AS {}",
                quote_alias(alias, ""),
                quote_alias(alias, "id")
            )),
            OutputShape::SubqueryFrom | OutputShape::NoAliasesAllFields => {
                let with_aliases = shape == OutputShape::SubqueryFrom;
                let mut sql = format!("{alias}.OBJECT");
                if with_aliases {
                    sql.push_str(&format!(" AS {}", quote_alias(alias, "")));
                }
                let columns: BTreeMap<String, &str> = self
                    .model
                    .field_descriptors_for_class(qc.class_type())?
                    .into_values()
                    .filter_map(|fd| fd.column_name().map(|column| (column, fd.name())))
                    .collect();
                for (column, field) in columns {
                    let owner = self.field_alias(qc.id(), field)?;
                    sql.push_str(&format!(", {owner}.{column}"));
                    if with_aliases {
                        sql.push_str(&format!(" AS {}", quote_alias(alias, &column)));
                    }
                }
                Ok(sql)
            }
        }
    }

    pub(super) fn select(&self, shape: OutputShape) -> ObjectStoreResult<String> {
        let mut items = Vec::with_capacity(self.query.select().len());
        for item in self.query.select() {
            let sql = match item.node() {
                QueryNode::Class(qc) => self.class_projection(qc, shape)?,
                QueryNode::Evaluable(e) => {
                    let sql = self.evaluable(e)?;
                    match shape {
                        OutputShape::Normal => format!("{sql} AS {}", quote_alias(item.alias(), "")),
                        OutputShape::SubqueryFrom => format!("{sql} AS {}", item.alias()),
                        OutputShape::IdOnly | OutputShape::NoAliasesAllFields => sql,
                    }
                }
            };
            items.push(sql);
        }
        items.extend(self.state.synthetic_select().iter().cloned());
        Ok(items.join(", "))
    }

    pub(super) fn group_by(&self) -> ObjectStoreResult<String> {
        let parts = self
            .query
            .group_by()
            .iter()
            .map(|node| match node {
                QueryNode::Class(qc) => self.class_projection(qc, OutputShape::NoAliasesAllFields),
                QueryNode::Evaluable(e) => self.evaluable(e),
            })
            .collect::<ObjectStoreResult<Vec<_>>>()?;
        Ok(if parts.is_empty() {
            String::new()
        } else {
            format!(" GROUP BY {}", parts.join(", "))
        })
    }

    /// The explicit ORDER BY list followed by the select list, literals
    /// skipped. Expressions that are not selected are also added to the
    /// select list as `orderbyfieldN`.
    pub(super) fn order_by(&mut self) -> ObjectStoreResult<String> {
        let query = self.query;
        let mut registered: Vec<&QueryEvaluable> = Vec::new();
        let mut parts = Vec::new();
        let nodes = query
            .order_by()
            .iter()
            .chain(query.select().iter().map(SelectItem::node));
        for node in nodes {
            match node {
                _ if node.is_value() => {}
                QueryNode::Class(qc) => parts.push(self.class_id(qc)),
                QueryNode::Evaluable(e) => {
                    let sql = self.evaluable(e)?;
                    if !query.selects(node) && !registered.contains(&e) {
                        registered.push(e);
                        let alias = self.state.next_order_by_alias();
                        self.state.add_synthetic_select(format!("{sql} AS {alias}"));
                    }
                    parts.push(sql);
                }
            }
        }
        Ok(if parts.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", parts.join(", "))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::metadata::{AttributeType, ClassDescriptor, ClassType, FieldDescriptor};
    use crate::query::{
        ContainsConstraint, ContainsOp, QueryField, QueryReference, SimpleConstraint, SimpleOp,
    };

    fn model() -> Model {
        Model::new(
            "staff",
            vec![
                ClassDescriptor::new(
                    "Employee",
                    vec![],
                    vec![
                        FieldDescriptor::attribute("name", AttributeType::String),
                        FieldDescriptor::attribute("age", AttributeType::Integer),
                        FieldDescriptor::collection("projects", "Project", Some("members")),
                    ],
                ),
                ClassDescriptor::new(
                    "Project",
                    vec![],
                    vec![FieldDescriptor::collection("members", "Employee", Some("projects"))],
                ),
                ClassDescriptor::new(
                    "Contractor",
                    vec![],
                    vec![FieldDescriptor::attribute("agency", AttributeType::String)],
                ),
            ],
        )
        .unwrap()
    }

    fn normal(model: &Model, q: &Query) -> String {
        translate(model, Platform::PostgreSQL, q, None, OutputShape::Normal).unwrap()
    }

    #[test]
    fn test_composite_class_joins_its_tables() {
        let model = model();
        let qc = QueryClass::new(&model, ClassType::composite(["Employee", "Contractor"])).unwrap();
        let mut q = Query::new();
        q.add_from(&qc).add_to_select(&qc).set_constraint(SimpleConstraint::new(
            QueryField::new(&qc, "name", &model).unwrap(),
            SimpleOp::Equals,
            QueryEvaluable::value("Alice"),
        ));
        assert_eq!(
            normal(&model, &q),
            "SELECT a1_.OBJECT AS a1_, a1_.id AS a1_id FROM Contractor AS a1_, Employee AS a1__1 \
             WHERE a1_.id = a1__1.id AND a1__1.name = 'Alice' ORDER BY a1_.id"
        );
    }

    #[test]
    fn test_three_components_chain_joins() {
        let model = model();
        let qc = QueryClass::new(&model, ClassType::composite(["Project", "Employee", "Contractor"])).unwrap();
        let mut q = Query::new();
        q.add_from(&qc).add_to_select(&qc);
        assert_eq!(
            normal(&model, &q),
            "SELECT a1_.OBJECT AS a1_, a1_.id AS a1_id \
             FROM Contractor AS a1_, Employee AS a1__1, Project AS a1__2 \
             WHERE a1_.id = a1__1.id AND a1__1.id = a1__2.id ORDER BY a1_.id"
        );
    }

    #[test]
    fn test_distinct_and_literals_skipped_in_order_by() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let mut q = Query::new();
        q.add_from(&qc)
            .add_to_select(QueryEvaluable::value(1))
            .add_to_select(&qc)
            .set_distinct(true);
        assert_eq!(
            normal(&model, &q),
            "SELECT DISTINCT 1 AS a2_, a1_.OBJECT AS a1_, a1_.id AS a1_id FROM Employee AS a1_ ORDER BY a1_.id"
        );
    }

    #[test]
    fn test_upper_case_aliases_are_quoted() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let mut q = Query::new();
        q.add_from_with_alias(&qc, "Emp")
            .add_to_select(&qc)
            .add_to_select_with_alias(QueryEvaluable::count(), "Total");
        assert_eq!(
            normal(&model, &q),
            "SELECT Emp.OBJECT AS \"Emp\", Emp.id AS \"Empid\", COUNT(*) AS \"Total\" \
             FROM Employee AS Emp ORDER BY Emp.id, COUNT(*)"
        );
    }

    #[test]
    fn test_group_by_class_lists_every_column() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let mut q = Query::new();
        q.add_from(&qc)
            .add_to_select(&qc)
            .add_to_select(QueryEvaluable::count())
            .add_to_group_by(&qc);
        assert_eq!(
            normal(&model, &q),
            "SELECT a1_.OBJECT AS a1_, a1_.id AS a1_id, COUNT(*) AS a2_ FROM Employee AS a1_ \
             GROUP BY a1_.OBJECT, a1_.age, a1_.id, a1_.name ORDER BY a1_.id, COUNT(*)"
        );
    }

    #[test]
    fn test_order_by_field_is_selected_once() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let name = QueryField::new(&qc, "name", &model).unwrap();
        let mut q = Query::new();
        q.add_from(&qc)
            .add_to_select(&qc)
            .add_to_order_by(name.clone())
            .add_to_order_by(name);
        assert_eq!(
            normal(&model, &q),
            "SELECT a1_.OBJECT AS a1_, a1_.id AS a1_id, a1_.name AS orderbyfield0 FROM Employee AS a1_ \
             ORDER BY a1_.name, a1_.name, a1_.id"
        );
    }

    #[test]
    fn test_order_by_alias_follows_indirection_aliases() {
        let model = model();
        let employee = QueryClass::new(&model, "Employee").unwrap();
        let project = QueryClass::new(&model, "Project").unwrap();
        let mut q = Query::new();
        q.add_from(&employee)
            .add_from(&project)
            .add_to_select(&project)
            .add_to_order_by(QueryField::new(&employee, "age", &model).unwrap())
            .set_constraint(ContainsConstraint::new(
                QueryReference::new(&employee, "projects", &model).unwrap(),
                ContainsOp::Contains,
                &project,
            ));
        assert_eq!(
            normal(&model, &q),
            "SELECT a2_.OBJECT AS a2_, a2_.id AS a2_id, a1_.age AS orderbyfield1 \
             FROM Employee AS a1_, Project AS a2_, MembersProjects AS indirect0 \
             WHERE (a1_.id = indirect0.Members AND indirect0.Projects = a2_.id) \
             ORDER BY a1_.age, a2_.id"
        );
    }

    #[test]
    fn test_offset_constraint_is_anded() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let age = QueryField::new(&qc, "age", &model).unwrap();
        let mut q = Query::new();
        q.add_from(&qc).add_to_select(&qc).set_constraint(SimpleConstraint::new(
            age,
            SimpleOp::GreaterThanEquals,
            QueryEvaluable::value(18),
        ));
        let offset = Constraint::from(SimpleConstraint::new(
            QueryField::id_of(&qc),
            SimpleOp::GreaterThan,
            QueryEvaluable::value(100),
        ));
        assert_eq!(
            translate(&model, Platform::PostgreSQL, &q, Some(&offset), OutputShape::Normal).unwrap(),
            "SELECT a1_.OBJECT AS a1_, a1_.id AS a1_id FROM Employee AS a1_ \
             WHERE a1_.age >= 18 AND a1_.id > 100 ORDER BY a1_.id"
        );
    }

    #[test]
    fn test_subquery_in_from() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let mut inner = Query::new();
        inner
            .add_from(&qc)
            .add_to_select(&qc)
            .add_to_select(QueryField::new(&qc, "age", &model).unwrap());
        let inner = Arc::new(inner);
        assert_eq!(
            translate(&model, Platform::PostgreSQL, &inner, None, OutputShape::SubqueryFrom).unwrap(),
            "SELECT a1_.OBJECT AS a1_, a1_.age AS a1_age, a1_.id AS a1_id, a1_.name AS a1_name, \
             a1_.age AS a2_ FROM Employee AS a1_"
        );

        let mut outer = Query::new();
        outer
            .add_from(Arc::clone(&inner))
            .add_to_select(QueryField::for_subquery(&inner, "a2_", None, &model).unwrap());
        assert_eq!(
            normal(&model, &outer),
            "SELECT a1_.a2_ AS a2_ FROM (SELECT a1_.OBJECT AS a1_, a1_.age AS a1_age, a1_.id AS a1_id, \
             a1_.name AS a1_name, a1_.age AS a2_ FROM Employee AS a1_) AS a1_ ORDER BY a1_.a2_"
        );
    }

    #[test]
    fn test_id_only_shape() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let mut q = Query::new();
        q.add_from(&qc)
            .add_to_select(QueryField::new(&qc, "age", &model).unwrap())
            .add_to_order_by(QueryField::new(&qc, "name", &model).unwrap());
        assert_eq!(
            translate(&model, Platform::PostgreSQL, &q, None, OutputShape::IdOnly).unwrap(),
            "SELECT a1_.age FROM Employee AS a1_"
        );
    }

    #[test]
    fn test_shape_names() {
        assert_eq!(OutputShape::Normal.name(), "normal");
        assert_eq!(OutputShape::NoAliasesAllFields.name(), "no_aliases_all_fields");
    }
}
