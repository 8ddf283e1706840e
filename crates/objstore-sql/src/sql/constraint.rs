//! Constraint compilation.

use std::collections::BTreeSet;

use objstore_core::{ObjectStoreError, ObjectStoreResult};

use super::clauses::{translate, OutputShape};
use super::state::Translator;
use crate::metadata::{decompose_class, naming, FieldDescriptor, RelationType};
use crate::query::{
    BagConstraint, BagOp, ClassConstraint, Constraint, ConstraintSet, ContainsConstraint,
    ContainsOp, ObjectTarget, QueryNode, SimpleConstraint, SubqueryConstraint,
};
use crate::value::Value;

impl Translator<'_> {
    /// Compiles `constraint` and appends it to the WHERE clause.
    pub(super) fn add_where(&mut self, constraint: &Constraint) -> ObjectStoreResult<()> {
        let sql = self.constraint(constraint)?;
        self.state.add_to_where(sql);
        Ok(())
    }

    pub(super) fn constraint(&mut self, constraint: &Constraint) -> ObjectStoreResult<String> {
        match constraint {
            Constraint::Set(c) => self.constraint_set(c),
            Constraint::Simple(c) => self.simple_constraint(c),
            Constraint::Subquery(c) => self.subquery_constraint(c),
            Constraint::Class(c) => self.class_constraint(c),
            Constraint::Contains(c) => self.contains_constraint(c),
            Constraint::Bag(c) => self.bag_constraint(c),
        }
    }

    fn constraint_set(&mut self, c: &ConstraintSet) -> ObjectStoreResult<String> {
        let op = c.op();
        if c.constraints().is_empty() {
            // AND over nothing is true, OR false; negation flips both
            return Ok((op.is_disjunctive() == op.is_negated()).to_string());
        }
        let parts = c
            .constraints()
            .iter()
            .map(|member| self.constraint(member))
            .collect::<ObjectStoreResult<Vec<_>>>()?;
        let joined = parts.join(if op.is_disjunctive() { " OR " } else { " AND " });
        Ok(if op.is_negated() {
            format!("( NOT ({joined}))")
        } else {
            format!("({joined})")
        })
    }

    fn simple_constraint(&self, c: &SimpleConstraint) -> ObjectStoreResult<String> {
        let left = self.evaluable(c.left())?;
        Ok(match c.right() {
            Some(right) => format!("{left} {} {}", c.op(), self.evaluable(right)?),
            None => format!("{left} {}", c.op()),
        })
    }

    fn subquery_constraint(&self, c: &SubqueryConstraint) -> ObjectStoreResult<String> {
        let left = self.node_id_or_value(c.left())?;
        let subquery = translate(self.model, self.platform, c.query(), None, OutputShape::IdOnly)?;
        Ok(format!("{left} {} ({subquery})", c.op()))
    }

    fn class_constraint(&self, c: &ClassConstraint) -> ObjectStoreResult<String> {
        Ok(format!(
            "{} {} {}",
            self.class_id(c.left()),
            c.op(),
            self.object_target(c.right())?
        ))
    }

    fn contains_constraint(&mut self, c: &ContainsConstraint) -> ObjectStoreResult<String> {
        let reference = c.reference();
        let owner = reference.query_class();
        let model = self.model;
        let fields = model.field_descriptors_for_class(owner.class_type())?;
        let descriptor = fields
            .get(reference.field_name())
            .copied()
            .filter(|fd| !matches!(fd, FieldDescriptor::Attribute { .. }))
            .ok_or_else(|| ObjectStoreError::FieldNotInModel {
                class: owner.class_type().to_string(),
                field: reference.field_name().to_string(),
            })?;

        match model.relation_type(descriptor) {
            Some(RelationType::ToOne) => self.contains_reference(c, descriptor),
            Some(RelationType::OneToMany) => self.contains_foreign_key(c, descriptor),
            Some(RelationType::ManyToMany) => self.contains_indirection(c, descriptor),
            None => unreachable!("attributes were filtered out above"),
        }
    }

    /// To-one: compare the foreign-key column on the owner.
    fn contains_reference(
        &self,
        c: &ContainsConstraint,
        descriptor: &FieldDescriptor,
    ) -> ObjectStoreResult<String> {
        let owner = c.reference().query_class();
        let alias = self.field_alias(owner.id(), descriptor.name())?;
        let Some(column) = descriptor.column_name() else {
            unreachable!("reference {} has a column", descriptor.name())
        };
        match (c.op(), c.target()) {
            (ContainsOp::IsNull | ContainsOp::IsNotNull, _) => {
                Ok(format!("{alias}.{column} {}", c.op()))
            }
            (op, Some(target)) => Ok(format!(
                "{alias}.{column} {} {}",
                comparison(op),
                self.object_target(target)?
            )),
            (op, None) => panic!("{op} on reference {} has no target", descriptor.name()),
        }
    }

    /// One-to-many: compare the owner's id with the element's reverse
    /// foreign key.
    fn contains_foreign_key(
        &self,
        c: &ContainsConstraint,
        descriptor: &FieldDescriptor,
    ) -> ObjectStoreResult<String> {
        let Some(ObjectTarget::Class(target)) = c.target() else {
            panic!(
                "one-to-many collection {} must be compared with a class",
                descriptor.name()
            )
        };
        let Some(reverse) = self.model.reverse_descriptor(descriptor) else {
            unreachable!("one-to-many collection {} has a reverse", descriptor.name())
        };
        let Some(reverse_column) = reverse.column_name() else {
            unreachable!("reverse reference {} has a column", reverse.name())
        };
        let target_alias = self.field_alias(target.id(), reverse.name())?;
        Ok(format!(
            "{} {} {target_alias}.{reverse_column}",
            self.class_id(c.reference().query_class()),
            comparison(c.op())
        ))
    }

    /// Many-to-many: join a fresh alias of the indirection table to both
    /// ends.
    fn contains_indirection(
        &mut self,
        c: &ContainsConstraint,
        descriptor: &FieldDescriptor,
    ) -> ObjectStoreResult<String> {
        let owner = c.reference().query_class();
        let Some(target) = c.target() else {
            panic!("collection {} cannot be tested for null", descriptor.name())
        };
        let target = self.object_target(target)?;

        let model = self.model;
        let declaring = decompose_class(model, owner.class_type())?
            .into_iter()
            .find_map(|cld| model.declaring_class(cld, descriptor.name()))
            .ok_or_else(|| ObjectStoreError::FieldNotInModel {
                class: owner.class_type().to_string(),
                field: descriptor.name().to_string(),
            })?;
        let Some(table) = naming::indirection_table(declaring, descriptor) else {
            unreachable!("{} is a collection", descriptor.name())
        };

        let indirect = self.state.next_indirect_alias();
        self.state
            .add_to_from(format!("{} AS {indirect}", table.table));
        let joined = format!(
            "{} = {indirect}.{} AND {indirect}.{} = {target}",
            self.class_id(owner),
            table.inward_column,
            table.outward_column
        );
        Ok(match c.op() {
            ContainsOp::Contains => format!("({joined})"),
            _ => format!("( NOT ({joined}))"),
        })
    }

    fn bag_constraint(&self, c: &BagConstraint) -> ObjectStoreResult<String> {
        let left = self.node_id_or_value(c.node())?;
        let mut members = BTreeSet::new();
        for value in c.bag() {
            if self.bag_accepts(c.node(), value) {
                members.insert(format!("{left} = {}", self.platform.literal(value)?));
            }
        }
        if members.is_empty() {
            return Ok((c.op() == BagOp::NotIn).to_string());
        }
        let joined = members.into_iter().collect::<Vec<_>>().join(" OR ");
        Ok(match c.op() {
            BagOp::In => format!("({joined})"),
            BagOp::NotIn => format!("( NOT ({joined}))"),
        })
    }

    /// Whether a bag value can be compared with `node`: objects of a
    /// compatible class for a class node, values of a matching type for an
    /// expression.
    fn bag_accepts(&self, node: &QueryNode, value: &Value) -> bool {
        match (node, value) {
            (QueryNode::Class(qc), Value::Object(obj)) => {
                self.model.is_assignable(&obj.class_type, qc.class_type())
            }
            (QueryNode::Class(_), _) => false,
            (QueryNode::Evaluable(e), value) => e.logical_type().map_or_else(
                || !matches!(value, Value::Null | Value::Object(_)),
                |t| t.accepts(value),
            ),
        }
    }

    /// `alias.id` for a class, the compiled expression otherwise.
    fn node_id_or_value(&self, node: &QueryNode) -> ObjectStoreResult<String> {
        match node {
            QueryNode::Class(qc) => Ok(self.class_id(qc)),
            QueryNode::Evaluable(e) => self.evaluable(e),
        }
    }

    /// `alias.id` for a class, the id for a stored object.
    fn object_target(&self, target: &ObjectTarget) -> ObjectStoreResult<String> {
        match target {
            ObjectTarget::Class(qc) => Ok(self.class_id(qc)),
            ObjectTarget::Object(obj) => obj
                .id
                .map(|id| id.to_string())
                .ok_or_else(|| ObjectStoreError::ObjectWithoutId(obj.class_type.to_string())),
        }
    }
}

const fn comparison(op: ContainsOp) -> &'static str {
    match op {
        ContainsOp::DoesNotContain | ContainsOp::IsNotNull => "!=",
        ContainsOp::Contains | ContainsOp::IsNull => "=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AttributeType, ClassDescriptor, Model};
    use crate::platform::Platform;
    use crate::query::{
        ClassOp, Query, QueryClass, QueryEvaluable, QueryField, QueryReference, SetOp, SimpleOp,
    };
    use crate::value::PersistedObject;

    fn company() -> Model {
        Model::new(
            "company",
            vec![
                ClassDescriptor::new(
                    "Employee",
                    vec![],
                    vec![
                        FieldDescriptor::attribute("name", AttributeType::String),
                        FieldDescriptor::attribute("age", AttributeType::Integer),
                        FieldDescriptor::reference("department", "Department", Some("employees")),
                        FieldDescriptor::collection("projects", "Project", Some("members")),
                    ],
                ),
                ClassDescriptor::new(
                    "Manager",
                    vec!["Employee"],
                    vec![FieldDescriptor::attribute("title", AttributeType::String)],
                ),
                ClassDescriptor::new(
                    "Department",
                    vec![],
                    vec![
                        FieldDescriptor::attribute("name", AttributeType::String),
                        FieldDescriptor::collection("employees", "Employee", Some("department")),
                    ],
                ),
                ClassDescriptor::new(
                    "Project",
                    vec![],
                    vec![FieldDescriptor::collection("members", "Employee", Some("projects"))],
                ),
            ],
        )
        .unwrap()
    }

    struct Fixture {
        model: Model,
        query: Query,
        employee: QueryClass,
        department: QueryClass,
        project: QueryClass,
    }

    /// Employee a1_, Department a2_, Project a3_.
    fn fixture() -> Fixture {
        let model = company();
        let employee = QueryClass::new(&model, "Employee").unwrap();
        let department = QueryClass::new(&model, "Department").unwrap();
        let project = QueryClass::new(&model, "Project").unwrap();
        let mut query = Query::new();
        query.add_from(&employee).add_from(&department).add_from(&project);
        Fixture {
            model,
            query,
            employee,
            department,
            project,
        }
    }

    fn compile(f: &Fixture, constraint: impl Into<Constraint>) -> ObjectStoreResult<String> {
        let mut t = Translator::new(&f.model, Platform::PostgreSQL, &f.query);
        t.build_from()?;
        t.constraint(&constraint.into())
    }

    fn field(f: &Fixture, name: &str) -> QueryEvaluable {
        QueryField::new(&f.employee, name, &f.model).unwrap().into()
    }

    fn reference(f: &Fixture, qc: &QueryClass, name: &str) -> QueryReference {
        QueryReference::new(qc, name, &f.model).unwrap()
    }

    #[test]
    fn test_empty_sets() {
        let f = fixture();
        assert_eq!(compile(&f, ConstraintSet::new(SetOp::And)).unwrap(), "true");
        assert_eq!(compile(&f, ConstraintSet::new(SetOp::Or)).unwrap(), "false");
        assert_eq!(compile(&f, ConstraintSet::new(SetOp::Nand)).unwrap(), "false");
        assert_eq!(compile(&f, ConstraintSet::new(SetOp::Nor)).unwrap(), "true");
    }

    #[test]
    fn test_nested_sets_keep_member_order() {
        let f = fixture();
        let set = ConstraintSet::new(SetOp::And)
            .with(SimpleConstraint::new(field(&f, "name"), SimpleOp::Equals, QueryEvaluable::value("Alice")))
            .with(
                ConstraintSet::new(SetOp::Or)
                    .with(SimpleConstraint::new(field(&f, "age"), SimpleOp::LessThan, QueryEvaluable::value(30)))
                    .with(SimpleConstraint::unary(field(&f, "age"), SimpleOp::IsNull)),
            );
        assert_eq!(
            compile(&f, set).unwrap(),
            "(a1_.name = 'Alice' AND (a1_.age < 30 OR a1_.age IS NULL))"
        );
    }

    #[test]
    fn test_negated_set() {
        let f = fixture();
        let set = ConstraintSet::new(SetOp::Nand)
            .with(SimpleConstraint::new(field(&f, "name"), SimpleOp::Matches, QueryEvaluable::value("A%")))
            .with(SimpleConstraint::unary(field(&f, "age"), SimpleOp::IsNotNull));
        assert_eq!(
            compile(&f, set).unwrap(),
            "( NOT (a1_.name LIKE 'A%' AND a1_.age IS NOT NULL))"
        );
    }

    #[test]
    fn test_class_constraint() {
        let f = fixture();
        let c = ClassConstraint::new(&f.department, ClassOp::Equals, PersistedObject::new("Department", 7));
        assert_eq!(compile(&f, c).unwrap(), "a2_.id = 7");
        let c = ClassConstraint::new(&f.employee, ClassOp::NotEquals, &f.employee);
        assert_eq!(compile(&f, c).unwrap(), "a1_.id != a1_.id");
    }

    #[test]
    fn test_class_constraint_transient_object() {
        let f = fixture();
        let c = ClassConstraint::new(&f.department, ClassOp::Equals, PersistedObject::transient("Department"));
        let err = compile(&f, c).unwrap_err();
        assert!(matches!(err, ObjectStoreError::ObjectWithoutId(ref c) if c == "Department"));
    }

    #[test]
    fn test_contains_reference() {
        let f = fixture();
        let c = ContainsConstraint::new(reference(&f, &f.employee, "department"), ContainsOp::Contains, &f.department);
        assert_eq!(compile(&f, c).unwrap(), "a1_.departmentId = a2_.id");
        let c = ContainsConstraint::new(
            reference(&f, &f.employee, "department"),
            ContainsOp::DoesNotContain,
            PersistedObject::new("Department", 3),
        );
        assert_eq!(compile(&f, c).unwrap(), "a1_.departmentId != 3");
        let c = ContainsConstraint::null_check(reference(&f, &f.employee, "department"), ContainsOp::IsNull);
        assert_eq!(compile(&f, c).unwrap(), "a1_.departmentId IS NULL");
        let c = ContainsConstraint::null_check(reference(&f, &f.employee, "department"), ContainsOp::IsNotNull);
        assert_eq!(compile(&f, c).unwrap(), "a1_.departmentId IS NOT NULL");
    }

    #[test]
    fn test_contains_one_to_many() {
        let f = fixture();
        let c = ContainsConstraint::new(reference(&f, &f.department, "employees"), ContainsOp::Contains, &f.employee);
        assert_eq!(compile(&f, c).unwrap(), "a2_.id = a1_.departmentId");
        let c = ContainsConstraint::new(
            reference(&f, &f.department, "employees"),
            ContainsOp::DoesNotContain,
            &f.employee,
        );
        assert_eq!(compile(&f, c).unwrap(), "a2_.id != a1_.departmentId");
    }

    #[test]
    fn test_contains_many_to_many_adds_indirection_table() {
        let f = fixture();
        let c = ContainsConstraint::new(reference(&f, &f.employee, "projects"), ContainsOp::Contains, &f.project);
        let mut t = Translator::new(&f.model, Platform::PostgreSQL, &f.query);
        t.build_from().unwrap();
        assert_eq!(
            t.constraint(&c.into()).unwrap(),
            "(a1_.id = indirect0.Members AND indirect0.Projects = a3_.id)"
        );
        assert_eq!(
            t.state.from_clause(),
            " FROM Employee AS a1_, Department AS a2_, Project AS a3_, MembersProjects AS indirect0"
        );
    }

    #[test]
    fn test_each_many_to_many_gets_a_fresh_alias() {
        let f = fixture();
        let set = ConstraintSet::new(SetOp::And)
            .with(ContainsConstraint::new(
                reference(&f, &f.employee, "projects"),
                ContainsOp::Contains,
                PersistedObject::new("Project", 5),
            ))
            .with(ContainsConstraint::new(
                reference(&f, &f.project, "members"),
                ContainsOp::DoesNotContain,
                &f.employee,
            ));
        let mut t = Translator::new(&f.model, Platform::PostgreSQL, &f.query);
        t.build_from().unwrap();
        assert_eq!(
            t.constraint(&set.into()).unwrap(),
            "((a1_.id = indirect0.Members AND indirect0.Projects = 5) AND \
             ( NOT (a3_.id = indirect1.Projects AND indirect1.Members = a1_.id)))"
        );
        assert!(t.state.from_clause().ends_with("MembersProjects AS indirect0, MembersProjects AS indirect1"));
    }

    #[test]
    fn test_contains_inherited_collection() {
        let model = company();
        let manager = QueryClass::new(&model, "Manager").unwrap();
        let project = QueryClass::new(&model, "Project").unwrap();
        let mut q = Query::new();
        q.add_from(&manager).add_from(&project);
        let c = ContainsConstraint::new(
            QueryReference::new(&manager, "projects", &model).unwrap(),
            ContainsOp::Contains,
            &project,
        );
        let mut t = Translator::new(&model, Platform::PostgreSQL, &q);
        t.build_from().unwrap();
        assert_eq!(
            t.constraint(&c.into()).unwrap(),
            "(a1_.id = indirect0.Members AND indirect0.Projects = a2_.id)"
        );
    }

    #[test]
    fn test_bag_filters_and_sorts() {
        let f = fixture();
        let bag = BagConstraint::new(
            field(&f, "name"),
            BagOp::In,
            vec![Value::from("b"), Value::from(3), Value::from("a"), Value::from("b")],
        );
        assert_eq!(compile(&f, bag).unwrap(), "(a1_.name = 'a' OR a1_.name = 'b')");
        let bag = BagConstraint::new(field(&f, "age"), BagOp::NotIn, vec![40, 30]);
        assert_eq!(compile(&f, bag).unwrap(), "( NOT (a1_.age = 30 OR a1_.age = 40))");
    }

    #[test]
    fn test_empty_bags() {
        let f = fixture();
        let none: Vec<Value> = Vec::new();
        assert_eq!(compile(&f, BagConstraint::new(field(&f, "name"), BagOp::In, none.clone())).unwrap(), "false");
        assert_eq!(compile(&f, BagConstraint::new(field(&f, "name"), BagOp::NotIn, none)).unwrap(), "true");
        // nothing of a usable type
        let bag = BagConstraint::new(field(&f, "age"), BagOp::In, vec!["x"]);
        assert_eq!(compile(&f, bag).unwrap(), "false");
    }

    #[test]
    fn test_bag_of_objects() {
        let f = fixture();
        let bag = BagConstraint::new(
            &f.employee,
            BagOp::In,
            vec![PersistedObject::new("Manager", 4), PersistedObject::new("Department", 9)],
        );
        assert_eq!(compile(&f, bag).unwrap(), "(a1_.id = 4)");
    }

    #[test]
    fn test_bag_with_transient_object() {
        let f = fixture();
        let bag = BagConstraint::new(
            &f.employee,
            BagOp::In,
            vec![PersistedObject::new("Employee", 1), PersistedObject::transient("Manager")],
        );
        let err = compile(&f, bag).unwrap_err();
        assert!(matches!(err, ObjectStoreError::ObjectWithoutId(ref c) if c == "Manager"));

        // Filtered out before its id is needed.
        let bag = BagConstraint::new(&f.employee, BagOp::NotIn, vec![PersistedObject::transient("Department")]);
        assert_eq!(compile(&f, bag).unwrap(), "true");
    }

    #[test]
    fn test_contains_reference_transient_object() {
        let f = fixture();
        let c = ContainsConstraint::new(
            reference(&f, &f.employee, "department"),
            ContainsOp::Contains,
            PersistedObject::transient("Department"),
        );
        let err = compile(&f, c).unwrap_err();
        assert!(matches!(err, ObjectStoreError::ObjectWithoutId(ref c) if c == "Department"));
    }

    #[test]
    fn test_contains_many_to_many_object() {
        let f = fixture();
        let c = ContainsConstraint::new(
            reference(&f, &f.employee, "projects"),
            ContainsOp::DoesNotContain,
            PersistedObject::new("Project", 5),
        );
        assert_eq!(
            compile(&f, c).unwrap(),
            "( NOT (a1_.id = indirect0.Members AND indirect0.Projects = 5))"
        );

        let c = ContainsConstraint::new(
            reference(&f, &f.employee, "projects"),
            ContainsOp::Contains,
            PersistedObject::transient("Project"),
        );
        let mut t = Translator::new(&f.model, Platform::PostgreSQL, &f.query);
        t.build_from().unwrap();
        let err = t.constraint(&c.into()).unwrap_err();
        assert!(matches!(err, ObjectStoreError::ObjectWithoutId(ref c) if c == "Project"));
        assert_eq!(
            t.state.from_clause(),
            " FROM Employee AS a1_, Department AS a2_, Project AS a3_"
        );
    }

    #[test]
    fn test_subquery_constraint() {
        let f = fixture();
        let inner_class = QueryClass::new(&f.model, "Manager").unwrap();
        let mut inner = Query::new();
        inner.add_from(&inner_class).add_to_select(&inner_class);
        let c = SubqueryConstraint::new(&f.employee, BagOp::NotIn, inner);
        assert_eq!(
            compile(&f, c).unwrap(),
            "a1_.id NOT IN (SELECT a1_.id FROM Manager AS a1_)"
        );
    }

    #[test]
    #[should_panic(expected = "is not in the FROM list")]
    fn test_field_of_foreign_source_panics() {
        let f = fixture();
        let manager = QueryClass::new(&f.model, "Manager").unwrap();
        let title = QueryField::new(&manager, "title", &f.model).unwrap();
        let c = SimpleConstraint::new(title, SimpleOp::Equals, QueryEvaluable::value("x"));
        let _ = compile(&f, c);
    }
}
