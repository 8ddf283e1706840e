//! Query nodes: FROM sources, field references and scalar expressions.
//!
//! # Examples
//!
//! ```
//! use objstore_sql::metadata::{AttributeType, ClassDescriptor, FieldDescriptor, Model};
//! use objstore_sql::query::{QueryClass, QueryEvaluable, QueryField};
//!
//! let model = Model::new("m", vec![ClassDescriptor::new(
//!     "Employee",
//!     vec![],
//!     vec![FieldDescriptor::attribute("age", AttributeType::Integer)],
//! )]).unwrap();
//! let employee = QueryClass::new(&model, "Employee").unwrap();
//! let age = QueryField::new(&employee, "age", &model).unwrap();
//!
//! // age + 1
//! let next_year = QueryEvaluable::from(age) + QueryEvaluable::value(1);
//! assert_eq!(next_year.logical_type(), Some(AttributeType::Integer));
//! ```

use std::hash::{Hash, Hasher};
use std::ops;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use objstore_core::{ObjectStoreError, ObjectStoreResult};

use super::query::Query;
use crate::metadata::{decompose_class, AttributeType, ClassType, Model, ID_FIELD};
use crate::value::Value;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a FROM source or query.
///
/// Clones of a node share its id; separately built nodes never do, however
/// alike they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A persistent class used as a FROM source.
#[derive(Debug, Clone)]
pub struct QueryClass {
    id: NodeId,
    class_type: ClassType,
}

impl QueryClass {
    /// Creates a FROM source for `class_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::ClassNotInModel`] if any component of the
    /// type is unknown to `model`.
    pub fn new(model: &Model, class_type: impl Into<ClassType>) -> ObjectStoreResult<Self> {
        let class_type = class_type.into();
        decompose_class(model, &class_type)?;
        Ok(Self {
            id: NodeId::next(),
            class_type,
        })
    }

    /// The node identity.
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// The runtime type of the rows this source produces.
    pub const fn class_type(&self) -> &ClassType {
        &self.class_type
    }
}

impl PartialEq for QueryClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueryClass {}

impl Hash for QueryClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A FROM source: a class or a nested query.
#[derive(Debug, Clone)]
pub enum FromElement {
    /// A persistent class.
    Class(QueryClass),
    /// A nested query, compiled as a derived table.
    Subquery(Arc<Query>),
}

impl FromElement {
    /// The identity of the underlying class or query.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Class(qc) => qc.id(),
            Self::Subquery(q) => q.id(),
        }
    }
}

impl PartialEq for FromElement {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl From<QueryClass> for FromElement {
    fn from(qc: QueryClass) -> Self {
        Self::Class(qc)
    }
}

impl From<&QueryClass> for FromElement {
    fn from(qc: &QueryClass) -> Self {
        Self::Class(qc.clone())
    }
}

impl From<Arc<Query>> for FromElement {
    fn from(q: Arc<Query>) -> Self {
        Self::Subquery(q)
    }
}

impl From<Query> for FromElement {
    fn from(q: Query) -> Self {
        Self::Subquery(Arc::new(q))
    }
}

/// A column of a FROM source.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    from: FromElement,
    field_name: String,
    second_field_name: Option<String>,
    field_type: AttributeType,
}

impl QueryField {
    /// References attribute `field` of a class.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::FieldNotInModel`] if the class has no
    /// attribute of that name, and [`ObjectStoreError::ClassNotInModel`] if
    /// the class itself is unknown.
    pub fn new(qc: &QueryClass, field: &str, model: &Model) -> ObjectStoreResult<Self> {
        let fields = model.field_descriptors_for_class(qc.class_type())?;
        let field_type = fields
            .get(field)
            .and_then(|fd| fd.attribute_type())
            .ok_or_else(|| ObjectStoreError::FieldNotInModel {
                class: qc.class_type().to_string(),
                field: field.to_string(),
            })?;
        Ok(Self {
            from: FromElement::Class(qc.clone()),
            field_name: field.to_string(),
            second_field_name: None,
            field_type,
        })
    }

    /// References the identity column of a class.
    pub fn id_of(qc: &QueryClass) -> Self {
        Self {
            from: FromElement::Class(qc.clone()),
            field_name: ID_FIELD.to_string(),
            second_field_name: None,
            field_type: AttributeType::Integer,
        }
    }

    /// References a column of a FROM subquery.
    ///
    /// `select_alias` names an item of the subquery's select list. For an
    /// expression item `second` must be `None`; for a class item `second`
    /// names the attribute of that class, which the subquery exposes as the
    /// column `<select_alias><column>`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::FieldNotInModel`] if the subquery selects
    /// nothing under `select_alias` or the addressed attribute does not exist.
    pub fn for_subquery(
        subquery: &Arc<Query>,
        select_alias: &str,
        second: Option<&str>,
        model: &Model,
    ) -> ObjectStoreResult<Self> {
        let not_found = || ObjectStoreError::FieldNotInModel {
            class: "subquery".to_string(),
            field: second.map_or_else(
                || select_alias.to_string(),
                |s| format!("{select_alias}.{s}"),
            ),
        };
        let item = subquery
            .select()
            .iter()
            .find(|item| item.alias() == select_alias)
            .ok_or_else(not_found)?;

        let field_type = match (item.node(), second) {
            (QueryNode::Evaluable(e), None) => e.logical_type().unwrap_or(AttributeType::String),
            (QueryNode::Class(qc), Some(field)) => model
                .field_descriptors_for_class(qc.class_type())?
                .get(field)
                .and_then(|fd| fd.attribute_type())
                .ok_or_else(not_found)?,
            _ => return Err(not_found()),
        };
        Ok(Self {
            from: FromElement::Subquery(Arc::clone(subquery)),
            field_name: select_alias.to_string(),
            second_field_name: second.map(str::to_string),
            field_type,
        })
    }

    /// The source the column belongs to.
    pub const fn from_element(&self) -> &FromElement {
        &self.from
    }

    /// The field name, or the select alias for a subquery column.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The attribute of a selected class, for subquery columns.
    pub fn second_field_name(&self) -> Option<&str> {
        self.second_field_name.as_deref()
    }

    /// The logical type of the column.
    pub const fn field_type(&self) -> AttributeType {
        self.field_type
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
}

impl ArithmeticOp {
    /// The SQL operator symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    /// `COUNT(*)`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Average,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl AggregateOp {
    /// The SQL function name.
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Average => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// A scalar or aggregate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvaluable {
    /// A column.
    Field(QueryField),
    /// `(left op right)`.
    Arithmetic {
        /// The operator.
        op: ArithmeticOp,
        /// Left operand.
        left: Box<QueryEvaluable>,
        /// Right operand.
        right: Box<QueryEvaluable>,
    },
    /// `SUBSTR(base, start[, length])`.
    Substring {
        /// The string.
        base: Box<QueryEvaluable>,
        /// One-based start position.
        start: Box<QueryEvaluable>,
        /// Optional length.
        length: Option<Box<QueryEvaluable>>,
    },
    /// `STRPOS(haystack, needle)`.
    IndexOf {
        /// The string searched.
        haystack: Box<QueryEvaluable>,
        /// The string searched for.
        needle: Box<QueryEvaluable>,
    },
    /// An aggregate. `COUNT` takes no operand, every other function one.
    Aggregate {
        /// The function.
        op: AggregateOp,
        /// The aggregated expression.
        operand: Option<Box<QueryEvaluable>>,
    },
    /// A literal.
    Value(Value),
    /// `(inner)::TYPE`.
    Cast {
        /// The expression converted.
        inner: Box<QueryEvaluable>,
        /// The logical type converted to.
        target: AttributeType,
    },
}

impl QueryEvaluable {
    /// A literal.
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    /// `(left op right)`.
    pub fn arithmetic(op: ArithmeticOp, left: Self, right: Self) -> Self {
        Self::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `SUBSTR(base, start[, length])`.
    pub fn substring(base: Self, start: Self, length: Option<Self>) -> Self {
        Self::Substring {
            base: Box::new(base),
            start: Box::new(start),
            length: length.map(Box::new),
        }
    }

    /// `STRPOS(haystack, needle)`.
    pub fn index_of(haystack: Self, needle: Self) -> Self {
        Self::IndexOf {
            haystack: Box::new(haystack),
            needle: Box::new(needle),
        }
    }

    /// `COUNT(*)`.
    pub const fn count() -> Self {
        Self::Aggregate {
            op: AggregateOp::Count,
            operand: None,
        }
    }

    /// An aggregate over `operand`. `COUNT` ignores the operand.
    pub fn aggregate(op: AggregateOp, operand: Self) -> Self {
        match op {
            AggregateOp::Count => Self::count(),
            _ => Self::Aggregate {
                op,
                operand: Some(Box::new(operand)),
            },
        }
    }

    /// `(inner)::TYPE`.
    pub fn cast(inner: Self, target: AttributeType) -> Self {
        Self::Cast {
            inner: Box::new(inner),
            target,
        }
    }

    /// Returns `true` for literals.
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// The logical type this expression evaluates to, if known.
    ///
    /// `NULL`, objects and pre-rendered SQL literals have no known type.
    pub fn logical_type(&self) -> Option<AttributeType> {
        match self {
            Self::Field(f) => Some(f.field_type()),
            Self::Arithmetic { left, .. } => left.logical_type(),
            Self::Substring { .. } => Some(AttributeType::String),
            Self::IndexOf { .. } => Some(AttributeType::Integer),
            Self::Aggregate { op, operand } => {
                let operand_type = operand.as_ref().and_then(|o| o.logical_type());
                match op {
                    AggregateOp::Count => Some(AttributeType::Long),
                    AggregateOp::Average => Some(AttributeType::BigDecimal),
                    AggregateOp::Sum => operand_type.map(|t| {
                        if t.is_integral() {
                            AttributeType::Long
                        } else {
                            t
                        }
                    }),
                    AggregateOp::Min | AggregateOp::Max => operand_type,
                }
            }
            Self::Value(v) => v.attribute_type(),
            Self::Cast { target, .. } => Some(*target),
        }
    }
}

impl From<QueryField> for QueryEvaluable {
    fn from(f: QueryField) -> Self {
        Self::Field(f)
    }
}

impl From<Value> for QueryEvaluable {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl ops::Add for QueryEvaluable {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::arithmetic(ArithmeticOp::Add, self, rhs)
    }
}

impl ops::Sub for QueryEvaluable {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::arithmetic(ArithmeticOp::Subtract, self, rhs)
    }
}

impl ops::Mul for QueryEvaluable {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::arithmetic(ArithmeticOp::Multiply, self, rhs)
    }
}

impl ops::Div for QueryEvaluable {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::arithmetic(ArithmeticOp::Divide, self, rhs)
    }
}

/// Anything that can be selected, grouped or ordered by.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A whole object.
    Class(QueryClass),
    /// An expression.
    Evaluable(QueryEvaluable),
}

impl QueryNode {
    /// Returns `true` for literal expressions.
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Evaluable(QueryEvaluable::Value(_)))
    }
}

impl From<QueryClass> for QueryNode {
    fn from(qc: QueryClass) -> Self {
        Self::Class(qc)
    }
}

impl From<&QueryClass> for QueryNode {
    fn from(qc: &QueryClass) -> Self {
        Self::Class(qc.clone())
    }
}

impl From<QueryEvaluable> for QueryNode {
    fn from(e: QueryEvaluable) -> Self {
        Self::Evaluable(e)
    }
}

impl From<QueryField> for QueryNode {
    fn from(f: QueryField) -> Self {
        Self::Evaluable(QueryEvaluable::Field(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ClassDescriptor, FieldDescriptor};

    fn model() -> Model {
        Model::new(
            "m",
            vec![ClassDescriptor::new(
                "Employee",
                vec![],
                vec![
                    FieldDescriptor::attribute("name", AttributeType::String),
                    FieldDescriptor::attribute("age", AttributeType::Integer),
                    FieldDescriptor::attribute("salary", AttributeType::Double),
                    FieldDescriptor::reference("boss", "Employee", None),
                ],
            )],
        )
        .unwrap()
    }

    #[test]
    fn test_query_class_identity() {
        let model = model();
        let a = QueryClass::new(&model, "Employee").unwrap();
        let b = QueryClass::new(&model, "Employee").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_query_class_unknown() {
        let err = QueryClass::new(&model(), "Ghost").unwrap_err();
        assert!(matches!(err, ObjectStoreError::ClassNotInModel(_)));
    }

    #[test]
    fn test_query_field_types() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let age = QueryField::new(&qc, "age", &model).unwrap();
        assert_eq!(age.field_type(), AttributeType::Integer);
        assert_eq!(age.field_name(), "age");
        assert_eq!(age.second_field_name(), None);

        let id = QueryField::new(&qc, "id", &model).unwrap();
        assert_eq!(id, QueryField::id_of(&qc));
    }

    #[test]
    fn test_query_field_rejects_missing_and_references() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let err = QueryField::new(&qc, "height", &model).unwrap_err();
        assert!(matches!(err, ObjectStoreError::FieldNotInModel { ref field, .. } if field == "height"));
        assert!(QueryField::new(&qc, "boss", &model).is_err());
    }

    #[test]
    fn test_logical_types() {
        let model = model();
        let qc = QueryClass::new(&model, "Employee").unwrap();
        let age = QueryEvaluable::from(QueryField::new(&qc, "age", &model).unwrap());
        let salary = QueryEvaluable::from(QueryField::new(&qc, "salary", &model).unwrap());

        assert_eq!(QueryEvaluable::count().logical_type(), Some(AttributeType::Long));
        assert_eq!(
            QueryEvaluable::aggregate(AggregateOp::Sum, age.clone()).logical_type(),
            Some(AttributeType::Long)
        );
        assert_eq!(
            QueryEvaluable::aggregate(AggregateOp::Sum, salary.clone()).logical_type(),
            Some(AttributeType::Double)
        );
        assert_eq!(
            QueryEvaluable::aggregate(AggregateOp::Average, age.clone()).logical_type(),
            Some(AttributeType::BigDecimal)
        );
        assert_eq!(
            QueryEvaluable::aggregate(AggregateOp::Max, salary).logical_type(),
            Some(AttributeType::Double)
        );
        assert_eq!(
            QueryEvaluable::index_of(age.clone(), age.clone()).logical_type(),
            Some(AttributeType::Integer)
        );
        assert_eq!(
            QueryEvaluable::cast(age, AttributeType::String).logical_type(),
            Some(AttributeType::String)
        );
        assert_eq!(QueryEvaluable::value(Value::Null).logical_type(), None);
    }

    #[test]
    fn test_aggregate_count_drops_operand() {
        let v = QueryEvaluable::aggregate(AggregateOp::Count, QueryEvaluable::value(1));
        assert_eq!(v, QueryEvaluable::count());
    }

    #[test]
    fn test_operator_overloads() {
        let e = QueryEvaluable::value(1) * QueryEvaluable::value(2);
        assert!(matches!(
            e,
            QueryEvaluable::Arithmetic {
                op: ArithmeticOp::Multiply,
                ..
            }
        ));
        assert_eq!(ArithmeticOp::Divide.symbol(), "/");
        assert_eq!(AggregateOp::Average.sql_name(), "AVG");
    }

    #[test]
    fn test_query_node_is_value() {
        assert!(QueryNode::from(QueryEvaluable::value(1)).is_value());
        assert!(!QueryNode::from(QueryEvaluable::count()).is_value());
    }
}
