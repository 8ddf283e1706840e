//! Boolean constraints over query nodes.
//!
//! Each constraint kind has its own struct and operator enum; [`Constraint`]
//! is the closed sum of them. The `Display` impl of every operator gives its
//! SQL spelling.

use std::fmt;
use std::sync::Arc;

use objstore_core::{ObjectStoreError, ObjectStoreResult};

use super::nodes::{QueryClass, QueryEvaluable, QueryNode};
use super::query::Query;
use crate::metadata::{Model, RelationType};
use crate::value::{PersistedObject, Value};

/// A boolean condition.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// A conjunction or disjunction of constraints.
    Set(ConstraintSet),
    /// A comparison between expressions.
    Simple(SimpleConstraint),
    /// Membership in the result of a subquery.
    Subquery(SubqueryConstraint),
    /// Identity comparison between objects.
    Class(ClassConstraint),
    /// Relationship containment.
    Contains(ContainsConstraint),
    /// Membership in a fixed collection of values.
    Bag(BagConstraint),
}

impl From<ConstraintSet> for Constraint {
    fn from(c: ConstraintSet) -> Self {
        Self::Set(c)
    }
}

impl From<SimpleConstraint> for Constraint {
    fn from(c: SimpleConstraint) -> Self {
        Self::Simple(c)
    }
}

impl From<SubqueryConstraint> for Constraint {
    fn from(c: SubqueryConstraint) -> Self {
        Self::Subquery(c)
    }
}

impl From<ClassConstraint> for Constraint {
    fn from(c: ClassConstraint) -> Self {
        Self::Class(c)
    }
}

impl From<ContainsConstraint> for Constraint {
    fn from(c: ContainsConstraint) -> Self {
        Self::Contains(c)
    }
}

impl From<BagConstraint> for Constraint {
    fn from(c: BagConstraint) -> Self {
        Self::Bag(c)
    }
}

// ── Constraint sets ────────────────────────────────────────────────────

/// How the members of a [`ConstraintSet`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// All members hold.
    And,
    /// At least one member holds.
    Or,
    /// Not all members hold.
    Nand,
    /// No member holds.
    Nor,
}

impl SetOp {
    /// `true` for `OR` and `NOR`.
    pub const fn is_disjunctive(self) -> bool {
        matches!(self, Self::Or | Self::Nor)
    }

    /// `true` for `NAND` and `NOR`.
    pub const fn is_negated(self) -> bool {
        matches!(self, Self::Nand | Self::Nor)
    }
}

impl fmt::Display for SetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Nand => "NAND",
            Self::Nor => "NOR",
        })
    }
}

/// A group of constraints combined with one [`SetOp`].
///
/// Members are compiled in the order they were added.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    op: SetOp,
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// An empty set.
    pub const fn new(op: SetOp) -> Self {
        Self {
            op,
            constraints: Vec::new(),
        }
    }

    /// Adds a member, builder style.
    #[must_use]
    pub fn with(mut self, constraint: impl Into<Constraint>) -> Self {
        self.add(constraint);
        self
    }

    /// Adds a member.
    pub fn add(&mut self, constraint: impl Into<Constraint>) {
        self.constraints.push(constraint.into());
    }

    /// The operator.
    pub const fn op(&self) -> SetOp {
        self.op
    }

    /// The members.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

// ── Simple comparisons ─────────────────────────────────────────────────

/// Comparison operators for [`SimpleConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleOp {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEquals,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEquals,
    /// `LIKE`
    Matches,
    /// `NOT LIKE`
    DoesNotMatch,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl SimpleOp {
    /// `true` for operators that take no right operand.
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for SimpleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanEquals => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEquals => ">=",
            Self::Matches => "LIKE",
            Self::DoesNotMatch => "NOT LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        })
    }
}

/// `left op [right]`.
#[derive(Debug, Clone)]
pub struct SimpleConstraint {
    left: QueryEvaluable,
    op: SimpleOp,
    right: Option<QueryEvaluable>,
}

impl SimpleConstraint {
    /// A binary comparison.
    ///
    /// # Panics
    ///
    /// Panics if `op` is `IS NULL` or `IS NOT NULL`.
    pub fn new(left: impl Into<QueryEvaluable>, op: SimpleOp, right: impl Into<QueryEvaluable>) -> Self {
        assert!(!op.is_unary(), "{op} takes no right operand");
        Self {
            left: left.into(),
            op,
            right: Some(right.into()),
        }
    }

    /// A unary test.
    ///
    /// # Panics
    ///
    /// Panics unless `op` is `IS NULL` or `IS NOT NULL`.
    pub fn unary(left: impl Into<QueryEvaluable>, op: SimpleOp) -> Self {
        assert!(op.is_unary(), "{op} needs a right operand");
        Self {
            left: left.into(),
            op,
            right: None,
        }
    }

    /// The left operand.
    pub const fn left(&self) -> &QueryEvaluable {
        &self.left
    }

    /// The operator.
    pub const fn op(&self) -> SimpleOp {
        self.op
    }

    /// The right operand, absent for unary operators.
    pub const fn right(&self) -> Option<&QueryEvaluable> {
        self.right.as_ref()
    }
}

// ── Subquery membership ────────────────────────────────────────────────

/// Operators for [`SubqueryConstraint`] and [`BagConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
}

impl fmt::Display for MembershipOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        })
    }
}

/// Operators for [`SubqueryConstraint`].
pub type SubqueryOp = MembershipOp;

/// Operators for [`BagConstraint`].
pub type BagOp = MembershipOp;

/// `left IN (subquery)`. The subquery must select exactly one column; a
/// selected class contributes its id.
#[derive(Debug, Clone)]
pub struct SubqueryConstraint {
    left: QueryNode,
    op: SubqueryOp,
    query: Arc<Query>,
}

impl SubqueryConstraint {
    /// Creates the constraint.
    pub fn new(left: impl Into<QueryNode>, op: SubqueryOp, query: impl Into<Arc<Query>>) -> Self {
        Self {
            left: left.into(),
            op,
            query: query.into(),
        }
    }

    /// The tested node.
    pub const fn left(&self) -> &QueryNode {
        &self.left
    }

    /// The operator.
    pub const fn op(&self) -> SubqueryOp {
        self.op
    }

    /// The nested query.
    pub fn query(&self) -> &Query {
        &self.query
    }
}

// ── Object identity ────────────────────────────────────────────────────

/// The right-hand side of an identity comparison: another FROM class, or a
/// concrete stored object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectTarget {
    /// Another class in the query.
    Class(QueryClass),
    /// A stored object, compared by id.
    Object(PersistedObject),
}

impl From<QueryClass> for ObjectTarget {
    fn from(qc: QueryClass) -> Self {
        Self::Class(qc)
    }
}

impl From<&QueryClass> for ObjectTarget {
    fn from(qc: &QueryClass) -> Self {
        Self::Class(qc.clone())
    }
}

impl From<PersistedObject> for ObjectTarget {
    fn from(obj: PersistedObject) -> Self {
        Self::Object(obj)
    }
}

/// Operators for [`ClassConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassOp {
    /// Same object.
    Equals,
    /// Different objects.
    NotEquals,
}

impl fmt::Display for ClassOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
        })
    }
}

/// `left.id op right.id`.
#[derive(Debug, Clone)]
pub struct ClassConstraint {
    left: QueryClass,
    op: ClassOp,
    right: ObjectTarget,
}

impl ClassConstraint {
    /// Creates the constraint.
    pub fn new(left: &QueryClass, op: ClassOp, right: impl Into<ObjectTarget>) -> Self {
        Self {
            left: left.clone(),
            op,
            right: right.into(),
        }
    }

    /// The left class.
    pub const fn left(&self) -> &QueryClass {
        &self.left
    }

    /// The operator.
    pub const fn op(&self) -> ClassOp {
        self.op
    }

    /// The right-hand side.
    pub const fn right(&self) -> &ObjectTarget {
        &self.right
    }
}

// ── Relationship containment ───────────────────────────────────────────

/// A relationship field of a FROM class.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReference {
    qc: QueryClass,
    field_name: String,
    relation: RelationType,
}

impl QueryReference {
    /// References relationship `field` of `qc`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::FieldNotInModel`] if the class has no
    /// reference or collection of that name.
    pub fn new(qc: &QueryClass, field: &str, model: &Model) -> ObjectStoreResult<Self> {
        let fields = model.field_descriptors_for_class(qc.class_type())?;
        let relation = fields
            .get(field)
            .and_then(|fd| model.relation_type(fd))
            .ok_or_else(|| ObjectStoreError::FieldNotInModel {
                class: qc.class_type().to_string(),
                field: field.to_string(),
            })?;
        Ok(Self {
            qc: qc.clone(),
            field_name: field.to_string(),
            relation,
        })
    }

    /// The owning class.
    pub const fn query_class(&self) -> &QueryClass {
        &self.qc
    }

    /// The relationship field name.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// How the relationship is stored.
    pub const fn relation(&self) -> RelationType {
        self.relation
    }

    /// `true` for to-many relationships.
    pub fn is_collection(&self) -> bool {
        self.relation != RelationType::ToOne
    }
}

/// Operators for [`ContainsConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainsOp {
    /// The relationship holds the target.
    Contains,
    /// The relationship does not hold the target.
    DoesNotContain,
    /// A to-one reference is unset.
    IsNull,
    /// A to-one reference is set.
    IsNotNull,
}

impl fmt::Display for ContainsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Contains => "CONTAINS",
            Self::DoesNotContain => "DOES NOT CONTAIN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        })
    }
}

/// Tests whether a relationship holds a given object.
#[derive(Debug, Clone)]
pub struct ContainsConstraint {
    reference: QueryReference,
    op: ContainsOp,
    target: Option<ObjectTarget>,
}

impl ContainsConstraint {
    /// `reference CONTAINS target` or `reference DOES NOT CONTAIN target`.
    ///
    /// # Panics
    ///
    /// Panics if `op` is a null test, or if `target` is a stored object and
    /// the reference is a one-to-many collection (the element's foreign key
    /// is not known without a class to read it from).
    pub fn new(reference: QueryReference, op: ContainsOp, target: impl Into<ObjectTarget>) -> Self {
        let target = target.into();
        assert!(
            matches!(op, ContainsOp::Contains | ContainsOp::DoesNotContain),
            "{op} takes no target"
        );
        assert!(
            !(reference.relation() == RelationType::OneToMany
                && matches!(target, ObjectTarget::Object(_))),
            "collection {} can only be compared with a class",
            reference.field_name()
        );
        Self {
            reference,
            op,
            target: Some(target),
        }
    }

    /// `reference IS NULL` or `reference IS NOT NULL`.
    ///
    /// # Panics
    ///
    /// Panics unless `op` is a null test and the reference is to-one.
    pub fn null_check(reference: QueryReference, op: ContainsOp) -> Self {
        assert!(
            matches!(op, ContainsOp::IsNull | ContainsOp::IsNotNull),
            "{op} needs a target"
        );
        assert!(
            !reference.is_collection(),
            "collection {} cannot be tested for null",
            reference.field_name()
        );
        Self {
            reference,
            op,
            target: None,
        }
    }

    /// The relationship.
    pub const fn reference(&self) -> &QueryReference {
        &self.reference
    }

    /// The operator.
    pub const fn op(&self) -> ContainsOp {
        self.op
    }

    /// The target, absent for null tests.
    pub const fn target(&self) -> Option<&ObjectTarget> {
        self.target.as_ref()
    }
}

// ── Bags ───────────────────────────────────────────────────────────────

/// `node IN (v1, v2, ...)` over literal values.
///
/// Values whose type cannot match the node are ignored when compiling.
#[derive(Debug, Clone)]
pub struct BagConstraint {
    node: QueryNode,
    op: BagOp,
    bag: Vec<Value>,
}

impl BagConstraint {
    /// Creates the constraint.
    pub fn new<I, V>(node: impl Into<QueryNode>, op: BagOp, bag: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            node: node.into(),
            op,
            bag: bag.into_iter().map(Into::into).collect(),
        }
    }

    /// The tested node.
    pub const fn node(&self) -> &QueryNode {
        &self.node
    }

    /// The operator.
    pub const fn op(&self) -> BagOp {
        self.op
    }

    /// The candidate values.
    pub fn bag(&self) -> &[Value] {
        &self.bag
    }
}
