//! The query AST.
//!
//! - [`nodes`] - FROM sources, fields and expressions
//! - [`constraints`] - boolean constraints
//! - [`query`] - the [`Query`] builder

pub mod constraints;
pub mod nodes;
#[allow(clippy::module_inception)]
pub mod query;

pub use constraints::{
    BagConstraint, BagOp, ClassConstraint, ClassOp, Constraint, ConstraintSet, ContainsConstraint,
    ContainsOp, MembershipOp, ObjectTarget, QueryReference, SetOp, SimpleConstraint, SimpleOp,
    SubqueryConstraint, SubqueryOp,
};
pub use nodes::{
    AggregateOp, ArithmeticOp, FromElement, NodeId, QueryClass, QueryEvaluable, QueryField,
    QueryNode,
};
pub use query::{Query, SelectItem};
