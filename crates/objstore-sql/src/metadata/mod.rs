//! The metadata model: which classes are persistent, which tables and
//! columns back them, and how relationships are stored.

pub mod fields;
pub mod model;
pub mod naming;

pub use fields::{AttributeType, FieldDescriptor, IndirectionTable, RelationType};
pub use model::{decompose_class, ClassDescriptor, ClassType, Model, ModelId, ID_FIELD};
