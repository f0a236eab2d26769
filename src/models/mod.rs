//! Data models shared across the crate.

pub mod descriptor;
pub mod result;
pub mod value;

pub use descriptor::{
    ColumnSpec, CompareOp, Condition, Conjunction, Join, JoinKind, Operation, OrderDir,
    QueryDescriptor,
};
pub use result::{ColumnMetadata, QueryResult};
pub use value::SqlValue;
