//! Runtime value representation.

use crate::node_id::{NodeId, RelId};

/// An interval value: months, days, microseconds — kept separate because
/// each component has independent carry semantics (unlike a plain duration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

/// One runtime value of any [`crate::LogicalType`].
///
/// This is the row-oriented counterpart to the columnar value vectors in
/// `vgraph-vector`: row fixtures, factorized-table row readers/writers, and
/// test assertions all speak in terms of `Value`, while hot execution paths
/// stay columnar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Date(i32),
    Timestamp(i64),
    Interval(Interval),
    String(String),
    Blob(Vec<u8>),
    Node(NodeId),
    Rel(RelId),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Coerce to `i64` for the common integer/rowid paths used throughout
    /// the join and scan tests; panics on non-integer variants, which is
    /// appropriate only in test code.
    #[must_use]
    pub fn to_integer(&self) -> i64 {
        match self {
            Self::Int16(v) => i64::from(*v),
            Self::Int32(v) => i64::from(*v),
            Self::Int64(v) => *v,
            other => panic!("value {other:?} is not an integer"),
        }
    }
}
