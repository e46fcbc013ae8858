//! Logical type tags.

/// One of the value kinds a [`crate::Value`] or value vector column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Date,
    Timestamp,
    Interval,
    String,
    Blob,
    InternalId,
    List,
    FixedList,
    Struct,
    Node,
    Rel,
}

impl LogicalType {
    /// Whether values of this type are fixed-width and therefore eligible
    /// for a flat, directly-indexable buffer representation.
    #[must_use]
    pub const fn is_fixed_width(self) -> bool {
        !matches!(
            self,
            Self::String | Self::Blob | Self::List | Self::Struct
        )
    }
}
