//! Data positions.

/// `(chunkIdx, vectorIdx)` — every operator references its inputs and
/// outputs by data-positions rather than by holding vector references
/// directly, so a cloned operator can re-resolve them against its own
/// worker-local result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataPos {
    pub chunk_idx: u32,
    pub vector_idx: u32,
}

/// Sentinel for "no position" (`(UINT32_MAX, UINT32_MAX)`).
pub const INVALID_DATA_POS: DataPos = DataPos {
    chunk_idx: u32::MAX,
    vector_idx: u32::MAX,
};

impl DataPos {
    #[must_use]
    pub const fn new(chunk_idx: u32, vector_idx: u32) -> Self {
        Self {
            chunk_idx,
            vector_idx,
        }
    }

    #[must_use]
    pub const fn invalid() -> Self {
        INVALID_DATA_POS
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.chunk_idx != u32::MAX || self.vector_idx != u32::MAX
    }
}

impl Default for DataPos {
    fn default() -> Self {
        Self::invalid()
    }
}
