//! Selection state shared by every vector in a data chunk.

/// Shared selection/filter state for a data chunk.
///
/// When `filtered` is `false` the indices are implicitly `0..size`; when
/// `true`, `indices[0..size]` gives the active row indices into the
/// backing vectors. A state is *flat* when `size == 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    size: usize,
    indices: Vec<u32>,
    filtered: bool,
}

impl SelectionState {
    /// Unfiltered state of logical size `size` (indices `0..size`).
    #[must_use]
    pub fn unfiltered(size: usize) -> Self {
        Self {
            size,
            indices: Vec::new(),
            filtered: false,
        }
    }

    /// A filtered state selecting exactly `indices`.
    #[must_use]
    pub fn from_indices(indices: Vec<u32>) -> Self {
        let size = indices.len();
        Self {
            size,
            indices,
            filtered: true,
        }
    }

    /// A flat state selecting the single row `idx`.
    #[must_use]
    pub fn flat_at(idx: u32) -> Self {
        Self::from_indices(vec![idx])
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Flat ⇔ logical size is exactly 1.
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.size == 1
    }

    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Row index at selected position `pos` (`pos < len()`).
    #[must_use]
    pub fn index_at(&self, pos: usize) -> u32 {
        debug_assert!(pos < self.size, "selection position {pos} out of range ({})", self.size);
        if self.filtered {
            self.indices[pos]
        } else {
            pos as u32
        }
    }

    /// Materialize the selected indices as an owned vector, expanding the
    /// implicit `0..size` range when unfiltered.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        if self.filtered {
            self.indices.clone()
        } else {
            (0..self.size as u32).collect()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.size).map(move |pos| self.index_at(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_is_identity() {
        let s = SelectionState::unfiltered(5);
        assert_eq!(s.to_vec(), vec![0, 1, 2, 3, 4]);
        assert!(!s.is_flat());
    }

    #[test]
    fn flat_has_size_one() {
        let s = SelectionState::flat_at(7);
        assert!(s.is_flat());
        assert_eq!(s.index_at(0), 7);
    }

    #[test]
    fn filtered_selects_subset() {
        let s = SelectionState::from_indices(vec![2, 4, 6]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![2, 4, 6]);
    }
}
