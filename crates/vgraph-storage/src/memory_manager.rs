//! Memory manager: a per-query bump allocator used for overflow arenas
//! (string/blob/list data that outlives a single value vector). Frees are
//! tracked only in aggregate — nothing is reused — matching how a query's
//! arena is typically torn down all at once at query end rather than
//! piecewise.

use std::sync::atomic::{AtomicU64, Ordering};

use vgraph_error::{ExecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHandle {
    pub offset: u64,
    pub size: u64,
}

pub trait MemoryManager: Send + Sync {
    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::Runtime`] if the allocation
    /// would exceed this manager's configured limit.
    fn allocate(&self, size: u64) -> Result<MemoryHandle>;
    fn free(&self, handle: MemoryHandle);
    fn bytes_in_use(&self) -> u64;
}

pub struct InMemoryMemoryManager {
    limit: u64,
    next_offset: AtomicU64,
    bytes_in_use: AtomicU64,
}

impl InMemoryMemoryManager {
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self {
            limit,
            next_offset: AtomicU64::new(0),
            bytes_in_use: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(u64::MAX)
    }
}

impl MemoryManager for InMemoryMemoryManager {
    fn allocate(&self, size: u64) -> Result<MemoryHandle> {
        let in_use = self.bytes_in_use.fetch_add(size, Ordering::AcqRel);
        if in_use + size > self.limit {
            self.bytes_in_use.fetch_sub(size, Ordering::AcqRel);
            return Err(ExecError::runtime(format!(
                "allocation of {size} bytes would exceed the {} byte limit",
                self.limit
            )));
        }
        let offset = self.next_offset.fetch_add(size, Ordering::AcqRel);
        Ok(MemoryHandle { offset, size })
    }

    fn free(&self, handle: MemoryHandle) {
        self.bytes_in_use.fetch_sub(handle.size, Ordering::AcqRel);
    }

    fn bytes_in_use(&self) -> u64 {
        self.bytes_in_use.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_free_returns_to_zero() {
        let mm = InMemoryMemoryManager::unbounded();
        let handle = mm.allocate(64).unwrap();
        assert_eq!(mm.bytes_in_use(), 64);
        mm.free(handle);
        assert_eq!(mm.bytes_in_use(), 0);
    }

    #[test]
    fn allocation_beyond_limit_is_rejected() {
        let mm = InMemoryMemoryManager::new(100);
        mm.allocate(80).unwrap();
        assert!(mm.allocate(30).is_err());
    }
}
