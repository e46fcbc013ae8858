//! Buffer manager: pin/unpin reference counting for pages currently in
//! use by a running query. No actual page I/O happens here — there is no
//! disk and no page cache to evict from — but operators that must not
//! assume a page stays resident past their own lifetime still go through
//! this contract, so the pin-count discipline is exercised even in this
//! in-memory build.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use vgraph_error::{ExecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle {
    pub table_id: u32,
    pub page_id: u64,
}

pub trait BufferManager: Send + Sync {
    fn pin(&self, handle: PageHandle);

    /// # Errors
    /// Returns [`vgraph_error::ErrorKind::BufferManager`] if `handle` has
    /// no outstanding pin.
    fn unpin(&self, handle: PageHandle) -> Result<()>;

    fn mark_dirty(&self, handle: PageHandle);

    fn pin_count(&self, handle: PageHandle) -> u32;

    fn is_dirty(&self, handle: PageHandle) -> bool;
}

#[derive(Default)]
pub struct InMemoryBufferManager {
    pins: Mutex<HashMap<PageHandle, u32>>,
    dirty: Mutex<HashMap<PageHandle, bool>>,
    total_pins_issued: AtomicU64,
}

impl InMemoryBufferManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn total_pins_issued(&self) -> u64 {
        self.total_pins_issued.load(Ordering::Relaxed)
    }
}

impl BufferManager for InMemoryBufferManager {
    fn pin(&self, handle: PageHandle) {
        *self.pins.lock().entry(handle).or_insert(0) += 1;
        self.total_pins_issued.fetch_add(1, Ordering::Relaxed);
    }

    fn unpin(&self, handle: PageHandle) -> Result<()> {
        let mut pins = self.pins.lock();
        match pins.get_mut(&handle) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(ExecError::buffer_manager(format!(
                "unpin of {handle:?} with no outstanding pin"
            ))),
        }
    }

    fn mark_dirty(&self, handle: PageHandle) {
        self.dirty.lock().insert(handle, true);
    }

    fn pin_count(&self, handle: PageHandle) -> u32 {
        self.pins.lock().get(&handle).copied().unwrap_or(0)
    }

    fn is_dirty(&self, handle: PageHandle) -> bool {
        self.dirty.lock().get(&handle).copied().unwrap_or(false)
    }
}
