use std::sync::atomic::{AtomicU32, Ordering};

pub type SessionId = u32;
pub type TransferId = u32;

// Session ids start at 1; origin 0 is reserved for a client's upstream link.
pub(crate) const FIRST_SESSION_ID: SessionId = 0x01;
pub(crate) const FIRST_TRANSFER_ID: TransferId = 0x01;

pub(crate) struct IdAllocator(AtomicU32);

impl IdAllocator {
    pub fn new(start: u32) -> Self {
        Self(AtomicU32::new(start))
    }

    pub fn allocate(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
