//! Growable byte buffer for enumeration reads.

use tracing::debug;

/// A byte buffer that tracks how much of it holds valid data.
///
/// Enumeration calls fill the whole capacity and report how many bytes they
/// used, or fail with the exact size they need. The buffer grows to that size
/// and never shrinks, so it ends up sized to the largest entry seen.
#[derive(Debug, Clone)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    len: usize,
}

impl GrowableBuffer {
    /// Creates a zeroed buffer of `capacity` bytes holding no data.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            len: 0,
        }
    }

    /// Returns the whole buffer for an enumeration call to fill.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Returns the total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bytes are valid.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Marks the first `len` bytes as valid, clamped to the capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// Grows the buffer so it can hold `required` bytes.
    ///
    /// Returns true if the capacity changed.
    pub fn grow_to(&mut self, required: usize) -> bool {
        if required <= self.data.len() {
            return false;
        }
        debug!(from = self.data.len(), to = required, "Growing enumeration buffer");
        self.data.resize(required, 0);
        true
    }

    /// Drops the valid data without releasing capacity.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}
