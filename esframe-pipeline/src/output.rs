//! Output buffer allocation.
//!
//! The pipeline asks an [`OutputAllocator`] for one buffer per decoded block
//! at the moment the block is paired with its unit of work, and copies the
//! decoded bytes into it. Buffers are handed to the host inside
//! [`OutputBuffer`](crate::OutputBuffer)s; a [`SharedBlockPool`] lets the host
//! hand them back for reuse.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// An output buffer could not be obtained.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Output allocation of {requested} bytes failed")]
pub struct AllocError {
    /// Requested size in bytes.
    pub requested: usize,
}

/// Source of output buffers.
pub trait OutputAllocator: Send {
    /// Obtain an empty buffer with capacity for at least `len` bytes.
    fn allocate(&mut self, len: usize) -> Result<Vec<u8>, AllocError>;
}

impl<A: OutputAllocator + ?Sized> OutputAllocator for Box<A> {
    fn allocate(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        (**self).allocate(len)
    }
}

/// Plain heap allocation; fails only when the allocator does.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl OutputAllocator for HeapAllocator {
    fn allocate(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| AllocError { requested: len })?;
        Ok(buf)
    }
}

/// A pool of reusable output blocks with a bound on blocks in flight.
#[derive(Debug)]
pub struct BlockPool {
    /// Returned blocks ready for reuse.
    available: VecDeque<Vec<u8>>,
    /// Maximum number of blocks handed out and not yet returned.
    max_outstanding: usize,
    /// Maximum number of blocks kept for reuse.
    max_pooled: usize,
    outstanding: usize,
    /// Total blocks allocated (for statistics).
    total_allocated: usize,
}

impl BlockPool {
    /// Create a pool allowing `max_outstanding` blocks in flight.
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            available: VecDeque::with_capacity(max_outstanding),
            max_outstanding,
            max_pooled: max_outstanding,
            outstanding: 0,
            total_allocated: 0,
        }
    }

    /// Acquire a block with capacity for `len` bytes.
    pub fn acquire(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        if self.outstanding >= self.max_outstanding {
            return Err(AllocError { requested: len });
        }

        let mut block = match self.available.pop_front() {
            Some(block) => block,
            None => {
                self.total_allocated += 1;
                Vec::new()
            }
        };
        block.clear();
        block
            .try_reserve_exact(len)
            .map_err(|_| AllocError { requested: len })?;
        self.outstanding += 1;
        Ok(block)
    }

    /// Return a block to the pool.
    pub fn release(&mut self, block: Vec<u8>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.available.len() < self.max_pooled {
            self.available.push_back(block);
        }
    }

    /// Blocks currently handed out.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Blocks ready for reuse.
    pub fn available(&self) -> usize {
        self.available.len()
    }

    /// Total blocks ever allocated.
    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }

    /// Clear all pooled blocks.
    pub fn clear(&mut self) {
        self.available.clear();
    }
}

impl OutputAllocator for BlockPool {
    fn allocate(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        self.acquire(len)
    }
}

/// A thread-safe block pool shared between the pipeline and the host.
#[derive(Debug)]
pub struct SharedBlockPool {
    inner: Arc<Mutex<BlockPool>>,
}

impl SharedBlockPool {
    /// Create a new shared block pool.
    pub fn new(max_outstanding: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BlockPool::new(max_outstanding))),
        }
    }

    /// Return a block to the pool.
    pub fn release(&self, block: Vec<u8>) {
        self.inner.lock().release(block);
    }

    /// Blocks currently handed out.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding()
    }

    /// Blocks ready for reuse.
    pub fn available(&self) -> usize {
        self.inner.lock().available()
    }
}

impl Clone for SharedBlockPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl OutputAllocator for SharedBlockPool {
    fn allocate(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        self.inner.lock().acquire(len)
    }
}
