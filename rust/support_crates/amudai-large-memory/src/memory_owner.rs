//! Scoped ownership of a [`LargeMemory`].

use amudai_common::Result;

use crate::{
    allocator::MemoryAllocator, memory::LargeMemory, read_only_span::ReadOnlyLargeSpan,
    span::LargeSpan,
};

/// Pairs a [`LargeMemory`] with guaranteed release.
///
/// Dropping the owner (or calling [`dispose`](LargeMemoryOwner::dispose)) gives up
/// its reference to the backing. The storage is released right away unless slices
/// handed out through [`memory`](LargeMemoryOwner::memory) still refer to it.
pub struct LargeMemoryOwner<T: 'static> {
    memory: LargeMemory<T>,
}

impl LargeMemoryOwner<u8> {
    /// Allocates a zero-filled byte buffer of `length` bytes from `allocator`.
    pub fn allocate(allocator: &dyn MemoryAllocator, length: u64) -> Result<LargeMemoryOwner<u8>> {
        let manager = allocator.allocate(length)?;
        Ok(LargeMemoryOwner::new(LargeMemory::from_manager(manager)))
    }
}

impl<T: 'static> LargeMemoryOwner<T> {
    pub fn new(memory: LargeMemory<T>) -> LargeMemoryOwner<T> {
        LargeMemoryOwner { memory }
    }

    pub fn memory(&self) -> &LargeMemory<T> {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut LargeMemory<T> {
        &mut self.memory
    }

    pub fn len(&self) -> u64 {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn span(&self) -> Result<ReadOnlyLargeSpan<'_, T>> {
        self.memory.span()
    }

    pub fn span_mut(&mut self) -> Result<LargeSpan<'_, T>> {
        self.memory.span_mut()
    }

    /// Releases the storage now if no other handle refers to it.
    ///
    /// Returns `true` if this call released it.
    pub fn dispose(self) -> bool {
        self.memory.dispose()
    }

    /// Gives up the scoped ownership, returning the plain memory handle.
    pub fn into_memory(self) -> LargeMemory<T> {
        self.memory
    }
}

impl<T: 'static> std::fmt::Debug for LargeMemoryOwner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeMemoryOwner")
            .field("memory", &self.memory)
            .finish()
    }
}
