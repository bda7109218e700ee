//! `ReadOnlyLargeMemory`: the write-disabled counterpart of [`LargeMemory`].

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use amudai_common::Result;

use crate::{
    manager::{LargeMemoryManager, MemoryHandle},
    memory::LargeMemory,
    read_only_span::ReadOnlyLargeSpan,
    span::LargeSpan,
};

/// Same descriptor as [`LargeMemory`], but it only ever resolves to read-only spans.
///
/// A writable memory narrows into a read-only one through `From`; there is no
/// conversion back.
pub struct ReadOnlyLargeMemory<T: 'static>(LargeMemory<T>);

impl<T: 'static> ReadOnlyLargeMemory<T> {
    pub fn empty() -> ReadOnlyLargeMemory<T> {
        ReadOnlyLargeMemory(LargeMemory::empty())
    }

    pub fn from_array(array: Arc<[T]>) -> ReadOnlyLargeMemory<T> {
        ReadOnlyLargeMemory(LargeMemory::from_array(array))
    }

    /// # Errors
    ///
    /// `OutOfRange` if the range exceeds the array.
    pub fn from_array_range(
        array: Arc<[T]>,
        start: u64,
        length: u64,
    ) -> Result<ReadOnlyLargeMemory<T>> {
        LargeMemory::from_array_range(array, start, length).map(ReadOnlyLargeMemory)
    }

    pub fn from_manager(manager: Arc<dyn LargeMemoryManager<T>>) -> ReadOnlyLargeMemory<T> {
        ReadOnlyLargeMemory(LargeMemory::from_manager(manager))
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.0.offset()
    }

    pub fn slice_from(&self, start: u64) -> Result<ReadOnlyLargeMemory<T>> {
        self.0.slice_from(start).map(ReadOnlyLargeMemory)
    }

    pub fn slice(&self, start: u64, length: u64) -> Result<ReadOnlyLargeMemory<T>> {
        self.0.slice(start, length).map(ReadOnlyLargeMemory)
    }

    pub fn span(&self) -> Result<ReadOnlyLargeSpan<'_, T>> {
        self.0.span()
    }

    pub fn pin(&self) -> Result<MemoryHandle<'_, T>> {
        self.0.pin()
    }

    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.0.to_vec()
    }

    pub fn copy_to(&self, destination: &mut LargeMemory<T>) -> Result<()>
    where
        T: Copy,
    {
        self.0.copy_to(destination)
    }

    pub fn try_copy_to(&self, destination: &mut LargeMemory<T>) -> Result<bool>
    where
        T: Copy,
    {
        self.0.try_copy_to(destination)
    }

    /// Copies into a writable span rather than another memory.
    pub fn copy_to_span(&self, destination: &mut LargeSpan<'_, T>) -> Result<()>
    where
        T: Copy,
    {
        self.0.span()?.copy_to(destination)
    }

    pub fn try_get_array(&self) -> Option<&[T]> {
        self.0.try_get_array()
    }
}

impl<T: 'static> Clone for ReadOnlyLargeMemory<T> {
    fn clone(&self) -> Self {
        ReadOnlyLargeMemory(self.0.clone())
    }
}

impl<T: 'static> Default for ReadOnlyLargeMemory<T> {
    fn default() -> Self {
        ReadOnlyLargeMemory::empty()
    }
}

impl<T: 'static> PartialEq for ReadOnlyLargeMemory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: 'static> Eq for ReadOnlyLargeMemory<T> {}

impl<T: 'static> Hash for ReadOnlyLargeMemory<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T: 'static> From<LargeMemory<T>> for ReadOnlyLargeMemory<T> {
    fn from(memory: LargeMemory<T>) -> Self {
        ReadOnlyLargeMemory(memory)
    }
}

impl<T: 'static> From<Vec<T>> for ReadOnlyLargeMemory<T> {
    fn from(vec: Vec<T>) -> Self {
        ReadOnlyLargeMemory(LargeMemory::from_vec(vec))
    }
}

impl<T: 'static> fmt::Debug for ReadOnlyLargeMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReadOnlyLargeMemory<{}>[{}]",
            std::any::type_name::<T>(),
            self.len()
        )
    }
}
