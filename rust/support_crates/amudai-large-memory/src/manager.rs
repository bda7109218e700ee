//! The buffer manager capability: storage that is not a plain array.

use std::ptr::NonNull;

use amudai_common::{Result, error::Error};

use crate::{native::RawAllocation, read_only_span::ReadOnlyLargeSpan, span::LargeSpan};

/// Lifecycle state of a buffer manager.
///
/// The empty sentinel and a released manager both describe "no bytes", but only
/// the former may still be read from. Keeping the tag explicit avoids mistaking
/// a freshly released buffer for the empty singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Storage is attached and accessible.
    Live,
    /// A valid manager that never had any storage.
    Empty,
    /// Storage has been released; spans can no longer be produced.
    Released,
}

/// Owns or mediates access to a contiguous region of `T` that is not a plain array.
///
/// Exactly one manager is the release authority for a directly owned allocation
/// (imported allocations delegate to a shared
/// [`ImportedAllocation`](crate::owner::ImportedAllocation) instead).
///
/// Release happens in [`dispose`](LargeMemoryManager::dispose) or, at the latest,
/// when the manager is dropped. Both paths are idempotent, a manager never releases
/// its storage twice.
pub trait LargeMemoryManager<T>: Send + Sync {
    /// Number of elements managed.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> ManagerState;

    /// Produces a read-only span over the whole managed region.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the manager has been released.
    fn span(&self) -> Result<ReadOnlyLargeSpan<'_, T>>;

    /// Produces a writable span over the whole managed region.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the manager has been released.
    fn span_mut(&mut self) -> Result<LargeSpan<'_, T>>;

    /// Returns a handle holding a stable address of the element at `element_index`.
    ///
    /// `element_index == len` is allowed and yields the one-past-the-end address.
    fn pin(&self, element_index: u64) -> Result<MemoryHandle<'_, T>>;

    /// Counterpart of [`pin`](LargeMemoryManager::pin), invoked when a
    /// [`MemoryHandle`] is dropped.
    fn unpin(&self);

    /// Releases the underlying storage. Repeated calls are no-ops.
    fn dispose(&mut self);

    /// Zero-copy fallback to the backing array, if the manager has one.
    fn try_get_array(&self) -> Option<&[T]> {
        None
    }
}

/// Lets an exclusive manager hand off its raw allocation to a new owner.
///
/// Shared (imported) allocations refuse the hand-off.
pub trait OwnableAllocation {
    /// Takes the raw allocation out of the manager, leaving it released.
    ///
    /// Returns `None` if the allocation is shared or has already been released.
    fn try_acquire(&mut self) -> Option<RawAllocation>;
}

/// A stable address into a pinned region.
///
/// The region stays at this address for as long as the handle lives. Dropping
/// the handle unpins it.
pub struct MemoryHandle<'a, T> {
    ptr: NonNull<T>,
    pinnable: Option<&'a dyn LargeMemoryManager<T>>,
}

impl<'a, T> MemoryHandle<'a, T> {
    pub fn new(
        ptr: NonNull<T>,
        pinnable: Option<&'a dyn LargeMemoryManager<T>>,
    ) -> MemoryHandle<'a, T> {
        MemoryHandle { ptr, pinnable }
    }

    /// The pinned address.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// The pinned address, for consumers that write through it.
    ///
    /// Writing is only sound if no span over the same region is alive.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Drop for MemoryHandle<'_, T> {
    fn drop(&mut self) {
        if let Some(pinnable) = self.pinnable {
            pinnable.unpin();
        }
    }
}

impl<T> std::fmt::Debug for MemoryHandle<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHandle")
            .field("ptr", &self.ptr)
            .field("pinned", &self.pinnable.is_some())
            .finish()
    }
}

#[cold]
pub(crate) fn released_error() -> Error {
    Error::invalid_operation("access to a released buffer manager")
}
