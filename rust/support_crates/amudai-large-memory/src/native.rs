//! Buffer manager over unmanaged (native) memory.

use std::{
    mem::ManuallyDrop,
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicPtr, Ordering},
    },
};

use amudai_common::{Result, verify_range};

use crate::{
    manager::{LargeMemoryManager, ManagerState, MemoryHandle, OwnableAllocation, released_error},
    owner::NativeAllocationOwner,
    read_only_span::ReadOnlyLargeSpan,
    span::{LargeSpan, check_byte_len},
};

/// A byte buffer manager over native memory.
///
/// The manager records the base pointer of the allocation, the byte offset of the
/// usable region (alignment correction) and its length. The memory itself is
/// released through the [`NativeAllocationOwner`], exactly once: [`dispose`],
/// `Drop` and [`try_acquire`] all swap the base pointer to null, and only the
/// caller that observes the previous non-null value proceeds.
///
/// [`dispose`]: LargeMemoryManager::dispose
/// [`try_acquire`]: OwnableAllocation::try_acquire
pub struct NativeMemoryManager {
    ptr: AtomicPtr<u8>,
    offset: usize,
    len: u64,
    owner: Arc<dyn NativeAllocationOwner>,
}

impl NativeMemoryManager {
    /// Creates a manager over `ptr + offset .. ptr + offset + length`, released
    /// through `owner`.
    ///
    /// # Safety
    ///
    /// - `ptr + offset` must be valid for reads and writes of `length` bytes until
    ///   `owner.release(ptr, offset, length)` is called.
    /// - `owner.release` must be sound to call once with these values.
    /// - No other code may access the region while the manager holds it, except
    ///   through the manager.
    /// - `offset + length` must not exceed `isize::MAX`.
    pub unsafe fn with_owner(
        owner: Arc<dyn NativeAllocationOwner>,
        ptr: NonNull<u8>,
        offset: usize,
        length: u64,
    ) -> NativeMemoryManager {
        debug_assert!(check_byte_len::<u8>(length).is_ok());
        NativeMemoryManager {
            ptr: AtomicPtr::new(ptr.as_ptr()),
            offset,
            len: length,
            owner,
        }
    }

    /// Byte offset of the usable region from the allocation base.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the allocation may be handed off with [`OwnableAllocation::try_acquire`].
    pub fn is_exclusive(&self) -> bool {
        self.owner.is_exclusive()
    }

    /// Returns `true` once the storage has been released or handed off.
    pub fn is_released(&self) -> bool {
        self.ptr.load(Ordering::Acquire).is_null()
    }

    #[inline]
    fn data_ptr(&self) -> Option<NonNull<u8>> {
        let base = NonNull::new(self.ptr.load(Ordering::Acquire))?;
        Some(unsafe { base.add(self.offset) })
    }

    #[inline]
    fn take_ptr(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.ptr.swap(std::ptr::null_mut(), Ordering::AcqRel))
    }

    fn release_once(&self) {
        if let Some(ptr) = self.take_ptr() {
            log::trace!(
                "releasing native buffer {:p} (offset {}, {} bytes)",
                ptr,
                self.offset,
                self.len
            );
            // The swap above hands the pointer to exactly one caller.
            unsafe { self.owner.release(ptr, self.offset, self.len) };
        }
    }
}

impl LargeMemoryManager<u8> for NativeMemoryManager {
    fn len(&self) -> u64 {
        self.len
    }

    fn state(&self) -> ManagerState {
        if self.is_released() {
            ManagerState::Released
        } else {
            ManagerState::Live
        }
    }

    fn span(&self) -> Result<ReadOnlyLargeSpan<'_, u8>> {
        let ptr = self.data_ptr().ok_or_else(released_error)?;
        Ok(unsafe { ReadOnlyLargeSpan::from_raw_unchecked(ptr, self.len) })
    }

    fn span_mut(&mut self) -> Result<LargeSpan<'_, u8>> {
        let ptr = self.data_ptr().ok_or_else(released_error)?;
        Ok(unsafe { LargeSpan::from_raw_unchecked(ptr, self.len) })
    }

    fn pin(&self, element_index: u64) -> Result<MemoryHandle<'_, u8>> {
        verify_range!(element_index, element_index <= self.len);
        let ptr = self.data_ptr().ok_or_else(released_error)?;
        let ptr = unsafe { ptr.add(element_index as usize) };
        Ok(MemoryHandle::new(ptr, Some(self)))
    }

    fn unpin(&self) {
        // Native memory is never relocated.
    }

    fn dispose(&mut self) {
        self.release_once();
    }
}

impl OwnableAllocation for NativeMemoryManager {
    fn try_acquire(&mut self) -> Option<RawAllocation> {
        if !self.owner.is_exclusive() {
            return None;
        }
        let ptr = self.take_ptr()?;
        log::debug!(
            "handing off native buffer {:p} ({} bytes) to a new owner",
            ptr,
            self.len
        );
        Some(RawAllocation {
            ptr,
            offset: self.offset,
            len: self.len,
            owner: self.owner.clone(),
        })
    }
}

impl Drop for NativeMemoryManager {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for NativeMemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMemoryManager")
            .field("ptr", &self.ptr.load(Ordering::Relaxed))
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("exclusive", &self.owner.is_exclusive())
            .finish()
    }
}

/// A raw native allocation taken out of an exclusive [`NativeMemoryManager`].
///
/// The new owner either re-wraps it with [`RawAllocation::into_manager`] or lets it
/// drop, which releases the memory.
pub struct RawAllocation {
    ptr: NonNull<u8>,
    offset: usize,
    len: u64,
    owner: Arc<dyn NativeAllocationOwner>,
}

unsafe impl Send for RawAllocation {}

unsafe impl Sync for RawAllocation {}

impl RawAllocation {
    /// Base pointer of the allocation.
    pub fn base_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Pointer to the first usable byte (`base + offset`).
    pub fn data_ptr(&self) -> *mut u8 {
        unsafe { self.ptr.as_ptr().add(self.offset) }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Wraps the allocation into a new manager, which becomes its release authority.
    pub fn into_manager(self) -> NativeMemoryManager {
        let this = ManuallyDrop::new(self);
        let owner = unsafe { std::ptr::read(&this.owner) };
        unsafe { NativeMemoryManager::with_owner(owner, this.ptr, this.offset, this.len) }
    }
}

impl Drop for RawAllocation {
    fn drop(&mut self) {
        log::warn!(
            "raw allocation {:p} ({} bytes) dropped without a new owner, releasing",
            self.ptr,
            self.len
        );
        // The manager gave up the pointer in `try_acquire`, this is its only owner.
        unsafe { self.owner.release(self.ptr, self.offset, self.len) };
    }
}

impl std::fmt::Debug for RawAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAllocation")
            .field("ptr", &self.ptr)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Counts releases. The storage itself is borrowed from the test.
    #[derive(Default)]
    struct CountingOwner {
        releases: AtomicUsize,
        exclusive: bool,
    }

    impl NativeAllocationOwner for CountingOwner {
        unsafe fn release(&self, _ptr: NonNull<u8>, _offset: usize, _length: u64) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn is_exclusive(&self) -> bool {
            self.exclusive
        }
    }

    fn manager_over(
        storage: &mut [u8],
        offset: usize,
        owner: &Arc<CountingOwner>,
    ) -> NativeMemoryManager {
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
        let len = (storage.len() - offset) as u64;
        unsafe { NativeMemoryManager::with_owner(owner.clone(), ptr, offset, len) }
    }

    #[test]
    fn test_span_honors_offset() {
        let mut storage = [0u8, 1, 2, 3, 4, 5];
        let owner = Arc::new(CountingOwner::default());
        let manager = manager_over(&mut storage, 2, &owner);
        assert_eq!(manager.len(), 4);
        assert_eq!(manager.state(), ManagerState::Live);
        assert_eq!(manager.span().unwrap().as_slice(), &[2, 3, 4, 5]);
    }

    #[test]
    fn test_dispose_releases_exactly_once() {
        let mut storage = [0u8; 16];
        let owner = Arc::new(CountingOwner::default());
        for n in 1..5 {
            owner.releases.store(0, Ordering::SeqCst);
            let mut manager = manager_over(&mut storage, 0, &owner);
            for _ in 0..n {
                manager.dispose();
            }
            assert_eq!(manager.state(), ManagerState::Released);
            drop(manager);
            assert_eq!(owner.releases.load(Ordering::SeqCst), 1, "n = {n}");
        }
    }

    #[test]
    fn test_drop_releases() {
        let mut storage = [0u8; 4];
        let owner = Arc::new(CountingOwner::default());
        drop(manager_over(&mut storage, 0, &owner));
        assert_eq!(owner.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_released_manager_refuses_spans() {
        let mut storage = [0u8; 4];
        let owner = Arc::new(CountingOwner::default());
        let mut manager = manager_over(&mut storage, 0, &owner);
        manager.dispose();
        assert!(manager.span().unwrap_err().is_invalid_operation());
        assert!(manager.span_mut().unwrap_err().is_invalid_operation());
        assert!(manager.pin(0).unwrap_err().is_invalid_operation());
    }

    #[test]
    fn test_pin() {
        let mut storage = [0u8; 8];
        let base = storage.as_ptr();
        let owner = Arc::new(CountingOwner::default());
        let manager = manager_over(&mut storage, 1, &owner);
        {
            let handle = manager.pin(3).unwrap();
            assert_eq!(handle.as_ptr(), unsafe { base.add(4) });
        }
        assert!(manager.pin(7).is_ok());
        assert!(manager.pin(8).unwrap_err().is_out_of_range());
    }

    #[test]
    fn test_try_acquire_exclusive() {
        let mut storage = [7u8; 8];
        let owner = Arc::new(CountingOwner {
            exclusive: true,
            ..Default::default()
        });
        let mut manager = manager_over(&mut storage, 0, &owner);
        let raw = manager.try_acquire().unwrap();
        assert_eq!(raw.len(), 8);
        assert!(manager.is_released());
        assert!(manager.try_acquire().is_none());
        drop(manager);
        assert_eq!(owner.releases.load(Ordering::SeqCst), 0);

        let manager = raw.into_manager();
        assert_eq!(manager.span().unwrap().as_slice(), &[7u8; 8]);
        drop(manager);
        assert_eq!(owner.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_acquire_shared_refused() {
        let mut storage = [0u8; 8];
        let owner = Arc::new(CountingOwner::default());
        let mut manager = manager_over(&mut storage, 0, &owner);
        assert!(manager.try_acquire().is_none());
        assert!(!manager.is_released());
    }

    #[test]
    fn test_dropped_raw_allocation_releases() {
        let mut storage = [0u8; 8];
        let owner = Arc::new(CountingOwner {
            exclusive: true,
            ..Default::default()
        });
        let mut manager = manager_over(&mut storage, 0, &owner);
        drop(manager.try_acquire());
        assert_eq!(owner.releases.load(Ordering::SeqCst), 1);
        drop(manager);
        assert_eq!(owner.releases.load(Ordering::SeqCst), 1);
    }
}
