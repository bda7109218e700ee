//! Release authorities for native allocations.
//!
//! A [`NativeMemoryManager`] never frees memory on its own: it forwards the release
//! to its [`NativeAllocationOwner`]. Allocators use an exclusive owner that frees the
//! allocation immediately. Memory imported from outside is owned by an
//! [`ImportedAllocation`], which may alias the same allocation into several managers
//! and performs the final release once the last of them (and the import handle
//! itself) is gone.

use std::{
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
};

use amudai_common::{Result, error::Error};

use crate::{native::NativeMemoryManager, pressure};

/// Authority that physically releases native allocations.
///
/// Only the managers created with [`NativeMemoryManager::with_owner`] call
/// [`release`](NativeAllocationOwner::release); the crate never hands an owner
/// back out, so safe code cannot release memory behind a live manager.
///
/// ```compile_fail
/// use std::ptr::NonNull;
/// use amudai_large_memory::NativeAllocationOwner;
///
/// fn release_now(owner: &dyn NativeAllocationOwner, ptr: NonNull<u8>) {
///     owner.release(ptr, 0, 16);
/// }
/// ```
pub trait NativeAllocationOwner: Send + Sync {
    /// Releases the allocation whose base pointer is `ptr`.
    ///
    /// # Safety
    ///
    /// Must be called at most once per manager, with the values the manager was
    /// created with, and only after the manager has stopped handing out access to
    /// the region.
    unsafe fn release(&self, ptr: NonNull<u8>, offset: usize, length: u64);

    /// Whether allocations of this owner may be handed off to a new owner
    /// (see [`OwnableAllocation`](crate::manager::OwnableAllocation)).
    fn is_exclusive(&self) -> bool {
        false
    }
}

/// Performs the final, irreversible release of an imported allocation.
pub trait FinalRelease: Send + Sync {
    fn final_release(&self);
}

impl<F> FinalRelease for F
where
    F: Fn() + Send + Sync,
{
    fn final_release(&self) {
        self()
    }
}

/// Shared, reference-counted state of an imported allocation.
///
/// The count starts at 1 (the [`ImportedAllocation`] handle) and grows by one for
/// every aliasing manager.
pub(crate) struct ImportedAllocationOwner {
    reference_count: AtomicI64,
    tracked_bytes: AtomicU64,
    release: Box<dyn FinalRelease>,
}

impl ImportedAllocationOwner {
    fn reference_count(&self) -> i64 {
        self.reference_count.load(Ordering::Acquire)
    }

    fn tracked_bytes(&self) -> u64 {
        self.tracked_bytes.load(Ordering::Acquire)
    }

    /// Increments the reference count unless it has already dropped to zero.
    fn try_add_reference(&self) -> bool {
        let mut current = self.reference_count.load(Ordering::Relaxed);
        while current > 0 {
            match self.reference_count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(updated) => current = updated,
            }
        }
        false
    }

    fn release_reference(&self) {
        let previous = self.reference_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "imported allocation released too many times");
        if previous == 1 {
            let tracked = self.tracked_bytes.swap(0, Ordering::AcqRel);
            if tracked > 0 {
                pressure::remove(tracked);
            }
            log::debug!("final release of imported allocation ({tracked} tracked bytes)");
            self.release.final_release();
        }
    }
}

impl NativeAllocationOwner for ImportedAllocationOwner {
    unsafe fn release(&self, _ptr: NonNull<u8>, _offset: usize, _length: u64) {
        self.release_reference();
    }
}

/// Handle to a raw allocation imported from outside (for example, through a foreign
/// function interface).
///
/// The handle stands for the initial reference. Each [`add_memory`] call creates
/// another manager aliasing the allocation; the final release runs exactly once,
/// when the handle and all of those managers have been released.
///
/// The shared owner is never exposed, so the count can only drop through the
/// handle itself and through its managers:
///
/// ```compile_fail
/// use amudai_large_memory::ImportedAllocation;
///
/// let import = ImportedAllocation::new(|| {});
/// let _ = import.owner();
/// ```
///
/// [`add_memory`]: ImportedAllocation::add_memory
pub struct ImportedAllocation {
    owner: Arc<ImportedAllocationOwner>,
}

impl ImportedAllocation {
    pub fn new(release: impl FinalRelease + 'static) -> ImportedAllocation {
        ImportedAllocation {
            owner: Arc::new(ImportedAllocationOwner {
                reference_count: AtomicI64::new(1),
                tracked_bytes: AtomicU64::new(0),
                release: Box::new(release),
            }),
        }
    }

    /// Creates a manager aliasing `ptr + offset .. ptr + offset + length` of the
    /// imported allocation.
    ///
    /// # Errors
    ///
    /// `Disposed` if the reference count has already dropped to zero.
    ///
    /// # Safety
    ///
    /// The region must stay valid for reads and writes until the final release
    /// callback runs, and `offset + length` must not exceed `isize::MAX`.
    /// Managers created from overlapping regions must not be written concurrently.
    pub unsafe fn add_memory(
        &self,
        ptr: NonNull<u8>,
        offset: usize,
        length: u64,
    ) -> Result<NativeMemoryManager> {
        if !self.owner.try_add_reference() {
            return Err(Error::disposed("ImportedAllocationOwner"));
        }
        if length > 0 {
            self.owner.tracked_bytes.fetch_add(length, Ordering::AcqRel);
            pressure::add(length);
        }
        let owner: Arc<dyn NativeAllocationOwner> = self.owner.clone();
        Ok(unsafe { NativeMemoryManager::with_owner(owner, ptr, offset, length) })
    }

    /// Current reference count: the handle plus every live alias.
    ///
    /// **Note**: diagnostic only, the value may be outdated in a concurrent environment.
    pub fn reference_count(&self) -> i64 {
        self.owner.reference_count()
    }

    /// Total number of bytes aliased into managers and reported as memory pressure.
    pub fn tracked_bytes(&self) -> u64 {
        self.owner.tracked_bytes()
    }

    /// Releases the initial reference. Equivalent to dropping the handle.
    pub fn release(self) {}
}

impl Drop for ImportedAllocation {
    fn drop(&mut self) {
        self.owner.release_reference();
    }
}
