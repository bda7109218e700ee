//! Allocators handing out fresh, zero-filled byte buffers.

use std::{
    alloc::{Layout, alloc, dealloc},
    ptr::NonNull,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use amudai_common::{Result, error::Error, verify_arg};

use crate::{
    align::align_offset,
    manager::LargeMemoryManager,
    native::NativeMemoryManager,
    null::null_manager,
    owner::NativeAllocationOwner,
    pressure,
    span::LargeSpan,
};

/// Alignment of the buffers handed out by [`default_allocator`].
pub const DEFAULT_ALIGNMENT: usize = 64;

/// Allocation counters of a single allocator.
///
/// All counters are updated atomically; reads are diagnostic and may be outdated
/// in a concurrent environment.
#[derive(Debug, Default)]
pub struct AllocatorStats {
    allocations: AtomicU64,
    bytes_allocated: AtomicU64,
    releases: AtomicU64,
    bytes_released: AtomicU64,
}

impl AllocatorStats {
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Acquire)
    }

    /// Total number of bytes requested from the platform, alignment padding included.
    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated.load(Ordering::Acquire)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Acquire)
    }

    pub fn bytes_released(&self) -> u64 {
        self.bytes_released.load(Ordering::Acquire)
    }

    /// Number of allocations that have not been released yet.
    ///
    /// Zero once every buffer handed out has been disposed or dropped.
    pub fn live_allocations(&self) -> u64 {
        self.allocations().saturating_sub(self.releases())
    }

    pub fn live_bytes(&self) -> u64 {
        self.bytes_allocated()
            .saturating_sub(self.bytes_released())
    }

    pub(crate) fn record_allocation(&self, bytes: u64) {
        self.allocations.fetch_add(1, Ordering::AcqRel);
        self.bytes_allocated.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn record_release(&self, bytes: u64) {
        self.bytes_released.fetch_add(bytes, Ordering::AcqRel);
        self.releases.fetch_add(1, Ordering::AcqRel);
    }
}

/// Source of fresh, zero-filled byte buffers.
pub trait MemoryAllocator: Send + Sync {
    /// Alignment of the buffers produced, a power of two.
    fn alignment(&self) -> usize;

    fn statistics(&self) -> &AllocatorStats;

    /// Allocates a zero-filled buffer of `length > 0` bytes.
    ///
    /// Returns the manager along with the number of bytes actually requested
    /// from the platform.
    fn allocate_internal(&self, length: u64) -> Result<(Arc<dyn LargeMemoryManager<u8>>, u64)>;

    /// Allocates a zero-filled buffer of `length` bytes.
    ///
    /// A zero `length` returns the shared [`null_manager`] without allocating.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `length` cannot be addressed on this platform.
    /// - `AllocationFailed` if the platform allocator fails.
    fn allocate(&self, length: u64) -> Result<Arc<dyn LargeMemoryManager<u8>>> {
        if length == 0 {
            return Ok(null_manager());
        }
        let (manager, bytes_allocated) = self.allocate_internal(length)?;
        self.statistics().record_allocation(bytes_allocated);
        Ok(manager)
    }
}

/// Allocator over the Rust global allocator.
///
/// Every buffer is over-allocated by `alignment` bytes, and the manager records
/// the offset of the first aligned byte. The allocation is released through the
/// allocator's exclusive owner, so buffers can be handed off with
/// [`OwnableAllocation`](crate::manager::OwnableAllocation).
pub struct NativeMemoryAllocator {
    alignment: usize,
    stats: Arc<AllocatorStats>,
    owner: Arc<ExclusiveOwner>,
}

impl NativeMemoryAllocator {
    pub fn new() -> NativeMemoryAllocator {
        Self::build(DEFAULT_ALIGNMENT)
    }

    /// # Errors
    ///
    /// `InvalidArgument` unless `alignment` is a power of two.
    pub fn with_alignment(alignment: usize) -> Result<NativeMemoryAllocator> {
        verify_arg!(alignment, alignment.is_power_of_two());
        Ok(Self::build(alignment))
    }

    fn build(alignment: usize) -> NativeMemoryAllocator {
        let stats = Arc::new(AllocatorStats::default());
        NativeMemoryAllocator {
            alignment,
            owner: Arc::new(ExclusiveOwner {
                alignment,
                stats: stats.clone(),
            }),
            stats,
        }
    }

    /// Allocates a zero-filled buffer and returns the concrete manager.
    ///
    /// Unlike [`MemoryAllocator::allocate`], a zero `length` still performs a
    /// (padding-only) allocation.
    pub fn allocate_native(&self, length: u64) -> Result<NativeMemoryManager> {
        let (manager, bytes_allocated) = self.allocate_raw(length)?;
        self.stats.record_allocation(bytes_allocated);
        Ok(manager)
    }

    fn allocate_raw(&self, length: u64) -> Result<(NativeMemoryManager, u64)> {
        let size = usize::try_from(length)
            .ok()
            .and_then(|length| length.checked_add(self.alignment))
            .filter(|&size| size <= isize::MAX as usize)
            .ok_or_else(|| {
                Error::out_of_range(
                    "length",
                    format!("{length} bytes exceed the addressable range"),
                )
            })?;
        let layout = Layout::from_size_align(size, 1)
            .map_err(|e| Error::out_of_range("length", e.to_string()))?;

        let base = NonNull::new(unsafe { alloc(layout) })
            .ok_or_else(|| Error::allocation_failed(size))?;
        let offset = align_offset(base.as_ptr() as usize, self.alignment);

        // Zero-fill before the manager takes over, nothing can fail past this point.
        unsafe { LargeSpan::from_raw_unchecked(base.add(offset), length) }.clear();

        let owner: Arc<dyn NativeAllocationOwner> = self.owner.clone();
        let manager = unsafe { NativeMemoryManager::with_owner(owner, base, offset, length) };
        pressure::add(size as u64);
        log::trace!(
            "allocated native buffer {:p} ({} bytes, offset {})",
            base,
            size,
            offset
        );
        Ok((manager, size as u64))
    }
}

impl Default for NativeMemoryAllocator {
    fn default() -> Self {
        NativeMemoryAllocator::new()
    }
}

impl MemoryAllocator for NativeMemoryAllocator {
    fn alignment(&self) -> usize {
        self.alignment
    }

    fn statistics(&self) -> &AllocatorStats {
        &self.stats
    }

    fn allocate_internal(&self, length: u64) -> Result<(Arc<dyn LargeMemoryManager<u8>>, u64)> {
        let (manager, bytes_allocated) = self.allocate_raw(length)?;
        Ok((Arc::new(manager), bytes_allocated))
    }
}

impl std::fmt::Debug for NativeMemoryAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMemoryAllocator")
            .field("alignment", &self.alignment)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Frees buffers of a [`NativeMemoryAllocator`] back to the global allocator.
struct ExclusiveOwner {
    alignment: usize,
    stats: Arc<AllocatorStats>,
}

impl NativeAllocationOwner for ExclusiveOwner {
    unsafe fn release(&self, ptr: NonNull<u8>, _offset: usize, length: u64) {
        // `length + alignment` was validated when the buffer was allocated.
        let size = length as usize + self.alignment;
        match Layout::from_size_align(size, 1) {
            Ok(layout) => unsafe { dealloc(ptr.as_ptr(), layout) },
            Err(e) => {
                log::error!("cannot release native buffer {ptr:p} ({size} bytes): {e}");
                return;
            }
        }
        self.stats.record_release(size as u64);
        pressure::remove(size as u64);
        log::trace!("released native buffer {:p} ({} bytes)", ptr, size);
    }

    fn is_exclusive(&self) -> bool {
        true
    }
}

/// The process-wide allocator, built on first use with [`DEFAULT_ALIGNMENT`].
pub fn default_allocator() -> &'static NativeMemoryAllocator {
    static DEFAULT: OnceLock<NativeMemoryAllocator> = OnceLock::new();
    DEFAULT.get_or_init(NativeMemoryAllocator::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        align::is_ptr_aligned,
        manager::{ManagerState, OwnableAllocation},
        memory::LargeMemory,
    };

    #[test]
    fn test_allocations_are_zeroed_and_aligned() {
        let allocator = NativeMemoryAllocator::new();
        for length in [1u64, 7, 16, 63, 64, 65, 1000, 4096] {
            let manager = allocator.allocate(length).unwrap();
            let span = manager.span().unwrap();
            assert_eq!(span.len(), length);
            assert!(span.iter().all(|&b| b == 0));
            assert!(is_ptr_aligned(span.as_ptr(), DEFAULT_ALIGNMENT));
        }
    }

    #[test]
    fn test_custom_alignment() {
        let allocator = NativeMemoryAllocator::with_alignment(4096).unwrap();
        assert_eq!(allocator.alignment(), 4096);
        let manager = allocator.allocate_native(100).unwrap();
        assert!(manager.offset() < 4096);
        assert!(is_ptr_aligned(manager.span().unwrap().as_ptr(), 4096));

        assert!(NativeMemoryAllocator::with_alignment(0).is_err());
        assert!(NativeMemoryAllocator::with_alignment(48).is_err());
        assert!(NativeMemoryAllocator::with_alignment(1).is_ok());
    }

    #[test]
    fn test_zero_length_returns_null_manager() {
        let allocator = NativeMemoryAllocator::new();
        let a = allocator.allocate(0).unwrap();
        let b = allocator.allocate(0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &null_manager()));
        assert_eq!(a.state(), ManagerState::Empty);
        assert_eq!(allocator.statistics().allocations(), 0);
    }

    #[test]
    fn test_unaddressable_length() {
        let allocator = NativeMemoryAllocator::new();
        assert!(allocator.allocate(u64::MAX).err().unwrap().is_out_of_range());
        assert!(
            allocator
                .allocate(isize::MAX as u64)
                .err().unwrap()
                .is_out_of_range()
        );
        assert_eq!(allocator.statistics().allocations(), 0);
    }

    #[test]
    fn test_statistics_and_leak_detection() {
        let allocator = NativeMemoryAllocator::new();
        let first = allocator.allocate(10).unwrap();
        let mut second = allocator.allocate_native(20).unwrap();

        let stats = allocator.statistics();
        assert_eq!(stats.allocations(), 2);
        assert_eq!(stats.bytes_allocated(), 10 + 20 + 2 * DEFAULT_ALIGNMENT as u64);
        assert_eq!(stats.live_allocations(), 2);

        second.dispose();
        second.dispose();
        assert_eq!(stats.releases(), 1);
        assert_eq!(stats.live_allocations(), 1);

        let memory = LargeMemory::from_manager(first);
        let slice = memory.slice(2, 4).unwrap();
        drop(memory);
        assert_eq!(stats.live_allocations(), 1);
        drop(slice);
        drop(second);
        assert_eq!(stats.live_allocations(), 0);
        assert_eq!(stats.live_bytes(), 0);
    }

    #[test]
    fn test_hand_off_keeps_allocation_alive() {
        let allocator = NativeMemoryAllocator::new();
        let mut manager = allocator.allocate_native(32).unwrap();
        manager.span_mut().unwrap()[31] = 9;
        let raw = manager.try_acquire().unwrap();
        drop(manager);
        assert_eq!(allocator.statistics().live_allocations(), 1);

        let manager = raw.into_manager();
        assert_eq!(manager.span().unwrap()[31], 9);
        drop(manager);
        assert_eq!(allocator.statistics().live_allocations(), 0);
    }

    #[test]
    fn test_concurrent_allocation() {
        let allocator = NativeMemoryAllocator::new();
        std::thread::scope(|scope| {
            for t in 0..8u64 {
                let allocator = &allocator;
                scope.spawn(move || {
                    for i in 0..100u64 {
                        let length = 1 + (t * 100 + i) % 257;
                        let mut memory = LargeMemory::from_manager(allocator.allocate(length).unwrap());
                        memory.span_mut().unwrap().fill(t as u8);
                    }
                });
            }
        });
        let stats = allocator.statistics();
        assert_eq!(stats.allocations(), 800);
        assert_eq!(stats.releases(), 800);
        assert_eq!(stats.live_allocations(), 0);
    }

    #[test]
    fn test_default_allocator_is_shared() {
        let a = default_allocator();
        let b = default_allocator();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.alignment(), DEFAULT_ALIGNMENT);
    }
}
