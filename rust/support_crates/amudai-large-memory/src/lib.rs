//! 64-bit addressable buffers for the Amudai infrastructure: borrowed spans,
//! sliceable memory handles, buffer managers over native or array storage, and
//! an aligned, zero-filling native allocator.
//!
//! The layering is:
//! - [`LargeSpan`] / [`ReadOnlyLargeSpan`]: transient, non-owning views.
//! - [`LargeMemory`] / [`ReadOnlyLargeMemory`]: cheap (backing, offset, length)
//!   descriptors, resolved to spans on demand.
//! - [`LargeMemoryManager`]: storage that is not a plain array, released exactly
//!   once through [`dispose`](LargeMemoryManager::dispose) or `Drop`.
//! - [`MemoryAllocator`]: the source of fresh, zero-filled byte buffers.

pub mod align;
pub mod allocator;
pub mod array;
pub mod manager;
pub mod memory;
pub mod memory_owner;
pub mod native;
pub mod null;
pub mod owner;
pub mod pressure;
pub mod read_only_memory;
pub mod read_only_span;
pub mod span;

pub use allocator::{
    AllocatorStats, DEFAULT_ALIGNMENT, MemoryAllocator, NativeMemoryAllocator, default_allocator,
};
pub use array::ArrayMemoryManager;
pub use manager::{LargeMemoryManager, ManagerState, MemoryHandle, OwnableAllocation};
pub use memory::LargeMemory;
pub use memory_owner::LargeMemoryOwner;
pub use native::{NativeMemoryManager, RawAllocation};
pub use null::{NullMemoryManager, null_manager};
pub use owner::{FinalRelease, ImportedAllocation, NativeAllocationOwner};
pub use read_only_memory::ReadOnlyLargeMemory;
pub use read_only_span::ReadOnlyLargeSpan;
pub use span::LargeSpan;
