//! The zero-length buffer manager.

use std::{marker::PhantomData, ptr::NonNull, sync::Arc, sync::OnceLock};

use amudai_common::{Result, verify_range};

use crate::{
    manager::{LargeMemoryManager, ManagerState, MemoryHandle},
    read_only_span::ReadOnlyLargeSpan,
    span::LargeSpan,
};

/// A manager that never had any storage.
///
/// It is always in the [`ManagerState::Empty`] state: spans are empty, pinning
/// yields a dangling (but well-aligned) address, and disposal is a no-op.
pub struct NullMemoryManager<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NullMemoryManager<T> {
    pub const fn new() -> NullMemoryManager<T> {
        NullMemoryManager {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for NullMemoryManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LargeMemoryManager<T> for NullMemoryManager<T> {
    fn len(&self) -> u64 {
        0
    }

    fn state(&self) -> ManagerState {
        ManagerState::Empty
    }

    fn span(&self) -> Result<ReadOnlyLargeSpan<'_, T>> {
        Ok(ReadOnlyLargeSpan::empty())
    }

    fn span_mut(&mut self) -> Result<LargeSpan<'_, T>> {
        Ok(LargeSpan::empty())
    }

    fn pin(&self, element_index: u64) -> Result<MemoryHandle<'_, T>> {
        verify_range!(element_index, element_index == 0);
        Ok(MemoryHandle::new(NonNull::dangling(), None))
    }

    fn unpin(&self) {}

    fn dispose(&mut self) {}
}

impl<T> std::fmt::Debug for NullMemoryManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NullMemoryManager")
    }
}

/// Returns the process-wide zero-length byte manager.
///
/// Every call returns the same instance, which is never released.
pub fn null_manager() -> Arc<dyn LargeMemoryManager<u8>> {
    static NULL_MANAGER: OnceLock<Arc<dyn LargeMemoryManager<u8>>> = OnceLock::new();
    NULL_MANAGER
        .get_or_init(|| Arc::new(NullMemoryManager::<u8>::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_manager_is_shared() {
        let a = null_manager();
        let b = null_manager();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 0);
        assert_eq!(a.state(), ManagerState::Empty);
        assert!(a.span().unwrap().is_empty());
    }

    #[test]
    fn test_null_manager_dispose_is_noop() {
        let mut manager = NullMemoryManager::<u32>::new();
        manager.dispose();
        manager.dispose();
        assert_eq!(manager.state(), ManagerState::Empty);
        assert!(manager.span_mut().unwrap().is_empty());
        assert!(manager.pin(0).is_ok());
        assert!(manager.pin(1).unwrap_err().is_out_of_range());
    }
}
