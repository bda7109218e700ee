//! Buffer manager over an owned boxed slice.

use std::ptr::NonNull;

use amudai_common::{Result, verify_range};

use crate::{
    manager::{LargeMemoryManager, ManagerState, MemoryHandle, released_error},
    read_only_span::ReadOnlyLargeSpan,
    span::LargeSpan,
};

/// A manager that owns its elements in a boxed slice.
///
/// Useful for element types other than bytes and for storage that should go
/// through the manager path while still supporting the zero-copy array
/// fallback ([`LargeMemoryManager::try_get_array`]).
pub struct ArrayMemoryManager<T> {
    data: Option<Box<[T]>>,
}

impl<T> ArrayMemoryManager<T> {
    pub fn new(data: impl Into<Box<[T]>>) -> ArrayMemoryManager<T> {
        ArrayMemoryManager {
            data: Some(data.into()),
        }
    }

    /// Takes the elements back out of the manager, or returns `None` if it has been
    /// disposed.
    pub fn into_inner(self) -> Option<Box<[T]>> {
        self.data
    }
}

impl<T> LargeMemoryManager<T> for ArrayMemoryManager<T>
where
    T: Send + Sync,
{
    fn len(&self) -> u64 {
        self.data.as_ref().map_or(0, |data| data.len() as u64)
    }

    fn state(&self) -> ManagerState {
        match &self.data {
            Some(_) => ManagerState::Live,
            None => ManagerState::Released,
        }
    }

    fn span(&self) -> Result<ReadOnlyLargeSpan<'_, T>> {
        let data = self.data.as_deref().ok_or_else(released_error)?;
        Ok(ReadOnlyLargeSpan::new(data))
    }

    fn span_mut(&mut self) -> Result<LargeSpan<'_, T>> {
        let data = self.data.as_deref_mut().ok_or_else(released_error)?;
        Ok(LargeSpan::new(data))
    }

    fn pin(&self, element_index: u64) -> Result<MemoryHandle<'_, T>> {
        let data = self.data.as_deref().ok_or_else(released_error)?;
        verify_range!(element_index, element_index <= data.len() as u64);
        let base = NonNull::from(data).cast::<T>();
        let ptr = unsafe { base.add(element_index as usize) };
        Ok(MemoryHandle::new(ptr, Some(self)))
    }

    fn unpin(&self) {
        // Boxed storage does not move while the manager is borrowed.
    }

    fn dispose(&mut self) {
        self.data = None;
    }

    fn try_get_array(&self) -> Option<&[T]> {
        self.data.as_deref()
    }
}

impl<T> std::fmt::Debug for ArrayMemoryManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayMemoryManager")
            .field("type", &std::any::type_name::<T>())
            .field("len", &self.data.as_ref().map(|data| data.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_manager() {
        let mut manager = ArrayMemoryManager::new(vec![1.5f64, 2.5, 3.5]);
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.try_get_array(), Some(&[1.5, 2.5, 3.5][..]));

        manager.span_mut().unwrap()[1] = 0.0;
        assert_eq!(manager.span().unwrap().as_slice(), &[1.5, 0.0, 3.5]);

        let handle = manager.pin(2).unwrap();
        assert_eq!(unsafe { *handle.as_ptr() }, 3.5);
        drop(handle);

        manager.dispose();
        assert_eq!(manager.state(), ManagerState::Released);
        assert!(manager.span().unwrap_err().is_invalid_operation());
        assert!(manager.try_get_array().is_none());
        assert!(manager.into_inner().is_none());
    }
}
