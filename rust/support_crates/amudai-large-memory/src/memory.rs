//! `LargeMemory`: a cheap, cloneable (backing, offset, length) descriptor.

use std::{
    fmt,
    hash::{Hash, Hasher},
    ptr::NonNull,
    sync::Arc,
};

use amudai_common::{Result, error::Error, verify_range};

use crate::{
    manager::{LargeMemoryManager, ManagerState, MemoryHandle, released_error},
    read_only_span::ReadOnlyLargeSpan,
    span::{LargeSpan, check_range},
};

/// A sliceable handle to a contiguous region of `T`, resolved to a span on demand.
///
/// The region is backed by either nothing (the empty memory), a shared array, or a
/// [`LargeMemoryManager`]. Cloning and slicing never copy elements, they only share
/// the backing and adjust the offset and length.
///
/// A manager-backed memory shares ownership of the manager: the manager (and its
/// storage) is released when the last handle referring to it is dropped.
///
/// Equality and hashing are structural over (backing identity, offset, length),
/// never over content.
pub struct LargeMemory<T: 'static> {
    backing: Backing<T>,
    start: u64,
    len: u64,
}

enum Backing<T: 'static> {
    Empty,
    Array(Arc<[T]>),
    Manager(Arc<dyn LargeMemoryManager<T>>),
}

impl<T: 'static> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Empty => Backing::Empty,
            Backing::Array(array) => Backing::Array(array.clone()),
            Backing::Manager(manager) => Backing::Manager(manager.clone()),
        }
    }
}

impl<T: 'static> Backing<T> {
    fn identity(&self) -> Option<*const ()> {
        match self {
            Backing::Empty => None,
            Backing::Array(array) => Some(Arc::as_ptr(array) as *const ()),
            Backing::Manager(manager) => Some(Arc::as_ptr(manager) as *const ()),
        }
    }
}

impl<T: 'static> LargeMemory<T> {
    /// Returns an empty memory that has no backing.
    pub fn empty() -> LargeMemory<T> {
        LargeMemory {
            backing: Backing::Empty,
            start: 0,
            len: 0,
        }
    }

    pub fn from_vec(vec: Vec<T>) -> LargeMemory<T> {
        LargeMemory::from_array(vec.into())
    }

    /// Creates a memory over the entire array.
    pub fn from_array(array: Arc<[T]>) -> LargeMemory<T> {
        let len = array.len() as u64;
        LargeMemory {
            backing: Backing::Array(array),
            start: 0,
            len,
        }
    }

    /// Creates a memory over `length` elements of `array`, starting at `start`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if the range exceeds the array.
    pub fn from_array_range(array: Arc<[T]>, start: u64, length: u64) -> Result<LargeMemory<T>> {
        check_range(array.len() as u64, start, length)?;
        Ok(LargeMemory {
            backing: Backing::Array(array),
            start,
            len: length,
        })
    }

    /// Creates a memory over the entire region of `manager`.
    pub fn from_manager(manager: Arc<dyn LargeMemoryManager<T>>) -> LargeMemory<T> {
        let len = manager.len();
        LargeMemory {
            backing: Backing::Manager(manager),
            start: 0,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this memory within its backing, in elements.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.start
    }

    /// The manager backing this memory, if any.
    pub fn manager(&self) -> Option<&Arc<dyn LargeMemoryManager<T>>> {
        match &self.backing {
            Backing::Manager(manager) => Some(manager),
            _ => None,
        }
    }

    /// Returns the memory starting at `start` and running to the end.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `start > len`.
    pub fn slice_from(&self, start: u64) -> Result<LargeMemory<T>> {
        verify_range!(start, start <= self.len);
        Ok(self.slice_unchecked(start, self.len - start))
    }

    /// Returns the memory of `length` elements starting at `start`, sharing the backing.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if the sub-region is not contained in this memory.
    pub fn slice(&self, start: u64, length: u64) -> Result<LargeMemory<T>> {
        check_range(self.len, start, length)?;
        Ok(self.slice_unchecked(start, length))
    }

    /// Resolves the backing into a read-only span.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the backing manager has been released.
    pub fn span(&self) -> Result<ReadOnlyLargeSpan<'_, T>> {
        match &self.backing {
            Backing::Empty => Ok(ReadOnlyLargeSpan::empty()),
            Backing::Array(array) => Ok(ReadOnlyLargeSpan::new(
                &array[self.start as usize..(self.start + self.len) as usize],
            )),
            Backing::Manager(manager) => manager.span()?.slice(self.start, self.len),
        }
    }

    /// Resolves the backing into a writable span.
    ///
    /// Writing requires this handle to be the only one referring to the backing,
    /// like [`Arc::get_mut`]. Empty regions always resolve to an empty span.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the backing is shared with other handles.
    /// - `InvalidOperation` if the backing manager has been released.
    pub fn span_mut(&mut self) -> Result<LargeSpan<'_, T>> {
        let (start, len) = (self.start, self.len);
        match &mut self.backing {
            Backing::Empty => Ok(LargeSpan::empty()),
            Backing::Array(array) => {
                if len == 0 {
                    return Ok(LargeSpan::empty());
                }
                let array = Arc::get_mut(array).ok_or_else(shared_backing_error)?;
                Ok(LargeSpan::new(
                    &mut array[start as usize..(start + len) as usize],
                ))
            }
            Backing::Manager(manager) => {
                if manager.state() == ManagerState::Released {
                    return Err(released_error());
                }
                if len == 0 {
                    return Ok(LargeSpan::empty());
                }
                let manager = Arc::get_mut(manager).ok_or_else(shared_backing_error)?;
                manager.span_mut()?.slice(start, len)
            }
        }
    }

    /// Returns a handle holding a stable address of the first element.
    ///
    /// Manager-backed memory delegates to [`LargeMemoryManager::pin`]; array-backed
    /// memory points into the array, which cannot move while the handle borrows it.
    pub fn pin(&self) -> Result<MemoryHandle<'_, T>> {
        match &self.backing {
            Backing::Empty => Ok(MemoryHandle::new(NonNull::dangling(), None)),
            Backing::Array(array) => {
                let base = NonNull::from(&array[..]).cast::<T>();
                let ptr = unsafe { base.add(self.start as usize) };
                Ok(MemoryHandle::new(ptr, None))
            }
            Backing::Manager(manager) => manager.pin(self.start),
        }
    }

    /// Copies the elements into a new `Vec`.
    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        Ok(self.span()?.to_vec())
    }

    /// Copies the elements into `destination`.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `destination` is shorter than this memory.
    /// - Any error of [`LargeMemory::span`] / [`LargeMemory::span_mut`].
    pub fn copy_to(&self, destination: &mut LargeMemory<T>) -> Result<()>
    where
        T: Copy,
    {
        let source = self.span()?;
        source.copy_to(&mut destination.span_mut()?)
    }

    /// Copies the elements into `destination` if it is long enough.
    ///
    /// Returns `Ok(false)` when it is too short; resolution failures are still errors.
    pub fn try_copy_to(&self, destination: &mut LargeMemory<T>) -> Result<bool>
    where
        T: Copy,
    {
        let source = self.span()?;
        Ok(source.try_copy_to(&mut destination.span_mut()?))
    }

    /// Zero-copy access to the backing array region, if the backing has one.
    pub fn try_get_array(&self) -> Option<&[T]> {
        let range = self.start as usize..(self.start + self.len) as usize;
        match &self.backing {
            Backing::Empty => None,
            Backing::Array(array) => Some(&array[range]),
            Backing::Manager(manager) => manager.try_get_array().map(|array| &array[range]),
        }
    }

    /// Releases the backing right away if this is the only handle referring to it.
    ///
    /// Returns `true` if the storage was released by this call. Otherwise the handle
    /// is simply dropped and the storage goes away with the last remaining one.
    pub(crate) fn dispose(mut self) -> bool {
        match &mut self.backing {
            Backing::Empty => false,
            Backing::Array(array) => Arc::get_mut(array).is_some(),
            Backing::Manager(manager) => match Arc::get_mut(manager) {
                Some(manager) => {
                    let live = manager.state() == ManagerState::Live;
                    manager.dispose();
                    live
                }
                None => false,
            },
        }
    }

    #[inline]
    fn slice_unchecked(&self, start: u64, length: u64) -> LargeMemory<T> {
        LargeMemory {
            backing: self.backing.clone(),
            start: self.start + start,
            len: length,
        }
    }
}

#[cold]
fn shared_backing_error() -> Error {
    Error::invalid_operation("writable span over a shared backing")
}

impl<T: 'static> Clone for LargeMemory<T> {
    fn clone(&self) -> Self {
        LargeMemory {
            backing: self.backing.clone(),
            start: self.start,
            len: self.len,
        }
    }
}

impl<T: 'static> Default for LargeMemory<T> {
    fn default() -> Self {
        LargeMemory::empty()
    }
}

impl<T: 'static> PartialEq for LargeMemory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.backing.identity() == other.backing.identity()
            && self.start == other.start
            && self.len == other.len
    }
}

impl<T: 'static> Eq for LargeMemory<T> {}

impl<T: 'static> Hash for LargeMemory<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.backing.identity().map(|p| p as usize).hash(state);
        self.start.hash(state);
        self.len.hash(state);
    }
}

impl<T: 'static> From<Vec<T>> for LargeMemory<T> {
    fn from(vec: Vec<T>) -> Self {
        LargeMemory::from_vec(vec)
    }
}

impl<T: 'static> From<Arc<[T]>> for LargeMemory<T> {
    fn from(array: Arc<[T]>) -> Self {
        LargeMemory::from_array(array)
    }
}

impl<T: 'static> fmt::Debug for LargeMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LargeMemory<{}>[{}]",
            std::any::type_name::<T>(),
            self.len
        )
    }
}
