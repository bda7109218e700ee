//! `LargeSpan`: a transient, writable, non-owning view over a contiguous region.

use std::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
    ptr::NonNull,
};

use amudai_common::{Result, error::Error, verify_range};

use crate::read_only_span::ReadOnlyLargeSpan;

/// A writable, directly addressable window over `len` contiguous elements of `T`.
///
/// The span borrows its region for `'a` and never frees it. Lengths and indices are
/// `u64`, so a span can describe regions beyond the 32-bit element limit.
///
/// Spans implement neither `PartialEq` nor `Hash`. Compare contents through
/// [`LargeSpan::as_slice`].
pub struct LargeSpan<'a, T> {
    ptr: NonNull<T>,
    len: u64,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for LargeSpan<'_, T> {}

unsafe impl<T: Sync> Sync for LargeSpan<'_, T> {}

impl<'a, T> LargeSpan<'a, T> {
    /// Returns an empty span.
    pub fn empty() -> LargeSpan<'a, T> {
        LargeSpan {
            ptr: NonNull::dangling(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Creates a span over an entire slice.
    pub fn new(slice: &'a mut [T]) -> LargeSpan<'a, T> {
        let len = slice.len() as u64;
        LargeSpan {
            ptr: NonNull::from(slice).cast(),
            len,
            _marker: PhantomData,
        }
    }

    /// Creates a span over `length` elements of `array`, starting at `start`.
    ///
    /// A missing array is accepted only together with an empty range, in which case
    /// the result is the empty span.
    ///
    /// # Errors
    ///
    /// - `NullArgument` if `array` is `None` and the range is not empty.
    /// - `OutOfRange` if `start + length` exceeds the array length.
    pub fn from_array(
        array: Option<&'a mut [T]>,
        start: u64,
        length: u64,
    ) -> Result<LargeSpan<'a, T>> {
        let Some(array) = array else {
            if start == 0 && length == 0 {
                return Ok(LargeSpan::empty());
            }
            return Err(Error::null_argument("array"));
        };
        check_range(array.len() as u64, start, length)?;
        Ok(LargeSpan::new(array).slice_unchecked(start, length))
    }

    /// Creates a span from a raw pointer and an element count.
    ///
    /// # Errors
    ///
    /// - `NullArgument` if `ptr` is null.
    /// - `OutOfRange` if the region would exceed `isize::MAX` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `length` elements of `T`,
    /// properly aligned, initialized, and not aliased by any other live reference
    /// for the whole lifetime `'a`.
    pub unsafe fn from_raw_parts(ptr: *mut T, length: u64) -> Result<LargeSpan<'a, T>> {
        let ptr = NonNull::new(ptr).ok_or_else(|| Error::null_argument("pointer"))?;
        check_byte_len::<T>(length)?;
        Ok(unsafe { LargeSpan::from_raw_unchecked(ptr, length) })
    }

    /// Creates a single-element span over `value`.
    pub fn from_mut(value: &'a mut T) -> LargeSpan<'a, T> {
        LargeSpan::new(std::slice::from_mut(value))
    }

    /// # Safety
    ///
    /// Same contract as [`LargeSpan::from_raw_parts`]; additionally the byte size
    /// of the region must not exceed `isize::MAX`.
    #[inline]
    pub(crate) unsafe fn from_raw_unchecked(ptr: NonNull<T>, length: u64) -> LargeSpan<'a, T> {
        LargeSpan {
            ptr,
            len: length,
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements in the span.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the span has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index >= len`.
    #[inline]
    pub fn get(&self, index: u64) -> Result<&T> {
        verify_range!(index, index < self.len);
        Ok(unsafe { &*self.ptr.as_ptr().add(index as usize) })
    }

    /// Returns a mutable reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `index >= len`.
    #[inline]
    pub fn get_mut(&mut self, index: u64) -> Result<&mut T> {
        verify_range!(index, index < self.len);
        Ok(unsafe { &mut *self.ptr.as_ptr().add(index as usize) })
    }

    /// Returns the sub-span starting at `start` and running to the end.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `start > len`.
    pub fn slice_from(self, start: u64) -> Result<LargeSpan<'a, T>> {
        verify_range!(start, start <= self.len);
        let length = self.len - start;
        Ok(self.slice_unchecked(start, length))
    }

    /// Returns the sub-span of `length` elements starting at `start`, without copying.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if the sub-region is not contained in this span.
    pub fn slice(self, start: u64, length: u64) -> Result<LargeSpan<'a, T>> {
        check_range(self.len, start, length)?;
        Ok(self.slice_unchecked(start, length))
    }

    /// Reborrows the span for a shorter lifetime, leaving `self` usable afterwards.
    #[inline]
    pub fn reborrow(&mut self) -> LargeSpan<'_, T> {
        LargeSpan {
            ptr: self.ptr,
            len: self.len,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_read_only(&self) -> ReadOnlyLargeSpan<'_, T> {
        unsafe { ReadOnlyLargeSpan::from_raw_unchecked(self.ptr, self.len) }
    }

    #[inline]
    pub fn into_read_only(self) -> ReadOnlyLargeSpan<'a, T> {
        unsafe { ReadOnlyLargeSpan::from_raw_unchecked(self.ptr, self.len) }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len as usize) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len as usize) }
    }

    #[inline]
    pub fn into_mut_slice(self) -> &'a mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len as usize) }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Writes `value` into every element of the span.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.as_mut_slice().fill(value);
    }

    /// Zero-fills the span.
    pub fn clear(&mut self)
    where
        T: bytemuck::Zeroable,
    {
        unsafe {
            self.ptr.as_ptr().write_bytes(0, self.len as usize);
        }
    }

    /// Copies the contents of this span into `destination`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `destination` is shorter than this span. Nothing is written
    /// in that case.
    pub fn copy_to(&self, destination: &mut LargeSpan<'_, T>) -> Result<()>
    where
        T: Copy,
    {
        self.as_read_only().copy_to(destination)
    }

    /// Copies the contents of this span into `destination` if it is long enough.
    ///
    /// Returns `false`, without writing anything, if it is not.
    pub fn try_copy_to(&self, destination: &mut LargeSpan<'_, T>) -> bool
    where
        T: Copy,
    {
        self.as_read_only().try_copy_to(destination)
    }

    /// Copies the span into a newly allocated `Vec`.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    #[inline]
    fn slice_unchecked(self, start: u64, length: u64) -> LargeSpan<'a, T> {
        debug_assert!(start <= self.len && length <= self.len - start);
        LargeSpan {
            ptr: unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(start as usize)) },
            len: length,
            _marker: PhantomData,
        }
    }
}

impl<'a> LargeSpan<'a, u8> {
    /// Reinterprets the bytes of this span as a span of `U`.
    ///
    /// # Errors
    ///
    /// `ArrayTypeMismatch` if the span is not aligned for `U` or its length is not
    /// a multiple of `size_of::<U>()`.
    pub fn cast<U>(self) -> Result<LargeSpan<'a, U>>
    where
        U: bytemuck::Pod,
    {
        let typed = bytemuck::try_cast_slice_mut::<u8, U>(self.into_mut_slice())
            .map_err(|e| Error::array_type_mismatch(std::any::type_name::<U>(), format!("{e:?}")))?;
        Ok(LargeSpan::new(typed))
    }
}

impl<T> Index<u64> for LargeSpan<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: u64) -> &T {
        assert!(
            index < self.len,
            "index out of range: {index} >= {}",
            self.len
        );
        unsafe { &*self.ptr.as_ptr().add(index as usize) }
    }
}

impl<T> IndexMut<u64> for LargeSpan<'_, T> {
    #[inline]
    fn index_mut(&mut self, index: u64) -> &mut T {
        assert!(
            index < self.len,
            "index out of range: {index} >= {}",
            self.len
        );
        unsafe { &mut *self.ptr.as_ptr().add(index as usize) }
    }
}

impl<'a, T> From<&'a mut [T]> for LargeSpan<'a, T> {
    fn from(slice: &'a mut [T]) -> Self {
        LargeSpan::new(slice)
    }
}

impl<'a, T> From<&'a mut Vec<T>> for LargeSpan<'a, T> {
    fn from(vec: &'a mut Vec<T>) -> Self {
        LargeSpan::new(vec.as_mut_slice())
    }
}

impl<T> Default for LargeSpan<'_, T> {
    fn default() -> Self {
        LargeSpan::empty()
    }
}

impl<T> fmt::Debug for LargeSpan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeSpan")
            .field("type", &std::any::type_name::<T>())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Verifies that `start..start + length` lies within `0..len`, without overflowing.
#[inline]
pub(crate) fn check_range(len: u64, start: u64, length: u64) -> Result<()> {
    verify_range!(start, start <= len);
    verify_range!(length, length <= len - start);
    Ok(())
}

/// Verifies that `length` elements of `T` fit in `isize::MAX` bytes.
#[inline]
pub(crate) fn check_byte_len<T>(length: u64) -> Result<()> {
    let max_len = isize::MAX as u64 / std::mem::size_of::<T>().max(1) as u64;
    verify_range!(length, length <= max_len);
    Ok(())
}
