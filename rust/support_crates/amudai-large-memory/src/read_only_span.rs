//! `ReadOnlyLargeSpan`: the write-disabled counterpart of [`LargeSpan`].

use std::{fmt, marker::PhantomData, ops::Index, ptr::NonNull};

use amudai_common::{Result, error::Error, verify_range};

use crate::span::{LargeSpan, check_byte_len, check_range};

/// A read-only, directly addressable window over `len` contiguous elements of `T`.
///
/// Unlike [`LargeSpan`], read-only spans are `Copy` and may alias each other.
pub struct ReadOnlyLargeSpan<'a, T> {
    ptr: NonNull<T>,
    len: u64,
    _marker: PhantomData<&'a [T]>,
}

unsafe impl<T: Sync> Send for ReadOnlyLargeSpan<'_, T> {}

unsafe impl<T: Sync> Sync for ReadOnlyLargeSpan<'_, T> {}

impl<T> Clone for ReadOnlyLargeSpan<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadOnlyLargeSpan<'_, T> {}

impl<'a, T> ReadOnlyLargeSpan<'a, T> {
    pub fn empty() -> ReadOnlyLargeSpan<'a, T> {
        ReadOnlyLargeSpan {
            ptr: NonNull::dangling(),
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn new(slice: &'a [T]) -> ReadOnlyLargeSpan<'a, T> {
        ReadOnlyLargeSpan {
            ptr: NonNull::from(slice).cast(),
            len: slice.len() as u64,
            _marker: PhantomData,
        }
    }

    /// Creates a span over `length` elements of `array`, starting at `start`.
    ///
    /// # Errors
    ///
    /// - `NullArgument` if `array` is `None` and the range is not empty.
    /// - `OutOfRange` if `start + length` exceeds the array length.
    pub fn from_array(
        array: Option<&'a [T]>,
        start: u64,
        length: u64,
    ) -> Result<ReadOnlyLargeSpan<'a, T>> {
        let Some(array) = array else {
            if start == 0 && length == 0 {
                return Ok(ReadOnlyLargeSpan::empty());
            }
            return Err(Error::null_argument("array"));
        };
        check_range(array.len() as u64, start, length)?;
        Ok(ReadOnlyLargeSpan::new(array).slice_unchecked(start, length))
    }

    /// Creates a read-only span from a raw pointer and an element count.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `length` elements of `T`, properly aligned
    /// and initialized, and must not be written through any other pointer for the
    /// whole lifetime `'a`.
    pub unsafe fn from_raw_parts(ptr: *const T, length: u64) -> Result<ReadOnlyLargeSpan<'a, T>> {
        let ptr = NonNull::new(ptr as *mut T).ok_or_else(|| Error::null_argument("pointer"))?;
        check_byte_len::<T>(length)?;
        Ok(unsafe { ReadOnlyLargeSpan::from_raw_unchecked(ptr, length) })
    }

    #[inline]
    pub(crate) unsafe fn from_raw_unchecked(ptr: NonNull<T>, length: u64) -> ReadOnlyLargeSpan<'a, T> {
        ReadOnlyLargeSpan {
            ptr,
            len: length,
            _marker: PhantomData,
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

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Returns a reference to the element at `index`, or `OutOfRange` if
    /// `index >= len`.
    #[inline]
    pub fn get(&self, index: u64) -> Result<&'a T> {
        verify_range!(index, index < self.len);
        Ok(unsafe { &*self.ptr.as_ptr().add(index as usize) })
    }

    pub fn slice_from(self, start: u64) -> Result<ReadOnlyLargeSpan<'a, T>> {
        verify_range!(start, start <= self.len);
        Ok(self.slice_unchecked(start, self.len - start))
    }

    pub fn slice(self, start: u64, length: u64) -> Result<ReadOnlyLargeSpan<'a, T>> {
        check_range(self.len, start, length)?;
        Ok(self.slice_unchecked(start, length))
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len as usize) }
    }

    pub fn iter(&self) -> std::slice::Iter<'a, T> {
        self.as_slice().iter()
    }

    /// Copies the contents of this span into `destination`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `destination` is shorter than this span; nothing is written.
    pub fn copy_to(&self, destination: &mut LargeSpan<'_, T>) -> Result<()>
    where
        T: Copy,
    {
        if self.len > destination.len() {
            return Err(Error::out_of_range(
                "destination",
                format!(
                    "destination length {} is shorter than source length {}",
                    destination.len(),
                    self.len
                ),
            ));
        }
        self.copy_unchecked(destination);
        Ok(())
    }

    pub fn try_copy_to(&self, destination: &mut LargeSpan<'_, T>) -> bool
    where
        T: Copy,
    {
        if self.len > destination.len() {
            return false;
        }
        self.copy_unchecked(destination);
        true
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_slice().to_vec()
    }

    #[inline]
    fn copy_unchecked(&self, destination: &mut LargeSpan<'_, T>)
    where
        T: Copy,
    {
        // `ptr::copy` tolerates overlap, spans obtained through raw pointers may alias.
        unsafe {
            std::ptr::copy(
                self.ptr.as_ptr(),
                destination.as_mut_ptr(),
                self.len as usize,
            );
        }
    }

    #[inline]
    fn slice_unchecked(self, start: u64, length: u64) -> ReadOnlyLargeSpan<'a, T> {
        debug_assert!(start <= self.len && length <= self.len - start);
        ReadOnlyLargeSpan {
            ptr: unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(start as usize)) },
            len: length,
            _marker: PhantomData,
        }
    }
}

impl<'a> ReadOnlyLargeSpan<'a, u8> {
    /// Reinterprets the bytes of this span as a span of `U`.
    ///
    /// # Errors
    ///
    /// `ArrayTypeMismatch` on alignment or size mismatch.
    pub fn cast<U>(self) -> Result<ReadOnlyLargeSpan<'a, U>>
    where
        U: bytemuck::Pod,
    {
        let typed = bytemuck::try_cast_slice::<u8, U>(self.as_slice())
            .map_err(|e| Error::array_type_mismatch(std::any::type_name::<U>(), format!("{e:?}")))?;
        Ok(ReadOnlyLargeSpan::new(typed))
    }
}

impl<T> Index<u64> for ReadOnlyLargeSpan<'_, T> {
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

impl<'a, T> From<LargeSpan<'a, T>> for ReadOnlyLargeSpan<'a, T> {
    fn from(span: LargeSpan<'a, T>) -> Self {
        span.into_read_only()
    }
}

impl<'a, T> From<&'a [T]> for ReadOnlyLargeSpan<'a, T> {
    fn from(slice: &'a [T]) -> Self {
        ReadOnlyLargeSpan::new(slice)
    }
}

impl<'a, T> From<&'a Vec<T>> for ReadOnlyLargeSpan<'a, T> {
    fn from(vec: &'a Vec<T>) -> Self {
        ReadOnlyLargeSpan::new(vec.as_slice())
    }
}

impl<T> Default for ReadOnlyLargeSpan<'_, T> {
    fn default() -> Self {
        ReadOnlyLargeSpan::empty()
    }
}

impl<T> fmt::Debug for ReadOnlyLargeSpan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyLargeSpan")
            .field("type", &std::any::type_name::<T>())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_view() {
        let data = vec![3u8, 1, 4, 1, 5, 9, 2, 6];
        let span = ReadOnlyLargeSpan::from(&data);
        assert_eq!(span.len(), 8);
        assert_eq!(span[2], 4);
        assert_eq!(*span.get(7).unwrap(), 6);
        assert!(span.get(8).unwrap_err().is_out_of_range());

        let aliased = span;
        assert_eq!(aliased.slice(2, 3).unwrap().to_vec(), vec![4, 1, 5]);
        assert_eq!(span.slice_from(6).unwrap().as_slice(), &[2, 6]);
    }

    #[test]
    fn test_from_array_rules() {
        assert!(ReadOnlyLargeSpan::<u32>::from_array(None, 0, 0).unwrap().is_empty());
        assert!(ReadOnlyLargeSpan::<u32>::from_array(None, 1, 0).is_err());

        let data = [1u32, 2, 3];
        assert_eq!(
            ReadOnlyLargeSpan::from_array(Some(&data[..]), 3, 0).unwrap().len(),
            0
        );
        assert!(
            ReadOnlyLargeSpan::from_array(Some(&data[..]), 1, 3)
                .unwrap_err()
                .is_out_of_range()
        );
    }

    #[test]
    fn test_narrowing_from_writable() {
        let mut data = [7u16; 4];
        let mut span = LargeSpan::new(&mut data[..]);
        span[0] = 1;
        let read_only: ReadOnlyLargeSpan<'_, u16> = span.into();
        assert_eq!(read_only.as_slice(), &[1, 7, 7, 7]);
    }

    #[test]
    fn test_copy_into_writable() {
        let src = [1i64, 2];
        let mut dst = [0i64; 3];
        let mut dst_span = LargeSpan::new(&mut dst[..]);
        ReadOnlyLargeSpan::new(&src[..])
            .copy_to(&mut dst_span.reborrow().slice_from(1).unwrap())
            .unwrap();
        assert_eq!(dst_span.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_cast() {
        let words = [1u32, 2, 3];
        let bytes: &[u8] = bytemuck::cast_slice(&words[..]);
        let typed = ReadOnlyLargeSpan::new(bytes).cast::<u32>().unwrap();
        assert_eq!(typed.as_slice(), &words);
        assert!(ReadOnlyLargeSpan::new(&bytes[..5]).cast::<u32>().is_err());
    }
}
