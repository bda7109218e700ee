//! Power-of-two alignment arithmetic.

/// Returns the smallest non-negative offset that makes `addr + offset` a multiple
/// of `alignment`.
///
/// The result is always in `0..alignment`; an address that is already aligned
/// yields zero.
///
/// # Examples
///
/// ```
/// use amudai_large_memory::align::align_offset;
///
/// assert_eq!(align_offset(0x1000, 64), 0);
/// assert_eq!(align_offset(0x1001, 64), 63);
/// assert_eq!(align_offset(0x103f, 64), 1);
/// ```
#[inline]
pub fn align_offset(addr: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    addr.wrapping_neg() & (alignment - 1)
}

/// Checks if an address is aligned to the specified alignment boundary.
#[inline]
pub fn is_aligned(addr: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    (addr & (alignment - 1)) == 0
}

/// Checks if a pointer is aligned to the specified alignment boundary.
#[inline]
pub fn is_ptr_aligned<T>(ptr: *const T, alignment: usize) -> bool {
    is_aligned(ptr as usize, alignment)
}
