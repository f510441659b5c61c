//! Comparator-parameterized binary search and binary insertion.
//!
//! [`lower_bound_by`] works over an index-addressed accessor rather than
//! a slice so that it can search storage which is not a contiguous
//! `&[T]` (the arena's atomic lanes, for instance).

use std::cmp::Ordering;

/// First index in `0..len` for which `is_before(index)` is false.
///
/// `is_before` must be monotone over the range: true for a (possibly
/// empty) prefix and false for the rest. Returns `len` when every index
/// is "before".
pub fn lower_bound_by<F>(len: usize, mut is_before: F) -> usize
where
    F: FnMut(usize) -> bool,
{
    let mut lo = 0usize;
    let mut hi = len;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if is_before(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Insert `item` into `dest`, which must already be sorted by `cmp`,
/// keeping it sorted. Equal elements keep their arrival order.
///
/// Returns the index `item` was inserted at.
pub fn binary_insert_sorted<T, F>(dest: &mut Vec<T>, item: T, mut cmp: F) -> usize
where
    F: FnMut(&T, &T) -> Ordering,
{
    let at = dest.partition_point(|probe| cmp(probe, &item) != Ordering::Greater);
    dest.insert(at, item);
    at
}
