//! Random-access byte sources from which ELF structures are read.

use core::{error, fmt};

use alloc::{vec, vec::Vec};

use crate::{u64_to_usize, usize_to_u64};

/// A random-access source of bytes, such as an in-memory buffer or an open file.
///
/// The contents must not change while a [`Medium`] is being read.
///
/// # Implementors
///
/// Implementations must treat any overflow in `offset + length` as a bounds error
/// ([`check_bounds()`] centralizes this).
pub trait Medium {
    /// Any errors that might need to be propagated up through the [`Medium`] abstraction.
    type Error;

    /// The number of bytes available to be retrieved.
    fn size(&self) -> u64;

    /// Reads `slice.len()` bytes into `slice` from `offset`.
    ///
    /// # Errors
    ///
    /// - [`MediumError::BoundsError`]: Requested region is outside of the bounds of [`Medium`].
    /// - [`MediumError::UnderlyingError`]: The underlying source returned an error.
    fn read_slice(&self, offset: u64, slice: &mut [u8]) -> Result<(), MediumError<Self::Error>>;
}

/// Reads exactly `length` bytes at `offset` from `medium`.
///
/// # Errors
///
/// - [`MediumError::BoundsError`]: Requested region is outside of the bounds of `medium`.
/// - [`MediumError::UnderlyingError`]: The underlying source returned an error.
pub fn read_vec<M: Medium + ?Sized>(
    medium: &M,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, MediumError<M::Error>> {
    check_bounds::<M::Error>(medium.size(), offset, length)?;

    // `length` fits in `usize` because it is bounded by the size of the medium.
    let mut bytes = vec![0; u64_to_usize(length)];
    medium.read_slice(offset, &mut bytes)?;
    Ok(bytes)
}

/// Various errors that can occur when interacting with a [`Medium`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediumError<E> {
    /// Requested region is outside of the bounds of [`Medium`].
    BoundsError {
        /// The offset, in bytes, of the start of the requested region.
        offset: u64,
        /// The size, in bytes, of the requested region.
        length: u64,
        /// The actual size of the [`Medium`].
        size: u64,
    },
    /// An error reported by the underlying source.
    UnderlyingError(E),
}

impl<E> From<E> for MediumError<E> {
    fn from(value: E) -> Self {
        Self::UnderlyingError(value)
    }
}

impl<E: fmt::Display> fmt::Display for MediumError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoundsError {
                offset,
                length,
                size,
            } => write!(
                f,
                "requested region at {offset} bytes with a length of {length} \
                does not fit inside medium of {size} bytes"
            ),
            Self::UnderlyingError(error) => write!(f, "error accessing underlying medium: {error}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> error::Error for MediumError<E> {}

/// Checks that `length` bytes at `offset` fit inside a [`Medium`] of `size` bytes.
///
/// # Errors
///
/// Returns [`MediumError::BoundsError`] if the region does not fit or `offset + length`
/// overflows.
pub fn check_bounds<E>(size: u64, offset: u64, length: u64) -> Result<(), MediumError<E>> {
    let error = MediumError::BoundsError {
        offset,
        length,
        size,
    };

    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(error),
    }
}

impl Medium for [u8] {
    type Error = core::convert::Infallible;

    fn size(&self) -> u64 {
        usize_to_u64(self.len())
    }

    fn read_slice(&self, offset: u64, slice: &mut [u8]) -> Result<(), MediumError<Self::Error>> {
        check_bounds::<Self::Error>(self.size(), offset, usize_to_u64(slice.len()))?;

        // The bounds check guarantees that `offset` fits in a `usize`.
        slice.copy_from_slice(&self[u64_to_usize(offset)..][..slice.len()]);
        Ok(())
    }
}

impl<M: Medium + ?Sized> Medium for &M {
    type Error = M::Error;

    fn size(&self) -> u64 {
        M::size(*self)
    }

    fn read_slice(&self, offset: u64, slice: &mut [u8]) -> Result<(), MediumError<Self::Error>> {
        M::read_slice(*self, offset, slice)
    }
}

#[cfg(test)]
mod test {
    use super::{MediumError, check_bounds, read_vec};

    #[test]
    fn slice_reads() {
        let bytes: &[u8] = &[1, 2, 3, 4, 5];

        assert_eq!(read_vec(bytes, 1, 3), Ok(vec![2, 3, 4]));
        assert_eq!(read_vec(bytes, 5, 0), Ok(vec![]));
    }

    #[test]
    fn slice_bounds() {
        let bytes: &[u8] = &[1, 2, 3, 4, 5];

        assert_eq!(
            read_vec(bytes, 3, 3),
            Err(MediumError::BoundsError {
                offset: 3,
                length: 3,
                size: 5,
            })
        );
    }

    #[test]
    fn overflowing_region() {
        assert!(check_bounds::<()>(10, u64::MAX, 2).is_err());
        assert!(check_bounds::<()>(10, 0, 10).is_ok());
    }
}
