//! Destinations that synthesized files are written to.

use alloc::vec::Vec;

/// A sequential destination for bytes.
pub trait ByteSink {
    /// Any errors that might need to be propagated up through the [`ByteSink`] abstraction.
    type Error;

    /// Appends `bytes` to the sink.
    ///
    /// # Errors
    ///
    /// Returns [`ByteSink::Error`] if the underlying destination rejects the write.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Called once after the last write.
    ///
    /// File backed sinks use this to flush and to apply the final permissions.
    ///
    /// # Errors
    ///
    /// Returns [`ByteSink::Error`] if the underlying destination fails to finish.
    fn finalize(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    type Error = core::convert::Infallible;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    type Error = S::Error;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        S::write_bytes(*self, bytes)
    }

    fn finalize(&mut self) -> Result<(), Self::Error> {
        S::finalize(*self)
    }
}
