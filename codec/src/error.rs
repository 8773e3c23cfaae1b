//! Error types for codec operations

use thiserror::Error;

/// Error type for codec operations.
///
/// Running out of input (or output space) in the middle of a value is not an error: it is
/// reported as a byte count through [crate::Attempt], [crate::Step] and [crate::Decoded].
/// [Error::EndOfBuffer] is only produced once the caller has declared that no more input
/// will arrive.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of buffer: {0} more bytes needed")]
    EndOfBuffer(usize),
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid format in {0}: {1}")]
    Format(&'static str, String), // context, message
    #[error("length exceeded: {0} > {1}")]
    LengthExceeded(usize, usize), // found, max
    #[error("value out of range converting {0} to {1}")]
    OutOfRange(&'static str, &'static str), // wire, target
    #[error("no converter from {0} to {1}")]
    NotSupported(&'static str, &'static str), // wire, target
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the error indicates a bug in the codec rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }
}
