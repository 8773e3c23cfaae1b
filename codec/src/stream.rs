//! Incremental encoding and decoding.
//!
//! An [Encoder] writes a value into a sequence of caller-provided output windows and a
//! [Decoder] reads a value from a sequence of input chunks. Both suspend whenever a window runs
//! out and report exactly how many more bytes they need. Feeding the same payload in any
//! chunking produces the same value as decoding it in one piece.

use crate::{
    cursor::{Attempt, Reader, Writer},
    model::{downcast, Model},
    pool::PooledBuf,
    state::{ReadState, WriteState},
    Error,
};
use std::marker::PhantomData;
use tracing::trace;

/// Result of writing into one output window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoded {
    /// The value is complete; `written` bytes of the window were used.
    Complete { written: usize },
    /// `written` bytes were produced and the next window must be at least `window` bytes long
    /// for encoding to make progress.
    Needs { written: usize, window: usize },
}

/// Writes one value across any number of output windows.
pub struct Encoder<'a> {
    state: WriteState<'a>,
    max_array_size: usize,
    failed: bool,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(state: WriteState<'a>, max_array_size: usize) -> Self {
        Self {
            state,
            max_array_size,
            failed: false,
        }
    }

    /// Returns true once the value has been fully written.
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Writes as much of the value as fits into `out`.
    ///
    /// Bytes reported as written are final: the encoder never revisits them, so the caller may
    /// flush them before providing the next window.
    ///
    /// Once an error is returned, every later call fails.
    pub fn write_into(&mut self, out: &mut [u8]) -> Result<Encoded, Error> {
        if self.failed {
            return Err(Error::InvalidState("encoder failed"));
        }
        let len = out.len();
        let mut writer = Writer::new(out, 0, self.max_array_size);
        let attempt = match self.state.run(&mut writer) {
            Ok(attempt) => attempt,
            Err(err) => {
                self.failed = true;
                self.state.abandon();
                return Err(err);
            }
        };
        let written = writer.position();
        Ok(match attempt {
            Attempt::Done(()) => Encoded::Complete { written },
            Attempt::Needs(needed) => Encoded::Needs {
                written,
                window: len - written + needed,
            },
        })
    }
}

/// Result of feeding one input chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// The value is complete.
    Complete(T),
    /// At least this many more bytes are required.
    Needs(usize),
}

/// Reads one value of type `T` from any number of input chunks.
///
/// Input that has been fed but not yet consumed (for example half of a fixed-width number)
/// is buffered internally. Bytes following the value are left in the buffer and can be
/// inspected with [Decoder::remainder].
pub struct Decoder<T> {
    state: ReadState,
    buffer: PooledBuf,
    filled: usize,
    max_array_size: usize,
    complete: bool,
    failed: bool,
    _target: PhantomData<fn() -> T>,
}

impl<T: Model> Decoder<T> {
    pub(crate) fn new(state: ReadState, buffer: PooledBuf, max_array_size: usize) -> Self {
        Self {
            state,
            buffer,
            filled: 0,
            max_array_size,
            complete: false,
            failed: false,
            _target: PhantomData,
        }
    }

    /// Appends `chunk` to the buffered input and decodes as far as possible.
    ///
    /// Feeding an empty chunk reports the current byte need without changing any state.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Decoded<T>, Error> {
        if self.complete {
            return Err(Error::InvalidState("decoder already completed"));
        }
        if self.failed {
            return Err(Error::InvalidState("decoder failed"));
        }

        let filled = self.filled + chunk.len();
        if filled > self.buffer.len() {
            self.buffer.grow(filled, self.filled);
        }
        self.buffer[self.filled..filled].copy_from_slice(chunk);
        self.filled = filled;

        let mut reader = Reader::new(&self.buffer[..self.filled], self.max_array_size);
        let result = self.state.run(&mut reader);
        let consumed = reader.position();

        // Compact: keep only unconsumed input and clear what was vacated.
        self.buffer.copy_within(consumed..self.filled, 0);
        self.buffer[self.filled - consumed..self.filled].fill(0);
        self.filled -= consumed;
        trace!(consumed, buffered = self.filled, "fed decoder");

        match result {
            Ok(Attempt::Done(value)) => {
                self.complete = true;
                Ok(Decoded::Complete(downcast::<T>(value)?))
            }
            Ok(Attempt::Needs(needed)) => Ok(Decoded::Needs(needed)),
            Err(err) => {
                self.failed = true;
                self.state.abandon();
                Err(err)
            }
        }
    }

    /// Number of bytes fed but not consumed.
    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Bytes fed but not consumed.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer[..self.filled]
    }

    /// Declares that no more input will arrive.
    ///
    /// Fails with [Error::EndOfBuffer] if the value is still incomplete.
    pub fn finish(mut self) -> Result<T, Error> {
        match self.feed(&[])? {
            Decoded::Complete(value) => Ok(value),
            Decoded::Needs(needed) => Err(Error::EndOfBuffer(needed)),
        }
    }
}
