//! Converters between in-memory values and their wire encoding.
//!
//! A converter handles one `(wire type, target type)` pair. It is stateless: everything it
//! needs to resume lives in the frame it is handed. Converters for composite values never
//! process their children directly. They return [Step::Push] and are invoked again once the
//! child frame has completed.

use crate::{
    cursor::{Reader, Writer},
    registry::Builder,
    state::{ReadChild, ReadFrame, Source, Step, WriteChild, WriteFrame},
    Error,
};

mod enumerable;
mod nullable;
mod object;
mod pair;
mod primitive;

pub use self::{
    enumerable::{EnumerableConverter, MapConverter},
    nullable::{BoxedConverter, NullableConverter},
    object::ObjectConverter,
    pair::PairConverter,
    primitive::{BytesConverter, CastConverter, FixedConverter, TextConverter},
};

/// Unwraps a completed [crate::Attempt], or returns its byte need from the enclosing step.
macro_rules! ready {
    ($attempt:expr) => {
        match $attempt {
            $crate::Attempt::Done(value) => value,
            $crate::Attempt::Needs(needed) => return Ok($crate::Step::Needs(needed)),
        }
    };
}
pub(crate) use ready;

/// Encodes and decodes values of one type pair, one resumable step at a time.
pub trait Converter: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Resolves the converters this converter delegates to.
    ///
    /// Called exactly once, after the converter has been registered, so that recursive
    /// types can refer back to it.
    fn setup(&self, _builder: &mut Builder<'_>) -> Result<(), Error> {
        Ok(())
    }

    /// Writes as much of the frame's value as fits.
    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error>;

    /// Reads as much of the frame's value as is available.
    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error>;

    /// Returns true if the value is null.
    fn is_null(&self, _source: Source<'_>) -> Result<bool, Error> {
        Ok(false)
    }
}

/// Returns the converter resolved at setup.
pub(crate) fn resolved<T>(cell: &std::sync::OnceLock<T>) -> Result<&T, Error> {
    cell.get()
        .ok_or(Error::InvalidState("converter used before setup"))
}

/// Stores the converter resolved at setup.
pub(crate) fn resolve_once<T>(cell: &std::sync::OnceLock<T>, value: T) -> Result<(), Error> {
    cell.set(value)
        .map_err(|_| Error::InvalidState("converter set up twice"))
}
