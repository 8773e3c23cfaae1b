//! Converters for primitive values.

use super::{ready, Converter};
use crate::{
    cursor::{Attempt, Fixed, Reader, Writer},
    model::{cast, AnyBox, Model, NumericAccess},
    state::{ReadChild, ReadFrame, ReadProgress, Step, WriteChild, WriteFrame, WriteProgress},
    Error,
};
use bytes::Bytes;
use std::{any::type_name, marker::PhantomData, sync::Arc};

/// Pass-through converter for a fixed-width type written as itself.
pub struct FixedConverter<F>(PhantomData<fn() -> F>);

impl<F: Fixed + Model> FixedConverter<F> {
    /// Builds the converter behind an [Arc].
    pub fn build() -> Arc<dyn Converter> {
        Arc::new(Self(PhantomData))
    }
}

impl<F: Fixed + Model> Converter for FixedConverter<F> {
    fn name(&self) -> &'static str {
        type_name::<F>()
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let value = *cast::<F>(frame.source.value()?)?;
        ready!(writer.try_write(value));
        Ok(Step::Done)
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        let value = ready!(reader.try_read::<F>()?);
        frame.object = Some(Box::new(value));
        Ok(Step::Done)
    }
}

/// Converts between two different numeric types.
///
/// Values are widened to a [crate::model::Number] and narrowed into the other type. A value
/// that does not fit is rejected rather than truncated.
pub struct CastConverter {
    wire: NumericAccess,
    target: NumericAccess,
    wire_name: &'static str,
    target_name: &'static str,
}

impl CastConverter {
    pub fn new(
        wire: NumericAccess,
        target: NumericAccess,
        wire_name: &'static str,
        target_name: &'static str,
    ) -> Self {
        Self {
            wire,
            target,
            wire_name,
            target_name,
        }
    }
}

impl Converter for CastConverter {
    fn name(&self) -> &'static str {
        "cast"
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let number = (self.target.to_number)(frame.source.value()?)?;
        let mut encoded = [0u8; 16];
        let encoded = &mut encoded[..self.wire.size];
        if !(self.wire.put)(number, encoded) {
            return Err(Error::OutOfRange(self.target_name, self.wire_name));
        }
        ready!(writer.try_write_bytes(encoded));
        Ok(Step::Done)
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        let encoded = ready!(reader.try_read_bytes(self.wire.size));
        let number = (self.wire.get)(encoded)?;
        let value = (self.target.from_number)(number)
            .ok_or(Error::OutOfRange(self.wire_name, self.target_name))?;
        frame.object = Some(value);
        Ok(Step::Done)
    }
}

/// Writes a length prefix unless the frame has already recorded one.
fn write_length(
    writer: &mut Writer<'_>,
    progress: &mut WriteProgress<'_>,
    length: usize,
) -> Result<Attempt<()>, Error> {
    if matches!(progress, WriteProgress::Text { .. }) {
        return Ok(Attempt::Done(()));
    }
    let attempt = writer.try_write_length(length)?;
    if attempt.is_done() {
        *progress = WriteProgress::Text { length };
    }
    Ok(attempt)
}

/// Reads a length prefix unless the frame has already recorded one.
fn read_length(
    reader: &mut Reader<'_>,
    progress: &mut ReadProgress,
) -> Result<Attempt<usize>, Error> {
    if let ReadProgress::Text { length } = progress {
        return Ok(Attempt::Done(*length));
    }
    let attempt = reader.try_read_length()?;
    if let Attempt::Done(length) = attempt {
        *progress = ReadProgress::Text { length };
    }
    Ok(attempt)
}

/// Converter for UTF-8 strings: `[i32 length][bytes]`.
#[derive(Default)]
pub struct TextConverter;

impl TextConverter {
    pub fn build() -> Arc<dyn Converter> {
        Arc::new(Self)
    }
}

impl Converter for TextConverter {
    fn name(&self) -> &'static str {
        "string"
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let value = cast::<String>(frame.source.value()?)?;
        ready!(write_length(writer, &mut frame.progress, value.len())?);
        ready!(writer.try_write_bytes(value.as_bytes()));
        Ok(Step::Done)
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        let length = ready!(read_length(reader, &mut frame.progress)?);
        let bytes = ready!(reader.try_read_bytes(length));
        let text =
            std::str::from_utf8(bytes).map_err(|err| Error::Format("string", err.to_string()))?;

        // Fill an existing string in place to keep its allocation.
        let existing = frame.object.take().map(|existing| existing.downcast::<String>());
        let value: AnyBox = match existing {
            Some(Ok(mut existing)) => {
                existing.clear();
                existing.push_str(text);
                existing
            }
            _ => Box::new(text.to_owned()),
        };
        frame.object = Some(value);
        Ok(Step::Done)
    }
}

/// Converter for byte strings: `[i32 length][bytes]`.
#[derive(Default)]
pub struct BytesConverter;

impl BytesConverter {
    pub fn build() -> Arc<dyn Converter> {
        Arc::new(Self)
    }
}

impl Converter for BytesConverter {
    fn name(&self) -> &'static str {
        "bytes"
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let value = cast::<Bytes>(frame.source.value()?)?;
        ready!(write_length(writer, &mut frame.progress, value.len())?);
        ready!(writer.try_write_bytes(value));
        Ok(Step::Done)
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        let length = ready!(read_length(reader, &mut frame.progress)?);
        let bytes = ready!(reader.try_read_bytes(length));
        frame.object = Some(Box::new(Bytes::copy_from_slice(bytes)));
        Ok(Step::Done)
    }
}
