//! Converters for values wrapped in `Option` or `Box`.

use super::{ready, resolve_once, resolved, Converter};
use crate::{
    cursor::{Reader, Writer},
    model::{BoxedAccess, DetailFn, NullableAccess},
    registry::Builder,
    state::{
        ReadChild, ReadFrame, ReadProgress, Source, Step, WriteChild, WriteFrame, WriteProgress,
    },
    Error,
};
use std::sync::{Arc, OnceLock};

/// Converter for `Option<T>`.
///
/// When the frame carries null flags, a marker byte precedes the value. Without null flags
/// the value must be present: the only positions that drop the marker are object members,
/// and the object converter never hands a null member to a child frame.
pub struct NullableConverter {
    wire_inner: DetailFn,
    access: NullableAccess,
    inner: OnceLock<Arc<dyn Converter>>,
}

impl NullableConverter {
    pub fn new(wire_inner: DetailFn, access: NullableAccess) -> Self {
        Self {
            wire_inner,
            access,
            inner: OnceLock::new(),
        }
    }
}

impl Converter for NullableConverter {
    fn name(&self) -> &'static str {
        "nullable"
    }

    fn setup(&self, builder: &mut Builder<'_>) -> Result<(), Error> {
        let inner = builder.resolve(self.wire_inner, self.access.inner)?;
        resolve_once(&self.inner, inner)
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        if let WriteProgress::Delegated = frame.progress {
            return Ok(Step::Done);
        }
        let value = (self.access.get)(frame.source.value()?)?;
        if frame.null_flags && !frame.has_written_is_null {
            ready!(writer.try_write_is_null(value.is_none()));
            frame.has_written_is_null = true;
        }
        let Some(value) = value else {
            if !frame.null_flags {
                return Err(Error::InvalidState("null value without a null marker"));
            }
            return Ok(Step::Done);
        };
        frame.progress = WriteProgress::Delegated;
        Ok(Step::Push(WriteChild {
            converter: Arc::clone(resolved(&self.inner)?),
            source: Source::Value(value),
            null_flags: true,
            graph: frame.graph.clone(),
        }))
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        if let ReadProgress::Delegated = frame.progress {
            let value = frame
                .returned
                .take()
                .ok_or(Error::InvalidState("missing nullable value"))?;
            frame.object = Some((self.access.some)(value)?);
            return Ok(Step::Done);
        }
        if frame.null_flags && !frame.has_null_checked {
            let is_null = ready!(reader.try_read_is_null()?);
            frame.has_null_checked = true;
            if is_null {
                frame.object = Some((self.access.none)());
                return Ok(Step::Done);
            }
        }
        let existing = match frame.object.as_deref_mut() {
            Some(existing) => (self.access.take)(existing)?,
            None => None,
        };
        frame.object = None;
        frame.progress = ReadProgress::Delegated;
        Ok(Step::Push(ReadChild {
            converter: Arc::clone(resolved(&self.inner)?),
            null_flags: true,
            graph: frame.graph.clone(),
            existing,
        }))
    }

    fn is_null(&self, source: Source<'_>) -> Result<bool, Error> {
        Ok((self.access.get)(source.value()?)?.is_none())
    }
}

/// Converter for `Box<T>`. The box itself has no wire representation.
pub struct BoxedConverter {
    wire_inner: DetailFn,
    access: BoxedAccess,
    inner: OnceLock<Arc<dyn Converter>>,
}

impl BoxedConverter {
    pub fn new(wire_inner: DetailFn, access: BoxedAccess) -> Self {
        Self {
            wire_inner,
            access,
            inner: OnceLock::new(),
        }
    }
}

impl Converter for BoxedConverter {
    fn name(&self) -> &'static str {
        "boxed"
    }

    fn setup(&self, builder: &mut Builder<'_>) -> Result<(), Error> {
        let inner = builder.resolve(self.wire_inner, self.access.inner)?;
        resolve_once(&self.inner, inner)
    }

    fn try_write<'a>(
        &self,
        _writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        if let WriteProgress::Delegated = frame.progress {
            return Ok(Step::Done);
        }
        let value = (self.access.get)(frame.source.value()?)?;
        frame.progress = WriteProgress::Delegated;
        Ok(Step::Push(WriteChild {
            converter: Arc::clone(resolved(&self.inner)?),
            source: Source::Value(value),
            null_flags: frame.null_flags,
            graph: frame.graph.clone(),
        }))
    }

    fn try_read(
        &self,
        _reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        if let ReadProgress::Delegated = frame.progress {
            let value = frame
                .returned
                .take()
                .ok_or(Error::InvalidState("missing boxed value"))?;
            frame.object = Some((self.access.wrap)(value)?);
            return Ok(Step::Done);
        }
        let existing = match frame.object.take() {
            Some(mut existing) => Some((self.access.take)(&mut *existing)?),
            None => None,
        };
        frame.progress = ReadProgress::Delegated;
        Ok(Step::Push(ReadChild {
            converter: Arc::clone(resolved(&self.inner)?),
            null_flags: frame.null_flags,
            graph: frame.graph.clone(),
            existing,
        }))
    }

    fn is_null(&self, source: Source<'_>) -> Result<bool, Error> {
        let inner = (self.access.get)(source.value()?)?;
        resolved(&self.inner)?.is_null(Source::Value(inner))
    }
}
