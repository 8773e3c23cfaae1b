//! Converter for two element tuples and dictionary entries.

use super::{resolve_once, resolved, Converter};
use crate::{
    cursor::{Reader, Writer},
    model::{DetailFn, PairAccess},
    registry::Builder,
    state::{
        ReadChild, ReadFrame, ReadProgress, Source, Step, WriteChild, WriteFrame, WriteProgress,
    },
    Error,
};
use std::sync::{Arc, OnceLock};

/// Converter for `(A, B)`: the first half followed by the second, each with a null marker.
pub struct PairConverter {
    wire_first: DetailFn,
    wire_second: DetailFn,
    access: PairAccess,
    halves: OnceLock<[Arc<dyn Converter>; 2]>,
}

impl PairConverter {
    pub fn new(wire_first: DetailFn, wire_second: DetailFn, access: PairAccess) -> Self {
        Self {
            wire_first,
            wire_second,
            access,
            halves: OnceLock::new(),
        }
    }
}

impl Converter for PairConverter {
    fn name(&self) -> &'static str {
        "pair"
    }

    fn setup(&self, builder: &mut Builder<'_>) -> Result<(), Error> {
        let first = builder.resolve(self.wire_first, self.access.first)?;
        let second = builder.resolve(self.wire_second, self.access.second)?;
        resolve_once(&self.halves, [first, second])
    }

    fn try_write<'a>(
        &self,
        _writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let pushed = match frame.progress {
            WriteProgress::Start => 0,
            WriteProgress::Pair { pushed } => pushed,
            _ => return Err(Error::InvalidState("unexpected pair progress")),
        };
        if pushed == 2 {
            return Ok(Step::Done);
        }
        let (first, second) = match frame.source {
            Source::Pair(first, second) => (first, second),
            Source::Value(value) => (self.access.split)(value)?,
        };
        let halves = resolved(&self.halves)?;
        let (converter, half) = if pushed == 0 {
            (&halves[0], first)
        } else {
            (&halves[1], second)
        };
        frame.progress = WriteProgress::Pair { pushed: pushed + 1 };
        Ok(Step::Push(WriteChild {
            converter: Arc::clone(converter),
            source: Source::Value(half),
            null_flags: true,
            graph: frame.graph.clone(),
        }))
    }

    fn try_read(
        &self,
        _reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        let halves = resolved(&self.halves)?;
        let converter = match frame.progress {
            ReadProgress::Start => {
                frame.progress = ReadProgress::Pair { first: None };
                &halves[0]
            }
            ReadProgress::Pair { ref mut first } => {
                let value = frame
                    .returned
                    .take()
                    .ok_or(Error::InvalidState("missing half of pair"))?;
                match first.take() {
                    None => {
                        *first = Some(value);
                        &halves[1]
                    }
                    Some(first) => {
                        frame.object = Some((self.access.join)(first, value)?);
                        return Ok(Step::Done);
                    }
                }
            }
            _ => return Err(Error::InvalidState("unexpected pair progress")),
        };
        Ok(Step::Push(ReadChild {
            converter: Arc::clone(converter),
            null_flags: true,
            graph: frame.graph.clone(),
            existing: None,
        }))
    }
}
