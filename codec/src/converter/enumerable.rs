//! Converters for collections and dictionaries: `[i32 count][item]*`.

use super::{ready, resolve_once, resolved, Converter};
use crate::{
    cursor::{Reader, Writer},
    model::{AnyBox, DetailFn, EnumerableAccess, MapAccess},
    registry::Builder,
    state::{
        ReadChild, ReadFrame, ReadProgress, Source, Step, WriteChild, WriteFrame, WriteProgress,
    },
    Error,
};
use std::sync::{Arc, OnceLock};

/// Converter for arrays, lists and sets.
///
/// Index-addressable containers are walked by position; sets are walked with an iterator
/// kept in the frame. Elements always carry their own null marker.
pub struct EnumerableConverter {
    wire_element: DetailFn,
    access: EnumerableAccess,
    element: OnceLock<Arc<dyn Converter>>,
}

impl EnumerableConverter {
    pub fn new(wire_element: DetailFn, access: EnumerableAccess) -> Self {
        Self {
            wire_element,
            access,
            element: OnceLock::new(),
        }
    }
}

impl Converter for EnumerableConverter {
    fn name(&self) -> &'static str {
        "enumerable"
    }

    fn setup(&self, builder: &mut Builder<'_>) -> Result<(), Error> {
        let element = builder.resolve(self.wire_element, self.access.element)?;
        resolve_once(&self.element, element)
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let value = frame.source.value()?;
        if let WriteProgress::Start = frame.progress {
            let length = (self.access.len)(value)?;
            ready!(writer.try_write_length(length)?);
            frame.progress = match self.access.get {
                Some(_) => WriteProgress::Sequence { length, index: 0 },
                None => WriteProgress::Enumerator {
                    items: Box::new((self.access.iter)(value)?.map(Source::Value)),
                },
            };
        }

        let item = match &mut frame.progress {
            WriteProgress::Sequence { length, index } => {
                if *index == *length {
                    return Ok(Step::Done);
                }
                let get = self
                    .access
                    .get
                    .ok_or(Error::InvalidState("collection is not index addressable"))?;
                let item = get(value, *index)?;
                *index += 1;
                Source::Value(item)
            }
            WriteProgress::Enumerator { items } => match items.next() {
                Some(item) => item,
                None => return Ok(Step::Done),
            },
            _ => return Err(Error::InvalidState("unexpected collection progress")),
        };
        Ok(Step::Push(WriteChild {
            converter: Arc::clone(resolved(&self.element)?),
            source: item,
            null_flags: true,
            graph: frame.graph.clone(),
        }))
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        if let ReadProgress::Start = frame.progress {
            let length = ready!(reader.try_read_length()?);
            let container = match frame.object.take() {
                Some(mut existing) => {
                    if (self.access.reuse)(&mut *existing, length)? {
                        existing
                    } else {
                        (self.access.create)(length)
                    }
                }
                None => (self.access.create)(length),
            };
            frame.object = Some(container);
            frame.progress = ReadProgress::Sequence { length, index: 0 };
        }

        let ReadFrame {
            object,
            returned,
            progress,
            graph,
            ..
        } = frame;
        let ReadProgress::Sequence { length, index } = progress else {
            return Err(Error::InvalidState("unexpected collection progress"));
        };
        if let Some(item) = returned.take() {
            let container = object
                .as_deref_mut()
                .ok_or(Error::InvalidState("missing collection"))?;
            (self.access.add)(container, *index, item)?;
            *index += 1;
        }
        if *index == *length {
            let container = object
                .take()
                .ok_or(Error::InvalidState("missing collection"))?;
            *object = Some((self.access.complete)(container)?);
            return Ok(Step::Done);
        }
        Ok(Step::Push(ReadChild {
            converter: Arc::clone(resolved(&self.element)?),
            null_flags: true,
            graph: graph.clone(),
            existing: None,
        }))
    }
}

/// Converter for dictionaries. Each entry is encoded as a key and value pair.
pub struct MapConverter {
    wire_entry: DetailFn,
    access: MapAccess,
    entry: OnceLock<Arc<dyn Converter>>,
}

impl MapConverter {
    pub fn new(wire_entry: DetailFn, access: MapAccess) -> Self {
        Self {
            wire_entry,
            access,
            entry: OnceLock::new(),
        }
    }
}

impl Converter for MapConverter {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn setup(&self, builder: &mut Builder<'_>) -> Result<(), Error> {
        let entry = builder.resolve(self.wire_entry, self.access.entry)?;
        resolve_once(&self.entry, entry)
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let value = frame.source.value()?;
        if let WriteProgress::Start = frame.progress {
            let length = (self.access.len)(value)?;
            ready!(writer.try_write_length(length)?);
            frame.progress = WriteProgress::Enumerator {
                items: Box::new(
                    (self.access.iter)(value)?.map(|(key, value)| Source::Pair(key, value)),
                ),
            };
        }
        let WriteProgress::Enumerator { items } = &mut frame.progress else {
            return Err(Error::InvalidState("unexpected dictionary progress"));
        };
        let Some(entry) = items.next() else {
            return Ok(Step::Done);
        };
        Ok(Step::Push(WriteChild {
            converter: Arc::clone(resolved(&self.entry)?),
            source: entry,
            null_flags: false,
            graph: frame.graph.clone(),
        }))
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        if let ReadProgress::Start = frame.progress {
            let length = ready!(reader.try_read_length()?);
            let map: AnyBox = match frame.object.take() {
                Some(mut existing) => {
                    (self.access.reuse)(&mut *existing)?;
                    existing
                }
                None => (self.access.create)(length),
            };
            frame.object = Some(map);
            frame.progress = ReadProgress::Sequence { length, index: 0 };
        }

        let ReadFrame {
            object,
            returned,
            progress,
            graph,
            ..
        } = frame;
        let ReadProgress::Sequence { length, index } = progress else {
            return Err(Error::InvalidState("unexpected dictionary progress"));
        };
        if let Some(entry) = returned.take() {
            let map = object
                .as_deref_mut()
                .ok_or(Error::InvalidState("missing dictionary"))?;
            (self.access.insert)(map, entry)?;
            *index += 1;
        }
        if *index == *length {
            return Ok(Step::Done);
        }
        Ok(Step::Push(ReadChild {
            converter: Arc::clone(resolved(&self.entry)?),
            null_flags: false,
            graph: graph.clone(),
            existing: None,
        }))
    }
}
