//! Converter for registered objects.
//!
//! # Layouts
//!
//! ```text
//! sequential   [type?] [value]*                        every selected member, by ordinal
//! indexed      [type?] ([ordinal][value])* [0]         ordinals start at 1
//! named        [type?] ([u8 len][name][value])* [0]    terminated by an empty name
//! ```
//!
//! The optional type discriminator is the registered object name, written like a member name.
//! In keyed layouts without null flags, null members are left out and present members are
//! written without a marker.

use super::{ready, resolve_once, resolved, Converter};
use crate::{
    config::{Layout, WireOptions},
    cursor::{Reader, Writer},
    model::{AnyBox, MemberAccess, ObjectAccess},
    registry::Builder,
    state::{
        ReadChild, ReadFrame, ReadProgress, Source, Step, WriteChild, WriteFrame, WriteProgress,
    },
    Error, Graph,
};
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// A member with its resolved wire ordinal.
struct Slot {
    name: &'static str,
    ordinal: u16,
    access: Box<dyn MemberAccess>,
}

/// Converter for one registered object type.
pub struct ObjectConverter {
    name: &'static str,
    options: WireOptions,
    create: fn() -> AnyBox,
    /// Members sorted by ordinal.
    slots: Vec<Slot>,
    converters: OnceLock<Vec<Arc<dyn Converter>>>,
}

impl ObjectConverter {
    /// Assigns ordinals to the members of `access` and sorts them.
    ///
    /// Members take their explicit index unless indices are ignored, in which case (or when
    /// no index is given) they are numbered by declaration order starting at 1.
    pub fn new(access: ObjectAccess, options: WireOptions) -> Result<Self, Error> {
        let mut slots = Vec::with_capacity(access.members.len());
        for (position, member) in access.members.into_iter().enumerate() {
            let declared = u16::try_from(position + 1)
                .map_err(|_| Error::Format("member index", "too many members".into()))?;
            let ordinal = match member.index {
                Some(index) if !options.ignore_index_attribute => index,
                _ => declared,
            };
            if ordinal == 0 {
                return Err(Error::Format(
                    "member index",
                    format!("{}.{} uses reserved ordinal 0", access.name, member.name),
                ));
            }
            slots.push(Slot {
                name: member.name,
                ordinal,
                access: member.access,
            });
        }
        slots.sort_by_key(|slot| slot.ordinal);
        if let Some(pair) = slots.windows(2).find(|pair| pair[0].ordinal == pair[1].ordinal) {
            return Err(Error::Format(
                "member index",
                format!(
                    "{}.{} and {}.{} share ordinal {}",
                    access.name, pair[0].name, access.name, pair[1].name, pair[0].ordinal
                ),
            ));
        }
        Ok(Self {
            name: access.name,
            options,
            create: access.create,
            slots,
            converters: OnceLock::new(),
        })
    }

    fn selected(&self, graph: Option<&Arc<Graph>>, slot: &Slot) -> bool {
        graph.map_or(true, |graph| graph.includes(slot.name))
    }

    fn child_graph(graph: Option<&Arc<Graph>>, slot: &Slot) -> Option<Arc<Graph>> {
        graph.and_then(|graph| graph.child(slot.name)).cloned()
    }

    /// Finds the slot for a decoded key.
    fn locate(&self, key: Key<'_>) -> Result<usize, Error> {
        let found = match key {
            Key::Ordinal(ordinal) => self
                .slots
                .binary_search_by_key(&ordinal, |slot| slot.ordinal)
                .ok(),
            Key::Name(name) => self.slots.iter().position(|slot| slot.name == name),
        };
        found.ok_or_else(|| {
            warn!(object = self.name, ?key, "unknown member");
            Error::Format("member", format!("{} has no member {key:?}", self.name))
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Key<'b> {
    Ordinal(u16),
    Name(&'b str),
}

impl Converter for ObjectConverter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn setup(&self, builder: &mut Builder<'_>) -> Result<(), Error> {
        let converters = self
            .slots
            .iter()
            .map(|slot| builder.resolve_detail(slot.access.detail(), slot.access.detail()))
            .collect::<Result<Vec<_>, _>>()?;
        resolve_once(&self.converters, converters)
    }

    fn try_write<'a>(
        &self,
        writer: &mut Writer<'_>,
        frame: &mut WriteFrame<'a>,
    ) -> Result<Step<WriteChild<'a>>, Error> {
        let value = frame.source.value()?;
        let converters = resolved(&self.converters)?;
        if let WriteProgress::Start = frame.progress {
            if self.options.include_types {
                ready!(writer.try_write_name(self.name)?);
            }
            frame.progress = WriteProgress::Object { cursor: 0 };
        }
        let WriteProgress::Object { cursor } = &mut frame.progress else {
            return Err(Error::InvalidState("unexpected object progress"));
        };

        let omit_nulls = self.options.omits_null_members();
        while let Some(slot) = self.slots.get(*cursor) {
            let converter = &converters[*cursor];
            if !self.selected(frame.graph.as_ref(), slot) {
                *cursor += 1;
                continue;
            }
            let member = slot.access.get(value)?;
            if omit_nulls && converter.is_null(Source::Value(member))? {
                *cursor += 1;
                continue;
            }
            match self.options.layout {
                Layout::Sequential => {}
                Layout::Indexed => {
                    ready!(writer.try_write_index(slot.ordinal, self.options.index_size_u16)?)
                }
                Layout::Named => ready!(writer.try_write_name(slot.name)?),
            }
            *cursor += 1;
            return Ok(Step::Push(WriteChild {
                converter: Arc::clone(converter),
                source: Source::Value(member),
                null_flags: !omit_nulls,
                graph: Self::child_graph(frame.graph.as_ref(), slot),
            }));
        }

        match self.options.layout {
            Layout::Sequential => {}
            Layout::Indexed => ready!(writer.try_write_index(0, self.options.index_size_u16)?),
            Layout::Named => ready!(writer.try_write_name("")?),
        }
        Ok(Step::Done)
    }

    fn try_read(
        &self,
        reader: &mut Reader<'_>,
        frame: &mut ReadFrame,
    ) -> Result<Step<ReadChild>, Error> {
        let converters = resolved(&self.converters)?;
        if let ReadProgress::Start = frame.progress {
            if self.options.include_types {
                let name = ready!(reader.try_read_name()?);
                if name != self.name {
                    warn!(expected = self.name, found = name, "type discriminator mismatch");
                    return Err(Error::Format(
                        "type discriminator",
                        format!("expected {}, found {name}", self.name),
                    ));
                }
            }
            if frame.object.is_none() {
                frame.object = Some((self.create)());
            }
            frame.progress = ReadProgress::Object {
                cursor: 0,
                pending: None,
            };
        }

        let ReadFrame {
            object,
            returned,
            progress,
            graph,
            ..
        } = frame;
        let ReadProgress::Object { cursor, pending } = progress else {
            return Err(Error::InvalidState("unexpected object progress"));
        };
        let object = object
            .as_deref_mut()
            .ok_or(Error::InvalidState("missing object"))?;
        if let Some(index) = pending.take() {
            let value = returned
                .take()
                .ok_or(Error::InvalidState("missing member value"))?;
            self.slots[index].access.set(object, value)?;
        }

        let index = match self.options.layout {
            Layout::Sequential => {
                while self
                    .slots
                    .get(*cursor)
                    .is_some_and(|slot| !self.selected(graph.as_ref(), slot))
                {
                    *cursor += 1;
                }
                if *cursor == self.slots.len() {
                    return Ok(Step::Done);
                }
                *cursor += 1;
                *cursor - 1
            }
            Layout::Indexed => {
                let ordinal = ready!(reader.try_read_index(self.options.index_size_u16)?);
                if ordinal == 0 {
                    return Ok(Step::Done);
                }
                self.locate(Key::Ordinal(ordinal))?
            }
            Layout::Named => {
                let name = ready!(reader.try_read_name()?);
                if name.is_empty() {
                    return Ok(Step::Done);
                }
                self.locate(Key::Name(name))?
            }
        };

        let slot = &self.slots[index];
        let existing = slot.access.take(object)?;
        *pending = Some(index);
        Ok(Step::Push(ReadChild {
            converter: Arc::clone(&converters[index]),
            null_flags: !self.options.omits_null_members(),
            graph: Self::child_graph(graph.as_ref(), slot),
            existing: Some(existing),
        }))
    }
}
