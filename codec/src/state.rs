//! Resumable encode and decode state.
//!
//! A pass over an object graph is driven by an explicit stack of frames, one per value
//! currently being processed. The top frame belongs to the innermost value. Its converter is
//! invoked with the current cursor and returns one of three outcomes:
//!
//! - [Step::Done]: the value is complete and its frame is popped.
//! - [Step::Push]: a child value must be processed first; a frame is pushed for it.
//! - [Step::Needs]: the window is exhausted; the pass suspends with the stack intact.
//!
//! Converters never recurse, so nesting depth is bounded only by memory and a suspended pass
//! can be resumed against a new window at exactly the frame that ran out of bytes.
//!
//! Each frame records which parts of its value are already on the wire (the null marker,
//! a length prefix, the members or elements handled so far) so that a retried step never
//! writes or consumes the same bytes twice.

use crate::{
    converter::Converter,
    cursor::{Attempt, Reader, Writer},
    model::AnyBox,
    Error, Graph,
};
use std::{any::Any, sync::Arc};
use tracing::trace;

/// Maximum number of finished frames kept for reuse.
const STASH_LIMIT: usize = 16;

/// Outcome of one converter step.
pub enum Step<C> {
    /// The value is complete.
    Done,
    /// A child value must be processed before this one can continue.
    Push(C),
    /// The window is short by exactly this many bytes.
    Needs(usize),
}

/// The in-memory value a write frame encodes.
#[derive(Clone, Copy)]
pub enum Source<'a> {
    /// A single value.
    Value(&'a dyn Any),
    /// A key and value borrowed from a dictionary entry.
    Pair(&'a dyn Any, &'a dyn Any),
}

impl<'a> Source<'a> {
    /// Returns the single value, failing for a borrowed pair.
    pub fn value(&self) -> Result<&'a dyn Any, Error> {
        match self {
            Source::Value(value) => Ok(*value),
            Source::Pair(_, _) => Err(Error::InvalidState("expected a single value")),
        }
    }
}

/// A child value to encode.
pub struct WriteChild<'a> {
    pub converter: Arc<dyn Converter>,
    pub source: Source<'a>,
    /// Whether a null marker precedes the child.
    pub null_flags: bool,
    pub graph: Option<Arc<Graph>>,
}

/// A child value to decode.
pub struct ReadChild {
    pub converter: Arc<dyn Converter>,
    /// Whether a null marker precedes the child.
    pub null_flags: bool,
    pub graph: Option<Arc<Graph>>,
    /// An existing value to fill in place, if the converter can reuse it.
    pub existing: Option<AnyBox>,
}

/// Progress through the value of a write frame.
pub enum WriteProgress<'a> {
    /// Nothing beyond the null marker has been written.
    Start,
    /// The wrapped value has been handed to a child frame.
    Delegated,
    /// A length prefix has been written and the payload is pending.
    Text { length: usize },
    /// Index-addressable elements, with `index` the next element to push.
    Sequence { length: usize, index: usize },
    /// Elements pulled from an iterator over the source.
    Enumerator {
        items: Box<dyn Iterator<Item = Source<'a>> + 'a>,
    },
    /// The first `pushed` halves of a pair have been handed to child frames.
    Pair { pushed: u8 },
    /// Object members before `cursor` have been handled.
    Object { cursor: usize },
}

/// Progress through the value of a read frame.
pub enum ReadProgress {
    /// Nothing beyond the null marker has been consumed.
    Start,
    /// The wrapped value has been handed to a child frame.
    Delegated,
    /// A length prefix has been consumed and the payload is pending.
    Text { length: usize },
    /// `index` elements out of `length` have been stored.
    Sequence { length: usize, index: usize },
    /// The first half of a pair, once decoded.
    Pair { first: Option<AnyBox> },
    /// Object members. `pending` is the member whose value a child frame is decoding.
    Object {
        cursor: usize,
        pending: Option<usize>,
    },
}

/// One value being encoded.
pub struct WriteFrame<'a> {
    pub converter: Arc<dyn Converter>,
    pub source: Source<'a>,
    pub null_flags: bool,
    pub has_written_is_null: bool,
    pub graph: Option<Arc<Graph>>,
    pub progress: WriteProgress<'a>,
}

impl<'a> WriteFrame<'a> {
    fn new(child: WriteChild<'a>) -> Self {
        Self {
            converter: child.converter,
            source: child.source,
            null_flags: child.null_flags,
            has_written_is_null: false,
            graph: child.graph,
            progress: WriteProgress::Start,
        }
    }

    fn reset(&mut self, child: WriteChild<'a>) {
        self.converter = child.converter;
        self.source = child.source;
        self.null_flags = child.null_flags;
        self.has_written_is_null = false;
        self.graph = child.graph;
        self.progress = WriteProgress::Start;
    }
}

/// One value being decoded.
pub struct ReadFrame {
    pub converter: Arc<dyn Converter>,
    pub null_flags: bool,
    pub has_null_checked: bool,
    pub graph: Option<Arc<Graph>>,
    /// The value under construction. On entry it holds the existing value to reuse, if any.
    pub object: Option<AnyBox>,
    /// The value produced by the most recently completed child frame.
    pub returned: Option<AnyBox>,
    pub progress: ReadProgress,
}

impl ReadFrame {
    fn new(child: ReadChild) -> Self {
        Self {
            converter: child.converter,
            null_flags: child.null_flags,
            has_null_checked: false,
            graph: child.graph,
            object: child.existing,
            returned: None,
            progress: ReadProgress::Start,
        }
    }

    fn reset(&mut self, child: ReadChild) {
        self.converter = child.converter;
        self.null_flags = child.null_flags;
        self.has_null_checked = false;
        self.graph = child.graph;
        self.object = child.existing;
        self.returned = None;
        self.progress = ReadProgress::Start;
    }
}

/// The frame stack of an encode pass.
pub struct WriteState<'a> {
    frames: Vec<WriteFrame<'a>>,
    stash: Vec<WriteFrame<'a>>,
    held: Option<WriteFrame<'a>>,
}

impl<'a> WriteState<'a> {
    /// Starts a pass over `root`. The root value is always preceded by a null marker if it
    /// is nullable.
    pub fn new(
        converter: Arc<dyn Converter>,
        root: &'a dyn Any,
        graph: Option<Arc<Graph>>,
    ) -> Self {
        let mut state = Self {
            frames: Vec::new(),
            stash: Vec::new(),
            held: None,
        };
        state.push_frame(WriteChild {
            converter,
            source: Source::Value(root),
            null_flags: true,
            graph,
        });
        state
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns true once the root value has been fully written.
    pub fn is_complete(&self) -> bool {
        self.frames.is_empty() && self.held.is_none()
    }

    /// Returns the innermost frame.
    pub fn current(&mut self) -> Option<&mut WriteFrame<'a>> {
        self.frames.last_mut()
    }

    /// Pushes a frame for `child`, recycling a finished frame when one is available.
    pub fn push_frame(&mut self, child: WriteChild<'a>) {
        let frame = match self.stash.pop() {
            Some(mut frame) => {
                frame.reset(child);
                frame
            }
            None => WriteFrame::new(child),
        };
        self.frames.push(frame);
    }

    /// Pops the innermost frame.
    pub fn end_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.recycle(frame);
        }
    }

    /// Sets the innermost frame aside with its progress intact, exposing its parent as
    /// [WriteState::current]. The frame returns with [WriteState::restore_frame] or at the
    /// start of the next [WriteState::run].
    pub fn stash_frame(&mut self) -> Result<(), Error> {
        if self.held.is_some() {
            return Err(Error::InvalidState("a frame is already stashed"));
        }
        let frame = self
            .frames
            .pop()
            .ok_or(Error::InvalidState("no frame to stash"))?;
        self.held = Some(frame);
        Ok(())
    }

    /// Puts a stashed frame back on top of the stack. Does nothing if none is stashed.
    pub fn restore_frame(&mut self) {
        if let Some(frame) = self.held.take() {
            self.frames.push(frame);
        }
    }

    /// Discards every frame, leaving the pass unable to continue.
    pub fn abandon(&mut self) {
        self.held = None;
        while let Some(frame) = self.frames.pop() {
            self.recycle(frame);
        }
    }

    fn recycle(&mut self, mut frame: WriteFrame<'a>) {
        if self.stash.len() < STASH_LIMIT {
            frame.progress = WriteProgress::Start;
            frame.graph = None;
            self.stash.push(frame);
        }
    }

    /// Runs the pass until the root value is complete or the window is exhausted.
    pub fn run(&mut self, writer: &mut Writer<'_>) -> Result<Attempt<()>, Error> {
        self.restore_frame();
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Attempt::Done(()));
            };
            let converter = Arc::clone(&frame.converter);
            match converter.try_write(writer, frame)? {
                Step::Done => self.end_frame(),
                Step::Push(child) => self.push_frame(child),
                Step::Needs(needed) => {
                    trace!(
                        needed,
                        depth = self.frames.len(),
                        converter = converter.name(),
                        "write suspended"
                    );
                    return Ok(Attempt::Needs(needed));
                }
            }
        }
    }
}

/// The frame stack of a decode pass.
pub struct ReadState {
    frames: Vec<ReadFrame>,
    stash: Vec<ReadFrame>,
    held: Option<ReadFrame>,
}

impl ReadState {
    /// Starts a pass producing a value of the converter's target type. If `existing` is
    /// given, the converter fills it in place where it can.
    pub fn new(
        converter: Arc<dyn Converter>,
        graph: Option<Arc<Graph>>,
        existing: Option<AnyBox>,
    ) -> Self {
        let mut state = Self {
            frames: Vec::new(),
            stash: Vec::new(),
            held: None,
        };
        state.push_frame(ReadChild {
            converter,
            null_flags: true,
            graph,
            existing,
        });
        state
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns the innermost frame.
    pub fn current(&mut self) -> Option<&mut ReadFrame> {
        self.frames.last_mut()
    }

    /// Pushes a frame for `child`, recycling a finished frame when one is available.
    pub fn push_frame(&mut self, child: ReadChild) {
        let frame = match self.stash.pop() {
            Some(mut frame) => {
                frame.reset(child);
                frame
            }
            None => ReadFrame::new(child),
        };
        self.frames.push(frame);
    }

    /// Pops the innermost frame and hands its value to the parent frame. Returns the value
    /// instead if the popped frame was the root.
    pub fn end_frame(&mut self) -> Result<Option<AnyBox>, Error> {
        let mut frame = self
            .frames
            .pop()
            .ok_or(Error::InvalidState("no frame to end"))?;
        let value = frame
            .object
            .take()
            .ok_or(Error::InvalidState("frame completed without a value"))?;
        self.recycle(frame);

        let Some(parent) = self.frames.last_mut() else {
            return Ok(Some(value));
        };
        if parent.returned.is_some() {
            return Err(Error::InvalidState("parent has an undelivered child value"));
        }
        parent.returned = Some(value);
        Ok(None)
    }

    /// Sets the innermost frame aside with its progress and partial value intact, exposing
    /// its parent as [ReadState::current]. The frame returns with [ReadState::restore_frame]
    /// or at the start of the next [ReadState::run].
    pub fn stash_frame(&mut self) -> Result<(), Error> {
        if self.held.is_some() {
            return Err(Error::InvalidState("a frame is already stashed"));
        }
        let frame = self
            .frames
            .pop()
            .ok_or(Error::InvalidState("no frame to stash"))?;
        self.held = Some(frame);
        Ok(())
    }

    /// Puts a stashed frame back on top of the stack. Does nothing if none is stashed.
    pub fn restore_frame(&mut self) {
        if let Some(frame) = self.held.take() {
            self.frames.push(frame);
        }
    }

    /// Pops the innermost frame, discarding any partial value.
    pub fn discard_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.recycle(frame);
        }
    }

    /// Discards every frame, leaving the pass unable to continue.
    pub fn abandon(&mut self) {
        if let Some(frame) = self.held.take() {
            self.recycle(frame);
        }
        while !self.frames.is_empty() {
            self.discard_frame();
        }
    }

    fn recycle(&mut self, mut frame: ReadFrame) {
        if self.stash.len() < STASH_LIMIT {
            frame.object = None;
            frame.returned = None;
            frame.graph = None;
            frame.progress = ReadProgress::Start;
            self.stash.push(frame);
        }
    }

    /// Runs the pass until the root value is complete or the window is exhausted.
    pub fn run(&mut self, reader: &mut Reader<'_>) -> Result<Attempt<AnyBox>, Error> {
        self.restore_frame();
        loop {
            let frame = self
                .frames
                .last_mut()
                .ok_or(Error::InvalidState("decode already completed"))?;
            let converter = Arc::clone(&frame.converter);
            match converter.try_read(reader, frame)? {
                Step::Done => {
                    if let Some(value) = self.end_frame()? {
                        return Ok(Attempt::Done(value));
                    }
                }
                Step::Push(child) => self.push_frame(child),
                Step::Needs(needed) => {
                    trace!(
                        needed,
                        depth = self.frames.len(),
                        converter = converter.name(),
                        "read suspended"
                    );
                    return Ok(Attempt::Needs(needed));
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::downcast, registry::Registry, Config};

    fn registry() -> Registry {
        Registry::new(Config::default().wire())
    }

    #[test]
    fn test_read_stash_exposes_parent() {
        let registry = registry();
        let converter = registry.converter::<Vec<u32>, Vec<u32>>().unwrap();
        let mut state = ReadState::new(converter, None, None);

        // Count, the first element and half of the second.
        let mut reader = Reader::new(&[2, 0, 0, 0, 1, 0, 0, 0, 2, 0], 1024);
        assert!(matches!(state.run(&mut reader).unwrap(), Attempt::Needs(2)));
        assert_eq!(reader.position(), 8);
        assert_eq!(state.depth(), 2);

        state.stash_frame().unwrap();
        assert_eq!(state.depth(), 1);
        assert!(matches!(
            state.current().unwrap().progress,
            ReadProgress::Sequence {
                length: 2,
                index: 1
            }
        ));
        assert!(state.stash_frame().is_err());
        state.restore_frame();
        assert_eq!(state.depth(), 2);

        // A stashed frame is put back before the pass resumes.
        state.stash_frame().unwrap();
        let mut reader = Reader::new(&[2, 0, 0, 0], 1024);
        let Attempt::Done(value) = state.run(&mut reader).unwrap() else {
            panic!("decode did not complete");
        };
        assert_eq!(downcast::<Vec<u32>>(value).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_read_abandon_drops_stashed_frame() {
        let registry = registry();
        let converter = registry.converter::<Vec<u32>, Vec<u32>>().unwrap();
        let mut state = ReadState::new(converter, None, None);
        let mut reader = Reader::new(&[1, 0, 0, 0], 1024);
        assert!(matches!(state.run(&mut reader).unwrap(), Attempt::Needs(4)));

        state.stash_frame().unwrap();
        state.abandon();
        assert_eq!(state.depth(), 0);
        state.restore_frame();
        assert_eq!(state.depth(), 0);
        assert!(state.run(&mut Reader::new(&[], 1024)).is_err());
    }

    #[test]
    fn test_read_discard_frame() {
        let registry = registry();
        let converter = registry.converter::<Vec<u32>, Vec<u32>>().unwrap();
        let mut state = ReadState::new(converter, None, None);
        let mut reader = Reader::new(&[1, 0, 0, 0], 1024);
        assert!(matches!(state.run(&mut reader).unwrap(), Attempt::Needs(4)));
        assert_eq!(state.depth(), 2);

        state.discard_frame();
        assert_eq!(state.depth(), 1);
        assert!(state.current().unwrap().returned.is_none());
    }

    #[test]
    fn test_write_stash_and_resume() {
        let registry = registry();
        let converter = registry.converter::<Vec<u32>, Vec<u32>>().unwrap();
        let value = vec![1u32, 2];
        let mut state = WriteState::new(converter, &value, None);

        let mut first = [0u8; 6];
        let mut writer = Writer::new(&mut first, 0, 1024);
        assert!(matches!(state.run(&mut writer).unwrap(), Attempt::Needs(2)));
        assert_eq!(writer.position(), 4);
        assert_eq!(state.depth(), 2);

        state.stash_frame().unwrap();
        assert!(!state.is_complete());
        assert!(matches!(
            state.current().unwrap().progress,
            WriteProgress::Sequence {
                length: 2,
                index: 1
            }
        ));

        let mut second = [0u8; 8];
        let mut writer = Writer::new(&mut second, 0, 1024);
        assert!(matches!(state.run(&mut writer).unwrap(), Attempt::Done(())));
        assert!(state.is_complete());
        assert_eq!(&first[..4], &[2, 0, 0, 0]);
        assert_eq!(second, [1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_write_abandon() {
        let registry = registry();
        let converter = registry.converter::<String, String>().unwrap();
        let value = String::from("frame");
        let mut state = WriteState::new(converter, &value, None);
        state.stash_frame().unwrap();
        state.abandon();
        assert!(state.is_complete());
        assert_eq!(state.depth(), 0);
    }
}
