//! The [Serializer] facade.

use crate::{
    cursor::{Attempt, Reader, Writer},
    model::{downcast, AnyBox, Model},
    pool::BufferPool,
    registry::Registry,
    state::{ReadState, WriteState},
    stream::{Decoded, Decoder, Encoded, Encoder},
    Config, Error, Graph,
};
use bytes::Bytes;
use std::{
    io::{self, Read, Write},
    sync::Arc,
};
use tracing::{trace, warn};

/// Encodes and decodes registered types with one [Config].
///
/// A serializer caches the converters it builds, so it should be created once and shared.
/// It is `Send + Sync`.
pub struct Serializer {
    config: Config,
    registry: Registry,
    pool: BufferPool,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Serializer {
    /// Creates a serializer with its own buffer pool.
    ///
    /// # Panics
    ///
    /// Panics if the buffer configuration is invalid.
    pub fn new(config: Config) -> Self {
        let pool = BufferPool::new(config.buffer.clone());
        Self::with_pool(config, pool)
    }

    /// Creates a serializer that rents buffers from `pool`.
    pub fn with_pool(config: Config, pool: BufferPool) -> Self {
        let registry = Registry::new(config.wire());
        Self {
            config,
            registry,
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Builds the converters for writing `T` as `W` without encoding anything.
    ///
    /// Unsupported type pairs are reported here rather than on first use.
    pub fn prepare<W: Model, T: Model>(&self) -> Result<(), Error> {
        self.registry.converter::<W, T>().map(|_| ())
    }

    /// Encodes `value`.
    pub fn serialize<T: Model>(&self, value: &T) -> Result<Bytes, Error> {
        self.encode::<T, T>(value, None)
    }

    /// Encodes `value` using the wire representation of `W`.
    pub fn serialize_as<W: Model, T: Model>(&self, value: &T) -> Result<Bytes, Error> {
        self.encode::<W, T>(value, None)
    }

    /// Encodes the members of `value` selected by `graph`.
    pub fn serialize_with_graph<T: Model>(
        &self,
        value: &T,
        graph: &Graph,
    ) -> Result<Bytes, Error> {
        self.encode::<T, T>(value, Some(Arc::new(graph.clone())))
    }

    fn encode<W: Model, T: Model>(
        &self,
        value: &T,
        graph: Option<Arc<Graph>>,
    ) -> Result<Bytes, Error> {
        let converter = self.registry.converter::<W, T>()?;
        let mut state = WriteState::new(converter, value, graph);
        let mut buffer = self.pool.rent(self.config.buffer.min_size.get());
        let mut written = 0;
        loop {
            let mut writer = Writer::new(&mut buffer, written, self.config.max_array_size);
            let attempt = state.run(&mut writer);
            written = writer.position();
            match attempt? {
                Attempt::Done(()) => break,
                Attempt::Needs(needed) => {
                    let len = buffer.len();
                    buffer.grow(len + needed, written);
                }
            }
        }
        let encoded = Bytes::copy_from_slice(&buffer[..written]);
        buffer.release(written);
        trace!(len = encoded.len(), "serialized");
        Ok(encoded)
    }

    /// Decodes a `T` that occupies all of `bytes`.
    pub fn deserialize<T: Model>(&self, bytes: &[u8]) -> Result<T, Error> {
        self.decode::<T, T>(bytes, None, None)
    }

    /// Decodes a `T` written with the wire representation of `W`.
    pub fn deserialize_as<W: Model, T: Model>(&self, bytes: &[u8]) -> Result<T, Error> {
        self.decode::<W, T>(bytes, None, None)
    }

    /// Decodes a `T` written with `graph`. Unselected members keep their default value.
    pub fn deserialize_with_graph<T: Model>(
        &self,
        bytes: &[u8],
        graph: &Graph,
    ) -> Result<T, Error> {
        self.decode::<T, T>(bytes, Some(Arc::new(graph.clone())), None)
    }

    /// Decodes into an existing value, reusing its allocations where possible.
    ///
    /// Members absent from a keyed payload keep their current value. On error `target` is
    /// left in its default state.
    pub fn deserialize_into<T: Model>(&self, bytes: &[u8], target: &mut T) -> Result<(), Error> {
        let existing: AnyBox = Box::new(std::mem::take(target));
        *target = self.decode::<T, T>(bytes, None, Some(existing))?;
        Ok(())
    }

    fn decode<W: Model, T: Model>(
        &self,
        bytes: &[u8],
        graph: Option<Arc<Graph>>,
        existing: Option<AnyBox>,
    ) -> Result<T, Error> {
        let converter = self.registry.converter::<W, T>()?;
        let mut state = ReadState::new(converter, graph, existing);
        let mut reader = Reader::new(bytes, self.config.max_array_size);
        match state.run(&mut reader)? {
            Attempt::Done(value) => {
                let extra = reader.remaining();
                if extra > 0 {
                    warn!(extra, "trailing bytes after value");
                    return Err(Error::ExtraData(extra));
                }
                downcast::<T>(value)
            }
            Attempt::Needs(needed) => Err(Error::EndOfBuffer(needed)),
        }
    }

    /// Starts an incremental encoding of `value`.
    pub fn encoder<'a, T: Model>(&self, value: &'a T) -> Result<Encoder<'a>, Error> {
        self.encoder_as::<T, T>(value)
    }

    /// Starts an incremental encoding of `value` using the wire representation of `W`.
    pub fn encoder_as<'a, W: Model, T: Model>(
        &self,
        value: &'a T,
    ) -> Result<Encoder<'a>, Error> {
        let converter = self.registry.converter::<W, T>()?;
        let state = WriteState::new(converter, value, None);
        Ok(Encoder::new(state, self.config.max_array_size))
    }

    /// Starts an incremental decoding of a `T`.
    pub fn decoder<T: Model>(&self) -> Result<Decoder<T>, Error> {
        self.decoder_as::<T, T>()
    }

    /// Starts an incremental decoding of a `T` written as `W`.
    pub fn decoder_as<W: Model, T: Model>(&self) -> Result<Decoder<T>, Error> {
        let converter = self.registry.converter::<W, T>()?;
        let state = ReadState::new(converter, None, None);
        let buffer = self.pool.rent(self.config.buffer.min_size.get());
        Ok(Decoder::new(state, buffer, self.config.max_array_size))
    }

    /// Encodes `value` into `writer`, returning the number of bytes written.
    pub fn write_to<T: Model>(&self, value: &T, mut writer: impl Write) -> Result<usize, Error> {
        let mut encoder = self.encoder(value)?;
        let mut chunk = self.pool.rent(self.config.buffer.min_size.get());
        let mut total = 0;
        loop {
            match encoder.write_into(&mut chunk)? {
                Encoded::Complete { written } => {
                    writer.write_all(&chunk[..written])?;
                    return Ok(total + written);
                }
                Encoded::Needs { written, window } => {
                    writer.write_all(&chunk[..written])?;
                    total += written;
                    if window > chunk.len() {
                        let len = chunk.len();
                        chunk.grow(window, len);
                    }
                }
            }
        }
    }

    /// Decodes one `T` from `reader`, reading exactly the bytes the value occupies.
    pub fn read_from<T: Model>(&self, mut reader: impl Read) -> Result<T, Error> {
        let mut decoder = self.decoder::<T>()?;
        let mut chunk = self.pool.rent(self.config.buffer.min_size.get());
        let mut status = decoder.feed(&[])?;
        loop {
            let needed = match status {
                Decoded::Complete(value) => return Ok(value),
                Decoded::Needs(needed) => needed,
            };
            if needed > chunk.len() {
                let len = chunk.len();
                chunk.grow(needed, len);
            }
            let window = &mut chunk[..needed];
            reader.read_exact(window).map_err(|err| match err.kind() {
                io::ErrorKind::UnexpectedEof => Error::EndOfBuffer(needed),
                _ => Error::Io(err),
            })?;
            status = decoder.feed(window)?;
        }
    }
}
