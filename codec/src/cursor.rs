//! Byte cursors over a bounded window.
//!
//! A [Reader] borrows a slice of input and a [Writer] borrows a slice of output. Each
//! `try_*` method attempts to consume or produce exactly one wire value. When the window is
//! too small it returns [Attempt::Needs] with the exact number of additional bytes required
//! and leaves the cursor untouched, so the same call can be retried once the window has
//! been extended.
//!
//! # Layout
//!
//! ```text
//! fixed width      [value; size_of::<T>() little-endian]
//! length prefix    [i32 little-endian]
//! null marker      [0 = null | 1 = present]
//! member index     [u8] or [u16 little-endian]
//! member name      [u8 length][utf-8]
//! ```

use crate::Error;

/// Width of a length prefix.
pub const LENGTH_SIZE: usize = 4;

/// Outcome of a single attempt against a bounded window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The value was consumed (or produced) and the cursor advanced.
    Done(T),
    /// The window is short by exactly this many bytes.
    Needs(usize),
}

impl<T> Attempt<T> {
    /// Maps the completed value, preserving a byte need.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U> {
        match self {
            Attempt::Done(value) => Attempt::Done(f(value)),
            Attempt::Needs(n) => Attempt::Needs(n),
        }
    }

    /// Returns true if the attempt completed.
    pub fn is_done(&self) -> bool {
        matches!(self, Attempt::Done(_))
    }
}

/// Types with a constant encoded width.
pub trait Fixed: Copy + Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Writes the value into `dst`, which is exactly [Self::SIZE] bytes.
    fn put(self, dst: &mut [u8]);

    /// Reads a value from `src`, which is exactly [Self::SIZE] bytes.
    fn get(src: &[u8]) -> Result<Self, Error>;
}

macro_rules! impl_fixed {
    ($($type:ty),*) => {
        $(
            impl Fixed for $type {
                const SIZE: usize = std::mem::size_of::<$type>();

                #[inline]
                fn put(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn get(src: &[u8]) -> Result<Self, Error> {
                    let bytes = src
                        .try_into()
                        .map_err(|_| Error::InvalidState("fixed width window mismatch"))?;
                    Ok(<$type>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

impl_fixed!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl Fixed for bool {
    const SIZE: usize = 1;

    #[inline]
    fn put(self, dst: &mut [u8]) {
        dst[0] = u8::from(self);
    }

    #[inline]
    fn get(src: &[u8]) -> Result<Self, Error> {
        match src[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Format("bool", format!("invalid byte {other:#04x}"))),
        }
    }
}

impl Fixed for char {
    const SIZE: usize = 4;

    #[inline]
    fn put(self, dst: &mut [u8]) {
        u32::from(self).put(dst);
    }

    #[inline]
    fn get(src: &[u8]) -> Result<Self, Error> {
        let scalar = u32::get(src)?;
        char::from_u32(scalar)
            .ok_or_else(|| Error::Format("char", format!("invalid scalar value {scalar:#x}")))
    }
}

/// A read cursor over a borrowed input window.
#[derive(Debug)]
pub struct Reader<'b> {
    buf: &'b [u8],
    pos: usize,
    max_array_size: usize,
}

impl<'b> Reader<'b> {
    /// Creates a reader positioned at the start of `buf`.
    ///
    /// Length prefixes larger than `max_array_size` are rejected before any allocation.
    pub fn new(buf: &'b [u8], max_array_size: usize) -> Self {
        Self {
            buf,
            pos: 0,
            max_array_size,
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left in the window.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Maximum length prefix this reader accepts.
    pub fn max_array_size(&self) -> usize {
        self.max_array_size
    }

    #[inline]
    fn shortfall(&self, size: usize) -> Option<usize> {
        let remaining = self.remaining();
        (remaining < size).then(|| size - remaining)
    }

    /// Reads one fixed-width value.
    #[inline]
    pub fn try_read<F: Fixed>(&mut self) -> Result<Attempt<F>, Error> {
        if let Some(needed) = self.shortfall(F::SIZE) {
            return Ok(Attempt::Needs(needed));
        }
        let value = F::get(&self.buf[self.pos..self.pos + F::SIZE])?;
        self.pos += F::SIZE;
        Ok(Attempt::Done(value))
    }

    /// Reads a null marker, returning true if the value that follows is null.
    pub fn try_read_is_null(&mut self) -> Result<Attempt<bool>, Error> {
        if let Some(needed) = self.shortfall(1) {
            return Ok(Attempt::Needs(needed));
        }
        let is_null = match self.buf[self.pos] {
            0 => true,
            1 => false,
            other => {
                return Err(Error::Format(
                    "null marker",
                    format!("invalid byte {other:#04x}"),
                ))
            }
        };
        self.pos += 1;
        Ok(Attempt::Done(is_null))
    }

    /// Reads a length prefix, validating it against the maximum array size.
    pub fn try_read_length(&mut self) -> Result<Attempt<usize>, Error> {
        if let Some(needed) = self.shortfall(LENGTH_SIZE) {
            return Ok(Attempt::Needs(needed));
        }
        let raw = i32::get(&self.buf[self.pos..self.pos + LENGTH_SIZE])?;
        let length = usize::try_from(raw)
            .map_err(|_| Error::Format("length prefix", format!("negative length {raw}")))?;
        if length > self.max_array_size {
            return Err(Error::LengthExceeded(length, self.max_array_size));
        }
        self.pos += LENGTH_SIZE;
        Ok(Attempt::Done(length))
    }

    /// Reads exactly `len` raw bytes.
    pub fn try_read_bytes(&mut self, len: usize) -> Attempt<&'b [u8]> {
        if let Some(needed) = self.shortfall(len) {
            return Attempt::Needs(needed);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Attempt::Done(bytes)
    }

    /// Reads a member index of the configured width.
    pub fn try_read_index(&mut self, wide: bool) -> Result<Attempt<u16>, Error> {
        if wide {
            self.try_read::<u16>()
        } else {
            Ok(self.try_read::<u8>()?.map(u16::from))
        }
    }

    /// Reads a member name (a one byte length followed by utf-8). The name is consumed
    /// atomically: either all of it is available or nothing is consumed.
    pub fn try_read_name(&mut self) -> Result<Attempt<&'b str>, Error> {
        if let Some(needed) = self.shortfall(1) {
            return Ok(Attempt::Needs(needed));
        }
        let len = usize::from(self.buf[self.pos]);
        if let Some(needed) = self.shortfall(1 + len) {
            return Ok(Attempt::Needs(needed));
        }
        let bytes = &self.buf[self.pos + 1..self.pos + 1 + len];
        let name = std::str::from_utf8(bytes)
            .map_err(|err| Error::Format("member name", err.to_string()))?;
        self.pos += 1 + len;
        Ok(Attempt::Done(name))
    }
}

/// A write cursor over a borrowed output window.
#[derive(Debug)]
pub struct Writer<'b> {
    buf: &'b mut [u8],
    pos: usize,
    max_array_size: usize,
}

impl<'b> Writer<'b> {
    /// Creates a writer positioned at `pos` within `buf`.
    pub fn new(buf: &'b mut [u8], pos: usize, max_array_size: usize) -> Self {
        Self {
            buf,
            pos,
            max_array_size,
        }
    }

    /// Number of bytes written into the window (including any starting offset).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes of free space left in the window.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn shortfall(&self, size: usize) -> Option<usize> {
        let remaining = self.remaining();
        (remaining < size).then(|| size - remaining)
    }

    /// Writes one fixed-width value.
    #[inline]
    pub fn try_write<F: Fixed>(&mut self, value: F) -> Attempt<()> {
        if let Some(needed) = self.shortfall(F::SIZE) {
            return Attempt::Needs(needed);
        }
        value.put(&mut self.buf[self.pos..self.pos + F::SIZE]);
        self.pos += F::SIZE;
        Attempt::Done(())
    }

    /// Writes a null marker.
    pub fn try_write_is_null(&mut self, is_null: bool) -> Attempt<()> {
        self.try_write(!is_null)
    }

    /// Writes a length prefix, rejecting lengths above the maximum array size.
    pub fn try_write_length(&mut self, length: usize) -> Result<Attempt<()>, Error> {
        if length > self.max_array_size {
            return Err(Error::LengthExceeded(length, self.max_array_size));
        }
        let raw = i32::try_from(length)
            .map_err(|_| Error::LengthExceeded(length, i32::MAX as usize))?;
        Ok(self.try_write(raw))
    }

    /// Writes raw bytes.
    pub fn try_write_bytes(&mut self, bytes: &[u8]) -> Attempt<()> {
        if let Some(needed) = self.shortfall(bytes.len()) {
            return Attempt::Needs(needed);
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Attempt::Done(())
    }

    /// Writes a member index of the configured width.
    pub fn try_write_index(&mut self, index: u16, wide: bool) -> Result<Attempt<()>, Error> {
        if wide {
            return Ok(self.try_write(index));
        }
        let narrow = u8::try_from(index)
            .map_err(|_| Error::Format("member index", format!("{index} does not fit in u8")))?;
        Ok(self.try_write(narrow))
    }

    /// Writes a member name atomically.
    pub fn try_write_name(&mut self, name: &str) -> Result<Attempt<()>, Error> {
        let len = u8::try_from(name.len())
            .map_err(|_| Error::Format("member name", format!("{name} is longer than 255 bytes")))?;
        if let Some(needed) = self.shortfall(1 + name.len()) {
            return Ok(Attempt::Needs(needed));
        }
        self.buf[self.pos] = len;
        self.buf[self.pos + 1..self.pos + 1 + name.len()].copy_from_slice(name.as_bytes());
        self.pos += 1 + name.len();
        Ok(Attempt::Done(()))
    }
}
