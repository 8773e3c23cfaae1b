//! Encode object graphs incrementally against bounded buffers.
//!
//! # Overview
//!
//! Values are encoded into, and decoded from, a compact binary format by walking the object
//! graph with an explicit stack of frames instead of recursion. Whenever the current window
//! runs out, the pass suspends and reports exactly how many more bytes it needs. It can then
//! be resumed against a larger (or a fresh) window without repeating any work, which makes
//! the same machinery usable for in-memory buffers, sockets and files.
//!
//! # Supported Types
//!
//! Natively supports:
//! - Primitives: `bool`, `char`, `u8` through `u128`, `i8` through `i128`, `f32`, `f64`
//! - Text and bytes: `String`, `bytes::Bytes`
//! - Wrappers: `Option<T>`, `Box<T>`, and pairs `(A, B)`
//! - Collections: `Vec<T>`, `VecDeque<T>`, `Box<[T]>`, `HashSet<T>`, `BTreeSet<T>`
//! - Dictionaries: `HashMap<K, V>`, `BTreeMap<K, V>`
//! - Structs registered with the [object!] macro, including recursive ones
//!
//! Numeric values may be read and written across types (`serialize_as::<u64, u8>`), failing
//! with [Error::OutOfRange] when a value does not fit.
//!
//! # Wire Format
//!
//! Everything is little-endian. Strings, byte strings and collections carry a signed 32-bit
//! count. Nullable values carry a one byte marker (0 = null, 1 = present). The layout of
//! objects depends on the [Config] (see [Layout]).
//!
//! # Example
//!
//! ```
//! use strata_codec::{object, Config, Decoded, Encoded, Serializer};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Item {
//!     id: u32,
//!     label: Option<String>,
//!     parts: Vec<u16>,
//! }
//!
//! object!(Item {
//!     id: u32,
//!     label: Option<String>,
//!     parts: Vec<u16>,
//! });
//!
//! let serializer = Serializer::new(Config::default());
//! let item = Item {
//!     id: 7,
//!     label: Some("bolt".into()),
//!     parts: vec![1, 2, 3],
//! };
//!
//! // Whole buffers
//! let encoded = serializer.serialize(&item).unwrap();
//! assert_eq!(serializer.deserialize::<Item>(&encoded).unwrap(), item);
//!
//! // Small windows, widened only when a single field does not fit
//! let mut encoder = serializer.encoder(&item).unwrap();
//! let mut decoder = serializer.decoder::<Item>().unwrap();
//! let mut window = [0u8; 16];
//! let mut size = 3;
//! let mut decoded = None;
//! loop {
//!     let (written, done) = match encoder.write_into(&mut window[..size]).unwrap() {
//!         Encoded::Complete { written } => (written, true),
//!         Encoded::Needs { written, window: next } => {
//!             size = next.max(3);
//!             (written, false)
//!         }
//!     };
//!     if let Decoded::Complete(value) = decoder.feed(&window[..written]).unwrap() {
//!         decoded = Some(value);
//!     }
//!     if done {
//!         break;
//!     }
//! }
//! assert_eq!(decoded.as_ref(), Some(&item));
//! ```

pub mod config;
pub mod converter;
pub mod cursor;
pub mod error;
pub mod graph;
mod macros;
pub mod model;
pub mod pool;
pub mod registry;
pub mod serializer;
pub mod state;
pub mod stream;
mod types;

pub use config::{Config, Layout, WireOptions};
pub use converter::Converter;
pub use cursor::Attempt;
pub use error::Error;
pub use graph::Graph;
pub use model::{Member, Model, Shape, TypeDetail};
pub use pool::{BufferPool, BufferPoolConfig, PooledBuf};
pub use registry::Registry;
pub use serializer::Serializer;
pub use state::Step;
pub use stream::{Decoded, Decoder, Encoded, Encoder};
