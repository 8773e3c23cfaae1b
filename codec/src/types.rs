//! [crate::Model] implementations for standard library and `bytes` types.

mod collections;
mod primitives;
mod wrappers;
