//! Wire options shared by writers and readers.
//!
//! Readers and writers must agree on a [Config] ahead of time: nothing in the payload
//! identifies the options it was written with.

use crate::pool::BufferPoolConfig;

/// Default maximum length prefix (16 Mi elements or bytes).
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for a [crate::Serializer].
#[derive(Debug, Clone)]
pub struct Config {
    /// Precede every nullable value with a one byte null marker.
    ///
    /// When disabled, null object members are omitted from the payload entirely (which
    /// requires a keyed object layout). Nullable values in positions that cannot be
    /// omitted (the root, collection elements, dictionary keys and values) keep their marker.
    pub null_flags: bool,

    /// Write a type discriminator (the registered object name) ahead of every object.
    pub include_types: bool,

    /// Key object members by name instead of by ordinal.
    pub use_property_names: bool,

    /// Ignore explicit member ordinals and number members by declaration order.
    pub ignore_index_attribute: bool,

    /// Use two byte member ordinals instead of one.
    pub index_size_u16: bool,

    /// Largest length prefix accepted for strings, byte strings and collections.
    pub max_array_size: usize,

    /// Size classes for the buffers the serializer grows into.
    pub buffer: BufferPoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            null_flags: true,
            include_types: false,
            use_property_names: false,
            ignore_index_attribute: false,
            index_size_u16: false,
            max_array_size: DEFAULT_MAX_ARRAY_SIZE,
            buffer: BufferPoolConfig::default(),
        }
    }
}

impl Config {
    /// Returns the object layout implied by this configuration.
    pub fn layout(&self) -> Layout {
        if self.use_property_names {
            Layout::Named
        } else if self.null_flags {
            Layout::Sequential
        } else {
            Layout::Indexed
        }
    }

    /// Returns the subset of options that changes how converters are built.
    pub fn wire(&self) -> WireOptions {
        WireOptions {
            layout: self.layout(),
            null_flags: self.null_flags,
            include_types: self.include_types,
            ignore_index_attribute: self.ignore_index_attribute,
            index_size_u16: self.index_size_u16,
        }
    }
}

/// How object members are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Every selected member in ordinal order, with no keys and no terminator.
    Sequential,
    /// `[ordinal][value]` for each present member, terminated by ordinal 0.
    Indexed,
    /// `[name][value]` for each present member, terminated by an empty name.
    Named,
}

/// Options captured by converters when they are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireOptions {
    pub layout: Layout,
    pub null_flags: bool,
    pub include_types: bool,
    pub ignore_index_attribute: bool,
    pub index_size_u16: bool,
}

impl WireOptions {
    /// Whether object members may be omitted when null.
    pub fn omits_null_members(&self) -> bool {
        !self.null_flags && self.layout != Layout::Sequential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_selection() {
        let mut cfg = Config::default();
        assert_eq!(cfg.layout(), Layout::Sequential);
        assert!(!cfg.wire().omits_null_members());

        cfg.null_flags = false;
        assert_eq!(cfg.layout(), Layout::Indexed);
        assert!(cfg.wire().omits_null_members());

        cfg.use_property_names = true;
        assert_eq!(cfg.layout(), Layout::Named);
        assert!(cfg.wire().omits_null_members());

        cfg.null_flags = true;
        assert_eq!(cfg.layout(), Layout::Named);
        assert!(!cfg.wire().omits_null_members());
    }
}
