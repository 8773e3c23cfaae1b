//! Converter registry.
//!
//! Converters are created on first use for a `(wire type, target type)` pair and cached for
//! the lifetime of the registry. Creation happens in two phases under the registry's write
//! lock:
//!
//! 1. The converter for the requested pair is constructed and staged.
//! 2. Every staged converter runs [Converter::setup], which resolves (and stages) the
//!    converters it delegates to. A pair that is already staged resolves to the staged
//!    converter, so self-referential types terminate.
//!
//! Staged converters are only published once every setup has succeeded. A failure leaves the
//! cache exactly as it was.

use crate::{
    config::WireOptions,
    converter::{
        BoxedConverter, CastConverter, Converter, EnumerableConverter, MapConverter,
        NullableConverter, ObjectConverter, PairConverter,
    },
    model::{DetailFn, Model, Shape, TypeDetail},
    Error,
};
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tracing::debug;

type Key = (TypeId, TypeId);

/// A cache of converters built for one set of wire options.
pub struct Registry {
    options: WireOptions,
    converters: RwLock<HashMap<Key, Arc<dyn Converter>>>,
}

impl Registry {
    /// Creates an empty registry for the given wire options.
    pub fn new(options: WireOptions) -> Self {
        Self {
            options,
            converters: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached converters.
    pub fn len(&self) -> usize {
        self.converters.read().map_or(0, |cache| cache.len())
    }

    /// Returns true if no converter has been built yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the converter reading and writing `T` values as `W` on the wire.
    pub fn converter<W: Model, T: Model>(&self) -> Result<Arc<dyn Converter>, Error> {
        let key = (TypeId::of::<W>(), TypeId::of::<T>());
        {
            let cache = self
                .converters
                .read()
                .map_err(|_| Error::InvalidState("converter cache poisoned"))?;
            if let Some(converter) = cache.get(&key) {
                return Ok(Arc::clone(converter));
            }
        }

        let mut cache = self
            .converters
            .write()
            .map_err(|_| Error::InvalidState("converter cache poisoned"))?;
        if let Some(converter) = cache.get(&key) {
            return Ok(Arc::clone(converter));
        }
        let mut builder = Builder {
            options: self.options,
            cache: &cache,
            staged: HashMap::new(),
            pending: Vec::new(),
        };
        let converter = builder.resolve(W::detail, T::detail)?;
        while let Some(staged) = builder.pending.pop() {
            staged.setup(&mut builder)?;
        }
        let staged = builder.staged;
        debug!(count = staged.len(), "published converters");
        cache.extend(staged);
        Ok(converter)
    }
}

/// Stages converters while a request is being resolved.
pub struct Builder<'r> {
    options: WireOptions,
    cache: &'r HashMap<Key, Arc<dyn Converter>>,
    staged: HashMap<Key, Arc<dyn Converter>>,
    pending: Vec<Arc<dyn Converter>>,
}

impl Builder<'_> {
    /// Resolves the converter for a pair of deferred type details.
    pub fn resolve(
        &mut self,
        wire: DetailFn,
        target: DetailFn,
    ) -> Result<Arc<dyn Converter>, Error> {
        self.resolve_detail(wire(), target())
    }

    /// Resolves the converter for a pair of type details, creating and staging it if needed.
    pub fn resolve_detail(
        &mut self,
        wire: TypeDetail,
        target: TypeDetail,
    ) -> Result<Arc<dyn Converter>, Error> {
        let key = (wire.id, target.id);
        if let Some(converter) = self.cache.get(&key).or_else(|| self.staged.get(&key)) {
            return Ok(Arc::clone(converter));
        }
        let (wire_name, target_name) = (wire.name, target.name);
        let converter = create(wire, target, self.options)?;
        debug!(
            wire = wire_name,
            target = target_name,
            converter = converter.name(),
            "created converter"
        );
        self.staged.insert(key, Arc::clone(&converter));
        self.pending.push(Arc::clone(&converter));
        Ok(converter)
    }
}

/// Selects and constructs the converter for a type pair.
///
/// Dictionaries are matched before other collections, and a dictionary is never converted to
/// or from a non-dictionary collection.
fn create(
    wire: TypeDetail,
    target: TypeDetail,
    options: WireOptions,
) -> Result<Arc<dyn Converter>, Error> {
    let unsupported = Error::NotSupported(wire.name, target.name);
    let converter: Arc<dyn Converter> = match (wire.shape, target.shape) {
        (Shape::Core(w), Shape::Core(t)) => {
            if w.core == t.core {
                return Ok((t.direct)());
            }
            match (w.numeric, t.numeric) {
                (Some(w), Some(t)) => Arc::new(CastConverter::new(w, t, wire.name, target.name)),
                _ => return Err(unsupported),
            }
        }
        (Shape::Nullable(w), Shape::Nullable(t)) => Arc::new(NullableConverter::new(w.inner, t)),
        (Shape::Map(w), Shape::Map(t)) => Arc::new(MapConverter::new(w.entry, t)),
        (Shape::Map(_), _) | (_, Shape::Map(_)) => return Err(unsupported),
        (Shape::Enumerable(w), Shape::Enumerable(t)) => {
            Arc::new(EnumerableConverter::new(w.element, t))
        }
        (Shape::Pair(w), Shape::Pair(t)) => Arc::new(PairConverter::new(w.first, w.second, t)),
        (Shape::Boxed(w), Shape::Boxed(t)) => Arc::new(BoxedConverter::new(w.inner, t)),
        (Shape::Object(_), Shape::Object(t)) if wire.id == target.id => {
            Arc::new(ObjectConverter::new(t, options)?)
        }
        _ => return Err(unsupported),
    };
    Ok(converter)
}
