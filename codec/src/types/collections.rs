//! Arrays, lists, sets and dictionaries.

use crate::{
    model::{
        cast, cast_mut, downcast, AnyBox, CollectionKind, Elements, EnumerableAccess, Entries,
        MapAccess, Model, Shape, TypeDetail,
    },
    Error,
};
use std::{
    any::Any,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    hash::Hash,
};

/// Upper bound on capacity reserved from a length prefix before any element has been read.
const MAX_PREALLOCATION: usize = 4096;

/// A container of elements sharing the enumerable wire layout.
trait Collection: Model {
    type Item: Model;

    const KIND: CollectionKind;

    fn count(&self) -> usize;

    fn items<'a>(&'a self) -> Box<dyn Iterator<Item = &'a Self::Item> + 'a>;

    /// Element at `index`, for index-addressable containers.
    fn at(&self, _index: usize) -> Option<&Self::Item> {
        None
    }

    /// Container that receives elements while `count` of them are read.
    fn start(count: usize) -> AnyBox;

    /// Stores `item` as element `index` of a container made by [Collection::start] or reused
    /// in place. Returns false if the index is out of bounds.
    fn store(container: &mut dyn Any, index: usize, item: Self::Item) -> Result<bool, Error> {
        Ok(cast_mut::<Self>(container)?.place(index, item))
    }

    /// Turns a filled container into the collection itself.
    fn complete(container: AnyBox) -> Result<AnyBox, Error> {
        Ok(container)
    }

    /// Prepares the container to receive `count` elements. Returns false if it cannot be
    /// reused for that many.
    fn prepare(&mut self, count: usize) -> bool;

    /// Stores `item` as element `index`. Returns false if the index is out of bounds.
    fn place(&mut self, index: usize, item: Self::Item) -> bool;
}

impl<T: Model> Collection for Vec<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::List;

    fn count(&self) -> usize {
        self.len()
    }

    fn items<'a>(&'a self) -> Box<dyn Iterator<Item = &'a T> + 'a> {
        Box::new(self.iter())
    }

    fn at(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    fn start(count: usize) -> AnyBox {
        Box::new(Vec::<T>::with_capacity(count.min(MAX_PREALLOCATION)))
    }

    fn prepare(&mut self, count: usize) -> bool {
        self.clear();
        self.reserve(count.min(MAX_PREALLOCATION));
        true
    }

    fn place(&mut self, _index: usize, item: T) -> bool {
        self.push(item);
        true
    }
}

impl<T: Model> Collection for VecDeque<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::List;

    fn count(&self) -> usize {
        self.len()
    }

    fn items<'a>(&'a self) -> Box<dyn Iterator<Item = &'a T> + 'a> {
        Box::new(self.iter())
    }

    fn at(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    fn start(count: usize) -> AnyBox {
        Box::new(VecDeque::<T>::with_capacity(count.min(MAX_PREALLOCATION)))
    }

    fn prepare(&mut self, _count: usize) -> bool {
        self.clear();
        true
    }

    fn place(&mut self, _index: usize, item: T) -> bool {
        self.push_back(item);
        true
    }
}

impl<T: Model> Collection for Box<[T]> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::Array;

    fn count(&self) -> usize {
        self.len()
    }

    fn items<'a>(&'a self) -> Box<dyn Iterator<Item = &'a T> + 'a> {
        Box::new(self.iter())
    }

    fn at(&self, index: usize) -> Option<&T> {
        self.get(index)
    }

    /// New arrays are staged in a list and boxed once every element has arrived.
    fn start(count: usize) -> AnyBox {
        Box::new(Vec::<T>::with_capacity(count.min(MAX_PREALLOCATION)))
    }

    fn store(container: &mut dyn Any, index: usize, item: T) -> Result<bool, Error> {
        if let Some(array) = container.downcast_mut::<Self>() {
            return Ok(array.place(index, item));
        }
        let staged = cast_mut::<Vec<T>>(container)?;
        if index != staged.len() {
            return Ok(false);
        }
        staged.push(item);
        Ok(true)
    }

    fn complete(container: AnyBox) -> Result<AnyBox, Error> {
        match container.downcast::<Vec<T>>() {
            Ok(staged) => Ok(Box::new((*staged).into_boxed_slice())),
            Err(container) => Ok(container),
        }
    }

    fn prepare(&mut self, count: usize) -> bool {
        self.len() == count
    }

    fn place(&mut self, index: usize, item: T) -> bool {
        match self.get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }
}

impl<T: Model + Eq + Hash> Collection for HashSet<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::Set;

    fn count(&self) -> usize {
        self.len()
    }

    fn items<'a>(&'a self) -> Box<dyn Iterator<Item = &'a T> + 'a> {
        Box::new(self.iter())
    }

    fn start(count: usize) -> AnyBox {
        Box::new(HashSet::<T>::with_capacity(count.min(MAX_PREALLOCATION)))
    }

    fn prepare(&mut self, _count: usize) -> bool {
        self.clear();
        true
    }

    fn place(&mut self, _index: usize, item: T) -> bool {
        self.insert(item);
        true
    }
}

impl<T: Model + Ord> Collection for BTreeSet<T> {
    type Item = T;

    const KIND: CollectionKind = CollectionKind::Set;

    fn count(&self) -> usize {
        self.len()
    }

    fn items<'a>(&'a self) -> Box<dyn Iterator<Item = &'a T> + 'a> {
        Box::new(self.iter())
    }

    fn start(_count: usize) -> AnyBox {
        Box::new(BTreeSet::<T>::new())
    }

    fn prepare(&mut self, _count: usize) -> bool {
        self.clear();
        true
    }

    fn place(&mut self, _index: usize, item: T) -> bool {
        self.insert(item);
        true
    }
}

fn len<C: Collection>(value: &dyn Any) -> Result<usize, Error> {
    Ok(cast::<C>(value)?.count())
}

fn at<C: Collection>(value: &dyn Any, index: usize) -> Result<&dyn Any, Error> {
    cast::<C>(value)?
        .at(index)
        .map(|item| item as &dyn Any)
        .ok_or(Error::InvalidState("element index out of bounds"))
}

fn iter<'a, C: Collection>(value: &'a dyn Any) -> Result<Elements<'a>, Error> {
    Ok(Box::new(
        cast::<C>(value)?.items().map(|item| item as &dyn Any),
    ))
}

fn create<C: Collection>(count: usize) -> AnyBox {
    C::start(count)
}

fn reuse<C: Collection>(value: &mut dyn Any, count: usize) -> Result<bool, Error> {
    Ok(cast_mut::<C>(value)?.prepare(count))
}

fn add<C: Collection>(value: &mut dyn Any, index: usize, item: AnyBox) -> Result<(), Error> {
    let item = downcast::<C::Item>(item)?;
    if !C::store(value, index, item)? {
        return Err(Error::InvalidState("element index out of bounds"));
    }
    Ok(())
}

fn complete<C: Collection>(value: AnyBox) -> Result<AnyBox, Error> {
    C::complete(value)
}

fn enumerable<C: Collection>() -> TypeDetail {
    let indexed = C::KIND != CollectionKind::Set;
    TypeDetail::new::<C>(Shape::Enumerable(EnumerableAccess {
        kind: C::KIND,
        element: <C::Item as Model>::detail,
        len: len::<C>,
        get: indexed.then_some(at::<C> as fn(&dyn Any, usize) -> Result<&dyn Any, Error>),
        iter: iter::<C>,
        create: create::<C>,
        reuse: reuse::<C>,
        add: add::<C>,
        complete: complete::<C>,
    }))
}

impl<T: Model> Model for Vec<T> {
    fn detail() -> TypeDetail {
        enumerable::<Self>()
    }
}

impl<T: Model> Model for VecDeque<T> {
    fn detail() -> TypeDetail {
        enumerable::<Self>()
    }
}

impl<T: Model> Model for Box<[T]> {
    fn detail() -> TypeDetail {
        enumerable::<Self>()
    }
}

impl<T: Model + Eq + Hash> Model for HashSet<T> {
    fn detail() -> TypeDetail {
        enumerable::<Self>()
    }
}

impl<T: Model + Ord> Model for BTreeSet<T> {
    fn detail() -> TypeDetail {
        enumerable::<Self>()
    }
}

/// A dictionary whose entries are encoded as `(key, value)` pairs.
trait Dictionary: Model {
    type Key: Model;
    type Value: Model;

    fn count(&self) -> usize;

    fn entries<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a Self::Key, &'a Self::Value)> + 'a>;

    fn with_count(count: usize) -> Self;

    fn clear(&mut self);

    fn put(&mut self, key: Self::Key, value: Self::Value);
}

impl<K: Model + Eq + Hash, V: Model> Dictionary for HashMap<K, V> {
    type Key = K;
    type Value = V;

    fn count(&self) -> usize {
        self.len()
    }

    fn entries<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a K, &'a V)> + 'a> {
        Box::new(self.iter())
    }

    fn with_count(count: usize) -> Self {
        HashMap::with_capacity(count.min(MAX_PREALLOCATION))
    }

    fn clear(&mut self) {
        HashMap::clear(self);
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Model + Ord, V: Model> Dictionary for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn count(&self) -> usize {
        self.len()
    }

    fn entries<'a>(&'a self) -> Box<dyn Iterator<Item = (&'a K, &'a V)> + 'a> {
        Box::new(self.iter())
    }

    fn with_count(_count: usize) -> Self {
        BTreeMap::new()
    }

    fn clear(&mut self) {
        BTreeMap::clear(self);
    }

    fn put(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

fn map_len<D: Dictionary>(value: &dyn Any) -> Result<usize, Error> {
    Ok(cast::<D>(value)?.count())
}

fn map_iter<'a, D: Dictionary>(value: &'a dyn Any) -> Result<Entries<'a>, Error> {
    Ok(Box::new(
        cast::<D>(value)?
            .entries()
            .map(|(key, value)| (key as &dyn Any, value as &dyn Any)),
    ))
}

fn map_create<D: Dictionary>(count: usize) -> AnyBox {
    Box::new(D::with_count(count))
}

fn map_reuse<D: Dictionary>(value: &mut dyn Any) -> Result<(), Error> {
    cast_mut::<D>(value)?.clear();
    Ok(())
}

fn map_insert<D: Dictionary>(value: &mut dyn Any, entry: AnyBox) -> Result<(), Error> {
    let (key, item) = downcast::<(D::Key, D::Value)>(entry)?;
    cast_mut::<D>(value)?.put(key, item);
    Ok(())
}

fn dictionary<D: Dictionary>() -> TypeDetail {
    TypeDetail::new::<D>(Shape::Map(MapAccess {
        entry: <(D::Key, D::Value)>::detail,
        len: map_len::<D>,
        iter: map_iter::<D>,
        create: map_create::<D>,
        reuse: map_reuse::<D>,
        insert: map_insert::<D>,
    }))
}

impl<K: Model + Eq + Hash, V: Model> Model for HashMap<K, V> {
    fn detail() -> TypeDetail {
        dictionary::<Self>()
    }
}

impl<K: Model + Ord, V: Model> Model for BTreeMap<K, V> {
    fn detail() -> TypeDetail {
        dictionary::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_reuse_requires_matching_length() {
        let mut array: Box<[u8]> = vec![1, 2, 3].into_boxed_slice();
        assert!(!reuse::<Box<[u8]>>(&mut array, 2).unwrap());
        assert!(reuse::<Box<[u8]>>(&mut array, 3).unwrap());
        add::<Box<[u8]>>(&mut array, 1, Box::new(9u8)).unwrap();
        assert_eq!(&*array, &[1u8, 9, 3][..]);
        assert!(add::<Box<[u8]>>(&mut array, 3, Box::new(0u8)).is_err());
    }

    #[test]
    fn test_list_reuse_clears() {
        let mut list = vec![1u32, 2, 3];
        assert!(reuse::<Vec<u32>>(&mut list, 1).unwrap());
        assert!(list.is_empty());
        add::<Vec<u32>>(&mut list, 0, Box::new(5u32)).unwrap();
        assert_eq!(list, vec![5]);
    }

    #[test]
    fn test_shapes() {
        assert!(matches!(
            Vec::<u8>::detail().shape,
            Shape::Enumerable(EnumerableAccess {
                kind: CollectionKind::List,
                get: Some(_),
                ..
            })
        ));
        assert!(matches!(
            HashSet::<u8>::detail().shape,
            Shape::Enumerable(EnumerableAccess { get: None, .. })
        ));
        assert!(matches!(
            BTreeMap::<u8, String>::detail().shape,
            Shape::Map(_)
        ));
    }

    #[test]
    fn test_prealloc_is_capped() {
        let list = downcast::<Vec<u64>>(create::<Vec<u64>>(1 << 24)).unwrap();
        assert!(list.capacity() <= MAX_PREALLOCATION);
    }

    #[test]
    fn test_array_staged_from_prefix() {
        let mut staged = create::<Box<[Vec<u64>]>>(1 << 24);
        let list = staged.downcast_ref::<Vec<Vec<u64>>>().unwrap();
        assert!(list.capacity() <= MAX_PREALLOCATION);

        add::<Box<[Vec<u64>]>>(&mut *staged, 0, Box::new(vec![1u64])).unwrap();
        assert!(add::<Box<[Vec<u64>]>>(&mut *staged, 2, Box::new(vec![2u64])).is_err());
        add::<Box<[Vec<u64>]>>(&mut *staged, 1, Box::new(vec![2u64])).unwrap();

        let array = complete::<Box<[Vec<u64>]>>(staged).unwrap();
        let array = downcast::<Box<[Vec<u64>]>>(array).unwrap();
        assert_eq!(&*array, &[vec![1u64], vec![2u64]][..]);
    }

    #[test]
    fn test_reused_array_completes_in_place() {
        let array: AnyBox = Box::new(vec![7u8, 8].into_boxed_slice());
        let array = downcast::<Box<[u8]>>(complete::<Box<[u8]>>(array).unwrap()).unwrap();
        assert_eq!(&*array, &[7u8, 8][..]);
    }
}
