//! Type registration.
//!
//! Every encodable type implements [Model], which returns a [TypeDetail]: the type's
//! identity plus a [Shape] holding plain function pointers to inspect, construct and fill
//! values of that type through `&dyn Any`. Converters are built from these tables, so
//! nothing is generated at runtime and the table for a type is fixed at compile time.
//!
//! User types register with the [crate::object!] macro.

use crate::{converter::Converter, Error};
use std::{
    any::{type_name, Any, TypeId},
    sync::Arc,
};

/// An owned, type-erased value.
pub type AnyBox = Box<dyn Any + Send>;

/// A deferred [TypeDetail], used wherever a shape refers to another type.
pub type DetailFn = fn() -> TypeDetail;

/// A type that can be encoded and decoded.
pub trait Model: Any + Default + Send + Sync {
    /// Returns the registration table for this type.
    fn detail() -> TypeDetail;
}

/// Identity and shape of a registered type.
pub struct TypeDetail {
    pub id: TypeId,
    pub name: &'static str,
    pub shape: Shape,
}

impl std::fmt::Debug for TypeDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDetail")
            .field("name", &self.name)
            .field("shape", &self.shape.family())
            .finish()
    }
}

impl TypeDetail {
    /// Describes a type with the given shape.
    pub fn new<T: Model>(shape: Shape) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape,
        }
    }

    /// Describes a user object with the given members, constructed with `Default`.
    pub fn object<T: Model>(name: &'static str, members: Vec<Member>) -> Self {
        Self::new::<T>(Shape::Object(ObjectAccess {
            name,
            members,
            create: create_default::<T>,
        }))
    }
}

/// The structural family of a type, which decides the converter used for it.
pub enum Shape {
    Core(CoreAccess),
    Nullable(NullableAccess),
    Boxed(BoxedAccess),
    Enumerable(EnumerableAccess),
    Map(MapAccess),
    Pair(PairAccess),
    Object(ObjectAccess),
}

impl Shape {
    /// Short name of the family, for diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            Shape::Core(_) => "core",
            Shape::Nullable(_) => "nullable",
            Shape::Boxed(_) => "boxed",
            Shape::Enumerable(access) => match access.kind {
                CollectionKind::Array => "array",
                CollectionKind::List => "list",
                CollectionKind::Set => "set",
            },
            Shape::Map(_) => "dictionary",
            Shape::Pair(_) => "pair",
            Shape::Object(_) => "object",
        }
    }
}

/// Primitive wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreType {
    Bool,
    Char,
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    String,
    Bytes,
}

/// Access to a primitive value.
pub struct CoreAccess {
    pub core: CoreType,
    /// Present for integer and float types.
    pub numeric: Option<NumericAccess>,
    /// Builds the pass-through converter for this type.
    pub direct: fn() -> Arc<dyn Converter>,
}

/// A numeric value widened for conversion between primitive types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Unsigned(u128),
    Signed(i128),
    Float(f64),
}

/// Conversions between a numeric type, its wire bytes and [Number].
#[derive(Clone, Copy)]
pub struct NumericAccess {
    /// Encoded width in bytes.
    pub size: usize,
    /// Reads a value of this type as a number.
    pub to_number: fn(&dyn Any) -> Result<Number, Error>,
    /// Builds a value of this type, or `None` if the number is out of range.
    pub from_number: fn(Number) -> Option<AnyBox>,
    /// Encodes a number as this type into exactly `size` bytes; false if out of range.
    pub put: fn(Number, &mut [u8]) -> bool,
    /// Decodes exactly `size` bytes of this type.
    pub get: fn(&[u8]) -> Result<Number, Error>,
}

/// Access to an `Option<T>`.
pub struct NullableAccess {
    pub inner: DetailFn,
    /// Returns the inner value, or `None` if null.
    pub get: fn(&dyn Any) -> Result<Option<&dyn Any>, Error>,
    /// Takes the inner value out of an existing instance for reuse.
    pub take: fn(&mut dyn Any) -> Result<Option<AnyBox>, Error>,
    pub some: fn(AnyBox) -> Result<AnyBox, Error>,
    pub none: fn() -> AnyBox,
}

/// Access to a `Box<T>`.
pub struct BoxedAccess {
    pub inner: DetailFn,
    pub get: fn(&dyn Any) -> Result<&dyn Any, Error>,
    pub take: fn(&mut dyn Any) -> Result<AnyBox, Error>,
    pub wrap: fn(AnyBox) -> Result<AnyBox, Error>,
}

/// Container families sharing the enumerable wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Fixed length, filled by index.
    Array,
    /// Growable, filled in order.
    List,
    /// Unordered, filled by insertion.
    Set,
}

/// Iterator over the elements of an erased collection.
pub type Elements<'a> = Box<dyn Iterator<Item = &'a dyn Any> + 'a>;

/// Iterator over the entries of an erased dictionary.
pub type Entries<'a> = Box<dyn Iterator<Item = (&'a dyn Any, &'a dyn Any)> + 'a>;

/// Access to an array, list or set.
pub struct EnumerableAccess {
    pub kind: CollectionKind,
    pub element: DetailFn,
    pub len: fn(&dyn Any) -> Result<usize, Error>,
    /// Index-addressable access, present for arrays and lists.
    pub get: Option<fn(&dyn Any, usize) -> Result<&dyn Any, Error>>,
    pub iter: for<'a> fn(&'a dyn Any) -> Result<Elements<'a>, Error>,
    /// Allocates a container sized for `count` elements.
    pub create: fn(usize) -> AnyBox,
    /// Prepares an existing container to receive `count` elements; false if it cannot.
    pub reuse: fn(&mut dyn Any, usize) -> Result<bool, Error>,
    /// Stores the element at `index`.
    pub add: fn(&mut dyn Any, usize, AnyBox) -> Result<(), Error>,
    /// Converts the filled container into the collection type.
    pub complete: fn(AnyBox) -> Result<AnyBox, Error>,
}

/// Access to a dictionary.
pub struct MapAccess {
    /// The `(key, value)` pair type used as the entry unit.
    pub entry: DetailFn,
    pub len: fn(&dyn Any) -> Result<usize, Error>,
    pub iter: for<'a> fn(&'a dyn Any) -> Result<Entries<'a>, Error>,
    pub create: fn(usize) -> AnyBox,
    /// Clears an existing dictionary for reuse.
    pub reuse: fn(&mut dyn Any) -> Result<(), Error>,
    /// Inserts a boxed `(key, value)` entry.
    pub insert: fn(&mut dyn Any, AnyBox) -> Result<(), Error>,
}

/// Access to a two element tuple.
pub struct PairAccess {
    pub first: DetailFn,
    pub second: DetailFn,
    pub split: fn(&dyn Any) -> Result<(&dyn Any, &dyn Any), Error>,
    pub join: fn(AnyBox, AnyBox) -> Result<AnyBox, Error>,
}

/// Access to a user object.
pub struct ObjectAccess {
    /// Registered name, used as the type discriminator.
    pub name: &'static str,
    /// Members in declaration order.
    pub members: Vec<Member>,
    pub create: fn() -> AnyBox,
}

/// One registered member of an object.
pub struct Member {
    pub name: &'static str,
    /// Explicit ordinal, if one was given at registration.
    pub index: Option<u16>,
    pub access: Box<dyn MemberAccess>,
}

impl Member {
    /// Registers a member through a pair of field accessors.
    pub fn new<O: Model, P: Model>(
        name: &'static str,
        index: Option<u16>,
        get: fn(&O) -> &P,
        get_mut: fn(&mut O) -> &mut P,
    ) -> Self {
        Self {
            name,
            index,
            access: Box::new(Field { get, get_mut }),
        }
    }
}

/// Erased getter and setter for one member.
pub trait MemberAccess: Send + Sync {
    /// Registration table of the member's type.
    fn detail(&self) -> TypeDetail;

    /// Borrows the member from its object.
    fn get<'a>(&self, object: &'a dyn Any) -> Result<&'a dyn Any, Error>;

    /// Replaces the member's value.
    fn set(&self, object: &mut dyn Any, value: AnyBox) -> Result<(), Error>;

    /// Moves the member's value out, leaving its default behind.
    fn take(&self, object: &mut dyn Any) -> Result<AnyBox, Error>;
}

struct Field<O, P> {
    get: fn(&O) -> &P,
    get_mut: fn(&mut O) -> &mut P,
}

impl<O: Model, P: Model> MemberAccess for Field<O, P> {
    fn detail(&self) -> TypeDetail {
        P::detail()
    }

    fn get<'a>(&self, object: &'a dyn Any) -> Result<&'a dyn Any, Error> {
        Ok((self.get)(cast::<O>(object)?))
    }

    fn set(&self, object: &mut dyn Any, value: AnyBox) -> Result<(), Error> {
        *(self.get_mut)(cast_mut::<O>(object)?) = downcast::<P>(value)?;
        Ok(())
    }

    fn take(&self, object: &mut dyn Any) -> Result<AnyBox, Error> {
        Ok(Box::new(std::mem::take((self.get_mut)(cast_mut::<O>(object)?))))
    }
}

/// Borrows an erased value as `T`.
pub fn cast<T: Any>(value: &dyn Any) -> Result<&T, Error> {
    value
        .downcast_ref::<T>()
        .ok_or(Error::InvalidState("value does not match converter type"))
}

/// Mutably borrows an erased value as `T`.
pub fn cast_mut<T: Any>(value: &mut dyn Any) -> Result<&mut T, Error> {
    value
        .downcast_mut::<T>()
        .ok_or(Error::InvalidState("value does not match converter type"))
}

/// Unboxes an erased value as `T`.
pub fn downcast<T: Any>(value: AnyBox) -> Result<T, Error> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::InvalidState("value does not match converter type"))
}

/// Constructs the default value of `T`.
pub fn create_default<T: Model>() -> AnyBox {
    Box::new(T::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Point {
        x: i32,
        label: String,
    }

    crate::object!(Point { x: i32, label: String });

    #[test]
    fn test_member_access() {
        let detail = Point::detail();
        let Shape::Object(object) = detail.shape else {
            panic!("expected object shape");
        };
        assert_eq!(object.name, "Point");
        assert_eq!(object.members.len(), 2);

        let mut point = Point {
            x: 4,
            label: "a".into(),
        };
        let x = &object.members[0];
        assert_eq!(cast::<i32>(x.access.get(&point).unwrap()).unwrap(), &4);
        x.access.set(&mut point, Box::new(9i32)).unwrap();
        assert_eq!(point.x, 9);

        let label = &object.members[1];
        let taken = downcast::<String>(label.access.take(&mut point).unwrap()).unwrap();
        assert_eq!(taken, "a");
        assert!(point.label.is_empty());

        assert!(matches!(
            x.access.set(&mut point, Box::new(1u8)),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_create_default() {
        let created = downcast::<Point>((create_default::<Point>)()).unwrap();
        assert_eq!(created.x, 0);
    }
}
