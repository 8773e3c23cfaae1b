//! `Option`, `Box` and pairs.

use crate::{
    model::{
        cast, cast_mut, downcast, AnyBox, BoxedAccess, Model, NullableAccess, PairAccess, Shape,
        TypeDetail,
    },
    Error,
};
use std::any::Any;

fn option_get<T: Model>(value: &dyn Any) -> Result<Option<&dyn Any>, Error> {
    Ok(cast::<Option<T>>(value)?
        .as_ref()
        .map(|inner| inner as &dyn Any))
}

fn option_take<T: Model>(value: &mut dyn Any) -> Result<Option<AnyBox>, Error> {
    Ok(cast_mut::<Option<T>>(value)?
        .take()
        .map(|inner| Box::new(inner) as AnyBox))
}

fn option_some<T: Model>(inner: AnyBox) -> Result<AnyBox, Error> {
    Ok(Box::new(Some(downcast::<T>(inner)?)))
}

fn option_none<T: Model>() -> AnyBox {
    Box::new(None::<T>)
}

impl<T: Model> Model for Option<T> {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Nullable(NullableAccess {
            inner: T::detail,
            get: option_get::<T>,
            take: option_take::<T>,
            some: option_some::<T>,
            none: option_none::<T>,
        }))
    }
}

fn boxed_get<T: Model>(value: &dyn Any) -> Result<&dyn Any, Error> {
    Ok(&**cast::<Box<T>>(value)?)
}

fn boxed_take<T: Model>(value: &mut dyn Any) -> Result<AnyBox, Error> {
    Ok(Box::new(std::mem::take(&mut **cast_mut::<Box<T>>(value)?)))
}

fn boxed_wrap<T: Model>(inner: AnyBox) -> Result<AnyBox, Error> {
    Ok(Box::new(Box::new(downcast::<T>(inner)?)))
}

impl<T: Model> Model for Box<T> {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Boxed(BoxedAccess {
            inner: T::detail,
            get: boxed_get::<T>,
            take: boxed_take::<T>,
            wrap: boxed_wrap::<T>,
        }))
    }
}

fn pair_split<A: Model, B: Model>(value: &dyn Any) -> Result<(&dyn Any, &dyn Any), Error> {
    let (first, second) = cast::<(A, B)>(value)?;
    Ok((first, second))
}

fn pair_join<A: Model, B: Model>(first: AnyBox, second: AnyBox) -> Result<AnyBox, Error> {
    Ok(Box::new((downcast::<A>(first)?, downcast::<B>(second)?)))
}

impl<A: Model, B: Model> Model for (A, B) {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Pair(PairAccess {
            first: A::detail,
            second: B::detail,
            split: pair_split::<A, B>,
            join: pair_join::<A, B>,
        }))
    }
}
