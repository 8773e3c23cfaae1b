//! Primitive types.
//!
//! Integers and floats also register a [NumericAccess] so that any two numeric types can be
//! converted into each other. Conversions are exact: an integer target rejects fractional or
//! out-of-range values, and a float target rejects values that overflow to infinity.

use crate::{
    converter::{BytesConverter, FixedConverter, TextConverter},
    cursor::Fixed,
    model::{cast, AnyBox, CoreAccess, CoreType, Model, Number, NumericAccess, Shape, TypeDetail},
    Error,
};
use bytes::Bytes;
use paste::paste;
use std::any::Any;

/// Numeric types that widen into and narrow from a [Number].
trait Numeric: Fixed + Model {
    fn to_number(self) -> Number;

    fn from_number(number: Number) -> Option<Self>;
}

/// Returns the integral value of `value` if it lies in `[min, max]`.
fn integral(value: f64, min: f64, max: f64) -> Option<f64> {
    // `max + 1.0` rounds to the next power of two for wide types, which keeps the bound exact.
    (value.is_finite() && value.fract() == 0.0 && value >= min && value < max + 1.0)
        .then_some(value)
}

macro_rules! impl_integer {
    ($variant:ident => $($type:ident),*) => {
        $(
            impl Numeric for $type {
                #[inline]
                fn to_number(self) -> Number {
                    Number::$variant(self.into())
                }

                #[inline]
                fn from_number(number: Number) -> Option<Self> {
                    match number {
                        Number::Unsigned(value) => Self::try_from(value).ok(),
                        Number::Signed(value) => Self::try_from(value).ok(),
                        Number::Float(value) => integral(value, Self::MIN as f64, Self::MAX as f64)
                            .map(|value| value as Self),
                    }
                }
            }
        )*
    };
}

impl_integer!(Unsigned => u8, u16, u32, u64, u128);
impl_integer!(Signed => i8, i16, i32, i64, i128);

macro_rules! impl_float {
    ($($type:ident),*) => {
        $(
            impl Numeric for $type {
                #[inline]
                fn to_number(self) -> Number {
                    Number::Float(self.into())
                }

                #[inline]
                fn from_number(number: Number) -> Option<Self> {
                    let (narrowed, finite) = match number {
                        Number::Unsigned(value) => (value as Self, true),
                        Number::Signed(value) => (value as Self, true),
                        Number::Float(value) => (value as Self, value.is_finite()),
                    };
                    (narrowed.is_finite() || !finite).then_some(narrowed)
                }
            }
        )*
    };
}

impl_float!(f32, f64);

fn to_number<N: Numeric>(value: &dyn Any) -> Result<Number, Error> {
    Ok(cast::<N>(value)?.to_number())
}

fn from_number<N: Numeric>(number: Number) -> Option<AnyBox> {
    N::from_number(number).map(|value| Box::new(value) as AnyBox)
}

fn put<N: Numeric>(number: Number, dst: &mut [u8]) -> bool {
    match N::from_number(number) {
        Some(value) => {
            value.put(dst);
            true
        }
        None => false,
    }
}

fn get<N: Numeric>(src: &[u8]) -> Result<Number, Error> {
    Ok(N::get(src)?.to_number())
}

fn numeric<N: Numeric>() -> NumericAccess {
    NumericAccess {
        size: N::SIZE,
        to_number: to_number::<N>,
        from_number: from_number::<N>,
        put: put::<N>,
        get: get::<N>,
    }
}

macro_rules! impl_numeric_model {
    ($($type:ident),*) => {
        paste! {
            $(
                impl Model for $type {
                    fn detail() -> TypeDetail {
                        TypeDetail::new::<Self>(Shape::Core(CoreAccess {
                            core: CoreType::[<$type:camel>],
                            numeric: Some(numeric::<Self>()),
                            direct: FixedConverter::<Self>::build,
                        }))
                    }
                }
            )*
        }
    };
}

impl_numeric_model!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl Model for bool {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Core(CoreAccess {
            core: CoreType::Bool,
            numeric: None,
            direct: FixedConverter::<Self>::build,
        }))
    }
}

impl Model for char {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Core(CoreAccess {
            core: CoreType::Char,
            numeric: None,
            direct: FixedConverter::<Self>::build,
        }))
    }
}

impl Model for String {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Core(CoreAccess {
            core: CoreType::String,
            numeric: None,
            direct: TextConverter::build,
        }))
    }
}

impl Model for Bytes {
    fn detail() -> TypeDetail {
        TypeDetail::new::<Self>(Shape::Core(CoreAccess {
            core: CoreType::Bytes,
            numeric: None,
            direct: BytesConverter::build,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_narrowing() {
        assert_eq!(u8::from_number(Number::Unsigned(255)), Some(255));
        assert_eq!(u8::from_number(Number::Unsigned(256)), None);
        assert_eq!(u8::from_number(Number::Signed(-1)), None);
        assert_eq!(i8::from_number(Number::Signed(-128)), Some(-128));
        assert_eq!(i64::from_number(Number::Unsigned(u64::MAX.into())), None);
    }

    #[test]
    fn test_float_to_integer() {
        assert_eq!(u8::from_number(Number::Float(255.0)), Some(255));
        assert_eq!(u8::from_number(Number::Float(256.0)), None);
        assert_eq!(i32::from_number(Number::Float(1.5)), None);
        assert_eq!(u64::from_number(Number::Float(18446744073709551616.0)), None);
        assert_eq!(i16::from_number(Number::Float(f64::NAN)), None);
    }

    #[test]
    fn test_float_narrowing() {
        assert_eq!(f32::from_number(Number::Float(1.5)), Some(1.5));
        assert_eq!(f32::from_number(Number::Float(f64::MAX)), None);
        assert!(f32::from_number(Number::Float(f64::INFINITY)).is_some());
        assert_eq!(f64::from_number(Number::Signed(-3)), Some(-3.0));
    }

    #[test]
    fn test_numeric_access() {
        let access = numeric::<u16>();
        assert_eq!(access.size, 2);

        let mut dst = [0u8; 2];
        assert!((access.put)(Number::Signed(513), &mut dst));
        assert_eq!(dst, [0x01, 0x02]);
        assert!(!(access.put)(Number::Signed(-1), &mut dst));
        assert_eq!((access.get)(&dst).unwrap(), Number::Unsigned(513));
        assert_eq!((access.to_number)(&7u16).unwrap(), Number::Unsigned(7));
    }
}
