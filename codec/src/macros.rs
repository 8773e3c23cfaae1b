//! Registration macros.

/// Registers a struct as an object by implementing [crate::Model] for it.
///
/// Every listed field must itself implement [crate::Model], and the struct must implement
/// `Default` (decoding starts from the default value and fills members in). Fields may carry
/// an explicit wire ordinal with `#[index = N]`; fields without one are numbered by their
/// position in the list, starting at 1. Fields that are not listed are never encoded.
///
/// ```
/// use strata_codec::{object, Serializer};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Person {
///     name: Option<String>,
///     tags: Vec<String>,
///     score: u8,
/// }
///
/// object!(Person {
///     name: Option<String>,
///     tags: Vec<String>,
///     #[index = 7]
///     score: u8,
/// });
///
/// let serializer = Serializer::default();
/// let person = Person {
///     name: Some("A".into()),
///     tags: vec!["x".into()],
///     score: 3,
/// };
/// let encoded = serializer.serialize(&person).unwrap();
/// assert_eq!(serializer.deserialize::<Person>(&encoded).unwrap(), person);
/// ```
#[macro_export]
macro_rules! object {
    (@index) => {
        None
    };
    (@index $index:literal) => {
        Some($index)
    };
    ($name:ident { $( $(#[index = $index:literal])? $field:ident : $ty:ty ),* $(,)? }) => {
        impl $crate::Model for $name {
            fn detail() -> $crate::TypeDetail {
                $crate::TypeDetail::object::<Self>(
                    stringify!($name),
                    vec![$({
                        fn get(object: &$name) -> &$ty {
                            &object.$field
                        }
                        fn get_mut(object: &mut $name) -> &mut $ty {
                            &mut object.$field
                        }
                        $crate::Member::new(
                            stringify!($field),
                            $crate::object!(@index $($index)?),
                            get,
                            get_mut,
                        )
                    }),*],
                )
            }
        }
    };
}
