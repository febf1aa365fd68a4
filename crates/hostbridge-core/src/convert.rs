//! Conversion traits for native argument extraction and return values.
//!
//! - [`FromDynamic`]: extract a Rust value from a [`Dynamic`]
//! - [`IntoDynamic`]: convert a Rust value into a [`Dynamic`]
//!
//! Integers are range-checked. Floats with an integral value are accepted
//! where an integer is expected, since scripts have a single number type.

use crate::{ConversionError, Delegate, Dynamic, EnumValue, HostArray, HostObject, ScriptRef};

/// Extract a value from a [`Dynamic`].
pub trait FromDynamic: Sized {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a value into a [`Dynamic`].
pub trait IntoDynamic {
    fn into_dynamic(self) -> Dynamic;
}

fn integral(value: &Dynamic) -> Result<i64, ConversionError> {
    match value {
        Dynamic::Int(v) => Ok(*v),
        Dynamic::Enum(e) => Ok(e.value),
        Dynamic::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => Ok(*f as i64),
        _ => Err(ConversionError::TypeMismatch {
            expected: "int",
            actual: value.type_name(),
        }),
    }
}

macro_rules! impl_dynamic_int {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
                    let v = integral(value)?;
                    <$ty>::try_from(v).map_err(|_| ConversionError::IntegerOverflow {
                        value: v,
                        target_type: stringify!($ty),
                    })
                }
            }

            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::Int(self as i64)
                }
            }
        )*
    };
}

impl_dynamic_int!(i8, i16, i32, i64, u8, u16, u32, usize);

// u64 reinterprets the bits so the full range survives a round trip.
impl FromDynamic for u64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        integral(value).map(|v| v as u64)
    }
}

impl IntoDynamic for u64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Int(self as i64)
    }
}

impl FromDynamic for f64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Float(v) => Ok(*v),
            Dynamic::Int(v) => Ok(*v as f64),
            _ => Err(ConversionError::TypeMismatch {
                expected: "float",
                actual: value.type_name(),
            }),
        }
    }
}

impl IntoDynamic for f64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self)
    }
}

impl FromDynamic for f32 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        let v = f64::from_dynamic(value)?;
        if v.is_finite() && (v > f32::MAX as f64 || v < f32::MIN as f64) {
            return Err(ConversionError::FloatConversion {
                value: v,
                target_type: "f32",
            });
        }
        Ok(v as f32)
    }
}

impl IntoDynamic for f32 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self as f64)
    }
}

impl FromDynamic for bool {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Bool(v) => Ok(*v),
            _ => Err(ConversionError::TypeMismatch {
                expected: "bool",
                actual: value.type_name(),
            }),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl FromDynamic for char {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        let v = integral(value)?;
        u32::try_from(v)
            .ok()
            .and_then(char::from_u32)
            .ok_or(ConversionError::IntegerOverflow {
                value: v,
                target_type: "char",
            })
    }
}

impl IntoDynamic for char {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Int(self as i64)
    }
}

impl FromDynamic for String {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: value.type_name(),
            }),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

impl IntoDynamic for &str {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_string())
    }
}

impl IntoDynamic for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Null
    }
}

impl FromDynamic for Dynamic {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoDynamic for Dynamic {
    fn into_dynamic(self) -> Dynamic {
        self
    }
}

impl<T: FromDynamic> FromDynamic for Option<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Null => Ok(None),
            other => T::from_dynamic(other).map(Some),
        }
    }
}

impl<T: IntoDynamic> IntoDynamic for Option<T> {
    fn into_dynamic(self) -> Dynamic {
        self.map_or(Dynamic::Null, IntoDynamic::into_dynamic)
    }
}

macro_rules! impl_dynamic_handle {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromDynamic for $ty {
            fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
                match value {
                    Dynamic::$variant(v) => Ok(v.clone()),
                    Dynamic::Null => Err(ConversionError::NullValue { target_type: $name }),
                    _ => Err(ConversionError::TypeMismatch {
                        expected: $name,
                        actual: value.type_name(),
                    }),
                }
            }
        }

        impl IntoDynamic for $ty {
            fn into_dynamic(self) -> Dynamic {
                Dynamic::$variant(self)
            }
        }
    };
}

impl_dynamic_handle!(HostObject, Object, "object");
impl_dynamic_handle!(HostArray, Array, "array");
impl_dynamic_handle!(Delegate, Delegate, "delegate");
impl_dynamic_handle!(EnumValue, Enum, "enum");

impl FromDynamic for ScriptRef {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        value.as_script_ref().cloned().ok_or(ConversionError::TypeMismatch {
            expected: "script reference",
            actual: value.type_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_is_checked() {
        assert_eq!(i8::from_dynamic(&Dynamic::Int(127)).unwrap(), 127);
        assert!(matches!(
            i8::from_dynamic(&Dynamic::Int(128)),
            Err(ConversionError::IntegerOverflow { value: 128, target_type: "i8" })
        ));
        assert!(u16::from_dynamic(&Dynamic::Int(-1)).is_err());
        assert!(i32::from_dynamic(&Dynamic::Bool(true)).is_err());
    }

    #[test]
    fn integral_floats_become_integers() {
        assert_eq!(i32::from_dynamic(&Dynamic::Float(4.0)).unwrap(), 4);
        assert!(i32::from_dynamic(&Dynamic::Float(4.5)).is_err());
    }

    #[test]
    fn u64_round_trip_preserves_bits() {
        let v = u64::MAX.into_dynamic();
        assert_eq!(u64::from_dynamic(&v).unwrap(), u64::MAX);
    }

    #[test]
    fn f32_range() {
        assert_eq!(f32::from_dynamic(&Dynamic::Int(2)).unwrap(), 2.0);
        assert!(f32::from_dynamic(&Dynamic::Float(1e300)).is_err());
        assert!(f32::from_dynamic(&Dynamic::Float(f64::INFINITY)).unwrap().is_infinite());
    }

    #[test]
    fn options_map_null() {
        assert_eq!(Option::<i32>::from_dynamic(&Dynamic::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_dynamic(&Dynamic::Int(1)).unwrap(), Some(1));
        assert_eq!(None::<String>.into_dynamic(), Dynamic::Null);
    }

    #[test]
    fn handles_reject_null() {
        assert!(matches!(
            HostObject::from_dynamic(&Dynamic::Null),
            Err(ConversionError::NullValue { target_type: "object" })
        ));
    }

    #[test]
    fn chars_are_code_points() {
        assert_eq!(char::from_dynamic(&Dynamic::Int(65)).unwrap(), 'A');
        assert!(char::from_dynamic(&Dynamic::Int(0xD800)).is_err());
    }
}
