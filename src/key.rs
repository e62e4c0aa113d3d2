//! Key normalization.
//!
//! Every store indexes its entries by a canonical string derived from the
//! caller's key. [`KeyNormalizer`] resolves that string in a fixed order:
//!
//! 1. a configured key encoder, if any, is authoritative;
//! 2. otherwise the key's own [`KeyPart`]: self-describing text, a string,
//!    or a primitive scalar formatted with `Display`;
//! 3. anything else fails with [`CacheError::UnsupportedKeyType`].
//!
//! Note that keys of different types can collide: `"1"` and `1u8` both
//! normalize to `"1"`. Use a single key type per store, or an encoder.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{CacheError, CacheResult};

/// A user-supplied function mapping a key to its canonical string.
pub type KeyEncoder<K> = Arc<dyn Fn(&K) -> String + Send + Sync>;

/// The string-convertible shape of a key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart<'a> {
    /// The key rendered itself as text.
    Described(Cow<'a, str>),
    Str(&'a str),
    Int(i128),
    UInt(u128),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// No string form; a key encoder is required.
    Unsupported,
}

impl KeyPart<'_> {
    fn render(self) -> Option<String> {
        let s = match self {
            KeyPart::Described(text) => text.into_owned(),
            KeyPart::Str(s) => s.to_owned(),
            KeyPart::Int(n) => n.to_string(),
            KeyPart::UInt(n) => n.to_string(),
            KeyPart::F32(f) => f.to_string(),
            KeyPart::F64(f) => f.to_string(),
            KeyPart::Bool(b) => b.to_string(),
            KeyPart::Unsupported => return None,
        };
        Some(s)
    }
}

/// Types usable as cache keys.
///
/// Implemented for strings, integers, floats, `bool` and `char`. Types that
/// should go through a key encoder only need an empty impl:
///
/// ```
/// use loading_cache::key::{CacheKey, KeyNormalizer};
/// use std::sync::Arc;
///
/// struct Point { x: i32, y: i32 }
/// impl CacheKey for Point {}
///
/// let plain = KeyNormalizer::<Point>::new();
/// assert!(plain.normalize(&Point { x: 1, y: 2 }).is_err());
///
/// let encoded = KeyNormalizer::<Point>::with_encoder(Arc::new(|p: &Point| format!("{}:{}", p.x, p.y)));
/// assert_eq!(encoded.normalize(&Point { x: 1, y: 2 }).unwrap(), "1:2");
/// ```
pub trait CacheKey {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Unsupported
    }
}

/// Wraps any `Display` type so it renders itself as its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Described<T>(pub T);

impl<T: fmt::Display> CacheKey for Described<T> {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Described(Cow::Owned(self.0.to_string()))
    }
}

impl CacheKey for str {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Str(self)
    }
}

impl CacheKey for String {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Str(self.as_str())
    }
}

impl CacheKey for Cow<'_, str> {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Str(self.as_ref())
    }
}

impl CacheKey for char {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Described(Cow::Owned(self.to_string()))
    }
}

impl CacheKey for bool {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::Bool(*self)
    }
}

impl CacheKey for f32 {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::F32(*self)
    }
}

impl CacheKey for f64 {
    fn key_part(&self) -> KeyPart<'_> {
        KeyPart::F64(*self)
    }
}

macro_rules! int_keys {
    ($variant:ident: $($t:ty),*) => {
        $(
            impl CacheKey for $t {
                fn key_part(&self) -> KeyPart<'_> {
                    KeyPart::$variant(*self as _)
                }
            }
        )*
    };
}

int_keys!(Int: i8, i16, i32, i64, i128, isize);
int_keys!(UInt: u8, u16, u32, u64, u128, usize);

impl<T: CacheKey + ?Sized> CacheKey for &T {
    fn key_part(&self) -> KeyPart<'_> {
        (**self).key_part()
    }
}

impl<T: CacheKey + ?Sized> CacheKey for Box<T> {
    fn key_part(&self) -> KeyPart<'_> {
        (**self).key_part()
    }
}

impl<T: CacheKey + ?Sized> CacheKey for Rc<T> {
    fn key_part(&self) -> KeyPart<'_> {
        (**self).key_part()
    }
}

impl<T: CacheKey + ?Sized> CacheKey for Arc<T> {
    fn key_part(&self) -> KeyPart<'_> {
        (**self).key_part()
    }
}

/// Maps keys to the canonical strings stores index by.
pub struct KeyNormalizer<K: ?Sized> {
    encoder: Option<KeyEncoder<K>>,
}

impl<K: ?Sized> KeyNormalizer<K> {
    /// A normalizer that relies on the key's own [`KeyPart`].
    pub fn new() -> Self {
        Self { encoder: None }
    }

    /// A normalizer that always uses `encoder`.
    pub fn with_encoder(encoder: KeyEncoder<K>) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }

    pub(crate) fn from_option(encoder: Option<KeyEncoder<K>>) -> Self {
        Self { encoder }
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder.is_some()
    }
}

impl<K: CacheKey + ?Sized> KeyNormalizer<K> {
    /// Produce the canonical string for `key`.
    pub fn normalize(&self, key: &K) -> CacheResult<String> {
        if let Some(encoder) = &self.encoder {
            return Ok(encoder(key));
        }
        key.key_part()
            .render()
            .ok_or(CacheError::UnsupportedKeyType(std::any::type_name::<K>()))
    }
}

impl<K: ?Sized> Default for KeyNormalizer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized> Clone for KeyNormalizer<K> {
    fn clone(&self) -> Self {
        Self {
            encoder: self.encoder.clone(),
        }
    }
}

impl<K: ?Sized> fmt::Debug for KeyNormalizer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNormalizer")
            .field("encoder", &self.encoder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm<K: CacheKey + ?Sized>(key: &K) -> CacheResult<String> {
        KeyNormalizer::<K>::new().normalize(key)
    }

    #[test]
    fn test_primitive_keys() {
        assert_eq!(norm("abc").unwrap(), "abc");
        assert_eq!(norm(&String::from("abc")).unwrap(), "abc");
        assert_eq!(norm(&-42i64).unwrap(), "-42");
        assert_eq!(norm(&7u8).unwrap(), "7");
        assert_eq!(norm(&u64::MAX).unwrap(), "18446744073709551615");
        assert_eq!(norm(&1.5f64).unwrap(), "1.5");
        assert_eq!(norm(&0.1f32).unwrap(), "0.1");
        assert_eq!(norm(&true).unwrap(), "true");
        assert_eq!(norm(&'x').unwrap(), "x");
    }

    #[test]
    fn test_described_key_renders_itself() {
        struct UserId(u32);
        impl fmt::Display for UserId {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "user:{}", self.0)
            }
        }

        assert_eq!(norm(&Described(UserId(9))).unwrap(), "user:9");
    }

    #[test]
    fn test_unsupported_key_type() {
        struct Opaque;
        impl CacheKey for Opaque {}

        let err = norm(&Opaque).unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedKeyType(name) if name.ends_with("Opaque")));
    }

    #[test]
    fn test_encoder_is_authoritative() {
        let normalizer = KeyNormalizer::<String>::with_encoder(Arc::new(|k: &String| format!("{}*", k)));
        assert!(normalizer.has_encoder());
        assert_eq!(normalizer.normalize(&"a".to_string()).unwrap(), "a*");
    }

    #[test]
    fn test_smart_pointers_delegate() {
        let key: Arc<str> = Arc::from("shared");
        assert_eq!(norm(&key).unwrap(), "shared");
        assert_eq!(norm(&Box::new(3i32)).unwrap(), "3");
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let a = norm(&123_456u32).unwrap();
        let b = norm(&123_456u32).unwrap();
        assert_eq!(a, b);
    }
}
