//! Registry of caller-defined error detail payloads.
//!
//! Each payload type implements [`ErrorDetails`] and is registered once at
//! startup. The registry maps its tag to a monomorphized encode/decode pair so
//! nothing is discovered at request time. Once built, the registry is frozen
//! and shared behind an `Arc`.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::CodecError;

/// A caller-defined payload carried by typed problems.
pub trait ErrorDetails: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Wire tag identifying this payload type. Must be unique per registry.
    const TYPE_TAG: &'static str;
}

/// A type-erased [`ErrorDetails`] value plus its tag.
#[derive(Clone)]
pub struct TypedErrorDetail {
    tag: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl TypedErrorDetail {
    pub fn new<T: ErrorDetails>(value: T) -> Self {
        Self {
            tag: T::TYPE_TAG,
            value: Arc::new(value),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    #[must_use]
    pub fn downcast_ref<T: ErrorDetails>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for TypedErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedErrorDetail")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Invalid registrations.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("error detail tag '{tag}' is already registered by {existing}")]
    DuplicateTag {
        tag: &'static str,
        existing: &'static str,
    },
    #[error("error detail type {0} declares an empty tag")]
    EmptyTag(&'static str),
}

type EncodeFn = fn(&(dyn Any + Send + Sync)) -> Result<Value, CodecError>;
type DecodeFn = fn(Value) -> Result<Arc<dyn Any + Send + Sync>, CodecError>;

#[derive(Clone, Copy)]
struct DetailCodec {
    type_name: &'static str,
    encode: EncodeFn,
    decode: DecodeFn,
}

fn encode_as<T: ErrorDetails>(value: &(dyn Any + Send + Sync)) -> Result<Value, CodecError> {
    let value = value
        .downcast_ref::<T>()
        .ok_or(CodecError::DetailTypeMismatch {
            tag: T::TYPE_TAG,
            expected: type_name::<T>(),
        })?;
    serde_json::to_value(value).map_err(|source| CodecError::InvalidDetail {
        tag: T::TYPE_TAG.to_owned(),
        source,
    })
}

fn decode_as<T: ErrorDetails>(value: Value) -> Result<Arc<dyn Any + Send + Sync>, CodecError> {
    let value: T = serde_json::from_value(value).map_err(|source| CodecError::InvalidDetail {
        tag: T::TYPE_TAG.to_owned(),
        source,
    })?;
    Ok(Arc::new(value))
}

/// Collects registrations before the registry is frozen.
#[derive(Default)]
pub struct ErrorDetailsRegistryBuilder {
    codecs: HashMap<&'static str, DetailCodec>,
}

impl ErrorDetailsRegistryBuilder {
    /// Registers `T` under [`ErrorDetails::TYPE_TAG`].
    ///
    /// # Errors
    /// Returns [`RegistryError`] when the tag is empty or already taken.
    pub fn register<T: ErrorDetails>(mut self) -> Result<Self, RegistryError> {
        if T::TYPE_TAG.is_empty() {
            return Err(RegistryError::EmptyTag(type_name::<T>()));
        }
        if let Some(existing) = self.codecs.get(T::TYPE_TAG) {
            return Err(RegistryError::DuplicateTag {
                tag: T::TYPE_TAG,
                existing: existing.type_name,
            });
        }
        self.codecs.insert(
            T::TYPE_TAG,
            DetailCodec {
                type_name: type_name::<T>(),
                encode: encode_as::<T>,
                decode: decode_as::<T>,
            },
        );
        tracing::debug!(tag = T::TYPE_TAG, ty = type_name::<T>(), "registered error details");
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> ErrorDetailsRegistry {
        ErrorDetailsRegistry {
            codecs: Arc::new(self.codecs),
        }
    }
}

/// Frozen tag -> codec map.
#[derive(Clone, Default)]
pub struct ErrorDetailsRegistry {
    codecs: Arc<HashMap<&'static str, DetailCodec>>,
}

impl ErrorDetailsRegistry {
    #[must_use]
    pub fn builder() -> ErrorDetailsRegistryBuilder {
        ErrorDetailsRegistryBuilder::default()
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(tag)
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.codecs.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub(crate) fn encode(&self, detail: &TypedErrorDetail) -> Result<Value, CodecError> {
        let codec = self
            .codecs
            .get(detail.tag)
            .ok_or_else(|| CodecError::UnregisteredTag(detail.tag.to_owned()))?;
        (codec.encode)(detail.value.as_ref())
    }

    pub(crate) fn decode(&self, tag: &str, value: Value) -> Result<TypedErrorDetail, CodecError> {
        let (tag, codec) = self
            .codecs
            .get_key_value(tag)
            .ok_or_else(|| CodecError::UnknownTag(tag.to_owned()))?;
        Ok(TypedErrorDetail {
            tag: *tag,
            value: (codec.decode)(value)?,
        })
    }
}

impl fmt::Debug for ErrorDetailsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorDetailsRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quota {
        limit: u32,
    }

    impl ErrorDetails for Quota {
        const TYPE_TAG: &'static str = "quota";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct OtherQuota;

    impl ErrorDetails for OtherQuota {
        const TYPE_TAG: &'static str = "quota";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Untagged;

    impl ErrorDetails for Untagged {
        const TYPE_TAG: &'static str = "";
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let err = ErrorDetailsRegistry::builder()
            .register::<Quota>()
            .unwrap()
            .register::<OtherQuota>()
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::DuplicateTag { tag: "quota", .. }));
    }

    #[test]
    fn empty_tags_are_rejected() {
        let err = ErrorDetailsRegistry::builder()
            .register::<Untagged>()
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::EmptyTag(_)));
    }

    #[test]
    fn decoded_value_downcasts_to_registered_type() {
        let registry = ErrorDetailsRegistry::builder()
            .register::<Quota>()
            .unwrap()
            .build();
        let detail = registry
            .decode("quota", serde_json::json!({ "limit": 3 }))
            .unwrap();
        assert_eq!(detail.tag(), "quota");
        assert_eq!(detail.downcast_ref::<Quota>(), Some(&Quota { limit: 3 }));
    }

    #[test]
    fn unknown_tags_fail_both_ways() {
        let registry = ErrorDetailsRegistry::default();
        assert!(matches!(
            registry.decode("quota", Value::Null),
            Err(CodecError::UnknownTag(tag)) if tag == "quota"
        ));
        assert!(matches!(
            registry.encode(&TypedErrorDetail::new(Quota { limit: 1 })),
            Err(CodecError::UnregisteredTag(tag)) if tag == "quota"
        ));
    }
}
