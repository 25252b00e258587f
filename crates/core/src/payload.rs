//! Typed payload envelope and type registry
//!
//! Every trait stores its value as a [`TypedPayload`]: a canonical type tag
//! plus the value's encoded bytes. Decoding is always explicit: the caller
//! names the Rust type it expects (`unpack::<T>`), or branches on the tag
//! first (`is::<T>`). Nothing inspects a decoded value to pick behavior.
//!
//! ## Registry
//!
//! A [`TypeRegistry`] maps canonical type names to [`Codec`]s. It is built
//! once at startup (`&mut self` registration) and then shared read-only,
//! typically behind an `Arc`, so concurrent lookups need no locking.
//!
//! ## Canonical tags
//!
//! Transports may decorate type tags with a prefix ending in `/`
//! (e.g. `type.example.com/notes.Note`). [`canonicalize`] strips it and is
//! idempotent.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tessera_core::{TraitType, TypeRegistry, TypedPayload};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Note { title: String }
//!
//! impl TraitType for Note {
//!     const TYPE_NAME: &'static str = "notes.Note";
//! }
//!
//! let registry = TypeRegistry::new().with_type::<Note>();
//! let payload = TypedPayload::pack(&Note { title: "hi".into() }, &registry).unwrap();
//! assert!(payload.is::<Note>());
//! let note: Note = payload.unpack(&registry).unwrap();
//! assert_eq!(note.title, "hi");
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// Type names
// ============================================================================

/// A Rust type that can be stored as a trait payload
pub trait TraitType: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Canonical, registry-resolvable type name (no transport prefix)
    const TYPE_NAME: &'static str;
}

/// Strip any transport prefix from a type tag
///
/// Returns the part after the last `/`, trimmed. Idempotent:
/// `canonicalize(&canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(type_tag: &str) -> String {
    let trimmed = type_tag.trim();
    let name = match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    };
    name.trim().to_string()
}

// ============================================================================
// Codec
// ============================================================================

/// Encoder/decoder for one registered type
///
/// Object-safe so a registry can hold codecs for unrelated types. Besides
/// typed encode/decode, a codec projects payload bytes into a
/// self-describing document, which engines use to evaluate field, text and
/// reference predicates without knowing the Rust type.
pub trait Codec: Send + Sync {
    /// Canonical name of the type this codec handles
    fn type_name(&self) -> &str;

    /// `TypeId` of the Rust value produced by [`Codec::decode`]
    fn value_type_id(&self) -> TypeId;

    /// Encode a value; fails if `value` is not of this codec's type
    fn encode(&self, value: &dyn Any) -> Result<Vec<u8>>;

    /// Decode bytes into a boxed value of this codec's type
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>>;

    /// Project encoded bytes into a JSON document
    fn to_document(&self, bytes: &[u8]) -> Result<serde_json::Value>;

    /// Encode a JSON document, validating it against this codec's type
    fn from_document(&self, document: &serde_json::Value) -> Result<Vec<u8>>;
}

/// MessagePack codec (named fields) for a [`TraitType`]
pub struct MsgPackCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> MsgPackCodec<T> {
    /// Create a codec for `T`
    pub fn new() -> Self {
        MsgPackCodec {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for MsgPackCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TraitType> Codec for MsgPackCodec<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn encode(&self, value: &dyn Any) -> Result<Vec<u8>> {
        let value = value.downcast_ref::<T>().ok_or_else(|| {
            Error::Serialization(format!("value is not a {}", T::TYPE_NAME))
        })?;
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
        let value: T = rmp_serde::from_slice(bytes)?;
        Ok(Box::new(value))
    }

    fn to_document(&self, bytes: &[u8]) -> Result<serde_json::Value> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn from_document(&self, document: &serde_json::Value) -> Result<Vec<u8>> {
        let value: T = serde_json::from_value(document.clone()).map_err(|e| {
            Error::DecodeError(format!("document is not a {}: {}", T::TYPE_NAME, e))
        })?;
        Ok(rmp_serde::to_vec_named(&value)?)
    }
}

// ============================================================================
// TypeRegistry
// ============================================================================

/// Canonical type name → codec lookup table
#[derive(Clone, Default)]
pub struct TypeRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` with a MessagePack codec
    pub fn register<T: TraitType>(&mut self) -> &mut Self {
        self.register_codec(T::TYPE_NAME, Arc::new(MsgPackCodec::<T>::new()))
    }

    /// Builder: register `T` with a MessagePack codec
    pub fn with_type<T: TraitType>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Register an arbitrary codec under `type_name`
    ///
    /// The name is canonicalized. Registering a name twice replaces the codec.
    pub fn register_codec(&mut self, type_name: &str, codec: Arc<dyn Codec>) -> &mut Self {
        self.codecs.insert(canonicalize(type_name), codec);
        self
    }

    /// Resolve the codec for a (possibly prefixed) type tag
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredType` if no codec is registered under the canonical tag.
    pub fn resolve(&self, type_tag: &str) -> Result<&Arc<dyn Codec>> {
        let name = canonicalize(type_tag);
        self.codecs
            .get(&name)
            .ok_or(Error::UnregisteredType(name))
    }

    /// Check whether a type tag resolves
    pub fn contains(&self, type_tag: &str) -> bool {
        self.codecs.contains_key(&canonicalize(type_tag))
    }

    /// Registered canonical type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Check if no types are registered
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

// ============================================================================
// TypedPayload
// ============================================================================

/// Immutable `{type_tag, bytes}` envelope around an encoded value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "WirePayload")]
pub struct TypedPayload {
    type_tag: String,
    bytes: Vec<u8>,
}

/// Envelope as received, tag not yet canonical
#[derive(Deserialize)]
struct WirePayload {
    type_tag: String,
    bytes: Vec<u8>,
}

impl From<WirePayload> for TypedPayload {
    fn from(wire: WirePayload) -> Self {
        TypedPayload::from_parts(&wire.type_tag, wire.bytes)
    }
}

impl TypedPayload {
    /// Encode `value` with its registered codec
    ///
    /// # Errors
    ///
    /// - `UnregisteredType` if `T::TYPE_NAME` has no codec
    /// - `Serialization` if the codec rejects the value
    pub fn pack<T: TraitType>(value: &T, registry: &TypeRegistry) -> Result<Self> {
        let codec = registry.resolve(T::TYPE_NAME)?;
        let bytes = codec.encode(value)?;
        Ok(TypedPayload {
            type_tag: canonicalize(T::TYPE_NAME),
            bytes,
        })
    }

    /// Build an envelope from raw parts received over a transport
    ///
    /// The tag is canonicalized; the bytes are not validated until unpacked.
    pub fn from_parts(type_tag: &str, bytes: Vec<u8>) -> Self {
        TypedPayload {
            type_tag: canonicalize(type_tag),
            bytes,
        }
    }

    /// Decode the payload as `T`
    ///
    /// # Errors
    ///
    /// - `UnregisteredType` if the tag has no codec
    /// - `DecodeError` if the bytes do not parse, or the tag decodes to a type other than `T`
    pub fn unpack<T: TraitType>(&self, registry: &TypeRegistry) -> Result<T> {
        let codec = registry.resolve(&self.type_tag)?;
        if codec.value_type_id() != TypeId::of::<T>() {
            return Err(Error::DecodeError(format!(
                "payload of type {} cannot be decoded as {}",
                self.type_tag,
                T::TYPE_NAME
            )));
        }
        let value = codec.decode(&self.bytes)?;
        value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            Error::DecodeError(format!(
                "codec for {} produced an unexpected type",
                self.type_tag
            ))
        })
    }

    /// Project the payload into a JSON document using its registered codec
    pub fn to_document(&self, registry: &TypeRegistry) -> Result<serde_json::Value> {
        registry.resolve(&self.type_tag)?.to_document(&self.bytes)
    }

    /// Check whether the payload carries a `T`
    pub fn is<T: TraitType>(&self) -> bool {
        self.type_tag == canonicalize(T::TYPE_NAME)
    }

    /// Canonical type tag
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Encoded bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
