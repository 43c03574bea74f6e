//! Encoder Module
//!
//! Pluggable value serialization. The engine only ever stores and
//! retrieves opaque byte strings; the encoder turns caller values into
//! those bytes and back.

use serde::de::DeserializeOwned;
use serde::Serialize;

// == Encode Error ==
/// Boxed error type produced by encoder implementations.
pub type EncodeError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Encoder Trait ==
/// Converts values to and from the opaque bytes persisted by the store.
pub trait Encoder<V> {
    /// Serializes a value into bytes.
    fn encode(&self, value: &V) -> Result<Vec<u8>, EncodeError>;

    /// Deserializes bytes back into a value.
    fn decode(&self, buf: &[u8]) -> Result<V, EncodeError>;
}

// == Json Encoder ==
/// Default encoder: generic structured-data serialization via JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl<V> Encoder<V> for JsonEncoder
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(value).map_err(Into::into)
    }

    fn decode(&self, buf: &[u8]) -> Result<V, EncodeError> {
        serde_json::from_slice(buf).map_err(Into::into)
    }
}
