//! JSON Codec using `serde_json`

use crate::error::StoreError;
use crate::traits::CacheCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON Codec using `serde_json`
///
/// Default codec for every byte-oriented store. Human-readable on disk and
/// in `redis-cli`, which helps when inspecting a backlog by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "serde_json"
    }
}
