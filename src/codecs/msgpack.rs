//! MessagePack Codec using `rmp-serde`

use crate::error::StoreError;
use crate::traits::CacheCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// MessagePack Codec using `rmp-serde`
///
/// Compact binary encoding. Unlike non-self-describing formats it can
/// round-trip [`Payload::Document`](crate::Payload::Document) values, since
/// arbitrary JSON needs `deserialize_any`.
///
/// Records are written with named fields (`to_vec_named`) so that adding a
/// field to [`Record`](crate::Record) does not break stored entries.
#[cfg_attr(docsrs, doc(cfg(feature = "msgpack")))]
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCodec;

impl CacheCodec for MsgPackCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        rmp_serde::to_vec_named(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "msgpack"
    }
}
