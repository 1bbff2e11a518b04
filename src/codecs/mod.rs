//! Record Codec Implementations
//!
//! Built-in implementations of the [`CacheCodec`](crate::traits::CacheCodec) trait,
//! used by byte-oriented stores (Redis, local files) to encode records.

mod json;
pub use json::JsonCodec;

#[cfg(feature = "msgpack")]
mod msgpack;
#[cfg(feature = "msgpack")]
#[cfg_attr(docsrs, doc(cfg(feature = "msgpack")))]
pub use msgpack::MsgPackCodec;
