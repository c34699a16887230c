//! Shared utilities.

pub mod codec;

pub use codec::{decode_value, encode_value, JsonCodec, PayloadCodec};
