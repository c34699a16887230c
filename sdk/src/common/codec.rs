//! Payload codec
//!
//! Workflow inputs, activity arguments and results travel as opaque bytes.
//! The codec is the only place they are interpreted, and the engine and
//! context only use it at their boundaries.

use crate::error::{CadenceError, Result};
use cadence_core::Payload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Converts argument lists to and from payload bytes.
pub trait PayloadCodec: Send + Sync + fmt::Debug {
    fn encode(&self, values: &[Value]) -> Result<Payload>;

    fn decode(&self, payload: &[u8]) -> Result<Vec<Value>>;
}

/// Encodes argument lists as a JSON array.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode(&self, values: &[Value]) -> Result<Payload> {
        Ok(serde_json::to_vec(values)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<Value>> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_slice(payload)? {
            Value::Array(values) => Ok(values),
            other => Ok(vec![other]),
        }
    }
}

/// Encode a single value as a one-element argument list.
pub fn encode_value<T: Serialize + ?Sized>(codec: &dyn PayloadCodec, value: &T) -> Result<Payload> {
    let value = serde_json::to_value(value)?;
    codec.encode(std::slice::from_ref(&value))
}

/// Decode a payload into `T`.
///
/// An absent or empty payload decodes from `null`, a single argument from
/// itself, and several arguments from the array holding them.
pub fn decode_value<T: DeserializeOwned>(
    codec: &dyn PayloadCodec,
    payload: Option<&[u8]>,
) -> Result<T> {
    let mut values = match payload {
        Some(bytes) => codec.decode(bytes)?,
        None => Vec::new(),
    };
    let value = match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    };
    serde_json::from_value(value)
        .map_err(|e| CadenceError::Codec(format!("cannot decode payload: {}", e)))
}
