//! Value codecs.
//!
//! A codec is a pure, stateless conversion between a value and its stored
//! bytes. Decoding must fail on payloads that do not fit the target type
//! instead of yielding a default value.

use crate::error::{CodecError, Error, Result};
use crate::key::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::str::FromStr;

pub trait Codec<V> {
    fn marshal(&self, value: &V) -> Result<Vec<u8>>;
    fn unmarshal(&self, data: &[u8]) -> Result<V>;
}

/// Self-describing JSON encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct Json;

/// Compact binary encoding, not self-describing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bincode;

/// Verbatim copy for byte-like values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Raw;

impl<V: Serialize + DeserializeOwned> Codec<V> for Json {
    fn marshal(&self, value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Encode(CodecError::Json(e)))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<V> {
        serde_json::from_slice(data).map_err(|e| Error::Decode(CodecError::Json(e)))
    }
}

impl<V: Serialize + DeserializeOwned> Codec<V> for Bincode {
    fn marshal(&self, value: &V) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| Error::Encode(CodecError::Bincode(e)))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<V> {
        bincode::deserialize(data).map_err(|e| Error::Decode(CodecError::Bincode(e)))
    }
}

impl<V: Bytes> Codec<V> for Raw {
    fn marshal(&self, value: &V) -> Result<Vec<u8>> {
        Ok(value.raw().to_vec())
    }

    fn unmarshal(&self, data: &[u8]) -> Result<V> {
        V::from_raw(data.to_vec())
    }
}

/// Serde codecs selectable at runtime.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum CodecKind {
    json,
    bincode,
}

impl Default for CodecKind {
    fn default() -> Self {
        CodecKind::json
    }
}

impl FromStr for CodecKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(CodecKind::json),
            "bincode" => Ok(CodecKind::bincode),
            _ => Err(Error::Config(format!("Invalid codec: {}", s))),
        }
    }
}

/// Codec chosen from configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyCodec(pub CodecKind);

impl<V: Serialize + DeserializeOwned> Codec<V> for AnyCodec {
    fn marshal(&self, value: &V) -> Result<Vec<u8>> {
        match self.0 {
            CodecKind::json => Json.marshal(value),
            CodecKind::bincode => Bincode.marshal(value),
        }
    }

    fn unmarshal(&self, data: &[u8]) -> Result<V> {
        match self.0 {
            CodecKind::json => Json.unmarshal(data),
            CodecKind::bincode => Bincode.unmarshal(data),
        }
    }
}
