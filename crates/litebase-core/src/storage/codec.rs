//! Snapshot serialization and file compression.
//!
//! Both steps are swappable: [`SnapshotCodec`] turns a [`Snapshot`] into bytes
//! and back, [`Compression`] wraps those bytes on their way to disk.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

use super::snapshot::Snapshot;

/// Converts a snapshot to and from its byte form.
pub trait SnapshotCodec: Send + Sync {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, StorageError>;
    fn decode(&self, bytes: &[u8]) -> Result<Snapshot, StorageError>;
}

/// MessagePack with named struct fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl SnapshotCodec for MessagePackCodec {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, StorageError> {
        rmp_serde::to_vec_named(snapshot).map_err(|e| StorageError::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot, StorageError> {
        rmp_serde::from_slice(bytes).map_err(|e| StorageError::CorruptFile(e.to_string()))
    }
}

/// Compression applied to the whole encoded snapshot.
///
/// Deserializes from its name (`"none"`, `"deflate"`) or from a bool, where
/// `true` means deflate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "CompressionSetting")]
pub enum Compression {
    #[default]
    None,
    /// zlib-wrapped deflate.
    Deflate,
}

impl Compression {
    pub fn compress(self, data: Vec<u8>) -> Result<Vec<u8>, StorageError> {
        match self {
            Compression::None => Ok(data),
            Compression::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    pub fn decompress(self, data: Vec<u8>) -> Result<Vec<u8>, StorageError> {
        match self {
            Compression::None => Ok(data),
            Compression::Deflate => {
                let mut out = Vec::new();
                ZlibDecoder::new(data.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|e| StorageError::CorruptFile(format!("inflate failed: {e}")))?;
                Ok(out)
            }
        }
    }
}

impl From<bool> for Compression {
    fn from(compress: bool) -> Self {
        if compress {
            Compression::Deflate
        } else {
            Compression::None
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CompressionSetting {
    Flag(bool),
    Name(String),
}

impl TryFrom<CompressionSetting> for Compression {
    type Error = String;

    fn try_from(setting: CompressionSetting) -> Result<Self, Self::Error> {
        match setting {
            CompressionSetting::Flag(compress) => Ok(compress.into()),
            CompressionSetting::Name(name) => match name.as_str() {
                "none" => Ok(Compression::None),
                "deflate" => Ok(Compression::Deflate),
                other => Err(format!("unknown compression \"{other}\"")),
            },
        }
    }
}
