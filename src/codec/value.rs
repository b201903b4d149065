//! Value Codec
//!
//! Serializes values to JSON payloads, optionally gzip-compressed.

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

/// Leading bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// == Value Codec ==
/// Stateless transform between values and stored bytes.
///
/// Decoding recognises gzip payloads by their magic bytes, so entries written
/// with compression on stay readable after it is switched off (and the other
/// way round).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec {
    compression: bool,
}

impl ValueCodec {
    pub fn new(compression: bool) -> Self {
        Self { compression }
    }

    // == Encode ==
    /// Encodes a value.
    ///
    /// Values serde_json cannot represent fail with `UnsupportedValue`.
    pub fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value).map_err(|e| {
            CacheError::UnsupportedValue(format!(
                "value of type '{}' is not serializable: {}",
                std::any::type_name::<V>(),
                e
            ))
        })?;

        if !self.compression {
            return Ok(json);
        }

        let compress_failed =
            |e: std::io::Error| CacheError::Codec(format!("impossible to compress value: {}", e));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json).map_err(compress_failed)?;
        encoder.finish().map_err(compress_failed)
    }

    // == Decode ==
    /// Decodes a payload produced by [`encode`](Self::encode).
    pub fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        if bytes.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(|e| CacheError::Codec(format!("impossible to decompress value: {}", e)))?;
            return Self::from_json(&json);
        }
        Self::from_json(bytes)
    }

    fn from_json<V: DeserializeOwned>(json: &[u8]) -> Result<V> {
        serde_json::from_slice(json).map_err(|e| {
            CacheError::Codec(format!(
                "stored payload is not a valid '{}': {}",
                std::any::type_name::<V>(),
                e
            ))
        })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};

    #[test]
    fn test_plain_payload_is_json() {
        let codec = ValueCodec::new(false);
        let bytes = codec.encode(&vec![1, 2, 3]).unwrap();
        assert_eq!(bytes, b"[1,2,3]");
        assert_eq!(codec.decode::<Vec<i32>>(&bytes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_compressed_payload() {
        let codec = ValueCodec::new(true);
        let value = "repetitive ".repeat(200);
        let bytes = codec.encode(&value).unwrap();

        assert!(bytes.starts_with(&GZIP_MAGIC));
        assert!(bytes.len() < value.len());
        assert_eq!(codec.decode::<String>(&bytes).unwrap(), value);
    }

    #[test]
    fn test_decode_ignores_compression_setting() {
        let set: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        let compressed = ValueCodec::new(true).encode(&set).unwrap();
        let plain = ValueCodec::new(false).encode(&set).unwrap();

        assert_eq!(ValueCodec::new(false).decode::<BTreeSet<String>>(&compressed).unwrap(), set);
        assert_eq!(ValueCodec::new(true).decode::<BTreeSet<String>>(&plain).unwrap(), set);
    }

    #[test]
    fn test_unsupported_value() {
        let mut value = HashMap::new();
        value.insert((1u8, 2u8), "tuple keys are not JSON object keys");

        let result = ValueCodec::new(false).encode(&value);
        assert!(matches!(result, Err(CacheError::UnsupportedValue(_))));
    }

    #[test]
    fn test_corrupt_gzip_is_codec_error() {
        let result = ValueCodec::new(true).decode::<String>(&[0x1f, 0x8b, 0x00, 0x01]);
        assert!(matches!(result, Err(CacheError::Codec(_))));
    }

    #[test]
    fn test_type_mismatch_is_codec_error() {
        let codec = ValueCodec::new(false);
        let bytes = codec.encode("text").unwrap();
        assert!(matches!(codec.decode::<u64>(&bytes), Err(CacheError::Codec(_))));
    }
}
