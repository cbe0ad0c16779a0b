//! Wire codec for every record crossing the broker.
//!
//! Records are encoded as MessagePack maps (field names carried in the
//! payload) and compressed with zstd. Map encoding is what makes the
//! compatibility rule hold: a field added at the record tail with
//! `#[serde(default)]` is simply absent from older payloads.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FabricError;

/// zstd level balancing ratio against encode cost.
pub const COMPRESS_LEVEL_TRADEOFF: i32 = 3;

/// Encode a record: MessagePack map, then zstd.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, FabricError> {
    let raw = rmp_serde::to_vec_named(value)?;
    Ok(zstd::encode_all(raw.as_slice(), COMPRESS_LEVEL_TRADEOFF)?)
}

/// Decode a record produced by [`encode`].
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, FabricError> {
    let raw = zstd::decode_all(data)?;
    Ok(rmp_serde::from_slice(&raw)?)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct RecordV1 {
        name: String,
        count: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct RecordV2 {
        name: String,
        count: u32,
        #[serde(default)]
        note: String,
    }

    #[test]
    fn roundtrip_is_identity() {
        let value = RecordV1 {
            name: "default".into(),
            count: 7,
        };
        let decoded: RecordV1 = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn tail_field_with_default_decodes_old_payloads() {
        let old = RecordV1 {
            name: "default".into(),
            count: 7,
        };
        let bytes = encode(&old).unwrap();

        let new: RecordV2 = decode(&bytes).unwrap();
        assert_eq!(new.name, "default");
        assert_eq!(new.count, 7);
        assert_eq!(new.note, "");
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let result: Result<RecordV1, _> = decode(b"not a payload");
        assert!(result.is_err());
    }
}
