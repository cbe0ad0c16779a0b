use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provider::MsgProvider;

/// A file attached to a request or response.
///
/// `content` is carried in transit only; after upload the blob store is
/// canonical and the in-memory copy is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgFile {
    pub file_uuid: String,
    pub provider: MsgProvider,
    /// Provider-native identifier (e.g. a Telegram file id).
    pub native_id: Option<String>,
    pub name: Option<String>,
    #[serde(with = "opt_bytes")]
    pub content: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl MsgFile {
    pub fn new(provider: MsgProvider, name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_uuid: Uuid::new_v4().to_string(),
            provider,
            native_id: None,
            name: Some(name.into()),
            content: Some(content),
            content_type: None,
            width: None,
            height: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Drop the in-transit bytes once the blob store holds them.
    pub fn without_content(mut self) -> Self {
        self.content = None;
        self
    }
}

/// Serialize `Option<Vec<u8>>` as MessagePack bin instead of an int array.
mod opt_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&serde_bytes_shim::Wrapper(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let buf: Option<serde_bytes_shim::Buf> = Deserialize::deserialize(d)?;
        Ok(buf.map(|b| b.0))
    }

    mod serde_bytes_shim {
        use serde::de::{self, Visitor};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub struct Wrapper<'a>(pub &'a [u8]);

        impl Serialize for Wrapper<'_> {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_bytes(self.0)
            }
        }

        pub struct Buf(pub Vec<u8>);

        impl<'de> Deserialize<'de> for Buf {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                struct BytesVisitor;

                impl<'de> Visitor<'de> for BytesVisitor {
                    type Value = Buf;

                    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                        f.write_str("byte buffer")
                    }

                    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Buf, E> {
                        Ok(Buf(v.to_vec()))
                    }

                    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Buf, E> {
                        Ok(Buf(v))
                    }

                    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Buf, A::Error> {
                        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                        while let Some(b) = seq.next_element::<u8>()? {
                            out.push(b);
                        }
                        Ok(Buf(out))
                    }
                }

                d.deserialize_byte_buf(BytesVisitor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    #[test]
    fn file_content_roundtrip() {
        let file = MsgFile::new(MsgProvider::Telegram, "photo.png", vec![0u8, 1, 2, 255]);
        let decoded: MsgFile = decode(&encode(&file).unwrap()).unwrap();
        assert_eq!(decoded, file);
    }

    #[test]
    fn without_content_clears_bytes_only() {
        let file = MsgFile::new(MsgProvider::Discord, "a.txt", vec![1, 2, 3]);
        let uuid = file.file_uuid.clone();
        let stripped = file.without_content();
        assert!(!stripped.has_content());
        assert_eq!(stripped.file_uuid, uuid);
        assert_eq!(stripped.name.as_deref(), Some("a.txt"));
    }
}
