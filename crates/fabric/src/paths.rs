//! Canonical broker key names and the single-byte key codec.
//!
//! Every queue and pub/sub channel lives under the `/osom/api` root.
//! Subscription channel identity must compare equal to the literal key
//! bytes, so keys are encoded one byte per character (Latin-1 style)
//! rather than re-encoded as UTF-8.

use crate::error::FabricError;

pub const PATH_SEPARATOR: char = '/';

pub const ROOT_PATH: &str = "/osom/api";
pub const REQUEST_PATH: &str = "/osom/api/request";
pub const RESPONSE_PATH: &str = "/osom/api/response";
pub const BROADCAST_PATH: &str = "/osom/api/broadcast";
pub const REGISTER_PATH: &str = "/osom/api/register";
pub const REGISTER_WORKER_PATH: &str = "/osom/api/register/worker";
pub const REGISTER_WORKER_REQUEST_PATH: &str = "/osom/api/register/worker/request";
pub const UNREGISTER_PATH: &str = "/osom/api/unregister";
pub const UNREGISTER_WORKER_PATH: &str = "/osom/api/unregister/worker";

/// Join path fragments, collapsing duplicate separators at the joints.
pub fn join_path(paths: &[&str]) -> String {
    let mut result = String::from(PATH_SEPARATOR);
    for path in paths {
        if path.is_empty() {
            continue;
        }
        match (result.ends_with(PATH_SEPARATOR), path.starts_with(PATH_SEPARATOR)) {
            (true, true) => result.push_str(&path[1..]),
            (false, false) => {
                result.push(PATH_SEPARATOR);
                result.push_str(path);
            }
            _ => result.push_str(path),
        }
    }
    result
}

/// Request queue key for a worker name: `/osom/api/request/{name}`.
pub fn make_request_path(worker: &str) -> String {
    join_path(&[REQUEST_PATH, worker])
}

/// Response queue key for a message: `/osom/api/response/{msg_uuid}`.
pub fn make_response_path(msg_uuid: &str) -> String {
    join_path(&[RESPONSE_PATH, msg_uuid])
}

/// Encode a key one byte per character.
///
/// Characters above U+00FF cannot appear in broker keys; hitting one is a
/// programming error surfaced as [`FabricError::Path`].
pub fn encode_path(path: &str) -> Result<Vec<u8>, FabricError> {
    path.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                Ok(code as u8)
            } else {
                Err(FabricError::Path(format!(
                    "non single-byte character {c:?} in key {path:?}"
                )))
            }
        })
        .collect()
}

/// Inverse of [`encode_path`]: every byte maps back to the same character.
pub fn decode_path(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
