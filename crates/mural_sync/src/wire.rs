//! Message body framing.
//!
//! | Message                   | Body                                        |
//! |---------------------------|---------------------------------------------|
//! | `ResourceTransfer`        | `[name_len: u64 LE][name bytes][payload]`   |
//! | `ResourceRequest`         | raw UTF-8 name, empty for bulk requests     |
//! | `ResourceReleaseTransfer` | raw UTF-8 name                              |

use mural_core::ProtocolViolation;

const NAME_LEN_BYTES: usize = std::mem::size_of::<u64>();

/// Frames a ResourceTransfer body.
#[must_use]
pub fn encode_transfer(name: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(NAME_LEN_BYTES + name.len() + payload.len());
    body.extend_from_slice(&(name.len() as u64).to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    body.extend_from_slice(payload);
    body
}

/// Splits a ResourceTransfer body into name and payload.
pub fn decode_transfer(body: &[u8], max_name_length: usize) -> Result<(&str, &[u8]), ProtocolViolation> {
    let Some((len_bytes, rest)) = body.split_first_chunk::<NAME_LEN_BYTES>() else {
        return Err(ProtocolViolation::MalformedTransfer {
            len: body.len(),
            reason: "shorter than the name length prefix",
        });
    };

    let name_len = u64::from_le_bytes(*len_bytes);
    let name_len = usize::try_from(name_len)
        .ok()
        .filter(|len| *len <= rest.len())
        .ok_or(ProtocolViolation::MalformedTransfer {
            len: body.len(),
            reason: "name length exceeds the message body",
        })?;

    let (name_bytes, payload) = rest.split_at(name_len);
    let name = decode_name(name_bytes, max_name_length)?;
    if name.is_empty() {
        return Err(ProtocolViolation::InvalidResourceName { reason: "empty" });
    }
    Ok((name, payload))
}

/// Validates a raw name body. Empty names are allowed here; callers decide
/// whether they mean "everything".
pub fn decode_name(bytes: &[u8], max_name_length: usize) -> Result<&str, ProtocolViolation> {
    if bytes.len() > max_name_length {
        return Err(ProtocolViolation::InvalidResourceName { reason: "too long" });
    }
    std::str::from_utf8(bytes).map_err(|_| ProtocolViolation::InvalidResourceName {
        reason: "not valid UTF-8",
    })
}
