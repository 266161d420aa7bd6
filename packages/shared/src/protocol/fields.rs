//! NUL-terminated text fields inside a single payload.

use super::error::{ProtocolError, Result};

/// Concatenate `fields`, each followed by a NUL terminator.
///
/// A field that itself contains NUL would be split on decode, so it is refused.
pub fn encode_fields<I, S>(fields: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut payload = Vec::new();
    for field in fields {
        let bytes = field.as_ref().as_bytes();
        if bytes.contains(&0) {
            return Err(ProtocolError::EmbeddedNul);
        }
        payload.extend_from_slice(bytes);
        payload.push(0);
    }
    Ok(payload)
}

/// Split a payload into its text fields.
///
/// The last field may omit its terminator. An empty payload has no fields.
pub fn decode_fields(payload: &[u8]) -> Result<Vec<String>> {
    let body = payload.strip_suffix(&[0u8]).unwrap_or(payload);
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    body.split(|b| *b == 0)
        .map(|raw| {
            std::str::from_utf8(raw)
                .map(str::to_owned)
                .map_err(|_| ProtocolError::InvalidText)
        })
        .collect()
}
