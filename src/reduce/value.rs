//! Attribute value masking and large-blob truncation.
//!
//! Masking is decided by the attribute *type*, never by scanning the value:
//! if any token of a (possibly composite) type names a digest, the whole
//! value is replaced with a placeholder. Values that survive masking but
//! look like huge hex/base64 payloads are cut to a character limit.

use serde_json::Value;

/// Attribute types whose values are content digests.
const HASH_TYPES: [&str; 18] = [
    "md5", "sha1", "sha224", "sha256", "sha384", "sha512",
    "sha3", "sha3-224", "sha3-256", "sha3-384", "sha3-512",
    "imphash", "authentihash", "pehash", "vhash", "cdhash",
    "ssdeep", "tlsh",
];

const TRUNCATION_MARKER: char = '…';

/// Any string this long is a blob regardless of shape.
const BLOB_ANY_LEN: usize = 256;
/// All-hex strings this long are blobs (raw dumps, long digests).
const BLOB_HEX_LEN: usize = 40;
/// Base64-alphabet strings this long are blobs (embedded payloads).
const BLOB_BASE64_LEN: usize = 80;

/// First digest token of a composite type, lowercased: "filename|md5"
/// yields "md5". `None` when no token is hash-like.
fn first_hash_token(attr_type: &str) -> Option<String> {
    let lowered = attr_type.to_ascii_lowercase();
    lowered
        .split('|')
        .map(str::trim)
        .find(|tok| HASH_TYPES.contains(tok))
        .map(str::to_string)
}

fn is_large_blob(text: &str) -> bool {
    let len = text.chars().count();
    if len >= BLOB_ANY_LEN {
        return true;
    }
    if len >= BLOB_HEX_LEN && text.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    len >= BLOB_BASE64_LEN
        && text.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_ascii_whitespace()
        })
}

/// Cut to `limit` characters plus a marker; strings at or under the limit
/// pass unchanged. Counts characters, never bytes, so multi-byte text is
/// never split mid-character.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push(TRUNCATION_MARKER);
    cut
}

/// Normalize one attribute value:
/// - hash-like type: the ENTIRE value becomes `<token>` (e.g. `<sha256>`),
///   irreversibly; composite values are never substring-masked;
/// - large blob with truncation enabled: cut to `truncate_limit` characters
///   plus `…` (a limit of 0 disables truncation);
/// - anything else, and every non-string value, passes through unchanged.
pub fn normalize_value(attr_type: &str, value: &Value, truncate_limit: usize) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };

    if let Some(token) = first_hash_token(attr_type) {
        return Value::String(format!("<{}>", token));
    }

    if truncate_limit > 0 && is_large_blob(text) {
        return Value::String(truncate_chars(text, truncate_limit));
    }

    value.clone()
}
