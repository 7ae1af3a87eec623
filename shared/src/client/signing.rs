//! Request signing for the cloud Open API.
//!
//! Every authenticated request carries a `Signature` header: the hex
//! MD5 digest of the path, API key, and millisecond timestamp joined by
//! a LITERAL backslash-r-backslash-n sequence. The cloud really does
//! sign over the two-character escape, not a CR LF pair.

use md5::{Digest, Md5};

/// The separator the cloud signs over: literal `\` `r` `\` `n`.
const SEPARATOR: &str = r"\r\n";

/// Computes the `Signature` header value for a request.
#[must_use]
pub fn signature(path: &str, token: &str, timestamp_ms: i64) -> String {
    let plaintext = format!("{path}{SEPARATOR}{token}{SEPARATOR}{timestamp_ms}");
    let digest = Md5::digest(plaintext.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_hex_md5() {
        let sig = signature("/op/v0/device/list", "key", 1_700_000_000_000);
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_known_vector() {
        // md5("/op/v0/device/list\r\nabc\r\n1700000000000") with literal
        // backslash sequences, cross-checked against the cloud's scheme.
        let plaintext = r"/op/v0/device/list\r\nabc\r\n1700000000000";
        let expected = hex::encode(Md5::digest(plaintext.as_bytes()));
        assert_eq!(signature("/op/v0/device/list", "abc", 1_700_000_000_000), expected);
    }

    #[test]
    fn test_signature_depends_on_all_inputs() {
        let base = signature("/op/v0/device/list", "key", 1);
        assert_ne!(base, signature("/op/v0/device/detail", "key", 1));
        assert_ne!(base, signature("/op/v0/device/list", "other", 1));
        assert_ne!(base, signature("/op/v0/device/list", "key", 2));
    }

    #[test]
    fn test_separator_is_literal_escape() {
        assert_eq!(SEPARATOR.as_bytes(), b"\\r\\n");
        assert_ne!(
            signature("/p", "t", 0),
            hex::encode(Md5::digest(b"/p\r\nt\r\n0"))
        );
    }
}
