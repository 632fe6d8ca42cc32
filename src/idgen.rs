//! Deterministic resource identifiers.
//!
//! Downstream FHIR records were originally populated by a JVM service using
//! `UUID.nameUUIDFromBytes`, which hashes the input with MD5 and stamps the
//! version/variant bits directly onto the digest — no namespace is mixed in
//! beforehand, unlike RFC 4122 v3/v5. `uuid::Builder::from_md5_bytes` is the
//! byte-for-byte equivalent, so we use it here rather than `Uuid::new_v3`
//! (which would prepend a namespace and produce different IDs for the same
//! source record).

use uuid::Uuid;

/// Deterministic, lower-case UUID derived from `bytes`. Same input always
/// yields the same UUID, matching Java's `UUID.nameUUIDFromBytes`.
pub fn name_uuid(bytes: &[u8]) -> Uuid {
    let digest = md5::compute(bytes);
    Uuid::from_bytes(uuid::Builder::from_md5_bytes(*digest).into_bytes())
}

/// Convenience wrapper for the common case of hashing a UTF-8 string.
pub fn name_uuid_str(value: &str) -> Uuid {
    name_uuid(value.as_bytes())
}

/// A fresh random UUID, used when no stable source identifier is available.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_id() {
        let a = name_uuid_str("12345");
        let b = name_uuid_str("12345");
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_yields_different_id() {
        assert_ne!(name_uuid_str("12345"), name_uuid_str("67890"));
    }

    #[test]
    fn id_is_lowercase_hex() {
        let id = name_uuid_str("12345").to_string();
        assert_eq!(id, id.to_lowercase());
        assert_eq!(id.len(), 36);
    }
}
