//! Common helper functions for Tapcast.

use rand::Rng;

/// Characters used for generated device ids. Uppercase-only keeps the id
/// easy to read aloud over a call.
const DEVICE_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated device ids.
pub const DEVICE_ID_LEN: usize = 6;

/// Maximum accepted length for a device id on the wire.
pub const MAX_DEVICE_ID_LEN: usize = 32;

/// Generate a short, human-shareable device id.
///
/// Ids are not persisted and carry no uniqueness guarantee beyond the
/// relay's last-write-wins registration.
pub fn generate_device_id() -> String {
    let mut rng = rand::thread_rng();
    (0..DEVICE_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..DEVICE_ID_ALPHABET.len());
            DEVICE_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Check that a device id is usable on the wire: non-empty, bounded, and
/// limited to ASCII alphanumerics and dashes.
pub fn is_valid_device_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_DEVICE_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_valid() {
        for _ in 0..100 {
            let id = generate_device_id();
            assert_eq!(id.len(), DEVICE_ID_LEN);
            assert!(is_valid_device_id(&id), "generated invalid id: {}", id);
        }
    }

    #[test]
    fn test_valid_device_ids() {
        assert!(is_valid_device_id("h1"));
        assert!(is_valid_device_id("AB12CD"));
        assert!(is_valid_device_id("my-phone-2"));
    }

    #[test]
    fn test_invalid_device_ids() {
        assert!(!is_valid_device_id(""));
        assert!(!is_valid_device_id("has space"));
        assert!(!is_valid_device_id("emoji\u{1F389}"));
        assert!(!is_valid_device_id(&"x".repeat(MAX_DEVICE_ID_LEN + 1)));
    }
}
