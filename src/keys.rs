//! Lookup key derivation.
//!
//! Translations are stored under either the raw label or a fixed-length hash
//! of it. Hashed keys keep arbitrary label text (punctuation, slashes, very
//! long sentences) out of store paths. The mode is fixed for the lifetime of a
//! session because switching it would orphan every stored translation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length in characters of a hashed lookup key.
pub const HASHED_KEY_LEN: usize = 64;

/// How labels map to lookup keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// The label is its own key
    #[default]
    Plain,
    /// The key is `derive_hashed_key(label)`
    Hashed,
}

impl KeyMode {
    pub fn from_flag(use_hashed_keys: bool) -> Self {
        if use_hashed_keys {
            KeyMode::Hashed
        } else {
            KeyMode::Plain
        }
    }
}

/// Derive the hashed key for a label: lowercase hex SHA-256 of its UTF-8 bytes.
pub fn derive_hashed_key(label: &str) -> String {
    hex::encode(Sha256::digest(label.as_bytes()))
}

/// Compute the key a label is stored under in the given mode.
pub fn lookup_key(mode: KeyMode, label: &str) -> String {
    match mode {
        KeyMode::Plain => label.to_string(),
        KeyMode::Hashed => derive_hashed_key(label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_key_is_identity() {
        assert_eq!(lookup_key(KeyMode::Plain, "Hello"), "Hello");
    }

    #[test]
    fn test_hashed_key_known_vector() {
        // sha256("Hello")
        assert_eq!(
            derive_hashed_key("Hello"),
            "185f8db32271fe25f561a6fc938b2e264306ec304eda518007d1764826381969"
        );
    }

    #[test]
    fn test_hashed_key_differs_from_label() {
        let key = lookup_key(KeyMode::Hashed, "Hello");
        assert_ne!(key, "Hello");
        assert_eq!(key.len(), HASHED_KEY_LEN);
    }

    #[test]
    fn test_from_flag() {
        assert_eq!(KeyMode::from_flag(true), KeyMode::Hashed);
        assert_eq!(KeyMode::from_flag(false), KeyMode::Plain);
        assert_eq!(KeyMode::default(), KeyMode::Plain);
    }

    proptest! {
        #[test]
        fn prop_hashed_key_is_fixed_length_hex(label in ".*") {
            let key = derive_hashed_key(&label);
            prop_assert_eq!(key.len(), HASHED_KEY_LEN);
            prop_assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        #[test]
        fn prop_hashed_key_is_deterministic(label in ".*") {
            prop_assert_eq!(derive_hashed_key(&label), derive_hashed_key(&label));
        }

        #[test]
        fn prop_hashed_key_never_contains_path_separator(label in ".*") {
            prop_assert!(!derive_hashed_key(&label).contains('/'));
        }
    }
}
