//! Language registry: the static catalog of languages an app supports.
//!
//! The registry is supplied by the host application when the session is
//! created and is never mutated afterwards. The session only uses it as the
//! fan-out target for auto-registration and exposes it to consumers for
//! building language pickers.

use serde::{Deserialize, Serialize};

/// A supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDescriptor {
    /// Human readable name (e.g., "English", "Français")
    pub name: String,

    /// Short code used in store paths (e.g., "en", "fr")
    pub short_code: String,
}

impl LanguageDescriptor {
    pub fn new(name: impl Into<String>, short_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_code: short_code.into(),
        }
    }

    /// Parse a `Name:code` pair.
    ///
    /// # Returns
    /// * `Some(LanguageDescriptor)` if both sides are non-empty
    /// * `None` otherwise
    pub fn parse_pair(pair: &str) -> Option<Self> {
        let (name, code) = pair.split_once(':')?;
        let (name, code) = (name.trim(), code.trim());
        if name.is_empty() || code.is_empty() {
            return None;
        }
        Some(Self::new(name, code))
    }
}

/// Ordered, immutable list of supported languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageRegistry {
    languages: Vec<LanguageDescriptor>,
}

impl LanguageRegistry {
    pub fn new(languages: Vec<LanguageDescriptor>) -> Self {
        Self { languages }
    }

    /// Parse a comma separated list of `Name:code` pairs.
    ///
    /// Malformed entries are skipped. An input with no valid entry yields
    /// the default registry.
    pub fn parse_list(input: &str) -> Self {
        let languages: Vec<_> = input
            .split(',')
            .filter_map(LanguageDescriptor::parse_pair)
            .collect();

        if languages.is_empty() {
            Self::default()
        } else {
            Self { languages }
        }
    }

    /// Get a language by its short code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageDescriptor> {
        self.languages.iter().find(|lang| lang.short_code == code)
    }

    /// Check if a short code is in the catalog.
    pub fn contains(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }

    pub fn short_codes(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|lang| lang.short_code.as_str())
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

impl Default for LanguageRegistry {
    /// English only, matching the provider's historical default.
    fn default() -> Self {
        Self {
            languages: vec![LanguageDescriptor::new("English", "en")],
        }
    }
}

impl From<Vec<LanguageDescriptor>> for LanguageRegistry {
    fn from(languages: Vec<LanguageDescriptor>) -> Self {
        Self::new(languages)
    }
}
