//! In-memory translation cache for the active (app, language) pair.
//!
//! The cache is only ever replaced wholesale from a fetched snapshot. An empty
//! snapshot for the pair the cache already holds leaves it untouched (stale
//! data beats no data while upstream is empty); an empty snapshot for another
//! pair clears it so nothing leaks across languages or apps.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Mapping from lookup key to translated string.
pub type TranslationSet = BTreeMap<String, String>;

/// The (app, language) pair a translation set was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheScope {
    pub app: String,
    pub language: String,
}

impl CacheScope {
    pub fn new(app: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            language: language.into(),
        }
    }
}

/// What applying a snapshot did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// Entries were replaced with this many new ones
    Replaced(usize),
    /// Snapshot was empty; existing entries kept
    Preserved,
    /// Snapshot was empty and for a different pair; cache emptied
    Cleared,
}

#[derive(Debug, Clone, Default)]
pub struct TranslationCache {
    entries: TranslationSet,
    /// `None` for an unscoped seed (the configured initial translations)
    scope: Option<CacheScope>,
}

impl TranslationCache {
    /// Seed the cache with translations that belong to no particular fetch.
    pub fn seeded(initial: TranslationSet) -> Self {
        Self {
            entries: initial,
            scope: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn entries(&self) -> &TranslationSet {
        &self.entries
    }

    /// Apply a snapshot delivered for `scope`.
    pub fn apply_snapshot(&mut self, scope: CacheScope, snapshot: Option<&Value>) -> CacheUpdate {
        let incoming = parse_snapshot(snapshot);

        if !incoming.is_empty() {
            let count = incoming.len();
            self.entries = incoming;
            self.scope = Some(scope);
            return CacheUpdate::Replaced(count);
        }

        let same_pair = match &self.scope {
            None => true,
            Some(current) => *current == scope,
        };

        if same_pair || self.entries.is_empty() {
            self.scope = Some(scope);
            CacheUpdate::Preserved
        } else {
            debug!(
                "Empty snapshot for {}/{}; dropping {} entries cached for {}/{}",
                scope.app,
                scope.language,
                self.entries.len(),
                self.scope.as_ref().map(|s| s.app.as_str()).unwrap_or_default(),
                self.scope.as_ref().map(|s| s.language.as_str()).unwrap_or_default(),
            );
            self.entries.clear();
            self.scope = Some(scope);
            CacheUpdate::Cleared
        }
    }
}

/// Extract the string-valued entries of a snapshot.
///
/// Anything that is not a JSON object yields an empty set. Non-string values
/// inside the object (nested nodes, numbers) are skipped.
pub fn parse_snapshot(snapshot: Option<&Value>) -> TranslationSet {
    let Some(Value::Object(map)) = snapshot else {
        return TranslationSet::new();
    };

    map.iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) => Some((key.clone(), text.clone())),
            _ => {
                debug!("Skipping non-string translation entry '{}'", key);
                None
            }
        })
        .collect()
}
