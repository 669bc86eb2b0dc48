use crate::cache::TranslationSet;
use crate::i18n::LanguageRegistry;
use crate::keys::KeyMode;
use crate::retry::RetryConfig;
use anyhow::{bail, Context, Result};

/// Options fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// App namespace translations are read from and written to
    pub app: String,

    /// Language used when nothing is persisted yet
    pub default_language: String,

    /// Languages auto-registration fans out to
    pub languages: LanguageRegistry,

    pub key_mode: KeyMode,

    /// Write labels missing from the cache back to the store
    pub auto_save_missing: bool,

    /// Keep a live subscription instead of one-shot reads
    pub live_updates: bool,

    /// Translations visible before the first fetch completes
    pub initial_translations: TranslationSet,

    /// Retry policy for remote writes
    pub write_retry: RetryConfig,
}

impl SessionConfig {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            default_language: "en".to_string(),
            languages: LanguageRegistry::default(),
            key_mode: KeyMode::Plain,
            auto_save_missing: true,
            live_updates: false,
            initial_translations: TranslationSet::new(),
            write_retry: RetryConfig::remote_write(),
        }
    }

    pub fn with_default_language(mut self, code: impl Into<String>) -> Self {
        self.default_language = code.into();
        self
    }

    pub fn with_languages(mut self, languages: impl Into<LanguageRegistry>) -> Self {
        self.languages = languages.into();
        self
    }

    pub fn with_hashed_keys(mut self, enabled: bool) -> Self {
        self.key_mode = KeyMode::from_flag(enabled);
        self
    }

    pub fn with_auto_save(mut self, enabled: bool) -> Self {
        self.auto_save_missing = enabled;
        self
    }

    pub fn with_live_updates(mut self, enabled: bool) -> Self {
        self.live_updates = enabled;
        self
    }

    pub fn with_initial_translations(mut self, translations: TranslationSet) -> Self {
        self.initial_translations = translations;
        self
    }

    pub fn with_write_retry(mut self, retry: RetryConfig) -> Self {
        self.write_retry = retry;
        self
    }

    pub fn from_env() -> Result<Self> {
        let app = std::env::var("TRANSLATIONS_APP").context("TRANSLATIONS_APP not set")?;
        if app.trim().is_empty() {
            bail!("TRANSLATIONS_APP is empty");
        }

        let defaults = Self::new(app.trim());

        Ok(Self {
            default_language: std::env::var("TRANSLATIONS_DEFAULT_LANGUAGE")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.default_language),

            languages: std::env::var("TRANSLATIONS_LANGUAGES")
                .map(|v| LanguageRegistry::parse_list(&v))
                .unwrap_or(defaults.languages),

            key_mode: env_flag("TRANSLATIONS_HASHED_KEYS")
                .map(KeyMode::from_flag)
                .unwrap_or(defaults.key_mode),

            auto_save_missing: env_flag("TRANSLATIONS_AUTO_SAVE")
                .unwrap_or(defaults.auto_save_missing),

            live_updates: env_flag("TRANSLATIONS_LIVE").unwrap_or(defaults.live_updates),

            ..defaults
        })
    }
}

/// Parse a boolean environment variable; unset or unrecognized is `None`.
fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&std::env::var(name).ok()?)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
