//! Write-back of labels missing from the remote store.
//!
//! When `t` misses, the label is merged into every known language's node so
//! translators can find it. Writes are spawned and never awaited by `t`.
//! Repeated registrations of the same label are identical merges, so the core
//! does not deduplicate them.

use crate::error::{TranslationError, TranslationResult};
use crate::error_sink::ErrorSink;
use crate::i18n::{LanguageRegistry, SessionMetrics};
use crate::remote::{entry_path, translations_path, RemoteStore};
use crate::retry::{with_retry, RetryConfig};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// A single translation write: `value` stored under `key` for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTranslation {
    pub app: String,
    pub short_code: String,
    pub key: String,
    pub value: String,
}

impl SaveTranslation {
    pub fn new(
        app: impl Into<String>,
        short_code: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            short_code: short_code.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    fn validate(&self) -> TranslationResult<()> {
        if self.app.is_empty() {
            return Err(TranslationError::MissingWriteParameters("app"));
        }
        if self.short_code.is_empty() {
            return Err(TranslationError::MissingWriteParameters("short_code"));
        }
        if self.key.is_empty() {
            return Err(TranslationError::MissingWriteParameters("key"));
        }
        Ok(())
    }

    /// Language node the write is merged into
    pub fn path(&self) -> String {
        translations_path(&self.app, &self.short_code)
    }

    /// Leaf the value ends up at
    pub fn entry_path(&self) -> String {
        entry_path(&self.app, &self.short_code, &self.key)
    }
}

#[derive(Clone)]
pub struct AutoRegistrar {
    remote: Arc<dyn RemoteStore>,
    sink: ErrorSink,
    retry: RetryConfig,
    metrics: Arc<SessionMetrics>,
    runtime: Handle,
}

impl AutoRegistrar {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        sink: ErrorSink,
        retry: RetryConfig,
        metrics: Arc<SessionMetrics>,
        runtime: Handle,
    ) -> Self {
        Self {
            remote,
            sink,
            retry,
            metrics,
            runtime,
        }
    }

    /// Merge one translation into the remote store.
    ///
    /// # Errors
    /// * `MissingWriteParameters` if app, short code or key is empty (nothing is written)
    /// * `RemoteWrite` if the store rejected the write after retries (also recorded remotely)
    pub async fn save(&self, request: SaveTranslation) -> TranslationResult<()> {
        if let Err(e) = request.validate() {
            warn!("Rejected translation write for key '{}': {}", request.key, e);
            return Err(e);
        }

        let path = request.path();
        let mut fields = Map::new();
        fields.insert(request.key.clone(), Value::String(request.value.clone()));

        let result = with_retry(&self.retry, &format!("Write to {}", path), || {
            self.remote.write(&path, fields.clone())
        })
        .await;

        match result {
            Ok(()) => {
                debug!("Saved {}", request.entry_path());
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to save {}: {}", request.entry_path(), e);
                error!("{}", message);
                self.metrics.record_write_failure();
                self.sink.record(&message).await;
                Err(TranslationError::RemoteWrite(e))
            }
        }
    }

    /// Spawn a write of `label` under `key` for every language in `languages`.
    ///
    /// Each write succeeds or fails on its own. The returned handles may be
    /// dropped; the writes keep running.
    pub fn register(
        &self,
        app: &str,
        languages: &LanguageRegistry,
        label: &str,
        key: &str,
    ) -> Vec<JoinHandle<TranslationResult<()>>> {
        languages
            .short_codes()
            .map(|code| {
                let registrar = self.clone();
                let request = SaveTranslation::new(app, code, key, label);
                self.metrics.record_registration();
                self.runtime
                    .spawn(async move { registrar.save(request).await })
            })
            .collect()
    }
}
