//! Best-effort remote diagnostics.
//!
//! Synchronization failures are appended to [`ERROR_LOG_PATH`] keyed by a
//! second-resolution UTC timestamp. Two failures within the same second share
//! a key and the later one wins.

use crate::remote::{RemoteStore, ERROR_LOG_PATH};
use crate::retry::{with_retry, RetryConfig};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Format a log key: ISO 8601 without fractional seconds or offset.
pub fn log_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[derive(Clone)]
pub struct ErrorSink {
    remote: Arc<dyn RemoteStore>,
    retry: RetryConfig,
}

impl ErrorSink {
    pub fn new(remote: Arc<dyn RemoteStore>, retry: RetryConfig) -> Self {
        Self { remote, retry }
    }

    /// Record `message` at the current time. Never fails.
    pub async fn record(&self, message: &str) {
        self.record_at(message, Utc::now()).await;
    }

    pub async fn record_at(&self, message: &str, at: DateTime<Utc>) {
        let key = log_timestamp(at);
        let mut entry = Map::new();
        entry.insert(key.clone(), Value::String(message.to_string()));

        let result = with_retry(&self.retry, "Error log write", || {
            self.remote.write(ERROR_LOG_PATH, entry.clone())
        })
        .await;

        match result {
            Ok(()) => debug!("Recorded error at {}/{}", ERROR_LOG_PATH, key),
            Err(e) => warn!("Could not record error '{}': {}", message, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 5).unwrap()
            + chrono::Duration::milliseconds(789)
    }

    #[test]
    fn test_log_timestamp_drops_fraction() {
        assert_eq!(log_timestamp(fixed_time()), "2024-01-15T10:30:05");
    }

    #[tokio::test]
    async fn test_record_writes_under_log_path() {
        let store = Arc::new(MemoryRemoteStore::new());
        let sink = ErrorSink::new(store.clone(), RetryConfig::none());

        sink.record_at("read failed", fixed_time()).await;

        assert_eq!(
            store.value_at(ERROR_LOG_PATH),
            Some(json!({ "2024-01-15T10:30:05": "read failed" }))
        );
    }

    #[tokio::test]
    async fn test_record_merges_with_earlier_entries() {
        let store = Arc::new(MemoryRemoteStore::new());
        let sink = ErrorSink::new(store.clone(), RetryConfig::none());

        sink.record_at("first", fixed_time()).await;
        sink.record_at("second", fixed_time() + chrono::Duration::seconds(1)).await;

        let logged = store.value_at(ERROR_LOG_PATH).unwrap();
        assert_eq!(logged.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_record_swallows_write_failure() {
        let store = Arc::new(MemoryRemoteStore::new());
        store.fail_writes(Some("denied"));
        let sink = ErrorSink::new(store.clone(), RetryConfig::none());

        // Must not panic or propagate
        sink.record("anything").await;

        assert_eq!(store.value_at(ERROR_LOG_PATH), None);
    }
}
