//! Client-side translation state synchronized with a remote key-value store.
//!
//! A [`TranslationSession`] owns the active language and app namespace, keeps
//! the fetched translations for that pair in memory, resolves labels through
//! [`TranslationSession::t`], and writes labels it could not resolve back to
//! the store so they can be translated. The persisted-language medium and the
//! remote store are injected through the [`StorageGateway`] and
//! [`RemoteStore`] traits.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use translation_session::{MemoryRemoteStore, MemoryStorage, SessionConfig, TranslationSession};
//!
//! let session = TranslationSession::mount(
//!     SessionConfig::new("app1"),
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryRemoteStore::new()),
//! )?;
//! session.wait_until(|s| s.loaded).await;
//! println!("{}", session.t("Hello"));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod error_sink;
pub mod i18n;
pub mod keys;
pub mod registrar;
pub mod remote;
pub mod retry;
pub mod session;
pub mod storage;

pub use cache::TranslationSet;
pub use config::SessionConfig;
pub use error::{RemoteError, StorageError, TranslationError, TranslationResult};
pub use i18n::{LanguageDescriptor, LanguageRegistry, MetricsReport};
pub use keys::KeyMode;
pub use registrar::SaveTranslation;
pub use remote::{MemoryRemoteStore, ReadOptions, RemoteStore, Snapshot, SnapshotStream};
pub use session::{SessionPhase, SessionSnapshot, TranslationSession};
pub use storage::{FileStorage, MemoryStorage, StorageGateway, LANGUAGE_STORAGE_KEY};
