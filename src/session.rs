//! Translation session: active language, cached translations and their sync.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --(storage read / default persisted)--> StorageLoaded
//! StorageLoaded --(initial fetch issued)--------------> Fetching
//! Fetching      --(first snapshot, or failure)--------> Ready
//! Ready         --(language or app change)------------> Fetching
//! any           --(close / drop)----------------------> Closed
//! ```
//!
//! No remote read is issued before `StorageLoaded`. Every fetch bumps a
//! generation counter; a delivery whose generation is no longer current is
//! dropped, and the superseded task is aborted so its subscription ends. The
//! cache is mutated only from a current fetch's delivery.
//!
//! `t`, `set_current_language` and `set_current_app` are synchronous and
//! never fail. Storage and remote I/O run on tasks spawned on the runtime the
//! session was mounted in.

use crate::cache::{CacheScope, CacheUpdate, TranslationCache, TranslationSet};
use crate::config::SessionConfig;
use crate::error::{RemoteError, TranslationError, TranslationResult};
use crate::error_sink::ErrorSink;
use crate::i18n::{LanguageRegistry, MetricsReport, SessionMetrics};
use crate::keys::lookup_key;
use crate::registrar::{AutoRegistrar, SaveTranslation};
use crate::remote::{translations_path, ReadOptions, RemoteStore};
use crate::storage::{StorageGateway, LANGUAGE_STORAGE_KEY};
use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Persisted language not read yet; no fetch allowed
    Uninitialized,
    /// Language known, no fetch issued yet
    StorageLoaded,
    /// A fetch is in flight
    Fetching,
    /// The latest fetch delivered or failed
    Ready,
    /// Torn down; deliveries are ignored
    Closed,
}

/// Consumer-facing view of the session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub language: String,
    pub current_app: String,
    pub translations: TranslationSet,
    pub loading: bool,
    pub loaded: bool,
    pub storage_ready: bool,
    pub phase: SessionPhase,
    pub languages: LanguageRegistry,
    /// Remote node the active translations come from
    pub translations_path: String,
    /// Increases with every published transition
    pub revision: u64,
}

struct SessionState {
    language: String,
    app: String,
    cache: TranslationCache,
    loading: bool,
    loaded: bool,
    storage_ready: bool,
    phase: SessionPhase,
    /// Bumped on every fetch and on close
    generation: u64,
    /// Language was set explicitly before bootstrap finished
    language_chosen: bool,
    fetch_task: Option<JoinHandle<()>>,
    /// Last revision handed out by `stamp`
    revision: u64,
}

struct Shared {
    config: SessionConfig,
    state: Mutex<SessionState>,
    storage: Arc<dyn StorageGateway>,
    remote: Arc<dyn RemoteStore>,
    registrar: AutoRegistrar,
    sink: ErrorSink,
    metrics: Arc<SessionMetrics>,
    runtime: Handle,
    persist_lock: tokio::sync::Mutex<()>,
    /// Auto-registration writes not yet awaited by `flush_registrations`
    pending_writes: Mutex<Vec<JoinHandle<TranslationResult<()>>>>,
    updates: watch::Sender<SessionSnapshot>,
}

/// A mounted translation session.
///
/// Dropping the session closes it. Share it behind an `Arc` when several
/// consumers need it.
pub struct TranslationSession {
    shared: Arc<Shared>,
}

impl TranslationSession {
    /// Create a session and start bootstrapping its language from `storage`.
    ///
    /// # Errors
    /// Returns `NoRuntime` when called outside of a tokio runtime.
    pub fn mount(
        config: SessionConfig,
        storage: Arc<dyn StorageGateway>,
        remote: Arc<dyn RemoteStore>,
    ) -> TranslationResult<Self> {
        let runtime = Handle::try_current().map_err(|_| TranslationError::NoRuntime)?;
        let metrics = Arc::new(SessionMetrics::new());
        let sink = ErrorSink::new(remote.clone(), config.write_retry.clone());
        let registrar = AutoRegistrar::new(
            remote.clone(),
            sink.clone(),
            config.write_retry.clone(),
            metrics.clone(),
            runtime.clone(),
        );

        let state = SessionState {
            language: config.default_language.clone(),
            app: config.app.clone(),
            cache: TranslationCache::seeded(config.initial_translations.clone()),
            loading: false,
            loaded: false,
            storage_ready: false,
            phase: SessionPhase::Uninitialized,
            generation: 0,
            language_chosen: false,
            fetch_task: None,
            revision: 0,
        };
        let (updates, _) = watch::channel(snapshot_of(&state, &config.languages));

        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(state),
            storage,
            remote,
            registrar,
            sink,
            metrics,
            runtime: runtime.clone(),
            persist_lock: tokio::sync::Mutex::new(()),
            pending_writes: Mutex::new(Vec::new()),
            updates,
        });

        let bootstrapping = Arc::clone(&shared);
        runtime.spawn(async move { bootstrapping.bootstrap().await });

        Ok(Self { shared })
    }

    /// Resolve a label against the active translations.
    ///
    /// Returns the translation when one is cached, the label itself otherwise,
    /// and an empty string (with a warning) for an empty label. A miss on a
    /// settled session with auto-save enabled writes the label back for every
    /// configured language without waiting for the writes.
    pub fn t(&self, label: &str) -> String {
        self.shared.resolve(label)
    }

    /// Resolve a dynamically typed label. Anything but a string yields `""`.
    pub fn t_value(&self, label: &Value) -> String {
        match label {
            Value::String(text) => self.shared.resolve(text),
            other => {
                warn!(
                    "{}",
                    TranslationError::InvalidLookupInput(format!("expected a string, got {}", other))
                );
                String::new()
            }
        }
    }

    /// Switch the active language.
    ///
    /// The change is visible to `t` immediately. The code is persisted in the
    /// background; a persistence failure only logs. Once storage is loaded the
    /// change supersedes any in-flight fetch.
    pub fn set_current_language(&self, code: &str) {
        self.shared.set_language(code);
    }

    /// Switch the app namespace and refetch with a full reset of `loaded`.
    pub fn set_current_app(&self, app: &str) {
        self.shared.set_app(app);
    }

    /// Merge one translation into the remote store.
    ///
    /// # Errors
    /// * `MissingWriteParameters` if app, short code or key is empty
    /// * `RemoteWrite` if the store rejected the write
    pub async fn save_translation_for_language(
        &self,
        request: SaveTranslation,
    ) -> TranslationResult<()> {
        self.shared.registrar.save(request).await
    }

    pub fn language(&self) -> String {
        self.shared.state().language.clone()
    }

    pub fn current_app(&self) -> String {
        self.shared.state().app.clone()
    }

    pub fn translations(&self) -> TranslationSet {
        self.shared.state().cache.entries().clone()
    }

    pub fn loading(&self) -> bool {
        self.shared.state().loading
    }

    pub fn loaded(&self) -> bool {
        self.shared.state().loaded
    }

    pub fn storage_ready(&self) -> bool {
        self.shared.state().storage_ready
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state().phase
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.shared.config.languages
    }

    pub fn translations_path(&self) -> String {
        let state = self.shared.state();
        translations_path(&state.app, &state.language)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.updates.borrow().clone()
    }

    /// Receive a new snapshot on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Wait for the first snapshot (current or future) matching `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut updates = self.subscribe();
        let snapshot = match updates.wait_for(|snapshot| predicate(snapshot)).await {
            Ok(snapshot) => (*snapshot).clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Wait for every auto-registration write issued so far.
    ///
    /// Failed writes were already logged; only tasks that died abnormally are
    /// reported here.
    pub async fn flush_registrations(&self) {
        let pending = std::mem::take(&mut *self.shared.pending_writes());
        for joined in join_all(pending).await {
            if let Err(e) = joined {
                warn!("Registration write task ended abnormally: {}", e);
            }
        }
    }

    pub fn metrics(&self) -> MetricsReport {
        self.shared.metrics.report()
    }

    /// Tear the session down: cancel the active subscription and ignore any
    /// later delivery. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl Drop for TranslationSession {
    fn drop(&mut self) {
        self.shared.close();
    }
}

fn snapshot_of(state: &SessionState, languages: &LanguageRegistry) -> SessionSnapshot {
    SessionSnapshot {
        language: state.language.clone(),
        current_app: state.app.clone(),
        translations: state.cache.entries().clone(),
        loading: state.loading,
        loaded: state.loaded,
        storage_ready: state.storage_ready,
        phase: state.phase,
        languages: languages.clone(),
        translations_path: translations_path(&state.app, &state.language),
        revision: state.revision,
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_writes(&self) -> MutexGuard<'_, Vec<JoinHandle<TranslationResult<()>>>> {
        self.pending_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture the state for subscribers. Called under the state lock.
    fn stamp(&self, state: &mut SessionState) -> SessionSnapshot {
        state.revision += 1;
        snapshot_of(state, &self.config.languages)
    }

    /// Hand a stamped snapshot to subscribers, dropping it if a later one got
    /// there first.
    ///
    /// Must not be called while the state lock is held: subscribers may read
    /// the session while they borrow the current snapshot.
    fn publish(&self, snapshot: SessionSnapshot) {
        self.updates.send_if_modified(move |current| {
            if snapshot.revision <= current.revision {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    async fn bootstrap(self: Arc<Self>) {
        let (persisted, storage_usable) = match self.storage.get(LANGUAGE_STORAGE_KEY).await {
            Ok(value) => (value.filter(|code| !code.trim().is_empty()), true),
            Err(e) => {
                warn!(
                    "Could not read persisted language, keeping it in memory only: {}",
                    TranslationError::Storage(e)
                );
                (None, false)
            }
        };

        let default_to_persist = {
            let mut state = self.state();
            if state.phase == SessionPhase::Closed {
                return;
            }
            if state.language_chosen {
                debug!("Language '{}' chosen before bootstrap finished", state.language);
                None
            } else if let Some(code) = persisted {
                state.language = code;
                None
            } else {
                Some(state.language.clone())
            }
        };

        if let (Some(code), true) = (default_to_persist, storage_usable) {
            let _guard = self.persist_lock.lock().await;
            if let Err(e) = self.storage.set(LANGUAGE_STORAGE_KEY, &code).await {
                warn!(
                    "Could not persist default language '{}': {}",
                    code,
                    TranslationError::Storage(e)
                );
            }
        }

        let (storage_loaded, fetching) = {
            let mut state = self.state();
            if state.phase == SessionPhase::Closed {
                return;
            }
            state.storage_ready = true;
            state.phase = SessionPhase::StorageLoaded;
            info!(
                "Language bootstrap complete: {} (app {})",
                state.language, state.app
            );
            let storage_loaded = self.stamp(&mut state);
            (storage_loaded, self.begin_fetch(&mut state, false))
        };
        self.publish(storage_loaded);
        self.publish(fetching);
    }

    /// Start a fetch for the current (app, language), superseding any other.
    /// Returns the snapshot to publish once the state lock is released.
    fn begin_fetch(self: &Arc<Self>, state: &mut SessionState, reset: bool) -> SessionSnapshot {
        if state.app.is_empty() || state.language.is_empty() {
            warn!(
                "Not fetching translations: app '{}' / language '{}' incomplete",
                state.app, state.language
            );
            return self.stamp(state);
        }

        state.generation += 1;
        let generation = state.generation;
        if let Some(previous) = state.fetch_task.take() {
            previous.abort();
        }

        state.loading = true;
        if reset {
            state.loaded = false;
        }
        state.phase = SessionPhase::Fetching;
        self.metrics.record_fetch();

        let scope = CacheScope::new(state.app.clone(), state.language.clone());
        let fetching = Arc::clone(self);
        state.fetch_task = Some(
            self.runtime
                .spawn(async move { fetching.run_fetch(generation, scope).await }),
        );
        self.stamp(state)
    }

    async fn run_fetch(self: Arc<Self>, generation: u64, scope: CacheScope) {
        let path = translations_path(&scope.app, &scope.language);
        let live = self.config.live_updates;
        let options = if live {
            ReadOptions::live()
        } else {
            ReadOptions::once()
        };
        debug!("Fetching {} (generation {}, live: {})", path, generation, live);

        let mut snapshots = match self.remote.read(&path, options).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                self.fail_fetch(generation, e).await;
                return;
            }
        };

        let mut delivered = false;
        while let Some(item) = snapshots.next().await {
            match item {
                Ok(snapshot) => {
                    if !self.apply_snapshot(generation, &scope, snapshot.as_ref()) {
                        return;
                    }
                    delivered = true;
                    if !live {
                        break;
                    }
                }
                Err(e) => {
                    self.fail_fetch(generation, e).await;
                    return;
                }
            }
        }

        if !delivered {
            debug!("Read of {} ended without a snapshot", path);
            self.settle(generation);
        }
    }

    /// Apply a delivery if its fetch is still current. Returns false when stale.
    fn apply_snapshot(&self, generation: u64, scope: &CacheScope, snapshot: Option<&Value>) -> bool {
        let mut state = self.state();
        if state.phase == SessionPhase::Closed || state.generation != generation {
            self.metrics.record_stale_snapshot();
            debug!(
                "Ignoring snapshot for {}/{} from superseded fetch {}",
                scope.app, scope.language, generation
            );
            return false;
        }

        match state.cache.apply_snapshot(scope.clone(), snapshot) {
            CacheUpdate::Replaced(count) => {
                debug!("Loaded {} translations for {}/{}", count, scope.app, scope.language)
            }
            CacheUpdate::Preserved => {
                debug!("Empty snapshot for {}/{}, keeping cache", scope.app, scope.language)
            }
            CacheUpdate::Cleared => {
                debug!("Empty snapshot for {}/{}, cache cleared", scope.app, scope.language)
            }
        }
        self.metrics.record_snapshot_applied();

        state.loading = false;
        state.loaded = true;
        state.phase = SessionPhase::Ready;
        let ready = self.stamp(&mut state);
        drop(state);
        self.publish(ready);
        true
    }

    /// Resolve loading/loaded for a fetch that ends without applying anything.
    fn settle(&self, generation: u64) {
        let ready = {
            let mut state = self.state();
            if state.phase == SessionPhase::Closed || state.generation != generation {
                return;
            }
            state.loading = false;
            state.loaded = true;
            state.phase = SessionPhase::Ready;
            self.stamp(&mut state)
        };
        self.publish(ready);
    }

    async fn fail_fetch(&self, generation: u64, e: RemoteError) {
        let message = e.to_string();
        error!("Translation fetch failed: {}", TranslationError::RemoteRead(e));
        self.metrics.record_read_failure();
        self.settle(generation);
        self.sink.record(&message).await;
    }

    fn resolve(&self, label: &str) -> String {
        if label.is_empty() {
            warn!(
                "{}",
                TranslationError::InvalidLookupInput("empty label".to_string())
            );
            return String::new();
        }

        let key = lookup_key(self.config.key_mode, label);
        let (translation, register_in) = {
            let state = self.state();
            match state.cache.get(&key) {
                Some(text) if !text.is_empty() => (Some(text.to_string()), None),
                // Key exists upstream without a translation yet
                Some(_) => (None, None),
                None => {
                    let settled = state.loaded
                        && !state.loading
                        && state.phase != SessionPhase::Closed;
                    let register = self.config.auto_save_missing && settled;
                    (None, register.then(|| state.app.clone()))
                }
            }
        };

        match translation {
            Some(text) => {
                self.metrics.record_cache_hit();
                text
            }
            None => {
                self.metrics.record_cache_miss();
                if let Some(app) = register_in {
                    debug!("Registering missing label '{}' in {}", label, app);
                    let writes = self
                        .registrar
                        .register(&app, &self.config.languages, label, &key);
                    let mut pending = self.pending_writes();
                    pending.retain(|write| !write.is_finished());
                    pending.extend(writes);
                }
                label.to_string()
            }
        }
    }

    fn set_language(self: &Arc<Self>, code: &str) {
        let code = code.trim();
        if code.is_empty() {
            warn!("Ignoring empty language code");
            return;
        }

        if !self.config.languages.contains(code) {
            debug!("Language {} is not in the configured catalog", code);
        }

        let changed = {
            let mut state = self.state();
            if state.phase == SessionPhase::Closed {
                debug!("Session closed, ignoring language change to {}", code);
                return;
            }
            let changed = state.language != code;
            state.language = code.to_string();
            if !state.storage_ready {
                state.language_chosen = true;
            }
            if changed {
                info!("Language changed to {}", code);
            }
            if changed && state.storage_ready {
                self.begin_fetch(&mut state, false)
            } else {
                self.stamp(&mut state)
            }
        };
        self.publish(changed);

        let persisting = Arc::clone(self);
        self.runtime
            .spawn(async move { persisting.persist_language().await });
    }

    /// Store whatever language is current when the write gets its turn, so
    /// racing persists converge on the latest choice.
    async fn persist_language(&self) {
        let _guard = self.persist_lock.lock().await;
        let code = self.state().language.clone();
        if let Err(e) = self.storage.set(LANGUAGE_STORAGE_KEY, &code).await {
            warn!(
                "Could not persist language '{}': {}",
                code,
                TranslationError::Storage(e)
            );
        }
    }

    fn set_app(self: &Arc<Self>, app: &str) {
        let app = app.trim();
        if app.is_empty() {
            warn!("Ignoring empty app namespace");
            return;
        }

        let changed = {
            let mut state = self.state();
            if state.phase == SessionPhase::Closed {
                debug!("Session closed, ignoring app change to {}", app);
                return;
            }
            state.app = app.to_string();
            info!("App namespace changed to {}", app);
            if state.storage_ready {
                self.begin_fetch(&mut state, true)
            } else {
                self.stamp(&mut state)
            }
        };
        self.publish(changed);
    }

    fn close(&self) {
        let closed = {
            let mut state = self.state();
            if state.phase == SessionPhase::Closed {
                return;
            }
            state.phase = SessionPhase::Closed;
            state.generation += 1;
            if let Some(task) = state.fetch_task.take() {
                task.abort();
            }
            info!("Translation session for {} closed", state.app);
            self.stamp(&mut state)
        };
        self.publish(closed);
    }
}
