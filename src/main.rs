use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use translation_session::remote::TRANSLATIONS_ROOT;
use translation_session::{
    FileStorage, MemoryRemoteStore, SessionConfig, TranslationSession,
};

/// How long to wait for auto-registration writes before printing the store
const WRITE_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables are set directly)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_session=info".parse()?),
        )
        .init();

    let config = SessionConfig::from_env()?;
    let labels: Vec<String> = std::env::args().skip(1).collect();
    if labels.is_empty() {
        anyhow::bail!("Usage: translation-session <label> [<label> ...]");
    }

    // Remote store seeded from a JSON file, or empty
    let store = Arc::new(match std::env::var("TRANSLATIONS_SEED_FILE") {
        Ok(path) => {
            let contents = std::fs::read_to_string(&path)
                .context(format!("Failed to read seed file {}", path))?;
            let data = serde_json::from_str(&contents)
                .context(format!("Seed file {} is not valid JSON", path))?;
            MemoryRemoteStore::with_data(data)
        }
        Err(_) => MemoryRemoteStore::new(),
    });

    let storage_path = std::env::var("TRANSLATIONS_STORAGE_FILE")
        .unwrap_or_else(|_| ".translation-session.json".to_string());
    let storage = Arc::new(FileStorage::new(storage_path));
    info!("Persisting language choice in {}", storage.path().display());

    let session = TranslationSession::mount(config, storage, store.clone())?;

    if let Ok(language) = std::env::var("TRANSLATIONS_LANGUAGE") {
        session.set_current_language(&language);
    }

    let snapshot = session.wait_until(|s| s.loaded && !s.loading).await;
    let language_name = session
        .languages()
        .get_by_code(&snapshot.language)
        .map(|lang| lang.name.clone())
        .unwrap_or_else(|| snapshot.language.clone());
    info!(
        "Loaded {} {} translations from {}",
        snapshot.translations.len(),
        language_name,
        snapshot.translations_path
    );

    for label in &labels {
        println!("{} => {}", label, session.t(label));
    }

    let flushed =
        tokio::time::timeout(WRITE_SETTLE_TIMEOUT, session.flush_registrations()).await;
    if flushed.is_err() {
        warn!("Not all auto-registration writes finished in time");
    }

    let app_path = format!("{}/{}", TRANSLATIONS_ROOT, session.current_app());
    println!(
        "{}",
        serde_json::to_string_pretty(&store.value_at(&app_path))?
    );
    println!("{}", serde_json::to_string_pretty(&session.metrics())?);

    session.close();
    Ok(())
}
