//! ringdl: download new Ring doorbell recordings exactly once.
//!
//! Each run logs in (reusing a cached OAuth token when possible), walks the
//! recent history of every doorbell on the account, saves recordings that
//! are ready and not yet in the ledger, and persists the ledger of
//! downloaded event ids at the end.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod download;
mod retry;
mod ring;
mod shutdown;
mod state;
mod sync;
mod timezone;
mod types;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fs4::fs_std::FileExt;
use tracing_subscriber::EnvFilter;

use auth::oauth::RingOAuth;
use auth::token::TokenCache;
use auth::twofa::StdinPrompt;
use auth::{Credentials, SessionManager};
use ring::client::build_http_client;
use ring::RingClient;
use state::Ledger;
use sync::{SyncEngine, SyncOptions, SyncReport};

/// Hold an exclusive advisory lock for the life of the run so two runs
/// never share the ledger and token cache.
async fn acquire_lock(lock_path: &Path) -> anyhow::Result<std::fs::File> {
    let lock_path = lock_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }
        let file = std::fs::File::create(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;
        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another ringdl instance is running (lock: {})",
                lock_path.display()
            )
        })?;
        Ok::<std::fs::File, anyhow::Error>(file)
    })
    .await?
}

/// True when the retention cap is smaller than what the run just saw: ids
/// evicted now can come back as "new" later.
fn cap_too_small(cap: Option<usize>, events_seen: usize) -> bool {
    cap.is_some_and(|cap| cap < events_seen)
}

fn warn_if_cap_too_small(ledger: &Ledger, report: &SyncReport) {
    if cap_too_small(ledger.cap(), report.events_seen()) {
        tracing::warn!(
            "Ledger cap ({}) is smaller than the {} events seen this run; \
             older recordings may be downloaded again. Raise ledger_cap.",
            ledger.cap().unwrap_or_default(),
            report.events_seen()
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = config::Config::load(&cli)?;
    tracing::debug!("{:?}", config);

    let _lock = acquire_lock(&config.lock_file).await?;
    let shutdown_token = shutdown::install_signal_handler()?;

    let http = build_http_client(Duration::from_secs(config.timeout_secs))
        .context("Failed to build the HTTP client")?;

    let credentials = Credentials {
        username: config.user_name.clone(),
        password: config.password.clone(),
    };
    let session = SessionManager::start(
        Box::new(RingOAuth::new(http.clone(), &config.user_name)),
        Box::new(StdinPrompt),
        TokenCache::new(&config.token_cache_file),
        credentials,
    )
    .await
    .into_shared();

    // Log in up front so a bad password or a refused code fails before any
    // device is touched.
    session
        .lock()
        .await
        .access_token()
        .await
        .context("Authentication failed")?;
    tracing::info!("Authenticated as {}", config.user_name);

    let api = RingClient::new(http, session, &config.user_name);
    let mut ledger = Ledger::load(&config.ledger_file, config.ledger_cap).await;
    if ledger.is_empty() {
        tracing::info!("No downloaded events recorded yet; every ready recording is new");
    } else {
        tracing::info!(
            "Loaded {} downloaded event ids from {}",
            ledger.len(),
            ledger.path().display()
        );
    }

    let options = SyncOptions {
        video_directory: config.video_directory.clone(),
        event_limit: config.event_limit,
        listing_retries: config.listing_retries,
        listing_backoff: retry::RetryConfig::default(),
        default_zone: config.default_zone,
    };
    let result = SyncEngine::new(
        &api,
        &mut ledger,
        &timezone::IanaTimeZones,
        options,
        shutdown_token,
    )
    .run()
    .await;

    // Persist whatever was recorded, even when the pass ended on a login
    // failure.
    let persisted = ledger
        .persist()
        .await
        .context("Failed to write the ledger")?;
    tracing::debug!("Ledger holds {} event ids", persisted);

    let report = result?;
    warn_if_cap_too_small(&ledger, &report);
    Ok(())
}
