//! Package sync facade
//!
//! Reconcile, download what is missing, reconcile again. At most one
//! download runs per `(language, voice, mode)`; each running download owns a
//! [`CancellationToken`] registered under that key.

use crate::error::{Error, Result};
use crate::fetch::{ChunkedFetcher, DownloadReport};
use crate::layout::PackageLayout;
use crate::reconciler::{Reconciliation, VersionReconciler};
use crate::store::ComponentStore;
use crate::writer::StoreWriter;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use voicepack_common::{EventBus, Mode};

/// Identity of one voice package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub language: String,
    pub voice: String,
    pub mode: Mode,
}

impl PackageKey {
    pub fn new(language: impl Into<String>, voice: impl Into<String>, mode: Mode) -> Self {
        Self {
            language: language.into(),
            voice: voice.into(),
            mode,
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.language, self.voice, self.mode)
    }
}

/// Settings of a [`PackageSync`]
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub target_version: String,
    pub package_url_prefix: String,
    /// Connect timeout, and longest wait for body bytes while streaming
    pub request_timeout: Duration,
}

/// Download report plus the reconciliation that followed it
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: DownloadReport,
    pub after: Reconciliation,
}

type RunningDownloads = Arc<Mutex<HashMap<PackageKey, CancellationToken>>>;

/// Registration of a running download; unregisters on drop
struct RunGuard {
    running: RunningDownloads,
    key: PackageKey,
    token: CancellationToken,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.key);
        }
    }
}

pub struct PackageSync<S> {
    reconciler: VersionReconciler<S>,
    fetcher: ChunkedFetcher<S>,
    running: RunningDownloads,
    event_bus: EventBus,
}

impl<S: ComponentStore> PackageSync<S> {
    pub fn new(store: Arc<S>, layout: PackageLayout, settings: SyncSettings, event_bus: EventBus) -> Result<Self> {
        let reconciler = VersionReconciler::new(
            Arc::clone(&store),
            Arc::new(layout),
            settings.target_version.clone(),
            event_bus.clone(),
        );
        let fetcher = ChunkedFetcher::new(
            settings.package_url_prefix,
            settings.target_version,
            settings.request_timeout,
            StoreWriter::new(store),
            event_bus.clone(),
        )?;

        Ok(Self {
            reconciler,
            fetcher,
            running: Arc::new(Mutex::new(HashMap::new())),
            event_bus,
        })
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn target_version(&self) -> &str {
        self.reconciler.target_version()
    }

    /// Reconcile and publish the package status
    pub async fn reconcile(&self, language: &str, voice: &str, mode: Mode) -> Result<Reconciliation> {
        self.reconciler.reconcile(language, voice, mode).await
    }

    /// Reconcile without publishing
    pub async fn inspect(&self, language: &str, voice: &str, mode: Mode) -> Result<Reconciliation> {
        self.reconciler.inspect(language, voice, mode).await
    }

    pub fn is_running(&self, language: &str, voice: &str, mode: Mode) -> bool {
        let key = PackageKey::new(language, voice, mode);
        self.running
            .lock()
            .map(|running| running.contains_key(&key))
            .unwrap_or(false)
    }

    /// Download everything missing for one package and wait for it
    ///
    /// Fails with [`Error::AlreadyRunning`] when a download for the same
    /// package is in progress. Component failures are reported in the
    /// outcome, not as an error.
    pub async fn download(&self, language: &str, voice: &str, mode: Mode) -> Result<SyncOutcome> {
        let guard = self.register(PackageKey::new(language, voice, mode))?;
        self.run(Uuid::new_v4(), &guard.key, &guard.token).await
    }

    /// Start a download in the background and return its run id
    pub fn spawn_download(self: &Arc<Self>, language: &str, voice: &str, mode: Mode) -> Result<Uuid> {
        let guard = self.register(PackageKey::new(language, voice, mode))?;
        let run_id = Uuid::new_v4();
        let sync = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = sync.run(run_id, &guard.key, &guard.token).await {
                warn!(%run_id, package = %guard.key, error = %e, "Background download failed");
            }
            drop(guard);
        });

        Ok(run_id)
    }

    /// Signal cancellation of the running download, if any
    pub fn cancel(&self, language: &str, voice: &str, mode: Mode) -> bool {
        let key = PackageKey::new(language, voice, mode);
        let token = self
            .running
            .lock()
            .ok()
            .and_then(|running| running.get(&key).cloned());

        match token {
            Some(token) => {
                info!(package = %key, "Cancelling download");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running download
    pub fn cancel_all(&self) {
        if let Ok(running) = self.running.lock() {
            for (key, token) in running.iter() {
                info!(package = %key, "Cancelling download");
                token.cancel();
            }
        }
    }

    fn register(&self, key: PackageKey) -> Result<RunGuard> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| voicepack_common::Error::Internal("download registry lock poisoned".to_string()))?;

        if running.contains_key(&key) {
            return Err(Error::AlreadyRunning(key.to_string()));
        }

        let token = CancellationToken::new();
        running.insert(key.clone(), token.clone());

        Ok(RunGuard {
            running: Arc::clone(&self.running),
            key,
            token,
        })
    }

    async fn run(&self, run_id: Uuid, key: &PackageKey, cancel: &CancellationToken) -> Result<SyncOutcome> {
        let before = self.reconciler.reconcile(&key.language, &key.voice, key.mode).await?;

        let report = self
            .fetcher
            .download(run_id, &key.language, &key.voice, key.mode, &before.missing, cancel)
            .await;

        let after = self.reconciler.inspect(&key.language, &key.voice, key.mode).await?;

        info!(
            %run_id,
            package = %key,
            status = %report.status,
            remaining = after.missing.len(),
            "Package sync finished"
        );

        Ok(SyncOutcome { report, after })
    }
}
