//! Version reconciler
//!
//! Reads every stored component of one `(language, voice)` pair and decides
//! whether the package for a mode is absent, incomplete, stale or current.

use crate::error::{Error, Result};
use crate::layout::{ComponentSpec, PackageLayout};
use crate::store::{ComponentStore, ComponentVersion};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use voicepack_common::{EventBus, Mode, PackageStatus, VoicePackEvent};

/// Result of one reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub language: String,
    pub voice: String,
    pub mode: Mode,
    pub status: PackageStatus,
    pub target_version: String,
    /// Components absent or not at the target version, in layout order
    pub missing: Vec<ComponentSpec>,
    /// Version shared by every required component, when the set is complete
    pub installed_version: Option<String>,
}

impl Reconciliation {
    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|c| c.name.clone()).collect()
    }
}

/// Outcome of comparing required components with stored versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: PackageStatus,
    pub missing: Vec<ComponentSpec>,
    pub installed_version: Option<String>,
}

/// Classify stored versions against the required component list
///
/// - incomplete: any required component absent, or stored versions disagree
/// - new version: nothing absent, but some version differs from the target
/// - otherwise latest
///
/// A mode with no required components is always latest.
pub fn evaluate(
    required: &[ComponentSpec],
    stored: &[ComponentVersion],
    target_version: &str,
) -> Evaluation {
    if required.is_empty() {
        return Evaluation {
            status: PackageStatus::Latest,
            missing: Vec::new(),
            installed_version: None,
        };
    }

    let stored: HashMap<&str, &str> = stored
        .iter()
        .map(|c| (c.component.as_str(), c.version.as_str()))
        .collect();

    let mut absent = 0usize;
    let mut versions = BTreeSet::new();
    let mut missing = Vec::new();

    for spec in required {
        match stored.get(spec.name.as_str()) {
            None => {
                absent += 1;
                missing.push(spec.clone());
            }
            Some(version) => {
                versions.insert(*version);
                if *version != target_version {
                    missing.push(spec.clone());
                }
            }
        }
    }

    let is_incomplete = absent > 0 || versions.len() > 1;
    let has_new_version = absent == 0 && versions.iter().any(|v| *v != target_version);

    let status = if is_incomplete {
        if absent == required.len() {
            PackageStatus::AvailableForDownload
        } else {
            PackageStatus::Incomplete
        }
    } else if has_new_version {
        PackageStatus::NewVersionAvailable
    } else {
        PackageStatus::Latest
    };

    let installed_version = if is_incomplete {
        None
    } else {
        versions.iter().next().map(|v| v.to_string())
    };

    Evaluation {
        status,
        missing,
        installed_version,
    }
}

pub struct VersionReconciler<S> {
    store: Arc<S>,
    layout: Arc<PackageLayout>,
    target_version: String,
    event_bus: EventBus,
}

impl<S: ComponentStore> VersionReconciler<S> {
    pub fn new(
        store: Arc<S>,
        layout: Arc<PackageLayout>,
        target_version: impl Into<String>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            layout,
            target_version: target_version.into(),
            event_bus,
        }
    }

    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    pub fn layout(&self) -> &PackageLayout {
        &self.layout
    }

    /// Reconcile and publish the resulting status
    ///
    /// Publishes `gathering_info` first. A store read failure publishes
    /// `gather_failed` and is returned as [`Error::Storage`]; retrying is up
    /// to the caller.
    pub async fn reconcile(&self, language: &str, voice: &str, mode: Mode) -> Result<Reconciliation> {
        self.publish(language, voice, mode, PackageStatus::GatheringInfo);

        match self.inspect(language, voice, mode).await {
            Ok(reconciliation) => {
                info!(
                    language,
                    voice,
                    mode = %mode,
                    status = %reconciliation.status,
                    missing = reconciliation.missing.len(),
                    "Package reconciled"
                );
                self.publish(language, voice, mode, reconciliation.status);
                Ok(reconciliation)
            }
            Err(e) => {
                warn!(language, voice, mode = %mode, error = %e, "Package reconciliation failed");
                self.publish(language, voice, mode, PackageStatus::GatherFailed);
                Err(e)
            }
        }
    }

    /// Reconcile without publishing anything
    pub async fn inspect(&self, language: &str, voice: &str, mode: Mode) -> Result<Reconciliation> {
        let required = self.layout.components(mode);

        let stored = match mode.package_kind() {
            Some(kind) if !required.is_empty() => self
                .store
                .get_all_by_voice(kind, language, voice)
                .await
                .map_err(|e| Error::storage(format!("{}/{}", language, voice), e))?,
            _ => Vec::new(),
        };

        debug!(
            language,
            voice,
            mode = %mode,
            required = required.len(),
            stored = stored.len(),
            "Comparing stored components with target version"
        );

        let evaluation = evaluate(required, &stored, &self.target_version);

        Ok(Reconciliation {
            language: language.to_string(),
            voice: voice.to_string(),
            mode,
            status: evaluation.status,
            target_version: self.target_version.clone(),
            missing: evaluation.missing,
            installed_version: evaluation.installed_version,
        })
    }

    fn publish(&self, language: &str, voice: &str, mode: Mode, status: PackageStatus) {
        self.event_bus.emit_lossy(VoicePackEvent::PackageStatusChanged {
            language: language.to_string(),
            voice: voice.to_string(),
            mode,
            status,
            timestamp: Utc::now(),
        });
    }
}
