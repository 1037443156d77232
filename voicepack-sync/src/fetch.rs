//! Chunked fetch orchestrator
//!
//! Downloads the missing components of one package as concurrent chunk
//! requests and commits each component as soon as all of its chunks are in.
//!
//! # Run structure
//!
//! 1. **Open**: every chunk request of every component is issued at once and
//!    its response head awaited. A bad status, transport error or unusable
//!    `Content-Length` abandons the owning component (its sibling requests
//!    are dropped); other components are unaffected.
//! 2. **Receive**: the expected total is the sum of the declared lengths of
//!    the surviving requests. All bodies stream concurrently; each read
//!    advances one aggregate progress ratio, which therefore never
//!    decreases. Chunks are concatenated in request index order regardless
//!    of completion order, then the component is committed.
//!
//! One shared [`CancellationToken`] is observed by every request. Once it
//! fires no new request is issued and in-flight ones are aborted; components
//! already committed stay committed.

use crate::error::{Error, Result};
use crate::layout::{component_url, ComponentSpec};
use crate::store::{ComponentRecord, ComponentStore};
use crate::writer::StoreWriter;
use chrono::Utc;
use futures::future::{join_all, try_join_all};
use futures::StreamExt;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voicepack_common::{EventBus, Mode, PackageKind, PackageStatus, VoicePackEvent};

const USER_AGENT: &str = concat!("voicepack-sync/", env!("CARGO_PKG_VERSION"));

/// Upper bound on the buffer reserved up front from a declared length
const MAX_PREALLOC: u64 = 1 << 20;

/// Terminal status of a download run
///
/// `latest` when nothing failed. Otherwise the prefix says why the run fell
/// short (cancellation beats storage, storage beats network) and the suffix
/// says whether at least one component was newly saved.
pub fn outcome_status(
    cancelled: bool,
    storage_failure: bool,
    any_saved: bool,
    any_failed: bool,
) -> PackageStatus {
    if !any_failed {
        return PackageStatus::Latest;
    }

    match (cancelled, storage_failure, any_saved) {
        (true, _, true) => PackageStatus::CancelledIncomplete,
        (true, _, false) => PackageStatus::CancelledNotDownloaded,
        (false, true, true) => PackageStatus::SaveIncomplete,
        (false, true, false) => PackageStatus::SaveFailed,
        (false, false, true) => PackageStatus::DownloadIncomplete,
        (false, false, false) => PackageStatus::DownloadFailed,
    }
}

/// A component that could not be downloaded or saved
#[derive(Debug)]
pub struct ComponentFailure {
    pub component: String,
    pub error: Error,
}

/// Per-component outcome of one download run
#[derive(Debug)]
pub struct DownloadReport {
    pub run_id: Uuid,
    pub language: String,
    pub voice: String,
    pub mode: Mode,
    pub status: PackageStatus,
    /// Components committed during this run, in completion order
    pub saved: Vec<String>,
    pub failed: Vec<ComponentFailure>,
    pub expected_bytes: u64,
    pub received_bytes: u64,
}

impl DownloadReport {
    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.component.clone()).collect()
    }

    pub fn summary(&self) -> DownloadSummary {
        DownloadSummary {
            run_id: self.run_id,
            status: self.status,
            saved: self.saved.clone(),
            failed: self
                .failed
                .iter()
                .map(|f| FailureSummary {
                    component: f.component.clone(),
                    error: f.error.to_string(),
                })
                .collect(),
            expected_bytes: self.expected_bytes,
            received_bytes: self.received_bytes,
        }
    }

    /// `Ok(())` when every component was saved, the single error when one
    /// failed, an [`Error::Aggregate`] otherwise
    pub fn into_result(self) -> Result<()> {
        match Error::collect(self.failed.into_iter().map(|f| f.error).collect()) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

/// Serializable view of a [`DownloadReport`]
#[derive(Debug, Clone, Serialize)]
pub struct DownloadSummary {
    pub run_id: Uuid,
    pub status: PackageStatus,
    pub saved: Vec<String>,
    pub failed: Vec<FailureSummary>,
    pub expected_bytes: u64,
    pub received_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub component: String,
    pub error: String,
}

/// Identity of one run, shared by every request it issues
struct RunContext<'a> {
    run_id: Uuid,
    kind: PackageKind,
    language: &'a str,
    voice: &'a str,
    /// Longest wait for the next body bytes
    read_timeout: Duration,
    cancel: &'a CancellationToken,
}

/// A chunk request whose response head has arrived
struct OpenedChunk {
    request: String,
    declared: u64,
    response: reqwest::Response,
}

/// Aggregate byte progress across every surviving request of a run
struct ProgressTracker<'a> {
    expected: u64,
    received: AtomicU64,
    event_bus: &'a EventBus,
    run_id: Uuid,
    language: &'a str,
    voice: &'a str,
    mode: Mode,
}

impl<'a> ProgressTracker<'a> {
    fn ratio(received: u64, expected: u64) -> f64 {
        if expected == 0 {
            return 0.0;
        }
        (received as f64 / expected as f64).min(1.0)
    }

    fn advance(&self, bytes: u64) {
        let received = self.received.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.event_bus.emit_lossy(VoicePackEvent::DownloadProgress {
            run_id: self.run_id,
            language: self.language.to_string(),
            voice: self.voice.to_string(),
            mode: self.mode,
            received_bytes: received,
            expected_bytes: self.expected,
            ratio: Self::ratio(received, self.expected),
            timestamp: Utc::now(),
        });
    }

    fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

/// Downloads package components as parallel chunk requests
pub struct ChunkedFetcher<S> {
    client: reqwest::Client,
    url_prefix: String,
    target_version: String,
    read_timeout: Duration,
    writer: StoreWriter<S>,
    event_bus: EventBus,
}

impl<S: ComponentStore> ChunkedFetcher<S> {
    pub fn new(
        url_prefix: impl Into<String>,
        target_version: impl Into<String>,
        request_timeout: Duration,
        writer: StoreWriter<S>,
        event_bus: EventBus,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url_prefix: url_prefix.into(),
            target_version: target_version.into(),
            read_timeout: request_timeout,
            writer,
            event_bus,
        })
    }

    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    /// Download and commit `components` for one `(language, voice, mode)`
    ///
    /// Never fails as a whole: every problem is recorded against its
    /// component in the returned report.
    pub async fn download(
        &self,
        run_id: Uuid,
        language: &str,
        voice: &str,
        mode: Mode,
        components: &[ComponentSpec],
        cancel: &CancellationToken,
    ) -> DownloadReport {
        let kind = match mode.package_kind() {
            Some(kind) if !components.is_empty() => kind,
            _ => {
                debug!(%run_id, language, voice, mode = %mode, "Nothing to download");
                return self.finish(run_id, language, voice, mode, false, Vec::new(), Vec::new(), 0, 0);
            }
        };

        let ctx = RunContext {
            run_id,
            kind,
            language,
            voice,
            read_timeout: self.read_timeout,
            cancel,
        };

        info!(
            %run_id,
            language,
            voice,
            mode = %mode,
            components = components.len(),
            version = %self.target_version,
            "Starting package download"
        );
        self.publish_status(language, voice, mode, PackageStatus::Downloading);

        // Phase 1: open every request of every component concurrently
        let opened = join_all(components.iter().map(|spec| self.open_component(&ctx, spec))).await;

        let mut failed = Vec::new();
        let mut pending = Vec::new();
        for (spec, result) in components.iter().zip(opened) {
            match result {
                Ok(chunks) => pending.push((spec, chunks)),
                Err(error) => {
                    warn!(%run_id, component = %spec.name, error = %error, "Component abandoned");
                    failed.push(ComponentFailure {
                        component: spec.name.clone(),
                        error,
                    });
                }
            }
        }

        let expected: u64 = pending
            .iter()
            .flat_map(|(_, chunks)| chunks.iter().map(|c| c.declared))
            .fold(0u64, u64::saturating_add);

        let progress = ProgressTracker {
            expected,
            received: AtomicU64::new(0),
            event_bus: &self.event_bus,
            run_id,
            language,
            voice,
            mode,
        };

        // Phase 2: stream every surviving body and commit per component
        let received = join_all(
            pending
                .into_iter()
                .map(|(spec, chunks)| self.receive_component(&ctx, spec, chunks, &progress)),
        )
        .await;

        let mut saved = Vec::new();
        for result in received {
            match result {
                (name, Ok(())) => saved.push(name),
                (name, Err(error)) => {
                    warn!(%run_id, component = %name, error = %error, "Component failed");
                    failed.push(ComponentFailure {
                        component: name,
                        error,
                    });
                }
            }
        }

        self.finish(
            run_id,
            language,
            voice,
            mode,
            cancel.is_cancelled(),
            saved,
            failed,
            expected,
            progress.received(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        run_id: Uuid,
        language: &str,
        voice: &str,
        mode: Mode,
        cancelled: bool,
        saved: Vec<String>,
        failed: Vec<ComponentFailure>,
        expected_bytes: u64,
        received_bytes: u64,
    ) -> DownloadReport {
        let storage_failure = failed.iter().any(|f| f.error.is_storage());
        let status = outcome_status(cancelled, storage_failure, !saved.is_empty(), !failed.is_empty());

        info!(
            %run_id,
            language,
            voice,
            mode = %mode,
            status = %status,
            saved = saved.len(),
            failed = failed.len(),
            received_bytes,
            expected_bytes,
            "Package download finished"
        );

        self.event_bus.emit_lossy(VoicePackEvent::DownloadFinished {
            run_id,
            language: language.to_string(),
            voice: voice.to_string(),
            mode,
            status,
            saved: saved.clone(),
            failed: failed.iter().map(|f| f.component.clone()).collect(),
            timestamp: Utc::now(),
        });
        self.publish_status(language, voice, mode, status);

        DownloadReport {
            run_id,
            language: language.to_string(),
            voice: voice.to_string(),
            mode,
            status,
            saved,
            failed,
            expected_bytes,
            received_bytes,
        }
    }

    /// Open all chunk requests of one component; the first failure drops
    /// the remaining requests
    async fn open_component(&self, ctx: &RunContext<'_>, spec: &ComponentSpec) -> Result<Vec<OpenedChunk>> {
        try_join_all(spec.request_files().into_iter().map(|file| {
            let url = component_url(
                &self.url_prefix,
                &self.target_version,
                ctx.language,
                ctx.voice,
                &file,
                ctx.kind.extension(),
            );
            self.open_request(ctx, file, url)
        }))
        .await
    }

    async fn open_request(&self, ctx: &RunContext<'_>, request: String, url: String) -> Result<OpenedChunk> {
        if ctx.cancel.is_cancelled() {
            return Err(Error::Cancelled { request });
        }

        debug!(run_id = %ctx.run_id, %url, "Requesting chunk");

        let response = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(Error::Cancelled { request }),
            response = self.client.get(&url).send() => response,
        }
        .map_err(|e| Error::Fetch {
            request: request.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                request,
                status: status.as_u16(),
            });
        }

        let declared = declared_length(&request, &response)?;

        Ok(OpenedChunk {
            request,
            declared,
            response,
        })
    }

    /// Read every chunk of one component, reassemble in index order and
    /// commit it
    async fn receive_component(
        &self,
        ctx: &RunContext<'_>,
        spec: &ComponentSpec,
        chunks: Vec<OpenedChunk>,
        progress: &ProgressTracker<'_>,
    ) -> (String, Result<()>) {
        let result = async {
            let bodies = try_join_all(chunks.into_iter().map(|chunk| read_body(ctx, chunk, progress))).await?;

            let bytes = bodies.concat();
            let record = ComponentRecord::new(
                ctx.language,
                ctx.voice,
                spec.name.clone(),
                self.target_version.clone(),
                bytes,
            );
            self.writer.commit(ctx.kind, &record).await?;

            self.event_bus.emit_lossy(VoicePackEvent::ComponentSaved {
                run_id: ctx.run_id,
                language: ctx.language.to_string(),
                voice: ctx.voice.to_string(),
                component: spec.name.clone(),
                version: self.target_version.clone(),
                timestamp: Utc::now(),
            });

            Ok(())
        }
        .await;

        (spec.name.clone(), result)
    }

    fn publish_status(&self, language: &str, voice: &str, mode: Mode, status: PackageStatus) {
        self.event_bus.emit_lossy(VoicePackEvent::PackageStatusChanged {
            language: language.to_string(),
            voice: voice.to_string(),
            mode,
            status,
            timestamp: Utc::now(),
        });
    }
}

/// Parse the required `Content-Length` header
///
/// Missing, non-integer and zero values are all failures of the request.
fn declared_length(request: &str, response: &reqwest::Response) -> Result<u64> {
    let invalid = |value: &str| Error::InvalidContentLength {
        request: request.to_string(),
        value: value.to_string(),
    };

    let header = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .ok_or_else(|| invalid("<missing>"))?;
    let text = header.to_str().map_err(|_| invalid("<non-ascii>"))?;

    match text.trim().parse::<u64>() {
        Ok(length) if length > 0 => Ok(length),
        _ => Err(invalid(text)),
    }
}

async fn read_body(ctx: &RunContext<'_>, chunk: OpenedChunk, progress: &ProgressTracker<'_>) -> Result<Vec<u8>> {
    let OpenedChunk {
        request,
        declared,
        response,
    } = chunk;

    let mut body = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
    let mut stream = response.bytes_stream();

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(Error::Cancelled { request }),
            next = tokio::time::timeout(ctx.read_timeout, stream.next()) => next,
        };

        let next = match next {
            Ok(next) => next,
            Err(_) => {
                return Err(Error::Fetch {
                    request,
                    reason: format!("no data received for {:?}", ctx.read_timeout),
                })
            }
        };

        match next {
            Some(Ok(bytes)) => {
                if body.len() as u64 + bytes.len() as u64 > declared {
                    return Err(Error::TruncatedBody {
                        request,
                        expected: declared,
                        received: body.len() as u64 + bytes.len() as u64,
                    });
                }
                body.extend_from_slice(&bytes);
                progress.advance(bytes.len() as u64);
            }
            Some(Err(e)) => {
                return Err(Error::Fetch {
                    request,
                    reason: e.to_string(),
                })
            }
            None => break,
        }
    }

    if body.len() as u64 != declared {
        return Err(Error::TruncatedBody {
            request,
            expected: declared,
            received: body.len() as u64,
        });
    }

    debug!(run_id = %ctx.run_id, %request, bytes = declared, "Chunk received");
    Ok(body)
}
