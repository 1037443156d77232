//! Synthesis router
//!
//! Resolves the cache first, then dispatches on [`SynthesisMode`]. Only
//! successful results are memoized, so a failed sentence is synthesized
//! again on the next attempt.

use super::cache::{AudioBufferCache, CacheKey};
use super::fragments::Sentence;
use super::inference::{InferenceEngine, LocalInference};
use super::offsets::OffsetIndex;
use super::remote::RemoteSynthesizer;
use super::splice::SpliceSynthesizer;
use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use voicepack_common::{EventBus, Mode, VoicePackEvent};
use voicepack_sync::store::ComponentStore;

/// Synthesis strategy with what it needs to run
///
/// Local modes carry the installed package version; they cannot be built
/// without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisMode {
    Remote,
    LocalInference { installed_version: String },
    LocalSplice { installed_version: String },
}

impl SynthesisMode {
    /// Pair a mode with the version the reconciler reported as installed
    pub fn resolve(mode: Mode, installed_version: Option<String>, language: &str, voice: &str) -> Result<Self> {
        let missing = || Error::AssetMissing {
            mode,
            language: language.to_string(),
            voice: voice.to_string(),
        };

        match mode {
            Mode::Remote => Ok(SynthesisMode::Remote),
            Mode::LocalInference => installed_version
                .map(|installed_version| SynthesisMode::LocalInference { installed_version })
                .ok_or_else(missing),
            Mode::LocalSplice => installed_version
                .map(|installed_version| SynthesisMode::LocalSplice { installed_version })
                .ok_or_else(missing),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            SynthesisMode::Remote => Mode::Remote,
            SynthesisMode::LocalInference { .. } => Mode::LocalInference,
            SynthesisMode::LocalSplice { .. } => Mode::LocalSplice,
        }
    }

    pub fn installed_version(&self) -> Option<&str> {
        match self {
            SynthesisMode::Remote => None,
            SynthesisMode::LocalInference { installed_version }
            | SynthesisMode::LocalSplice { installed_version } => Some(installed_version),
        }
    }
}

/// One sentence to synthesize
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub language: String,
    pub voice: String,
    pub mode: SynthesisMode,
    pub speed: f32,
    pub sentence: Sentence,
}

impl SynthesisRequest {
    pub fn new(
        language: impl Into<String>,
        voice: impl Into<String>,
        mode: SynthesisMode,
        speed: f32,
        sentence: Sentence,
    ) -> Self {
        Self {
            language: language.into(),
            voice: voice.into(),
            mode,
            speed,
            sentence,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(
            self.mode.mode(),
            self.speed,
            self.mode.installed_version().map(str::to_string),
            &self.language,
            &self.voice,
        )
    }
}

pub struct SynthesisRouter<S, O, E> {
    remote: Option<RemoteSynthesizer>,
    inference: LocalInference<E>,
    splice: SpliceSynthesizer<S, O>,
    cache: Arc<AudioBufferCache>,
    event_bus: Option<EventBus>,
}

impl<S, O, E> SynthesisRouter<S, O, E>
where
    S: ComponentStore,
    O: OffsetIndex,
    E: InferenceEngine,
{
    /// `remote` may be `None` when no service URL is configured; remote
    /// requests then fail with `NotConfigured`
    pub fn new(
        remote: Option<RemoteSynthesizer>,
        inference: LocalInference<E>,
        splice: SpliceSynthesizer<S, O>,
        cache: Arc<AudioBufferCache>,
    ) -> Self {
        Self {
            remote,
            inference,
            splice,
            cache,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn cache(&self) -> &Arc<AudioBufferCache> {
        &self.cache
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<Arc<AudioBuffer>> {
        let key = request.cache_key();
        let text = request.sentence.text();

        if let Some(buffer) = self.cache.get(&key, text) {
            debug!("Cache hit for '{}' ({})", text, key.mode);
            return Ok(buffer);
        }

        match self.dispatch(request).await {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                info!(
                    "Synthesized '{}' ({}, {:.2}s)",
                    text,
                    key.mode,
                    buffer.duration_secs()
                );
                self.cache.insert(key, text, Arc::clone(&buffer));
                Ok(buffer)
            }
            Err(e) => {
                warn!("Synthesis failed for '{}' ({}): {}", text, key.mode, e);
                if let Some(bus) = &self.event_bus {
                    bus.emit_lossy(VoicePackEvent::SynthesisFailed {
                        language: request.language.clone(),
                        voice: request.voice.clone(),
                        mode: key.mode,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn dispatch(&self, request: &SynthesisRequest) -> Result<AudioBuffer> {
        let SynthesisRequest {
            language,
            voice,
            mode,
            speed,
            sentence,
        } = request;

        match mode {
            SynthesisMode::Remote => {
                let remote = self
                    .remote
                    .as_ref()
                    .ok_or_else(|| Error::remote("NotConfigured", "No remote API URL configured"))?;
                remote.synthesize(language, voice, *speed, sentence.text()).await
            }
            SynthesisMode::LocalInference { .. } => {
                self.inference
                    .synthesize(language, voice, &sentence.fragment_texts(), *speed)
                    .await
            }
            SynthesisMode::LocalSplice { installed_version } => {
                self.splice
                    .synthesize(language, voice, installed_version, sentence)
                    .await
            }
        }
    }
}
