//! Per-sentence synthesis state
//!
//! A [`SentenceSession`] tracks one sentence on screen. Calling
//! [`SentenceSession::refresh`] whenever any input might have changed
//! re-enters synthesis only if the cache key or text actually changed,
//! or if the last attempt failed.

use super::cache::CacheKey;
use super::inference::InferenceEngine;
use super::offsets::OffsetIndex;
use super::router::{SynthesisRequest, SynthesisRouter};
use crate::audio::AudioBuffer;
use crate::error::Remedy;
use std::sync::Arc;
use voicepack_sync::store::ComponentStore;

#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    Ready(Arc<AudioBuffer>),
    Failed { message: String, remedy: Remedy },
}

impl SessionState {
    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        match self {
            SessionState::Ready(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed { .. })
    }
}

#[derive(Debug)]
pub struct SentenceSession {
    last: Option<(CacheKey, String)>,
    state: SessionState,
}

impl SentenceSession {
    pub fn new() -> Self {
        Self {
            last: None,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Bring the session up to date with `request`
    ///
    /// Returns `true` if synthesis was attempted.
    pub async fn refresh<S, O, E>(&mut self, router: &SynthesisRouter<S, O, E>, request: &SynthesisRequest) -> bool
    where
        S: ComponentStore,
        O: OffsetIndex,
        E: InferenceEngine,
    {
        let identity = (request.cache_key(), request.sentence.text().to_string());
        let unchanged = self.last.as_ref() == Some(&identity);
        if unchanged && !self.state.is_failed() {
            return false;
        }

        self.state = match router.synthesize(request).await {
            Ok(buffer) => SessionState::Ready(buffer),
            Err(e) => SessionState::Failed {
                message: e.to_string(),
                remedy: e.remedy(),
            },
        };
        self.last = Some(identity);
        true
    }

    /// Forget the last request so the next refresh synthesizes again
    pub fn reset(&mut self) {
        self.last = None;
        self.state = SessionState::Idle;
    }
}

impl Default for SentenceSession {
    fn default() -> Self {
        Self::new()
    }
}
