//! Local inference seam
//!
//! The engine itself (model loading, phonemization, the network) lives
//! behind [`InferenceEngine`]; this module only adapts its raw output into
//! an [`AudioBuffer`].

use super::PACKAGE_SAMPLE_RATE;
use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use std::future::Future;
use tracing::debug;

/// Produces raw single-channel samples at [`PACKAGE_SAMPLE_RATE`]
pub trait InferenceEngine: Send + Sync + 'static {
    fn infer(
        &self,
        language: &str,
        voice: &str,
        fragments: &[String],
        speed: f32,
    ) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

/// Engine used when no inference backend is linked in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl InferenceEngine for UnavailableEngine {
    async fn infer(&self, language: &str, voice: &str, _fragments: &[String], _speed: f32) -> Result<Vec<f32>> {
        Err(Error::Inference(format!(
            "No inference engine available for {}/{}",
            language, voice
        )))
    }
}

pub struct LocalInference<E> {
    engine: E,
}

impl<E: InferenceEngine> LocalInference<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub async fn synthesize(
        &self,
        language: &str,
        voice: &str,
        fragments: &[String],
        speed: f32,
    ) -> Result<AudioBuffer> {
        let samples = self.engine.infer(language, voice, fragments, speed).await?;
        debug!(
            "Inference produced {} samples for {} fragments",
            samples.len(),
            fragments.len()
        );
        Ok(AudioBuffer::mono(samples, PACKAGE_SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ToneEngine;

    impl InferenceEngine for ToneEngine {
        async fn infer(&self, _language: &str, _voice: &str, fragments: &[String], speed: f32) -> Result<Vec<f32>> {
            let frames = (fragments.len() as f32 * 2400.0 / speed) as usize;
            Ok(vec![0.5; frames])
        }
    }

    #[tokio::test]
    async fn test_output_is_wrapped_as_mono_package_rate() {
        let inference = LocalInference::new(ToneEngine);
        let fragments = vec!["你好".to_string(), "嗎".to_string()];

        let buffer = inference.synthesize("yue", "female", &fragments, 2.0).await.unwrap();
        assert_eq!(buffer.sample_rate(), PACKAGE_SAMPLE_RATE);
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.frames(), 2400);
    }

    #[tokio::test]
    async fn test_unavailable_engine_fails() {
        let inference = LocalInference::new(UnavailableEngine);
        let result = inference.synthesize("yue", "female", &["A".to_string()], 1.0).await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }
}
