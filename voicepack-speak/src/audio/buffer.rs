//! In-memory audio buffer
//!
//! Interleaved `f32` samples in `[-1.0, 1.0]` with a sample rate and a
//! channel count. Synthesized speech is single-channel.

use super::resampler::Resampler;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn empty(sample_rate: u32) -> Self {
        Self::mono(Vec::new(), sample_rate)
    }

    /// Single-channel silence of `duration_ms`
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        let frames = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::mono(vec![0.0; frames], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> AudioBuffer {
        if self.channels == 1 {
            return self.clone();
        }

        let channels = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        AudioBuffer::mono(samples, self.sample_rate)
    }

    /// Convert to `sample_rate` and `channels`
    ///
    /// Multi-channel input is averaged first; mono is then duplicated into
    /// every requested channel.
    pub fn convert(&self, sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
        let channels = channels.max(1);
        if self.sample_rate == sample_rate && self.channels == channels {
            return Ok(self.clone());
        }

        let mono = self.to_mono();
        let resampled = Resampler::resample(&mono.samples, mono.sample_rate, sample_rate, 1)?;

        let samples = if channels == 1 {
            resampled
        } else {
            resampled
                .iter()
                .flat_map(|s| std::iter::repeat(*s).take(channels as usize))
                .collect()
        };

        Ok(AudioBuffer::new(samples, sample_rate, channels))
    }

    /// Join buffers in order into one buffer of the given format
    ///
    /// Parts in another format are converted first.
    pub fn concat(parts: &[AudioBuffer], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
        if sample_rate == 0 {
            return Err(Error::Decode("Cannot concatenate at 0Hz".to_string()));
        }

        let mut samples = Vec::with_capacity(parts.iter().map(|p| p.samples.len()).sum());
        for part in parts {
            if part.sample_rate == sample_rate && part.channels == channels.max(1) {
                samples.extend_from_slice(&part.samples);
            } else {
                samples.extend(part.convert(sample_rate, channels)?.samples);
            }
        }

        Ok(AudioBuffer::new(samples, sample_rate, channels))
    }

    /// Mono sample at `frame`, zero past the end
    pub fn mono_sample(&self, frame: usize) -> f32 {
        let channels = self.channels as usize;
        let start = frame * channels;
        match self.samples.get(start..start + channels) {
            Some(values) => values.iter().sum::<f32>() / channels as f32,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let silence = AudioBuffer::silence(250, 24000);
        assert_eq!(silence.frames(), 6000);
        assert!(silence.samples().iter().all(|s| *s == 0.0));
        assert!((silence.duration_secs() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_to_mono_averages_channels() {
        let stereo = AudioBuffer::new(vec![1.0, 0.0, 0.5, 0.5], 24000, 2);
        assert_eq!(stereo.to_mono().samples(), &[0.5, 0.5]);
    }

    #[test]
    fn test_concat_same_format_preserves_order() {
        let a = AudioBuffer::mono(vec![0.1, 0.2], 24000);
        let b = AudioBuffer::mono(vec![0.3], 24000);

        let joined = AudioBuffer::concat(&[a, b], 24000, 1).unwrap();
        assert_eq!(joined.samples(), &[0.1, 0.2, 0.3]);
        assert_eq!(joined.sample_rate(), 24000);
    }

    #[test]
    fn test_concat_converts_foreign_rate() {
        let a = AudioBuffer::silence(100, 24000);
        let b = AudioBuffer::mono(vec![0.25; 4800], 48000);

        let joined = AudioBuffer::concat(&[a, b], 24000, 1).unwrap();
        let frames = joined.frames();
        assert!(frames >= 2400 + 2390 && frames <= 2400 + 2410, "got {} frames", frames);
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        let joined = AudioBuffer::concat(&[], 24000, 1).unwrap();
        assert!(joined.is_empty());
    }

    #[test]
    fn test_mono_sample_past_end_is_zero() {
        let buffer = AudioBuffer::new(vec![0.2, 0.4], 24000, 2);
        assert!((buffer.mono_sample(0) - 0.3).abs() < 1e-6);
        assert_eq!(buffer.mono_sample(1), 0.0);
    }
}
