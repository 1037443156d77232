//! Audio output using cpal
//!
//! One output stream is opened per [`AudioOutput`] and runs until it is
//! dropped, rendering silence when nothing is loaded. The number of frames
//! the device has consumed is the monotonic clock the
//! [`crate::clock::PlaybackClock`] reads.

use super::buffer::AudioBuffer;
use crate::clock::{AudioClock, AudioSink};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Read head over the loaded buffer, in source frames
#[derive(Default)]
struct Playhead {
    buffer: Option<Arc<AudioBuffer>>,
    position: f64,
    step: f64,
}

impl Playhead {
    fn next_sample(&mut self) -> f32 {
        let Some(buffer) = &self.buffer else {
            return 0.0;
        };

        let frame = self.position as usize;
        if frame >= buffer.frames() {
            self.buffer = None;
            return 0.0;
        }

        self.position += self.step;
        buffer.mono_sample(frame)
    }
}

/// State shared with the audio callback thread
#[derive(Default)]
struct Shared {
    playhead: Mutex<Playhead>,
    frames_rendered: AtomicU64,
    error_flag: AtomicBool,
}

pub struct AudioOutput {
    device_name: String,
    config: StreamConfig,
    shared: Arc<Shared>,
    _stream: Stream,
}

impl AudioOutput {
    /// List available output device names
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open a device (the default one when `device_name` is `None` or not
    /// found) and start its stream
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let requested = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(name)),
            None => None,
        };

        let device = match requested {
            Some(device) => device,
            None => {
                if let Some(name) = device_name {
                    warn!("Requested device '{}' not found, falling back to default device", name);
                }
                host.default_output_device()
                    .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?
            }
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let shared = Arc::new(Shared::default());
        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, Arc::clone(&shared))?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, Arc::clone(&shared))?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, Arc::clone(&shared))?,
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!("Using audio device: {}", device_name);
        Ok(Self {
            device_name,
            config,
            shared,
            _stream: stream,
        })
    }

    fn build_stream<T>(device: &Device, config: &StreamConfig, shared: Arc<Shared>) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let error_shared = Arc::clone(&shared);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;

                    // Never block the audio thread; render silence if the
                    // playhead is being replaced
                    match shared.playhead.try_lock() {
                        Ok(mut head) => {
                            for frame in data.chunks_mut(channels) {
                                let value = T::from_sample(head.next_sample().clamp(-1.0, 1.0));
                                frame.fill(value);
                            }
                        }
                        Err(_) => data.fill(T::EQUILIBRIUM),
                    }

                    shared.frames_rendered.fetch_add(frames as u64, Ordering::Relaxed);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_shared.error_flag.store(true, Ordering::SeqCst);
                },
                Some(Duration::from_secs(2)),
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn has_error(&self) -> bool {
        self.shared.error_flag.load(Ordering::SeqCst)
    }

    fn with_playhead(&self, f: impl FnOnce(&mut Playhead)) -> Result<()> {
        let mut head = self
            .shared
            .playhead
            .lock()
            .map_err(|_| Error::AudioOutput("playhead lock poisoned".to_string()))?;
        f(&mut head);
        Ok(())
    }
}

impl AudioClock for AudioOutput {
    fn now(&self) -> f64 {
        self.shared.frames_rendered.load(Ordering::Relaxed) as f64 / self.sample_rate() as f64
    }
}

impl AudioSink for AudioOutput {
    fn start(&mut self, buffer: Arc<AudioBuffer>, offset_secs: f64) -> Result<()> {
        let device_rate = self.sample_rate() as f64;
        self.with_playhead(|head| {
            head.step = buffer.sample_rate() as f64 / device_rate;
            head.position = (offset_secs * buffer.sample_rate() as f64).max(0.0);
            head.buffer = Some(buffer);
        })
    }

    fn stop(&mut self) {
        if let Err(e) = self.with_playhead(|head| head.buffer = None) {
            warn!("Failed to stop playback: {}", e);
        }
    }

    fn is_usable(&self) -> bool {
        !self.has_error()
    }
}
