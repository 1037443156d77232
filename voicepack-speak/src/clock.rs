//! Playback clock
//!
//! Transport state machine for one loaded [`AudioBuffer`]. Position is a
//! fraction of the buffer's duration, derived from a monotonic audio clock:
//! while playing, `position = (now - anchor) / duration`.
//!
//! | from              | action       | to                |
//! |-------------------|--------------|-------------------|
//! | stopped / seeking | `play`       | playing           |
//! | playing           | `pause`      | stopped(position) |
//! | any               | `stop`       | stopped(0)        |
//! | playing           | `seek_start` | seeking           |
//! | seeking           | `seek_move`  | seeking           |
//! | seeking           | `seek_end`   | playing           |
//! | playing           | end reached  | stopped(0)        |
//! | playing / seeking | device lost  | stopped(position) |

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use voicepack_common::{EventBus, PlaybackState, VoicePackEvent};

/// Monotonic time source in seconds
pub trait AudioClock {
    fn now(&self) -> f64;
}

/// Device that plays a buffer from an offset
pub trait AudioSink {
    fn start(&mut self, buffer: Arc<AudioBuffer>, offset_secs: f64) -> Result<()>;

    fn stop(&mut self);

    /// False once the device has failed and can no longer play
    fn is_usable(&self) -> bool {
        true
    }
}

/// Transport state with its payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportState {
    Stopped { position: f64 },
    /// `anchor` is the clock time at which position 0 would have played
    Playing { anchor: f64 },
    Seeking { position: f64 },
}

impl TransportState {
    pub fn kind(&self) -> PlaybackState {
        match self {
            TransportState::Stopped { .. } => PlaybackState::Stopped,
            TransportState::Playing { .. } => PlaybackState::Playing,
            TransportState::Seeking { .. } => PlaybackState::Seeking,
        }
    }
}

pub struct PlaybackClock<C> {
    device: C,
    buffer: Option<Arc<AudioBuffer>>,
    duration: f64,
    state: TransportState,
    event_bus: Option<EventBus>,
}

impl<C: AudioClock + AudioSink> PlaybackClock<C> {
    pub fn new(device: C) -> Self {
        Self {
            device,
            buffer: None,
            duration: 0.0,
            state: TransportState::Stopped { position: 0.0 },
            event_bus: None,
        }
    }

    /// Publish every transition as `PlaybackStateChanged`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn device(&self) -> &C {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut C {
        &mut self.device
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Replace the loaded buffer; playback stops at position 0
    pub fn load(&mut self, buffer: Arc<AudioBuffer>) {
        self.halt_device();
        self.duration = buffer.duration_secs();
        self.buffer = Some(buffer);
        self.transition(TransportState::Stopped { position: 0.0 });
    }

    /// Current position as a fraction of the duration
    pub fn position(&self) -> f64 {
        match self.state {
            TransportState::Stopped { position } | TransportState::Seeking { position } => position,
            TransportState::Playing { anchor } => self.position_at(anchor).clamp(0.0, 1.0),
        }
    }

    pub fn play(&mut self) -> Result<()> {
        let position = match self.state {
            TransportState::Playing { .. } => return Ok(()),
            TransportState::Stopped { position } | TransportState::Seeking { position } => position,
        };
        self.start_at(position)
    }

    pub fn pause(&mut self) {
        if let TransportState::Playing { anchor } = self.state {
            let position = self.position_at(anchor).clamp(0.0, 1.0);
            self.device.stop();
            self.transition(TransportState::Stopped { position });
        }
    }

    pub fn stop(&mut self) {
        self.halt_device();
        self.transition(TransportState::Stopped { position: 0.0 });
    }

    pub fn seek_start(&mut self) -> Result<()> {
        match self.state {
            TransportState::Playing { anchor } => {
                let position = self.position_at(anchor).clamp(0.0, 1.0);
                self.device.stop();
                self.transition(TransportState::Seeking { position });
                Ok(())
            }
            TransportState::Seeking { .. } => Ok(()),
            TransportState::Stopped { .. } => Err(Error::InvalidState("Cannot seek while stopped".to_string())),
        }
    }

    pub fn seek_move(&mut self, position: f64) -> Result<()> {
        match self.state {
            TransportState::Seeking { .. } => {
                self.state = TransportState::Seeking {
                    position: position.clamp(0.0, 1.0),
                };
                Ok(())
            }
            _ => Err(Error::InvalidState("seek_move outside of a seek".to_string())),
        }
    }

    pub fn seek_end(&mut self) -> Result<()> {
        match self.state {
            TransportState::Seeking { position } => self.start_at(position),
            _ => Err(Error::InvalidState("seek_end outside of a seek".to_string())),
        }
    }

    /// Per-frame sampler
    ///
    /// Recomputes the position while playing, stops at the end of the
    /// buffer, and handles a device that became unusable.
    pub fn tick(&mut self) -> f64 {
        if !self.device.is_usable() {
            self.device_lost();
        }

        if let TransportState::Playing { anchor } = self.state {
            let position = self.position_at(anchor);
            if position >= 1.0 {
                debug!("Reached end of buffer");
                self.stop();
                return 0.0;
            }
            return position.max(0.0);
        }

        self.position()
    }

    /// The audio device became unusable
    pub fn device_lost(&mut self) {
        let position = match self.state {
            TransportState::Playing { anchor } => self.position_at(anchor).clamp(0.0, 1.0),
            TransportState::Seeking { position } => position,
            TransportState::Stopped { .. } => return,
        };
        warn!("Audio device lost, stopping playback");
        self.device.stop();
        self.transition(TransportState::Stopped { position });
    }

    fn start_at(&mut self, position: f64) -> Result<()> {
        let buffer = match &self.buffer {
            Some(buffer) if self.duration > 0.0 => Arc::clone(buffer),
            _ => return Err(Error::InvalidState("Nothing to play".to_string())),
        };
        if !self.device.is_usable() {
            return Err(Error::AudioOutput("Audio device is not usable".to_string()));
        }

        let position = if position >= 1.0 { 0.0 } else { position.max(0.0) };
        let anchor = self.device.now() - position * self.duration;
        self.device.start(buffer, position * self.duration)?;
        self.transition(TransportState::Playing { anchor });
        Ok(())
    }

    fn halt_device(&mut self) {
        if matches!(self.state, TransportState::Playing { .. }) {
            self.device.stop();
        }
    }

    fn position_at(&self, anchor: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.device.now() - anchor) / self.duration
    }

    fn transition(&mut self, new_state: TransportState) {
        let old = self.state.kind();
        self.state = new_state;
        let new = new_state.kind();

        if old == new {
            return;
        }

        info!("Playback state: {} -> {}", old, new);
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(VoicePackEvent::PlaybackStateChanged {
                old_state: old,
                new_state: new,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Clock and sink advanced by hand
///
/// Stands in for an audio device when rendering offline or under test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: f64,
    usable: bool,
    playing_from: Option<f64>,
    starts: usize,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            usable: true,
            ..Self::default()
        }
    }

    pub fn advance(&mut self, secs: f64) {
        self.now += secs;
    }

    pub fn set_usable(&mut self, usable: bool) {
        self.usable = usable;
    }

    /// Offset of the running start, if the sink is playing
    pub fn playing_from(&self) -> Option<f64> {
        self.playing_from
    }

    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.now
    }
}

impl AudioSink for ManualClock {
    fn start(&mut self, _buffer: Arc<AudioBuffer>, offset_secs: f64) -> Result<()> {
        self.playing_from = Some(offset_secs);
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.playing_from = None;
    }

    fn is_usable(&self) -> bool {
        self.usable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two seconds of silence at 1 kHz
    fn loaded_clock() -> PlaybackClock<ManualClock> {
        let mut clock = PlaybackClock::new(ManualClock::new());
        clock.load(Arc::new(AudioBuffer::silence(2000, 1000)));
        clock
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
    }

    #[test]
    fn test_play_advances_with_clock() {
        let mut clock = loaded_clock();
        clock.play().unwrap();
        assert_eq!(clock.state().kind(), PlaybackState::Playing);

        clock.device_mut().advance(0.5);
        assert_close(clock.tick(), 0.25);
    }

    #[test]
    fn test_pause_keeps_position_and_play_resumes() {
        let mut clock = loaded_clock();
        clock.play().unwrap();
        clock.device_mut().advance(1.0);
        clock.pause();

        assert_eq!(clock.state(), TransportState::Stopped { position: 0.5 });
        assert_eq!(clock.device().playing_from(), None);

        clock.device_mut().advance(10.0);
        clock.play().unwrap();
        assert_close(clock.device().playing_from().unwrap(), 1.0);
        assert_close(clock.tick(), 0.5);
    }

    #[test]
    fn test_stop_resets_position() {
        let mut clock = loaded_clock();
        clock.play().unwrap();
        clock.device_mut().advance(1.0);
        clock.stop();
        assert_eq!(clock.state(), TransportState::Stopped { position: 0.0 });
    }

    #[test]
    fn test_reaching_end_stops_at_zero() {
        let mut clock = loaded_clock();
        clock.play().unwrap();
        clock.device_mut().advance(2.5);

        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.state(), TransportState::Stopped { position: 0.0 });
        assert_eq!(clock.device().playing_from(), None);
    }

    #[test]
    fn test_seek_cycle_resumes_from_new_position() {
        let mut clock = loaded_clock();
        clock.play().unwrap();
        clock.device_mut().advance(0.2);

        clock.seek_start().unwrap();
        assert_eq!(clock.state().kind(), PlaybackState::Seeking);
        assert_eq!(clock.device().playing_from(), None);

        clock.seek_move(0.3).unwrap();
        clock.seek_move(0.75).unwrap();
        clock.device_mut().advance(5.0);
        assert_close(clock.position(), 0.75);

        clock.seek_end().unwrap();
        assert_eq!(clock.state().kind(), PlaybackState::Playing);
        assert_close(clock.device().playing_from().unwrap(), 1.5);
        assert_close(clock.tick(), 0.75);
    }

    #[test]
    fn test_seek_requires_playing() {
        let mut clock = loaded_clock();
        assert!(matches!(clock.seek_start(), Err(Error::InvalidState(_))));
        assert!(matches!(clock.seek_move(0.5), Err(Error::InvalidState(_))));
        assert!(matches!(clock.seek_end(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_device_loss_forces_stop() {
        let mut clock = loaded_clock();
        clock.play().unwrap();
        clock.device_mut().advance(0.4);
        clock.device_mut().set_usable(false);

        clock.tick();
        assert_eq!(clock.state().kind(), PlaybackState::Stopped);
        assert_close(clock.position(), 0.2);
        assert!(matches!(clock.play(), Err(Error::AudioOutput(_))));
    }

    #[test]
    fn test_play_without_buffer_is_invalid() {
        let mut clock = PlaybackClock::new(ManualClock::new());
        assert!(matches!(clock.play(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_transitions_are_published() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut clock = PlaybackClock::new(ManualClock::new()).with_event_bus(bus);
        clock.load(Arc::new(AudioBuffer::silence(1000, 1000)));

        clock.play().unwrap();
        clock.seek_start().unwrap();
        clock.seek_end().unwrap();
        clock.stop();

        let mut transitions = Vec::new();
        while let Ok(VoicePackEvent::PlaybackStateChanged { old_state, new_state, .. }) = rx.try_recv() {
            transitions.push((old_state, new_state));
        }
        assert_eq!(
            transitions,
            vec![
                (PlaybackState::Stopped, PlaybackState::Playing),
                (PlaybackState::Playing, PlaybackState::Seeking),
                (PlaybackState::Seeking, PlaybackState::Playing),
                (PlaybackState::Playing, PlaybackState::Stopped),
            ]
        );
    }
}
