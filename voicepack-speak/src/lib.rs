//! # voicepack Speech Library (voicepack-speak)
//!
//! Turns a sentence into playable audio and plays it.
//!
//! **Architecture:** the [`synthesis::SynthesisRouter`] picks one of three
//! strategies per request (remote service, local inference, local splice of
//! downloaded fragments), memoizes results in an
//! [`synthesis::AudioBufferCache`], and hands [`audio::AudioBuffer`]s to the
//! [`clock::PlaybackClock`], which drives an audio device through the
//! [`clock::AudioClock`] and [`clock::AudioSink`] seams.

pub mod audio;
pub mod clock;
pub mod error;
pub mod synthesis;

pub use error::{Error, Remedy, Result};
