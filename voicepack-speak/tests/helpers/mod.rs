//! Test helpers for voicepack-speak integration tests
//!
//! - TtsServer: local remote-synthesis service with scripted failures
//! - CountingStore: component store that counts point lookups
//! - UnreadableStore: component store whose reads always fail
//! - wav_bytes: WAV fixtures generated with hound

#![allow(dead_code)]

pub mod counting_store;
pub mod tts_server;
pub mod unreadable_store;

pub use counting_store::CountingStore;
pub use tts_server::TtsServer;
pub use unreadable_store::UnreadableStore;

use std::io::Cursor;

pub const VERSION: &str = "1.0.0";

/// 16-bit mono WAV holding `frames` copies of `value`
pub fn wav_bytes(value: f32, frames: usize, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let sample = (value * i16::MAX as f32) as i16;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
