//! In-memory decoding using symphonia
//!
//! Decodes a complete encoded byte slice (a remote response body or a
//! fragment cut out of a package component) into a single-channel
//! [`AudioBuffer`]. Every sample format symphonia produces is converted to
//! `f32`; multi-channel audio is averaged down to mono.

use super::buffer::AudioBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode encoded audio bytes to mono
///
/// `extension` (e.g. `"mp3"`, `"wav"`) is passed to the format probe as a
/// hint; detection still works without it.
pub fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(Error::Decode("No audio bytes to decode".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Unrecognized audio format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Unsupported codec: {}", e)))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Slices cut at fragment boundaries may start mid-frame
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(Error::Decode(format!("Failed to decode packet: {}", e))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        sample_rate.get_or_insert(spec.rate);

        let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);

        if channels == 1 {
            mono.extend_from_slice(interleaved.samples());
        } else {
            mono.extend(
                interleaved
                    .samples()
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| Error::Decode("Unknown sample rate".to_string()))?;
    debug!("Decoded {} frames at {}Hz", mono.len(), sample_rate);

    Ok(AudioBuffer::mono(mono, sample_rate))
}
