//! Audio buffers, decoding, resampling and device output

pub mod buffer;
pub mod decode;
pub mod output;
pub mod resampler;

pub use buffer::AudioBuffer;
pub use decode::decode_bytes;
pub use output::AudioOutput;
pub use resampler::Resampler;
