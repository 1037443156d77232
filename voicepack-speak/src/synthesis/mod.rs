//! Sentence synthesis
//!
//! One [`SynthesisRouter`] serves three strategies, chosen per request by
//! [`SynthesisMode`]:
//!
//! - **Remote**: one HTTP call to the synthesis service
//! - **Local inference**: an [`InferenceEngine`] produces raw samples
//! - **Local splice**: fragments are cut out of the installed package by
//!   byte range (see [`OffsetIndex`]) and joined
//!
//! Successful results are memoized in an [`AudioBufferCache`].

pub mod cache;
pub mod fragments;
pub mod inference;
pub mod offsets;
pub mod remote;
pub mod router;
pub mod session;
pub mod splice;

pub use cache::{AudioBufferCache, CacheKey};
pub use fragments::{Fragment, FragmentKind, Sentence};
pub use inference::{InferenceEngine, LocalInference, UnavailableEngine};
pub use offsets::{ByteRange, InMemoryOffsetIndex, OffsetIndex};
pub use remote::RemoteSynthesizer;
pub use router::{SynthesisMode, SynthesisRequest, SynthesisRouter};
pub use session::{SentenceSession, SessionState};
pub use splice::SpliceSynthesizer;

/// Sample rate of package audio and inference output
pub const PACKAGE_SAMPLE_RATE: u32 = 24_000;
