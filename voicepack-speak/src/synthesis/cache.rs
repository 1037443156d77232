//! Audio buffer cache
//!
//! Successful syntheses keyed by their parameters and then by exact
//! sentence text. Optionally bounded: with a capacity set, inserting past
//! it evicts the least recently used sentence.
//!
//! Two concurrent misses on the same key both synthesize; the later insert
//! wins.

use crate::audio::AudioBuffer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use voicepack_common::Mode;

/// Synthesis parameters shared by every sentence in one cache bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mode: Mode,
    /// Speed in thousandths, so the key can be hashed
    pub speed_millis: u32,
    /// Installed package version (None for remote synthesis)
    pub version: Option<String>,
    pub language: String,
    pub voice: String,
}

impl CacheKey {
    pub fn new(mode: Mode, speed: f32, version: Option<String>, language: &str, voice: &str) -> Self {
        Self {
            mode,
            speed_millis: (speed.max(0.0) * 1000.0).round() as u32,
            version,
            language: language.to_string(),
            voice: voice.to_string(),
        }
    }
}

struct Entry {
    buffer: Arc<AudioBuffer>,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    buckets: HashMap<CacheKey, HashMap<String, Entry>>,
    tick: u64,
    len: usize,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .buckets
            .iter()
            .flat_map(|(key, bucket)| bucket.iter().map(move |(text, entry)| (entry.last_used, key, text)))
            .min_by_key(|(last_used, _, _)| *last_used)
            .map(|(_, key, text)| (key.clone(), text.clone()));

        let Some((key, text)) = oldest else {
            return;
        };

        if let Some(bucket) = self.buckets.get_mut(&key) {
            if bucket.remove(&text).is_some() {
                self.len -= 1;
                debug!("Evicted cached sentence '{}'", text);
            }
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }
}

pub struct AudioBufferCache {
    inner: Mutex<Inner>,
    capacity: Option<usize>,
}

impl AudioBufferCache {
    /// Unbounded cache
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Cache holding at most `capacity` sentences (unbounded for `None`)
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.filter(|c| *c > 0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey, text: &str) -> Option<Arc<AudioBuffer>> {
        let mut inner = self.lock();
        let tick = inner.next_tick();
        let entry = inner.buckets.get_mut(key)?.get_mut(text)?;
        entry.last_used = tick;
        Some(Arc::clone(&entry.buffer))
    }

    pub fn insert(&self, key: CacheKey, text: impl Into<String>, buffer: Arc<AudioBuffer>) {
        let mut inner = self.lock();
        let tick = inner.next_tick();

        let previous = inner.buckets.entry(key).or_default().insert(
            text.into(),
            Entry {
                buffer,
                last_used: tick,
            },
        );
        if previous.is_none() {
            inner.len += 1;
        }

        if let Some(capacity) = self.capacity {
            while inner.len > capacity {
                inner.evict_oldest();
            }
        }
    }

    pub fn contains(&self, key: &CacheKey, text: &str) -> bool {
        self.lock()
            .buckets
            .get(key)
            .is_some_and(|bucket| bucket.contains_key(text))
    }

    /// Number of cached sentences
    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.buckets.clear();
        inner.len = 0;
    }
}

impl Default for AudioBufferCache {
    fn default() -> Self {
        Self::new()
    }
}
