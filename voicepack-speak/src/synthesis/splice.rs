//! Local splice synthesis
//!
//! Each fragment is cut out of its component blob by byte range and
//! decoded on its own. A fragment with no recorded range is replaced by
//! [`SILENCE_MS`] of silence. Component blobs are read at most once per
//! sentence.

use super::fragments::{FragmentKind, Sentence};
use super::offsets::OffsetIndex;
use super::PACKAGE_SAMPLE_RATE;
use crate::audio::{decode_bytes, AudioBuffer};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use voicepack_common::{Mode, PackageKind};
use voicepack_sync::store::ComponentStore;

/// Substitute for fragments absent from the offset index
pub const SILENCE_MS: u32 = 250;

pub struct SpliceSynthesizer<S, O> {
    store: Arc<S>,
    offsets: Arc<O>,
}

impl<S: ComponentStore, O: OffsetIndex> SpliceSynthesizer<S, O> {
    pub fn new(store: Arc<S>, offsets: Arc<O>) -> Self {
        Self { store, offsets }
    }

    pub fn offsets(&self) -> &O {
        &self.offsets
    }

    pub async fn synthesize(&self, language: &str, voice: &str, version: &str, sentence: &Sentence) -> Result<AudioBuffer> {
        let mut blobs: HashMap<FragmentKind, Vec<u8>> = HashMap::new();
        let mut parts = Vec::with_capacity(sentence.fragments().len());

        for fragment in sentence.fragments() {
            let component = fragment.kind.component();

            let Some(range) = self
                .offsets
                .lookup(version, language, voice, component, &fragment.text)
            else {
                debug!("No offset for '{}' in {}, substituting silence", fragment.text, component);
                parts.push(AudioBuffer::silence(SILENCE_MS, PACKAGE_SAMPLE_RATE));
                continue;
            };

            if !blobs.contains_key(&fragment.kind) {
                let bytes = self.load_component(language, voice, version, component).await?;
                blobs.insert(fragment.kind, bytes);
            }
            let blob = blobs.get(&fragment.kind).map(Vec::as_slice).unwrap_or_default();

            let slice = range.slice(blob).ok_or_else(|| {
                Error::Decode(format!(
                    "Offset {}..{} for '{}' is outside {} ({} bytes)",
                    range.start,
                    range.end,
                    fragment.text,
                    component,
                    blob.len()
                ))
            })?;

            parts.push(decode_bytes(slice, Some(PackageKind::Audio.extension()))?);
        }

        AudioBuffer::concat(&parts, PACKAGE_SAMPLE_RATE, 1)
    }

    async fn load_component(&self, language: &str, voice: &str, version: &str, component: &str) -> Result<Vec<u8>> {
        let record = self
            .store
            .get(PackageKind::Audio, language, voice, component)
            .await
            .map_err(|source| Error::Storage {
                scope: format!("{}/{}/{}", language, voice, component),
                source,
            })?;

        match record {
            Some(record) if record.version == version => {
                debug!("Loaded component {} ({} bytes)", record.path, record.bytes.len());
                Ok(record.bytes)
            }
            _ => Err(Error::AssetMissing {
                mode: Mode::LocalSplice,
                language: language.to_string(),
                voice: voice.to_string(),
            }),
        }
    }
}
