//! Package layout: which components each mode needs and how they are split
//!
//! Chunk counts are fixed and known before any request is made. A component
//! with one chunk is fetched as `{component}.{ext}`; a component with N > 1
//! chunks as `{component}_chunk_{i}.{ext}` for i in 0..N.

use serde::Serialize;
use std::collections::HashMap;
use voicepack_common::config::ComponentOverride;
use voicepack_common::Mode;

/// One independently downloadable unit of a voice package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComponentSpec {
    pub name: String,
    pub chunks: usize,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, chunks: usize) -> Self {
        Self {
            name: name.into(),
            chunks: chunks.max(1),
        }
    }

    /// File names (without extension) of this component's requests, in
    /// reassembly order
    pub fn request_files(&self) -> Vec<String> {
        if self.chunks == 1 {
            vec![self.name.clone()]
        } else {
            (0..self.chunks)
                .map(|i| format!("{}_chunk_{}", self.name, i))
                .collect()
        }
    }
}

/// Component fetch URL: `{prefix}@{version}/{language}/{voice}/{file}.{ext}`
pub fn component_url(
    prefix: &str,
    version: &str,
    language: &str,
    voice: &str,
    file: &str,
    extension: &str,
) -> String {
    format!(
        "{}@{}/{}/{}/{}.{}",
        prefix.trim_end_matches('/'),
        version,
        language,
        voice,
        file,
        extension
    )
}

/// Required components per synthesis mode
#[derive(Debug, Clone)]
pub struct PackageLayout {
    components: HashMap<Mode, Vec<ComponentSpec>>,
}

impl PackageLayout {
    /// Built-in layout
    ///
    /// - lightweight: `chars` (2 chunks), `words` (1 chunk)
    /// - offline: `model` (4 chunks), `voices` (1 chunk)
    /// - online: nothing
    pub fn builtin() -> Self {
        let mut components = HashMap::new();
        components.insert(Mode::Remote, Vec::new());
        components.insert(
            Mode::LocalSplice,
            vec![ComponentSpec::new("chars", 2), ComponentSpec::new("words", 1)],
        );
        components.insert(
            Mode::LocalInference,
            vec![ComponentSpec::new("model", 4), ComponentSpec::new("voices", 1)],
        );
        Self { components }
    }

    /// Layout with explicit component lists (used by tests and tools)
    pub fn from_components(components: HashMap<Mode, Vec<ComponentSpec>>) -> Self {
        Self { components }
    }

    /// Apply configuration overrides: same-named components get the new
    /// chunk count, unknown names are appended
    pub fn with_overrides(mut self, overrides: &[ComponentOverride]) -> Self {
        for o in overrides {
            let list = self.components.entry(o.mode).or_default();
            match list.iter_mut().find(|c| c.name == o.name) {
                Some(existing) => existing.chunks = o.chunks.max(1),
                None => list.push(ComponentSpec::new(o.name.clone(), o.chunks)),
            }
        }
        self
    }

    /// Components required by `mode`, in declaration order
    pub fn components(&self, mode: Mode) -> &[ComponentSpec] {
        self.components
            .get(&mode)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn component(&self, mode: Mode, name: &str) -> Option<&ComponentSpec> {
        self.components(mode).iter().find(|c| c.name == name)
    }
}

impl Default for PackageLayout {
    fn default() -> Self {
        Self::builtin()
    }
}
