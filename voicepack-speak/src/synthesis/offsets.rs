//! Offset index: fragment text to byte range inside a component blob
//!
//! Ranges are scoped to `(version, language, voice, component)`; a range
//! recorded for one package version says nothing about another.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Half-open byte range `start..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[usize; 2]")]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl From<[usize; 2]> for ByteRange {
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The addressed bytes, or `None` if the range is empty or out of bounds
    pub fn slice<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        if self.is_empty() {
            return None;
        }
        bytes.get(self.start..self.end)
    }
}

/// Fragment lookup for one installed package
pub trait OffsetIndex: Send + Sync + 'static {
    fn lookup(
        &self,
        version: &str,
        language: &str,
        voice: &str,
        component: &str,
        fragment: &str,
    ) -> Option<ByteRange>;
}

type Scope = (String, String, String, String);

/// Offset index held in memory, filled from JSON or by hand
#[derive(Debug, Clone, Default)]
pub struct InMemoryOffsetIndex {
    entries: HashMap<Scope, HashMap<String, ByteRange>>,
}

impl InMemoryOffsetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        version: &str,
        language: &str,
        voice: &str,
        component: &str,
        fragment: impl Into<String>,
        range: ByteRange,
    ) {
        self.entries
            .entry(scope(version, language, voice, component))
            .or_default()
            .insert(fragment.into(), range);
    }

    /// Load one component's table: `{"fragment": [start, end], ...}`
    pub fn load_component_json(
        &mut self,
        version: &str,
        language: &str,
        voice: &str,
        component: &str,
        json: &str,
    ) -> Result<usize> {
        let table: HashMap<String, ByteRange> = serde_json::from_str(json)
            .map_err(|e| Error::Decode(format!("Invalid offset table for {}: {}", component, e)))?;
        let count = table.len();

        self.entries
            .entry(scope(version, language, voice, component))
            .or_default()
            .extend(table);
        Ok(count)
    }

    /// Load a whole package: `{"chars": {...}, "words": {...}}`
    pub fn load_package_json(&mut self, version: &str, language: &str, voice: &str, json: &str) -> Result<usize> {
        let tables: HashMap<String, HashMap<String, ByteRange>> =
            serde_json::from_str(json).map_err(|e| Error::Decode(format!("Invalid offset file: {}", e)))?;

        let mut count = 0;
        for (component, table) in tables {
            count += table.len();
            self.entries
                .entry(scope(version, language, voice, &component))
                .or_default()
                .extend(table);
        }
        Ok(count)
    }

    pub fn load_package_file(&mut self, path: &Path, version: &str, language: &str, voice: &str) -> Result<usize> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Decode(format!("Failed to read offset file {}: {}", path.display(), e)))?;
        let count = self.load_package_json(version, language, voice, &json)?;
        info!("Loaded {} offset entries from {}", count, path.display());
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OffsetIndex for InMemoryOffsetIndex {
    fn lookup(
        &self,
        version: &str,
        language: &str,
        voice: &str,
        component: &str,
        fragment: &str,
    ) -> Option<ByteRange> {
        self.entries
            .get(&scope(version, language, voice, component))
            .and_then(|table| table.get(fragment))
            .copied()
    }
}

fn scope(version: &str, language: &str, voice: &str, component: &str) -> Scope {
    (
        version.to_string(),
        language.to_string(),
        voice.to_string(),
        component.to_string(),
    )
}
