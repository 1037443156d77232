//! Component store wrapper counting `get` calls per component

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use voicepack_common::{PackageKind, Result};
use voicepack_sync::store::{ComponentRecord, ComponentStore, ComponentVersion, MemoryComponentStore};

#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    inner: MemoryComponentStore,
    reads: Arc<Mutex<HashMap<String, usize>>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self, component: &str) -> usize {
        self.reads.lock().unwrap().get(component).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().unwrap().values().sum()
    }

    pub async fn insert(&self, component: &str, version: &str, bytes: Vec<u8>) {
        let record = ComponentRecord::new("yue", "female", component, version, bytes);
        self.inner.put(PackageKind::Audio, &record).await.unwrap();
    }
}

impl ComponentStore for CountingStore {
    async fn get(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
        component: &str,
    ) -> Result<Option<ComponentRecord>> {
        *self.reads.lock().unwrap().entry(component.to_string()).or_default() += 1;
        self.inner.get(kind, language, voice, component).await
    }

    async fn get_all_by_voice(&self, kind: PackageKind, language: &str, voice: &str) -> Result<Vec<ComponentVersion>> {
        self.inner.get_all_by_voice(kind, language, voice).await
    }

    async fn put(&self, kind: PackageKind, record: &ComponentRecord) -> Result<()> {
        self.inner.put(kind, record).await
    }
}
