//! Component stores that fail on purpose

use voicepack_common::{Error, PackageKind, Result};
use voicepack_sync::store::{ComponentRecord, ComponentStore, ComponentVersion};

/// Component store that can read but never write
#[derive(Debug, Default)]
pub struct FailingStore;

impl ComponentStore for FailingStore {
    async fn get(
        &self,
        _kind: PackageKind,
        _language: &str,
        _voice: &str,
        _component: &str,
    ) -> Result<Option<ComponentRecord>> {
        Ok(None)
    }

    async fn get_all_by_voice(&self, _kind: PackageKind, _language: &str, _voice: &str) -> Result<Vec<ComponentVersion>> {
        Ok(Vec::new())
    }

    async fn put(&self, _kind: PackageKind, _record: &ComponentRecord) -> Result<()> {
        Err(Error::Internal("disk full".to_string()))
    }
}

/// Component store whose `(language, voice)` index lookup always fails
#[derive(Debug, Default)]
pub struct UnreadableStore;

impl ComponentStore for UnreadableStore {
    async fn get(
        &self,
        _kind: PackageKind,
        _language: &str,
        _voice: &str,
        _component: &str,
    ) -> Result<Option<ComponentRecord>> {
        Err(Error::Internal("database is locked".to_string()))
    }

    async fn get_all_by_voice(&self, _kind: PackageKind, _language: &str, _voice: &str) -> Result<Vec<ComponentVersion>> {
        Err(Error::Internal("database is locked".to_string()))
    }

    async fn put(&self, _kind: PackageKind, _record: &ComponentRecord) -> Result<()> {
        Ok(())
    }
}
