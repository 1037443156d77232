//! Component store whose reads always fail

use voicepack_common::{Error, PackageKind, Result};
use voicepack_sync::store::{ComponentRecord, ComponentStore, ComponentVersion};

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
