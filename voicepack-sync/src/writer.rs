//! Persistent store writer
//!
//! The only path through which downloaded components reach the store.
//! Callers hand over a fully reassembled component; a failed upsert is
//! reported as a component-scoped [`Error::Storage`].

use crate::error::{Error, Result};
use crate::store::{ComponentRecord, ComponentStore};
use std::sync::Arc;
use tracing::{debug, warn};
use voicepack_common::PackageKind;

pub struct StoreWriter<S> {
    store: Arc<S>,
}

impl<S> Clone for StoreWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ComponentStore> StoreWriter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Upsert one complete component
    pub async fn commit(&self, kind: PackageKind, record: &ComponentRecord) -> Result<()> {
        match self.store.put(kind, record).await {
            Ok(()) => {
                debug!(
                    path = %record.path,
                    version = %record.version,
                    bytes = record.bytes.len(),
                    "Component committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(path = %record.path, error = %e, "Component commit failed");
                Err(Error::storage(record.path.clone(), e))
            }
        }
    }
}
