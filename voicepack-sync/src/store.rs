//! Component store
//!
//! Persistent table of `(language, voice, component) -> {version, bytes}`,
//! one logical store per [`PackageKind`]. At most one record exists per key;
//! later writes replace earlier ones.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use voicepack_common::{Error, PackageKind, Result};

/// One whole component as persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    /// Logical path `{language}/{voice}/{component}`
    pub path: String,
    pub language: String,
    pub voice: String,
    pub component: String,
    pub version: String,
    pub bytes: Vec<u8>,
}

impl ComponentRecord {
    pub fn new(
        language: impl Into<String>,
        voice: impl Into<String>,
        component: impl Into<String>,
        version: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let language = language.into();
        let voice = voice.into();
        let component = component.into();
        Self {
            path: format!("{}/{}/{}", language, voice, component),
            language,
            voice,
            component,
            version: version.into(),
            bytes,
        }
    }
}

/// Version summary returned by the `(language, voice)` index lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion {
    pub component: String,
    pub version: String,
    pub size: u64,
}

/// Point lookup, index lookup and upsert over component records
///
/// Distinct keys may be read and written concurrently; no cross-component
/// transaction is offered.
pub trait ComponentStore: Send + Sync + 'static {
    /// Point lookup by identity key
    fn get(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
        component: &str,
    ) -> impl Future<Output = Result<Option<ComponentRecord>>> + Send;

    /// Index lookup of every component stored for `(language, voice)`
    fn get_all_by_voice(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
    ) -> impl Future<Output = Result<Vec<ComponentVersion>>> + Send;

    /// Insert or replace the record with the same identity key
    fn put(
        &self,
        kind: PackageKind,
        record: &ComponentRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// SQLite-backed component store
#[derive(Debug, Clone)]
pub struct SqliteComponentStore {
    pool: SqlitePool,
}

impl SqliteComponentStore {
    /// Wrap a pool whose tables were created by
    /// [`voicepack_common::db::init_tables`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ComponentStore for SqliteComponentStore {
    async fn get(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
        component: &str,
    ) -> Result<Option<ComponentRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT path, language, voice, component, version, bytes
            FROM {}
            WHERE language = ? AND voice = ? AND component = ?
            "#,
            kind.table()
        ))
        .bind(language)
        .bind(voice)
        .bind(component)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ComponentRecord {
            path: row.get("path"),
            language: row.get("language"),
            voice: row.get("voice"),
            component: row.get("component"),
            version: row.get("version"),
            bytes: row.get("bytes"),
        }))
    }

    async fn get_all_by_voice(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
    ) -> Result<Vec<ComponentVersion>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT component, version, length(bytes) AS size
            FROM {}
            WHERE language = ? AND voice = ?
            ORDER BY component
            "#,
            kind.table()
        ))
        .bind(language)
        .bind(voice)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ComponentVersion {
                component: row.get("component"),
                version: row.get("version"),
                size: row.get::<i64, _>("size").max(0) as u64,
            })
            .collect())
    }

    async fn put(&self, kind: PackageKind, record: &ComponentRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (path, language, voice, component, version, bytes, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(language, voice, component) DO UPDATE SET
                path = excluded.path,
                version = excluded.version,
                bytes = excluded.bytes,
                updated_at = CURRENT_TIMESTAMP
            "#,
            kind.table()
        ))
        .bind(&record.path)
        .bind(&record.language)
        .bind(&record.voice)
        .bind(&record.component)
        .bind(&record.version)
        .bind(&record.bytes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

type MemoryKey = (PackageKind, String, String, String);

/// In-process component store for ephemeral sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryComponentStore {
    records: Arc<Mutex<HashMap<MemoryKey, ComponentRecord>>>,
}

impl MemoryComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<MemoryKey, ComponentRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Internal("component store lock poisoned".to_string()))
    }
}

impl ComponentStore for MemoryComponentStore {
    async fn get(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
        component: &str,
    ) -> Result<Option<ComponentRecord>> {
        let key = (kind, language.to_string(), voice.to_string(), component.to_string());
        Ok(self.lock()?.get(&key).cloned())
    }

    async fn get_all_by_voice(
        &self,
        kind: PackageKind,
        language: &str,
        voice: &str,
    ) -> Result<Vec<ComponentVersion>> {
        let records = self.lock()?;
        let mut versions: Vec<ComponentVersion> = records
            .iter()
            .filter(|((k, l, v, _), _)| *k == kind && l == language && v == voice)
            .map(|(_, r)| ComponentVersion {
                component: r.component.clone(),
                version: r.version.clone(),
                size: r.bytes.len() as u64,
            })
            .collect();
        versions.sort_by(|a, b| a.component.cmp(&b.component));
        Ok(versions)
    }

    async fn put(&self, kind: PackageKind, record: &ComponentRecord) -> Result<()> {
        let key = (
            kind,
            record.language.clone(),
            record.voice.clone(),
            record.component.clone(),
        );
        self.lock()?.insert(key, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_store() -> SqliteComponentStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        voicepack_common::db::init_tables(&pool).await.unwrap();
        SqliteComponentStore::new(pool)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = setup_test_store().await;
        let record = ComponentRecord::new("yue", "female", "chars", "1.0.0", vec![1, 2, 3]);

        store.put(PackageKind::Audio, &record).await.unwrap();

        let loaded = store
            .get(PackageKind::Audio, "yue", "female", "chars")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.path, "yue/female/chars");
    }

    #[tokio::test]
    async fn test_stores_are_separate_per_kind() {
        let store = setup_test_store().await;
        let record = ComponentRecord::new("yue", "female", "chars", "1.0.0", vec![1]);
        store.put(PackageKind::Audio, &record).await.unwrap();

        let other = store
            .get(PackageKind::Model, "yue", "female", "chars")
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_later_write_replaces_record() {
        let store = setup_test_store().await;
        store
            .put(PackageKind::Audio, &ComponentRecord::new("yue", "female", "words", "1.0.0", vec![1]))
            .await
            .unwrap();
        store
            .put(PackageKind::Audio, &ComponentRecord::new("yue", "female", "words", "1.1.0", vec![9, 9]))
            .await
            .unwrap();

        let versions = store
            .get_all_by_voice(PackageKind::Audio, "yue", "female")
            .await
            .unwrap();
        assert_eq!(
            versions,
            vec![ComponentVersion {
                component: "words".to_string(),
                version: "1.1.0".to_string(),
                size: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_index_lookup_scopes_to_voice() {
        let store = setup_test_store().await;
        for (voice, component) in [("female", "chars"), ("female", "words"), ("male", "chars")] {
            store
                .put(PackageKind::Audio, &ComponentRecord::new("yue", voice, component, "1.0.0", vec![0]))
                .await
                .unwrap();
        }

        let female = store
            .get_all_by_voice(PackageKind::Audio, "yue", "female")
            .await
            .unwrap();
        let names: Vec<_> = female.iter().map(|c| c.component.as_str()).collect();
        assert_eq!(names, vec!["chars", "words"]);
    }

    #[tokio::test]
    async fn test_memory_store_matches_contract() {
        let store = MemoryComponentStore::new();
        assert!(store.is_empty());

        store
            .put(PackageKind::Model, &ComponentRecord::new("cmn", "a", "model", "1", vec![1, 2]))
            .await
            .unwrap();
        store
            .put(PackageKind::Model, &ComponentRecord::new("cmn", "a", "model", "2", vec![3]))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let record = store
            .get(PackageKind::Model, "cmn", "a", "model")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.version, "2");
        assert!(store
            .get_all_by_voice(PackageKind::Audio, "cmn", "a")
            .await
            .unwrap()
            .is_empty());
    }
}
