use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use diesel::prelude::*;
use tracing::debug;

use crate::db::executor::{DbExecutor, DieselSqliteExecutor};
use crate::db::models::NewRecordingPartRow;
use crate::db::schema::t_recording_part;
use wr_core::ports::{PartStoreError, PartStorePort};
use wr_core::recording::{PartWrite, StorageTier, TierHandle};

/// Indexed store tier. Every write runs in its own immediate transaction and yields
/// the autoincrement row id as the part key.
///
/// 索引存储层：每次写入都是独立事务，返回自增主键。
pub struct DieselIndexedPartStore {
    executor: DieselSqliteExecutor,
}

impl DieselIndexedPartStore {
    pub fn new(executor: DieselSqliteExecutor) -> Self {
        Self { executor }
    }

    /// Run a blocking diesel closure off the async worker threads.
    async fn blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> anyhow::Result<T> + Send + 'static,
    {
        let executor = self.executor.clone();
        tokio::task::spawn_blocking(move || executor.run(f))
            .await
            .context("Indexed store task panicked")?
    }

    fn key_of(handle: &TierHandle) -> Result<i64, PartStoreError> {
        match handle {
            TierHandle::Key { key } => Ok(*key),
            other => Err(PartStoreError::ForeignHandle(other.clone())),
        }
    }

    /// Number of rows currently stored for a session.
    pub async fn count_for_session(&self, session_id: &str) -> anyhow::Result<i64> {
        let session_id = session_id.to_string();
        self.blocking(move |conn| {
            let count = t_recording_part::table
                .filter(t_recording_part::session_id.eq(session_id))
                .count()
                .get_result::<i64>(conn)?;
            Ok(count)
        })
        .await
    }
}

#[async_trait]
impl PartStorePort for DieselIndexedPartStore {
    fn tier(&self) -> StorageTier {
        StorageTier::IndexedStore
    }

    async fn probe(&self) -> Result<(), PartStoreError> {
        self.blocking(|conn| {
            t_recording_part::table
                .count()
                .get_result::<i64>(conn)
                .context("Indexed store table not readable")?;
            Ok(())
        })
        .await
        .map_err(|err| PartStoreError::Unavailable(format!("{err:#}")))
    }

    async fn save(&self, write: PartWrite<'_>) -> Result<TierHandle, PartStoreError> {
        let row = NewRecordingPartRow {
            session_id: write.session_id.as_str().to_string(),
            file_name: write.file_name(),
            mime_type: write.mime_hint.to_string(),
            byte_size: write.bytes.len() as i64,
            data: write.bytes.to_vec(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        let file_name = row.file_name.clone();

        let key = self
            .blocking(move |conn| {
                conn.immediate_transaction(|conn| {
                    let id = diesel::insert_into(t_recording_part::table)
                        .values(&row)
                        .returning(t_recording_part::id)
                        .get_result::<i64>(conn)?;
                    Ok::<_, anyhow::Error>(id)
                })
            })
            .await
            .map_err(|err| PartStoreError::Storage(format!("{err:#}")))?;

        debug!(key, file_name = %file_name, "Part written to indexed store");
        Ok(TierHandle::Key { key })
    }

    async fn read(&self, handle: &TierHandle) -> Result<Bytes, PartStoreError> {
        let key = Self::key_of(handle)?;
        let data = self
            .blocking(move |conn| {
                let data = t_recording_part::table
                    .filter(t_recording_part::id.eq(key))
                    .select(t_recording_part::data)
                    .first::<Vec<u8>>(conn)
                    .optional()?;
                Ok(data)
            })
            .await
            .map_err(|err| PartStoreError::Storage(format!("{err:#}")))?;

        data.map(Bytes::from)
            .ok_or_else(|| PartStoreError::NotFound(format!("indexed part {key}")))
    }

    async fn delete(&self, handle: &TierHandle) -> Result<(), PartStoreError> {
        let key = Self::key_of(handle)?;
        self.blocking(move |conn| {
            conn.immediate_transaction(|conn| {
                diesel::delete(t_recording_part::table.filter(t_recording_part::id.eq(key)))
                    .execute(conn)?;
                Ok::<_, anyhow::Error>(())
            })
        })
        .await
        .map_err(|err| PartStoreError::Storage(format!("{err:#}")))
    }
}
