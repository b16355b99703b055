//! Postgres-backed persistence: connect, migrate, and let every query
//! surface a `StorageError` rather than panicking. Queries are built with
//! the runtime `sqlx::query`/`query_as` API (not the compile-time
//! `query!` macro), so this never assumes a live `DATABASE_URL` at
//! compile time.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::shared::ids::{ClientId, DocumentId, UserId};

use super::{
    AccessRole, DocumentRecord, MetadataStore, OfflineQueueEntry, OperationRecord, Storage,
    StorageError, UserDirectory, UserRecord,
};

pub struct SqlxStorage {
    pool: PgPool,
}

impl SqlxStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations, logging and continuing on migration
    /// failure — a pool that fails to migrate is still usable for reads
    /// against an already-migrated schema.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            tracing::error!("migration failed: {e}");
        }

        Ok(Self { pool })
    }
}

fn to_storage_err(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[async_trait]
impl MetadataStore for SqlxStorage {
    async fn get_document(&self, document_id: DocumentId) -> Result<Option<DocumentRecord>, StorageError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: i64,
            owner_id: i64,
            snapshot_state: Option<Vec<u8>>,
            snapshot_version: Option<i64>,
        }

        let row = sqlx::query_as::<_, Row>(
            "SELECT id, owner_id, snapshot_state, snapshot_version FROM documents WHERE id = $1",
        )
        .bind(document_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_storage_err)?;

        Ok(row.map(|r| DocumentRecord {
            id: DocumentId(r.id),
            owner_id: UserId(r.owner_id),
            snapshot_state: r.snapshot_state,
            snapshot_version: r.snapshot_version,
        }))
    }

    async fn check_document_access(
        &self,
        document_id: DocumentId,
        user_id: UserId,
    ) -> Result<Option<AccessRole>, StorageError> {
        // AND-predicate, not the source's broken short-circuit OR (§9 open question).
        let is_owner: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = $1 AND owner_id = $2)",
        )
        .bind(document_id.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(to_storage_err)?;

        if is_owner {
            return Ok(Some(AccessRole::Owner));
        }

        let has_grant: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM document_access_grants WHERE document_id = $1 AND user_id = $2)",
        )
        .bind(document_id.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(to_storage_err)?;

        Ok(has_grant.then_some(AccessRole::Grant))
    }
}

#[async_trait]
impl UserDirectory for SqlxStorage {
    async fn get_user_by_open_id(&self, open_id: &str) -> Result<Option<UserRecord>, StorageError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: i64,
            name: String,
            open_id: String,
        }

        let row = sqlx::query_as::<_, Row>("SELECT id, name, open_id FROM users WHERE open_id = $1")
            .bind(open_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(to_storage_err)?;

        Ok(row.map(|r| UserRecord {
            id: UserId(r.id),
            name: r.name,
            open_id: r.open_id,
        }))
    }
}

#[async_trait]
impl Storage for SqlxStorage {
    async fn add_operation(&self, op: OperationRecord) -> Result<(), StorageError> {
        let vector_clock = serde_json::to_value(&op.vector_clock).map_err(|e| StorageError::Backend(e.to_string()))?;

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            sqlx::query(
                "INSERT INTO operations (document_id, client_id, user_id, bytes, lamport, vector_clock, version)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(op.document_id.0)
            .bind(&op.client_id.0)
            .bind(op.user_id.0)
            .bind(&op.bytes)
            .bind(op.lamport as i64)
            .bind(vector_clock)
            .bind(op.version)
            .execute(&self.pool),
        )
        .await
        .map_err(|_| StorageError::Timeout)?
        .map_err(to_storage_err)?;

        Ok(())
    }

    async fn get_operations_since(
        &self,
        document_id: DocumentId,
        version: i64,
    ) -> Result<Vec<OperationRecord>, StorageError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            document_id: i64,
            client_id: String,
            user_id: i64,
            bytes: Vec<u8>,
            lamport: i64,
            vector_clock: serde_json::Value,
            version: i64,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT document_id, client_id, user_id, bytes, lamport, vector_clock, version
             FROM operations WHERE document_id = $1 AND version > $2 ORDER BY version ASC",
        )
        .bind(document_id.0)
        .bind(version)
        .fetch_all(&self.pool)
        .await
        .map_err(to_storage_err)?;

        rows.into_iter()
            .map(|r| {
                let vector_clock: HashMap<String, u64> =
                    serde_json::from_value(r.vector_clock).map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok(OperationRecord {
                    document_id: DocumentId(r.document_id),
                    client_id: ClientId(r.client_id),
                    user_id: UserId(r.user_id),
                    bytes: r.bytes,
                    lamport: r.lamport as u64,
                    vector_clock,
                    version: r.version,
                })
            })
            .collect()
    }

    async fn create_session(
        &self,
        document_id: DocumentId,
        user_id: UserId,
        client_id: ClientId,
        color: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO sessions (client_id, document_id, user_id, color, position)
             VALUES ($1, $2, $3, $4, 0)
             ON CONFLICT (client_id) DO UPDATE SET document_id = $2, user_id = $3, color = $4",
        )
        .bind(&client_id.0)
        .bind(document_id.0)
        .bind(user_id.0)
        .bind(color)
        .execute(&self.pool)
        .await
        .map_err(to_storage_err)?;
        Ok(())
    }

    async fn delete_session(&self, client_id: &ClientId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE client_id = $1")
            .bind(&client_id.0)
            .execute(&self.pool)
            .await
            .map_err(to_storage_err)?;
        Ok(())
    }

    async fn update_session_cursor(
        &self,
        client_id: &ClientId,
        position: u32,
        selection: Option<(u32, u32)>,
    ) -> Result<(), StorageError> {
        let (sel_start, sel_end) = selection.map_or((None, None), |(s, e)| (Some(s as i32), Some(e as i32)));
        // Best-effort per §4.3 — a failed cursor write is not fatal.
        let _ = sqlx::query(
            "UPDATE sessions SET position = $2, selection_start = $3, selection_end = $4 WHERE client_id = $1",
        )
        .bind(&client_id.0)
        .bind(position as i32)
        .bind(sel_start)
        .bind(sel_end)
        .execute(&self.pool)
        .await;
        Ok(())
    }

    async fn update_document_snapshot(
        &self,
        document_id: DocumentId,
        state_bytes: &[u8],
        version: i64,
    ) -> Result<(), StorageError> {
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            sqlx::query("UPDATE documents SET snapshot_state = $2, snapshot_version = $3 WHERE id = $1")
                .bind(document_id.0)
                .bind(state_bytes)
                .bind(version)
                .execute(&self.pool),
        )
        .await
        .map_err(|_| StorageError::Timeout)?
        .map_err(to_storage_err)?;

        Ok(())
    }

    async fn add_offline_operation(&self, entry: OfflineQueueEntry) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO offline_queue (client_id, document_id, bytes, sequence_number)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&entry.client_id.0)
        .bind(entry.document_id.0)
        .bind(&entry.bytes)
        .bind(entry.sequence_number)
        .execute(&self.pool)
        .await
        .map_err(to_storage_err)?;
        Ok(())
    }

    async fn get_offline_queue(
        &self,
        client_id: &ClientId,
        document_id: DocumentId,
    ) -> Result<Vec<OfflineQueueEntry>, StorageError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            client_id: String,
            document_id: i64,
            bytes: Vec<u8>,
            sequence_number: i64,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT client_id, document_id, bytes, sequence_number FROM offline_queue
             WHERE client_id = $1 AND document_id = $2 ORDER BY sequence_number ASC",
        )
        .bind(&client_id.0)
        .bind(document_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(to_storage_err)?;

        Ok(rows
            .into_iter()
            .map(|r| OfflineQueueEntry {
                client_id: ClientId(r.client_id),
                document_id: DocumentId(r.document_id),
                bytes: r.bytes,
                sequence_number: r.sequence_number,
            })
            .collect())
    }

    async fn clear_offline_queue(&self, client_id: &ClientId, document_id: DocumentId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM offline_queue WHERE client_id = $1 AND document_id = $2")
            .bind(&client_id.0)
            .bind(document_id.0)
            .execute(&self.pool)
            .await
            .map_err(to_storage_err)?;
        Ok(())
    }
}
