use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use super::{ProcessingSessionRecord, RecordFilter, RecordStore, ReviewUpdate};
use crate::error::StoreError;
use crate::models::{ProcessingResult, ProcessingStatus, ReviewStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS processing_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    review_status TEXT NOT NULL,
    reviewer_notes TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    result JSONB NOT NULL
)
"#;

const USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS processing_sessions_user_id ON processing_sessions (user_id)";

const COLUMNS: &str =
    "id, user_id, status, review_status, reviewer_notes, created_at, updated_at, result";

/// PostgreSQL implementation of RecordStore, one JSONB row per processing run
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(USER_INDEX).execute(&self.pool).await?;
        info!("processing_sessions table ready");
        Ok(())
    }
}

fn decode_label<T: TryFrom<String, Error = String>>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let raw: String = row.try_get(column)?;
    T::try_from(raw).map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))
}

fn record_from_row(row: &PgRow) -> Result<ProcessingSessionRecord, StoreError> {
    let status: ProcessingStatus = decode_label(row, "status")?;
    let review_status: ReviewStatus = decode_label(row, "review_status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
    let Json(result): Json<ProcessingResult> = row.try_get("result")?;

    Ok(ProcessingSessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        status,
        review_status,
        reviewer_notes: row.try_get("reviewer_notes")?,
        created_at,
        updated_at,
        result,
    })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn create(&self, record: ProcessingSessionRecord) -> Result<(), StoreError> {
        let outcome = sqlx::query(&format!(
            "INSERT INTO processing_sessions ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.status.as_str())
        .bind(record.review_status.as_str())
        .bind(&record.reviewer_notes)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(Json(&record.result))
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(record.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<ProcessingSessionRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM processing_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ProcessingSessionRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM processing_sessions \
             WHERE ($1::TEXT IS NULL OR user_id = $1) \
               AND ($2::TEXT IS NULL OR status = $2) \
               AND ($3::TEXT IS NULL OR review_status = $3) \
             ORDER BY created_at DESC"
        ))
        .bind(filter.user_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.review_status.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn update(&self, id: &str, update: ReviewUpdate) -> Result<ProcessingSessionRecord, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE processing_sessions \
             SET review_status = $2, reviewer_notes = COALESCE($3, reviewer_notes), updated_at = $4 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(update.review_status.as_str())
        .bind(update.reviewer_notes)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        record_from_row(&row)
    }
}
