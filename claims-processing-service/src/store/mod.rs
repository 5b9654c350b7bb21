//! Persistence of processing sessions behind an injectable repository trait.

mod memory;
mod postgres;

pub use memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{ProcessingResult, ProcessingStatus, ReviewStatus};

/// One persisted orchestration run plus its staff review state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSessionRecord {
    /// Same as the processing id of the result
    pub id: String,
    pub user_id: String,
    pub status: ProcessingStatus,
    pub review_status: ReviewStatus,
    pub reviewer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: ProcessingResult,
}

impl ProcessingSessionRecord {
    pub fn new(user_id: impl Into<String>, result: ProcessingResult) -> Self {
        Self {
            id: result.processing_id.clone(),
            user_id: user_id.into(),
            status: result.status,
            review_status: ReviewStatus::Pending,
            reviewer_notes: None,
            created_at: result.timestamp,
            updated_at: result.timestamp,
            result,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub user_id: Option<String>,
    pub status: Option<ProcessingStatus>,
    pub review_status: Option<ReviewStatus>,
}

impl RecordFilter {
    pub fn matches(&self, record: &ProcessingSessionRecord) -> bool {
        self.user_id.as_ref().is_none_or(|u| *u == record.user_id)
            && self.status.is_none_or(|s| s == record.status)
            && self.review_status.is_none_or(|r| r == record.review_status)
    }
}

/// Staff review decision applied to a stored record
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    pub review_status: ReviewStatus,
    /// Keeps the existing notes when absent
    pub reviewer_notes: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the id is already stored.
    async fn create(&self, record: ProcessingSessionRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<ProcessingSessionRecord>, StoreError>;

    /// Matching records, newest first.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ProcessingSessionRecord>, StoreError>;

    async fn update(&self, id: &str, update: ReviewUpdate) -> Result<ProcessingSessionRecord, StoreError>;
}
