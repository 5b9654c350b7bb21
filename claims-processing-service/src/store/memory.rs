use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{ProcessingSessionRecord, RecordFilter, RecordStore, ReviewUpdate};
use crate::error::StoreError;

/// In-memory implementation of RecordStore
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<DashMap<String, ProcessingSessionRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, record: ProcessingSessionRecord) -> Result<(), StoreError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<ProcessingSessionRecord>, StoreError> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<ProcessingSessionRecord>, StoreError> {
        let mut records: Vec<ProcessingSessionRecord> = self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn update(&self, id: &str, update: ReviewUpdate) -> Result<ProcessingSessionRecord, StoreError> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        entry.review_status = update.review_status;
        if let Some(notes) = update.reviewer_notes {
            entry.reviewer_notes = Some(notes);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}
