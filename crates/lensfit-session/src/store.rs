//! Measurement store port.

use crate::packager::FinalRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record {0} already stored")]
    Duplicate(Uuid),
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Receipt for a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub record_id: Uuid,
    pub stored_at: DateTime<Utc>,
}

/// Durable destination for packaged records.
///
/// Implementations own durability of both the record and the snapshot it
/// references. Callers do not retry on failure.
pub trait MeasurementStore: Send + Sync {
    fn persist(&self, record: &FinalRecord) -> Result<Ack, StoreError>;
}

/// In-process store, for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<FinalRecord>>,
    unavailable: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `persist` fail with [`StoreError::Unavailable`]
    /// until cleared with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self
            .unavailable
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }

    pub fn records(&self) -> Vec<FinalRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MeasurementStore for MemoryStore {
    fn persist(&self, record: &FinalRecord) -> Result<Ack, StoreError> {
        if let Some(reason) = self
            .unavailable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(StoreError::Unavailable(reason));
        }

        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        records.push(record.clone());

        Ok(Ack {
            record_id: record.id,
            stored_at: Utc::now(),
        })
    }
}
