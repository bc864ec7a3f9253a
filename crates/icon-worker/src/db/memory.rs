//! In-memory [`FileStore`] for tests and local experiments.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::file_repo::{FileRecord, FileStore, ProcessingStatus};
use super::DatabaseError;

/// Operations of [`FileStore`], used to select which one should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileOp {
    Find,
    MarkProcessing,
    MarkComplete,
}

/// A status write observed by the store, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusWrite {
    pub file_id: i32,
    pub status: ProcessingStatus,
    pub texture_path: Option<String>,
}

#[derive(Default)]
struct State {
    records: HashMap<i32, FileRecord>,
    writes: Vec<StatusWrite>,
    failing: Vec<FileOp>,
}

#[derive(Default)]
pub struct InMemoryFileStore {
    state: Mutex<State>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: FileRecord) {
        self.lock().records.insert(record.id, record);
    }

    pub fn get(&self, file_id: i32) -> Option<FileRecord> {
        self.lock().records.get(&file_id).cloned()
    }

    /// Every successful status write, in order.
    pub fn writes(&self) -> Vec<StatusWrite> {
        self.lock().writes.clone()
    }

    /// Makes `op` fail until [`Self::clear_failures`] is called.
    pub fn fail_on(&self, op: FileOp) {
        self.lock().failing.push(op);
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(state: &State, op: FileOp) -> Result<(), DatabaseError> {
        if state.failing.contains(&op) {
            return Err(DatabaseError::Unavailable(format!("injected {:?} failure", op)));
        }
        Ok(())
    }

    fn write(
        &self,
        op: FileOp,
        file_id: i32,
        status: ProcessingStatus,
        texture_path: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        Self::check(&state, op)?;

        let record = state
            .records
            .get_mut(&file_id)
            .ok_or(DatabaseError::RecordNotFound { file_id })?;
        record.status = status;
        if let Some(path) = texture_path {
            record.texture_path = Some(path.to_string());
        }

        state.writes.push(StatusWrite {
            file_id,
            status,
            texture_path: texture_path.map(str::to_string),
        });
        Ok(())
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn find(&self, file_id: i32) -> Result<Option<FileRecord>, DatabaseError> {
        let state = self.lock();
        Self::check(&state, FileOp::Find)?;
        Ok(state.records.get(&file_id).cloned())
    }

    async fn mark_processing(&self, file_id: i32) -> Result<(), DatabaseError> {
        self.write(
            FileOp::MarkProcessing,
            file_id,
            ProcessingStatus::Processing,
            None,
        )
    }

    async fn mark_complete(&self, file_id: i32, texture_path: &str) -> Result<(), DatabaseError> {
        self.write(
            FileOp::MarkComplete,
            file_id,
            ProcessingStatus::Complete,
            Some(texture_path),
        )
    }
}
