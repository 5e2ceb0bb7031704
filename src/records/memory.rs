//! In-process record store, optionally seeded from a JSON fixture file.

use super::{LogRecord, RecordStore, StoreError, UserLogSet};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

/// Fixture layout: `{ "<user_id>": [ { ...record... }, ... ] }`.
#[derive(Default)]
pub struct InMemoryRecordStore {
    users: RwLock<HashMap<String, Vec<LogRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(data: &str) -> Result<Self, StoreError> {
        let users: HashMap<String, Vec<LogRecord>> = serde_json::from_str(data)?;
        Ok(Self {
            users: RwLock::new(users),
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Backend(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&data)
    }

    /// Register a user (possibly with zero records) and append records.
    pub fn insert(&self, user_id: &str, records: Vec<LogRecord>) {
        self.users
            .write()
            .entry(user_id.to_string())
            .or_default()
            .extend(records);
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn fetch(&self, user_id: &str) -> Result<Option<UserLogSet>, StoreError> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|records| UserLogSet::new(user_id, records.clone())))
    }
}
