//! Shared setup: one log directory, one coordinator, writers and readers
//! over them, all in this process.

use ds_coordinator::MemoryCoordinator;
use ds_core::{CacheMode, FqField, LaggingPolicy};
use ds_reader::{Reader, ReaderOptions};
use ds_storage::FileLogStore;
use ds_writer::{Mutation, WriteRequest, Writer, WriterOptions};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Stack {
    pub dir: TempDir,
    pub coordinator: Arc<MemoryCoordinator>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            coordinator: Arc::new(MemoryCoordinator::new()),
        }
    }

    /// A fresh handle on the shared log, as a separate process would open it
    pub fn store(&self) -> Arc<FileLogStore> {
        Arc::new(FileLogStore::open(self.dir.path()).unwrap())
    }

    pub fn writer(&self) -> Writer<FileLogStore, MemoryCoordinator> {
        Writer::new(
            self.store(),
            Arc::clone(&self.coordinator),
            WriterOptions::default(),
        )
    }

    pub fn reader(&self, cache_mode: CacheMode) -> Reader<FileLogStore> {
        Reader::new(
            self.store(),
            ReaderOptions {
                cache_mode,
                lagging_policy: LaggingPolicy::Wait,
                wait_timeout: Duration::from_millis(500),
                poll_interval: Duration::from_millis(20),
            },
        )
    }
}

pub fn fqfield(s: &str) -> FqField {
    s.parse().unwrap()
}

pub fn set(field: &str, value: Value) -> WriteRequest {
    WriteRequest::new(vec![Mutation::Set {
        fqfield: fqfield(field),
        value,
    }])
}
