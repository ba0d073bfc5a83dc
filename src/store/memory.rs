//! In-memory table doubles used by integration tests and local dry runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::store::errors::TableError;
use crate::store::table::{CellUpdate, RemoteTable};

/// Grid-backed `RemoteTable` with per-operation call counters, so tests can
/// assert that a rejected submission issued zero writes.
#[derive(Debug, Default)]
pub struct MemoryTable {
    grid: Mutex<Vec<Vec<String>>>,
    fetch_calls: AtomicU32,
    update_calls: AtomicU32,
    append_calls: AtomicU32,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(grid: Vec<Vec<String>>) -> Self {
        Self {
            grid: Mutex::new(grid),
            ..Self::default()
        }
    }

    pub fn grid(&self) -> Vec<Vec<String>> {
        self.grid.lock().expect("grid lock").clone()
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> u32 {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> u32 {
        self.update_calls() + self.append_calls()
    }
}

#[async_trait]
impl RemoteTable for MemoryTable {
    async fn fetch_all(&self) -> Result<Vec<Vec<String>>, TableError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.grid.lock().expect("grid lock").clone())
    }

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<(), TableError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut grid = self.grid.lock().expect("grid lock");
        for update in updates {
            while grid.len() <= update.row {
                grid.push(Vec::new());
            }
            let row = &mut grid[update.row];
            while row.len() <= update.col {
                row.push(String::new());
            }
            row[update.col] = update.value.clone();
        }
        Ok(())
    }

    async fn append_row(&self, row: &[String]) -> Result<(), TableError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.grid.lock().expect("grid lock").push(row.to_vec());
        Ok(())
    }
}

/// Wrapper that fails the next `n` operations with a transient error before
/// delegating, for exercising the retry policy.
pub struct FlakyTable {
    inner: Arc<dyn RemoteTable>,
    failures_left: AtomicU32,
}

impl FlakyTable {
    pub fn new(inner: Arc<dyn RemoteTable>, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
        }
    }

    fn inject(&self) -> Result<(), TableError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(TableError::Status {
                status: 503,
                body: "injected outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTable for FlakyTable {
    async fn fetch_all(&self) -> Result<Vec<Vec<String>>, TableError> {
        self.inject()?;
        self.inner.fetch_all().await
    }

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<(), TableError> {
        self.inject()?;
        self.inner.batch_update(updates).await
    }

    async fn append_row(&self, row: &[String]) -> Result<(), TableError> {
        self.inject()?;
        self.inner.append_row(row).await
    }
}
