//! Header-indexed view over the remote flat table.
//!
//! The table has no schema and no transactions: row 0 names the columns and
//! every other row is one case, addressed by the normalized `(name, date)`
//! natural key. All reads go through a short-TTL snapshot cache to bound
//! read amplification; the cache is invalidated before every read-then-write
//! sequence and after every successful write. Rows are never deleted or
//! reordered, so a located row handle stays valid across the appends that
//! may happen after it was taken.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;
use tracing::{debug, info};

use crate::errors::WorkflowError;
use crate::store::retry::RetryPolicy;
use crate::store::table::{CellUpdate, RemoteTable};

/// One row parsed into field-name → cell-text form.
pub type Record = BTreeMap<String, String>;

/// Positional handle to a located row; `row` is the absolute table row
/// (header = 0), usable directly in cell updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowHandle {
    pub row: usize,
}

/// Parsed point-in-time copy of the table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Snapshot {
    fn new(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self {
                header: Vec::new(),
                rows: Vec::new(),
            };
        }
        let header = grid.remove(0);
        Self { header, rows: grid }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Field map for the data row at `index` (0-based, header excluded).
    pub fn record(&self, index: usize) -> Record {
        let mut record = Record::new();
        if let Some(row) = self.rows.get(index) {
            for (col, name) in self.header.iter().enumerate() {
                if name.is_empty() {
                    continue;
                }
                let value = row.get(col).cloned().unwrap_or_default();
                record.insert(name.clone(), value);
            }
        }
        record
    }

    pub fn records(&self) -> Vec<Record> {
        (0..self.rows.len()).map(|i| self.record(i)).collect()
    }
}

/// Trim the identity half of the natural key. The sheet is hand-editable, so
/// stray whitespace around names is routine.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

/// Canonicalize the date half of the natural key to `YYYY-MM-DD`. Several
/// serializations show up in practice depending on who last touched the row.
pub fn canonical_date(raw: &str) -> Result<String, WorkflowError> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y"];
    let raw = raw.trim();
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date.format("%Y-%m-%d").to_string());
        }
    }
    Err(WorkflowError::Validation(format!(
        "unrecognized assessment date '{raw}'"
    )))
}

pub struct CaseStore {
    table: Arc<dyn RemoteTable>,
    retry: RetryPolicy,
    cache: Cache<(), Arc<Snapshot>>,
}

impl CaseStore {
    pub fn new(table: Arc<dyn RemoteTable>, retry: RetryPolicy, snapshot_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(snapshot_ttl)
            .build();
        Self {
            table,
            retry,
            cache,
        }
    }

    /// Current snapshot, served from the TTL cache when fresh.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, WorkflowError> {
        if let Some(snapshot) = self.cache.get(&()).await {
            return Ok(snapshot);
        }
        let table = Arc::clone(&self.table);
        let grid = self
            .retry
            .run("fetch_all", move || {
                let table = Arc::clone(&table);
                async move { table.fetch_all().await }
            })
            .await?;
        let snapshot = Arc::new(Snapshot::new(grid));
        self.cache.insert((), Arc::clone(&snapshot)).await;
        debug!(rows = snapshot.row_count(), "loaded table snapshot");
        Ok(snapshot)
    }

    /// Drop the cached snapshot. Must be called before any read whose result
    /// feeds a write decision.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }

    /// Every case row as a field map.
    pub async fn load_all(&self) -> Result<Vec<Record>, WorkflowError> {
        Ok(self.snapshot().await?.records())
    }

    /// Find the single row matching the normalized `(name, date)` key.
    /// Zero matches is `NotFound`; more than one is `AmbiguousKey` — the
    /// store never silently picks a row.
    pub async fn locate(&self, name: &str, date: &str) -> Result<(RowHandle, Record), WorkflowError> {
        let want_name = normalize_name(name);
        let want_date = canonical_date(date)?;
        let snapshot = self.snapshot().await?;

        let mut matches = Vec::new();
        for index in 0..snapshot.row_count() {
            let record = snapshot.record(index);
            let row_name = record
                .get(super::schema::NAME)
                .map(|v| normalize_name(v))
                .unwrap_or_default();
            if row_name != want_name {
                continue;
            }
            let row_date = record
                .get(super::schema::DATE)
                .map(String::as_str)
                .unwrap_or("");
            let row_date = canonical_date(row_date)
                .unwrap_or_else(|_| row_date.trim().to_string());
            if row_date == want_date {
                matches.push((index, record));
            }
        }

        match matches.len() {
            0 => Err(WorkflowError::NotFound {
                name: want_name,
                date: want_date,
            }),
            1 => {
                let (index, record) = matches.into_iter().next().expect("one match");
                Ok((RowHandle { row: index + 1 }, record))
            }
            count => Err(WorkflowError::AmbiguousKey {
                name: want_name,
                date: want_date,
                count,
            }),
        }
    }

    /// Extend the header with any of `names` it does not already carry, at
    /// the right edge, preserving the requested order. A second call with
    /// the same names is a no-op that issues zero writes.
    pub async fn ensure_columns(&self, names: &[String]) -> Result<(), WorkflowError> {
        self.invalidate().await;
        let snapshot = self.snapshot().await?;

        let mut missing = Vec::new();
        for name in names {
            if snapshot.column_index(name).is_none() && !missing.contains(name) {
                missing.push(name.clone());
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let start = snapshot.header().len();
        let updates: Vec<CellUpdate> = missing
            .iter()
            .enumerate()
            .map(|(offset, name)| CellUpdate {
                row: 0,
                col: start + offset,
                value: name.clone(),
            })
            .collect();

        let table = Arc::clone(&self.table);
        self.retry
            .run("ensure_columns", move || {
                let table = Arc::clone(&table);
                let updates = updates.clone();
                async move { table.batch_update(&updates).await }
            })
            .await?;
        self.invalidate().await;
        info!(added = missing.len(), "extended table header");
        Ok(())
    }

    /// Append one row, laid out by the current header order; fields the
    /// record does not carry default to empty cells.
    pub async fn append_row(&self, record: &Record) -> Result<(), WorkflowError> {
        let snapshot = self.snapshot().await?;
        let row: Vec<String> = snapshot
            .header()
            .iter()
            .map(|name| record.get(name).cloned().unwrap_or_default())
            .collect();

        let table = Arc::clone(&self.table);
        self.retry
            .run("append_row", move || {
                let table = Arc::clone(&table);
                let row = row.clone();
                async move { table.append_row(&row).await }
            })
            .await?;
        self.invalidate().await;
        Ok(())
    }

    /// Write `fields` into the row behind `handle` as one batched call, so
    /// the API call count tracks the dirty field count, not the table width,
    /// and a crash cannot land half a stage delta.
    pub async fn update_cells(&self, handle: RowHandle, fields: &Record) -> Result<(), WorkflowError> {
        if fields.is_empty() {
            return Ok(());
        }
        let snapshot = self.snapshot().await?;
        let mut updates = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let col = snapshot.column_index(name).ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "column '{name}' missing from header; ensure_columns must run first"
                ))
            })?;
            updates.push(CellUpdate {
                row: handle.row,
                col,
                value: value.clone(),
            });
        }
        updates.sort_by_key(|u| u.col);

        let table = Arc::clone(&self.table);
        self.retry
            .run("update_cells", move || {
                let table = Arc::clone(&table);
                let updates = updates.clone();
                async move { table.batch_update(&updates).await }
            })
            .await?;
        self.invalidate().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryTable;
    use crate::store::retry::{RetryConfig, RetryPolicy};

    fn store_with(table: Arc<MemoryTable>) -> CaseStore {
        let retry = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        });
        CaseStore::new(table, retry, Duration::from_secs(5))
    }

    fn seeded_table() -> Arc<MemoryTable> {
        Arc::new(MemoryTable::with_grid(vec![
            vec!["status".into(), "name".into(), "date".into()],
            vec!["pending_initial".into(), "Alice".into(), "2024-01-05".into()],
            vec!["completed".into(), "Bob".into(), "2023-11-30".into()],
        ]))
    }

    #[tokio::test]
    async fn locate_normalizes_both_key_halves() {
        let store = store_with(seeded_table());
        let (handle, record) = store.locate("Alice ", "2024/01/05").await.unwrap();
        assert_eq!(handle, RowHandle { row: 1 });
        assert_eq!(record.get("status").unwrap(), "pending_initial");
    }

    #[tokio::test]
    async fn locate_misses_cleanly() {
        let store = store_with(seeded_table());
        match store.locate("Carol", "2024-01-05").await {
            Err(WorkflowError::NotFound { name, .. }) => assert_eq!(name, "Carol"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_keys_are_ambiguous_not_picked() {
        let table = Arc::new(MemoryTable::with_grid(vec![
            vec!["status".into(), "name".into(), "date".into()],
            vec!["pending_initial".into(), "Alice".into(), "2024-01-05".into()],
            vec!["completed".into(), " Alice".into(), "2024/01/05".into()],
        ]));
        let store = store_with(table);
        match store.locate("Alice", "2024-01-05").await {
            Err(WorkflowError::AmbiguousKey { count, .. }) => assert_eq!(count, 2),
            other => panic!("expected AmbiguousKey, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ensure_columns_is_idempotent() {
        let table = seeded_table();
        let store = store_with(Arc::clone(&table));
        let names = vec!["grade".to_string(), "routing".to_string()];

        store.ensure_columns(&names).await.unwrap();
        let header_after_first = table.grid()[0].clone();
        assert!(header_after_first.contains(&"grade".to_string()));
        let writes_after_first = table.update_calls();

        store.ensure_columns(&names).await.unwrap();
        assert_eq!(table.grid()[0], header_after_first);
        assert_eq!(table.update_calls(), writes_after_first);
    }

    #[tokio::test]
    async fn ensure_columns_bootstraps_an_empty_table() {
        let table = Arc::new(MemoryTable::new());
        let store = store_with(Arc::clone(&table));
        store
            .ensure_columns(&["status".to_string(), "name".to_string()])
            .await
            .unwrap();
        assert_eq!(table.grid()[0], vec!["status", "name"]);
    }

    #[tokio::test]
    async fn append_row_follows_header_order() {
        let table = seeded_table();
        let store = store_with(Arc::clone(&table));
        let mut record = Record::new();
        record.insert("name".to_string(), "Dana".to_string());
        record.insert("date".to_string(), "2024-02-01".to_string());
        // status intentionally absent: defaults to empty.
        store.append_row(&record).await.unwrap();

        let grid = table.grid();
        assert_eq!(grid.last().unwrap(), &vec!["", "Dana", "2024-02-01"]);
    }

    #[tokio::test]
    async fn update_cells_batches_into_one_call() {
        let table = seeded_table();
        let store = store_with(Arc::clone(&table));
        let (handle, _) = store.locate("Alice", "2024-01-05").await.unwrap();

        let mut fields = Record::new();
        fields.insert("status".to_string(), "pending_secondary".to_string());
        fields.insert("date".to_string(), "2024-01-05".to_string());
        store.update_cells(handle, &fields).await.unwrap();

        assert_eq!(table.update_calls(), 1);
        assert_eq!(table.grid()[1][0], "pending_secondary");
    }

    #[tokio::test]
    async fn update_cells_rejects_unknown_columns() {
        let table = seeded_table();
        let store = store_with(table);
        let (handle, _) = store.locate("Alice", "2024-01-05").await.unwrap();
        let mut fields = Record::new();
        fields.insert("no_such_column".to_string(), "x".to_string());
        assert!(matches!(
            store.update_cells(handle, &fields).await,
            Err(WorkflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_is_cached_until_invalidated() {
        let table = seeded_table();
        let store = store_with(Arc::clone(&table));
        store.snapshot().await.unwrap();
        store.snapshot().await.unwrap();
        assert_eq!(table.fetch_calls(), 1);

        store.invalidate().await;
        store.snapshot().await.unwrap();
        assert_eq!(table.fetch_calls(), 2);
    }

    #[test]
    fn canonical_date_accepts_common_serializations() {
        assert_eq!(canonical_date("2024-01-05").unwrap(), "2024-01-05");
        assert_eq!(canonical_date("2024/01/05").unwrap(), "2024-01-05");
        assert_eq!(canonical_date(" 2024/1/5 ").unwrap(), "2024-01-05");
        assert!(canonical_date("sometime in March").is_err());
    }
}
