//! Persistence over the remote header-indexed table: transport trait and
//! backends, retry policy, column registry, and the case store facade.

pub mod case_store;
pub mod errors;
pub mod memory;
pub mod retry;
pub mod schema;
pub mod table;

pub use case_store::{canonical_date, normalize_name, CaseStore, Record, RowHandle, Snapshot};
pub use errors::TableError;
pub use retry::{RetryConfig, RetryPolicy};
pub use schema::ColumnSchema;
pub use table::{CellUpdate, HttpTable, RemoteTable};
