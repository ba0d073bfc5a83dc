// Caseflow Library - performance-review case workflow over a remote table
// This exposes the core components for testing and integration

pub mod catalog;
pub mod config;
pub mod errors;
pub mod scoring;
pub mod store;
pub mod workflow;

// Re-export key types for easy access
pub use catalog::{Catalog, Item};
pub use config::CaseflowConfig;
pub use errors::WorkflowError;
pub use scoring::{Score, ScoreAggregator, StageTotal, MAX_ITEM_SCORE};
pub use store::{
    CaseStore, CellUpdate, ColumnSchema, HttpTable, Record, RemoteTable, RetryConfig, RetryPolicy,
    RowHandle, TableError,
};
pub use workflow::{
    AllowAll, CaseId, CaseStatus, CaseView, FinalAction, FinalSubmission, ReviewSubmission, Role,
    RoleAuthorizer, SelfSubmission, Stage, StageAuthorizer, StageView, WorkflowEngine,
};
