//! The approval workflow: state vocabulary, authorization seam, and the
//! engine that drives a case through its four stages.

pub mod auth;
pub mod engine;
pub mod state;

pub use auth::{AllowAll, RoleAuthorizer, StageAuthorizer};
pub use engine::{
    CaseId, CaseView, FinalSubmission, ReviewSubmission, SelfSubmission, StageView, WorkflowEngine,
};
pub use state::{CaseStatus, FinalAction, Role, Stage};
