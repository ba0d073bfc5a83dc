//! Approval-chain vocabulary: stages, submitter roles, case status, and the
//! one-directional transition table between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four scoring passes a case goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SelfAssessment,
    Initial,
    Secondary,
    Final,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::SelfAssessment,
        Stage::Initial,
        Stage::Secondary,
        Stage::Final,
    ];

    /// Suffix used in column names (`<item>-self`, `initial_total`, ...).
    pub fn column_suffix(self) -> &'static str {
        match self {
            Stage::SelfAssessment => "self",
            Stage::Initial => "initial",
            Stage::Secondary => "secondary",
            Stage::Final => "final",
        }
    }

    fn order(self) -> u8 {
        match self {
            Stage::SelfAssessment => 0,
            Stage::Initial => 1,
            Stage::Secondary => 2,
            Stage::Final => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_suffix())
    }
}

/// Role the reviewee picks at self-assessment time. Determines where the
/// case enters the approval chain; stages below the entry point are exempt,
/// not zero-scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    LineStaff,
    InitialManager,
    SeniorManager,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::LineStaff => "line_staff",
            Role::InitialManager => "initial_manager",
            Role::SeniorManager => "senior_manager",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim() {
            "line_staff" => Some(Role::LineStaff),
            "initial_manager" => Some(Role::InitialManager),
            "senior_manager" => Some(Role::SeniorManager),
            _ => None,
        }
    }

    /// Status a fresh case lands in after this role's self-assessment.
    pub fn initial_status(self) -> CaseStatus {
        match self {
            Role::LineStaff => CaseStatus::PendingInitial,
            Role::InitialManager => CaseStatus::PendingSecondary,
            Role::SeniorManager => CaseStatus::PendingFinal,
        }
    }

    /// Review stages this role skips entirely.
    pub fn exempt_stages(self) -> &'static [Stage] {
        match self {
            Role::LineStaff => &[],
            Role::InitialManager => &[Stage::Initial],
            Role::SeniorManager => &[Stage::Initial, Stage::Secondary],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a case sits in the approval chain. Advances monotonically through
/// the table below; no transition ever moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    PendingInitial,
    PendingSecondary,
    PendingFinal,
    Completed,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseStatus::Draft => "draft",
            CaseStatus::PendingInitial => "pending_initial",
            CaseStatus::PendingSecondary => "pending_secondary",
            CaseStatus::PendingFinal => "pending_final",
            CaseStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<CaseStatus> {
        match s.trim() {
            "draft" => Some(CaseStatus::Draft),
            "pending_initial" => Some(CaseStatus::PendingInitial),
            "pending_secondary" => Some(CaseStatus::PendingSecondary),
            "pending_final" => Some(CaseStatus::PendingFinal),
            "completed" => Some(CaseStatus::Completed),
            _ => None,
        }
    }

    /// Status a case must currently hold for `stage` to act on it.
    pub fn expected_for(stage: Stage) -> Option<CaseStatus> {
        match stage {
            Stage::SelfAssessment => None,
            Stage::Initial => Some(CaseStatus::PendingInitial),
            Stage::Secondary => Some(CaseStatus::PendingSecondary),
            Stage::Final => Some(CaseStatus::PendingFinal),
        }
    }

    /// Status the case advances to once `stage` has submitted.
    pub fn after(stage: Stage) -> CaseStatus {
        match stage {
            Stage::SelfAssessment => CaseStatus::PendingInitial,
            Stage::Initial => CaseStatus::PendingSecondary,
            Stage::Secondary => CaseStatus::PendingFinal,
            Stage::Final => CaseStatus::Completed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaseStatus::Completed)
    }

    fn order(self) -> u8 {
        match self {
            CaseStatus::Draft => 0,
            CaseStatus::PendingInitial => 1,
            CaseStatus::PendingSecondary => 2,
            CaseStatus::PendingFinal => 3,
            CaseStatus::Completed => 4,
        }
    }

    /// Whether `stage` has already submitted for a case in this status.
    pub fn stage_submitted(self, stage: Stage) -> bool {
        self.order() > stage.order()
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final decision recommendation. Unknown stored strings parse as `Other`
/// rather than poisoning the read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalAction {
    Pass,
    Observe,
    Coach,
    Reassign,
    Other,
}

impl FinalAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalAction::Pass => "pass",
            FinalAction::Observe => "observe",
            FinalAction::Coach => "coach",
            FinalAction::Reassign => "reassign",
            FinalAction::Other => "other",
        }
    }

    pub fn parse(s: &str) -> FinalAction {
        match s.trim() {
            "pass" => FinalAction::Pass,
            "observe" => FinalAction::Observe,
            "coach" => FinalAction::Coach,
            "reassign" => FinalAction::Reassign,
            _ => FinalAction::Other,
        }
    }
}

impl fmt::Display for FinalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
