//! The approval workflow engine.
//!
//! Each submission is one synchronous read-compute-write pass: take a fresh
//! snapshot, validate identity/authorization/state, fold the scores, then
//! persist the complete stage delta as a single batched write. Validation
//! failures happen strictly before the write, so a rejected submission
//! leaves the stored record untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::catalog::Catalog;
use crate::errors::WorkflowError;
use crate::scoring::{Score, ScoreAggregator, StageTotal};
use crate::store::case_store::{canonical_date, normalize_name, CaseStore, Record};
use crate::store::schema::{self, ColumnSchema};
use crate::workflow::auth::StageAuthorizer;
use crate::workflow::state::{CaseStatus, FinalAction, Role, Stage};

/// Normalized natural key of a case. The store enforces no uniqueness; the
/// engine rejects duplicate creation instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseId {
    pub name: String,
    pub date: String,
}

impl CaseId {
    /// Build a key from raw user input, normalizing both halves.
    pub fn new(name: &str, date: &str) -> Result<Self, WorkflowError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(WorkflowError::Validation(
                "reviewee name is required".to_string(),
            ));
        }
        Ok(Self {
            name,
            date: canonical_date(date)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SelfSubmission {
    pub name: String,
    pub rank: String,
    pub date: String,
    pub role: Role,
    /// Which initial-reviewer queue the case is routed to, fixed once set.
    pub routing: Option<String>,
    pub scores: HashMap<String, Score>,
    pub comment: String,
}

#[derive(Debug, Clone)]
pub struct ReviewSubmission {
    pub scores: HashMap<String, Score>,
    pub comment: String,
    pub reviewer: String,
}

#[derive(Debug, Clone)]
pub struct FinalSubmission {
    pub scores: HashMap<String, Score>,
    pub comment: String,
    pub approver: String,
    pub action: FinalAction,
    pub grade: String,
}

/// Per-stage slice of the read model. Skipped stages surface as `Exempt`,
/// never as a misleading zero score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageView {
    Exempt,
    Pending,
    Submitted {
        total: u32,
        max: u32,
        reviewer: Option<String>,
        comment: String,
        submitted_at: String,
    },
}

/// Read model of one case row for the presentation layer.
#[derive(Debug, Clone)]
pub struct CaseView {
    pub name: String,
    pub rank: String,
    pub date: String,
    pub role: Option<Role>,
    pub routing: Option<String>,
    pub status: CaseStatus,
    pub stages: Vec<(Stage, StageView)>,
    pub final_action: Option<FinalAction>,
    pub grade: Option<String>,
}

impl CaseView {
    pub fn stage(&self, stage: Stage) -> &StageView {
        const PENDING: StageView = StageView::Pending;
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, view)| view)
            .unwrap_or(&PENDING)
    }
}

pub struct WorkflowEngine {
    store: CaseStore,
    catalog: Catalog,
    schema: ColumnSchema,
    authorizer: Arc<dyn StageAuthorizer>,
}

impl WorkflowEngine {
    pub fn new(store: CaseStore, catalog: Catalog, authorizer: Arc<dyn StageAuthorizer>) -> Self {
        let schema = ColumnSchema::derive(&catalog);
        Self {
            store,
            catalog,
            schema,
            authorizer,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Create a case from a self-assessment. The case enters the chain at
    /// the status implied by the submitter's role; a case with the same
    /// normalized key must not already exist.
    pub async fn submit_self(&self, submission: SelfSubmission) -> Result<CaseId, WorkflowError> {
        let case_id = CaseId::new(&submission.name, &submission.date)?;
        self.check_items(&submission.scores)?;

        self.store.invalidate().await;
        match self.store.locate(&case_id.name, &case_id.date).await {
            Err(WorkflowError::NotFound { .. }) => {}
            Ok(_) | Err(WorkflowError::AmbiguousKey { .. }) => {
                return Err(WorkflowError::DuplicateKey {
                    name: case_id.name,
                    date: case_id.date,
                });
            }
            Err(other) => return Err(other),
        }

        let aggregator = ScoreAggregator::new(&self.catalog);
        let effective = aggregator.effective_scores(&submission.scores, &submission.scores);
        let totals = aggregator.fold(&submission.scores, &submission.scores);
        let status = submission.role.initial_status();
        let now = timestamp();

        let mut record = Record::new();
        record.insert(schema::STATUS.to_string(), status.as_str().to_string());
        record.insert(schema::NAME.to_string(), case_id.name.clone());
        record.insert(schema::RANK.to_string(), submission.rank.trim().to_string());
        record.insert(
            schema::ROLE.to_string(),
            submission.role.as_str().to_string(),
        );
        record.insert(schema::DATE.to_string(), case_id.date.clone());
        record.insert(
            schema::ROUTING.to_string(),
            submission.routing.clone().unwrap_or_default(),
        );
        record.insert(schema::SUBMITTED_AT.to_string(), now.clone());
        record.insert(
            schema::submitted_at_column(Stage::SelfAssessment),
            now.clone(),
        );
        record.insert(
            schema::total_column(Stage::SelfAssessment),
            totals.total.to_string(),
        );
        record.insert(
            schema::max_column(Stage::SelfAssessment),
            totals.max.to_string(),
        );
        record.insert(
            schema::comment_column(Stage::SelfAssessment),
            submission.comment.clone(),
        );
        for (item, score) in &effective {
            record.insert(
                schema::score_column(item, Stage::SelfAssessment),
                score.to_cell(),
            );
        }

        self.store.ensure_columns(self.schema.columns()).await?;
        self.store.append_row(&record).await?;

        info!(
            name = %case_id.name,
            date = %case_id.date,
            role = %submission.role,
            status = %status,
            total = totals.total,
            max = totals.max,
            "case created from self-assessment"
        );
        Ok(case_id)
    }

    /// Apply an initial or secondary review to a pending case.
    pub async fn submit_review(
        &self,
        stage: Stage,
        case_id: &CaseId,
        submission: ReviewSubmission,
    ) -> Result<(), WorkflowError> {
        let expected = match stage {
            Stage::Initial => CaseStatus::PendingInitial,
            Stage::Secondary => CaseStatus::PendingSecondary,
            _ => {
                return Err(WorkflowError::Validation(
                    "submit_review only handles the initial and secondary review stages"
                        .to_string(),
                ))
            }
        };
        self.apply_stage(
            stage,
            expected,
            case_id,
            &submission.reviewer,
            &submission.scores,
            &submission.comment,
            Record::new(),
        )
        .await
    }

    /// Apply the final decision, recording the outcome recommendation and
    /// grade label, and close the case.
    pub async fn submit_final(
        &self,
        case_id: &CaseId,
        submission: FinalSubmission,
    ) -> Result<(), WorkflowError> {
        let mut extra = Record::new();
        extra.insert(
            schema::FINAL_ACTION.to_string(),
            submission.action.as_str().to_string(),
        );
        extra.insert(schema::GRADE.to_string(), submission.grade.trim().to_string());
        self.apply_stage(
            Stage::Final,
            CaseStatus::PendingFinal,
            case_id,
            &submission.approver,
            &submission.scores,
            &submission.comment,
            extra,
        )
        .await
    }

    /// Read model for one case.
    pub async fn case_view(&self, case_id: &CaseId) -> Result<CaseView, WorkflowError> {
        let (_, record) = self.store.locate(&case_id.name, &case_id.date).await?;
        self.view_from_record(&record)
    }

    /// Read models for every case row, blank rows skipped.
    pub async fn list_cases(&self) -> Result<Vec<CaseView>, WorkflowError> {
        let records = self.store.load_all().await?;
        records
            .iter()
            .filter(|record| {
                record
                    .get(schema::NAME)
                    .is_some_and(|name| !name.trim().is_empty())
            })
            .map(|record| self.view_from_record(record))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_stage(
        &self,
        stage: Stage,
        expected: CaseStatus,
        case_id: &CaseId,
        actor: &str,
        scores: &HashMap<String, Score>,
        comment: &str,
        mut extra: Record,
    ) -> Result<(), WorkflowError> {
        let actor = normalize_name(actor);
        if actor.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "{stage} reviewer name is required"
            )));
        }
        if !self.authorizer.is_authorized(&actor, stage) {
            return Err(WorkflowError::Unauthorized { actor, stage });
        }
        self.check_items(scores)?;

        self.store.invalidate().await;
        let (handle, record) = self.store.locate(&case_id.name, &case_id.date).await?;
        let actual = record
            .get(schema::STATUS)
            .map(String::as_str)
            .and_then(CaseStatus::parse)
            .ok_or_else(|| {
                WorkflowError::Validation(format!(
                    "case ('{}', {}) has an unreadable status cell",
                    case_id.name, case_id.date
                ))
            })?;
        if actual != expected {
            return Err(WorkflowError::InvalidState { expected, actual });
        }

        // The self stage is the reference for what counts: its N/A markings
        // override whatever this reviewer submitted.
        let reference = self.reference_scores(&record);
        let aggregator = ScoreAggregator::new(&self.catalog);
        let effective = aggregator.effective_scores(scores, &reference);
        let totals: StageTotal = aggregator.fold(scores, &reference);
        let next = CaseStatus::after(stage);

        let mut delta = Record::new();
        for (item, score) in &effective {
            delta.insert(schema::score_column(item, stage), score.to_cell());
        }
        delta.insert(schema::total_column(stage), totals.total.to_string());
        delta.insert(schema::max_column(stage), totals.max.to_string());
        delta.insert(schema::comment_column(stage), comment.to_string());
        if let Some(column) = schema::reviewer_column(stage) {
            delta.insert(column, actor.clone());
        }
        delta.insert(schema::submitted_at_column(stage), timestamp());
        delta.insert(schema::STATUS.to_string(), next.as_str().to_string());
        delta.append(&mut extra);

        // The header may lag the derived schema (late-added columns such as
        // grade); converge it first, then land the whole delta in one
        // batched call.
        self.store.ensure_columns(self.schema.columns()).await?;
        self.store.update_cells(handle, &delta).await?;

        info!(
            name = %case_id.name,
            date = %case_id.date,
            stage = %stage,
            reviewer = %actor,
            total = totals.total,
            max = totals.max,
            status = %next,
            "stage submission persisted"
        );
        Ok(())
    }

    fn check_items(&self, scores: &HashMap<String, Score>) -> Result<(), WorkflowError> {
        for name in scores.keys() {
            if !self.catalog.contains(name) {
                return Err(WorkflowError::Validation(format!(
                    "unknown catalog item '{name}'"
                )));
            }
        }
        Ok(())
    }

    fn reference_scores(&self, record: &Record) -> HashMap<String, Score> {
        let mut reference = HashMap::new();
        for item in self.catalog.items() {
            let column = schema::score_column(&item.name, Stage::SelfAssessment);
            if let Some(score) = record.get(&column).and_then(|cell| Score::parse_cell(cell)) {
                reference.insert(item.name.clone(), score);
            }
        }
        reference
    }

    fn view_from_record(&self, record: &Record) -> Result<CaseView, WorkflowError> {
        let name = record
            .get(schema::NAME)
            .map(|v| normalize_name(v))
            .unwrap_or_default();
        let status = record
            .get(schema::STATUS)
            .map(String::as_str)
            .and_then(CaseStatus::parse)
            .ok_or_else(|| {
                WorkflowError::Validation(format!("case '{name}' has an unreadable status cell"))
            })?;
        let role = record
            .get(schema::ROLE)
            .and_then(|cell| Role::parse(cell));
        let exempt: &[Stage] = role.map(Role::exempt_stages).unwrap_or(&[]);

        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let view = if exempt.contains(&stage) {
                StageView::Exempt
            } else if status.stage_submitted(stage) {
                StageView::Submitted {
                    total: cell_number(record, &schema::total_column(stage)),
                    max: cell_number(record, &schema::max_column(stage)),
                    reviewer: schema::reviewer_column(stage)
                        .and_then(|column| record.get(&column))
                        .map(|v| normalize_name(v))
                        .filter(|v| !v.is_empty()),
                    comment: record
                        .get(&schema::comment_column(stage))
                        .cloned()
                        .unwrap_or_default(),
                    submitted_at: record
                        .get(&schema::submitted_at_column(stage))
                        .cloned()
                        .unwrap_or_default(),
                }
            } else {
                StageView::Pending
            };
            stages.push((stage, view));
        }

        Ok(CaseView {
            name,
            rank: record.get(schema::RANK).cloned().unwrap_or_default(),
            date: record.get(schema::DATE).cloned().unwrap_or_default(),
            role,
            routing: record
                .get(schema::ROUTING)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            status,
            stages,
            final_action: record
                .get(schema::FINAL_ACTION)
                .filter(|v| !v.trim().is_empty())
                .map(|v| FinalAction::parse(v)),
            grade: record
                .get(schema::GRADE)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

fn cell_number(record: &Record, column: &str) -> u32 {
    record
        .get(column)
        .and_then(|cell| cell.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
