use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use caseflow::catalog::Catalog;
use caseflow::config::CaseflowConfig;
use caseflow::scoring::{Score, MAX_ITEM_SCORE};
use caseflow::store::{CaseStore, HttpTable, RetryPolicy};
use caseflow::workflow::{
    AllowAll, CaseId, CaseView, FinalAction, FinalSubmission, ReviewSubmission, Role,
    SelfSubmission, Stage, StageView, WorkflowEngine,
};

#[derive(Parser)]
#[command(name = "caseflow")]
#[command(about = "Four-stage performance-review case workflow backed by a remote table")]
#[command(
    long_about = "Caseflow records performance-review cases in a remote spreadsheet-style \
                  table and drives each case through self-assessment, initial review, \
                  secondary review, and the final decision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter caseflow.toml into the current directory
    Init {
        /// Overwrite an existing caseflow.toml
        #[arg(long, help = "Overwrite an existing caseflow.toml")]
        force: bool,
    },
    /// Create a case from a self-assessment
    SubmitSelf {
        /// Reviewee name (identity half of the case key)
        #[arg(long)]
        name: String,
        /// Reviewee rank or grade label
        #[arg(long, default_value = "")]
        rank: String,
        /// Assessment date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Submitter role: line_staff, initial_manager, senior_manager
        #[arg(long)]
        role: String,
        /// Initial-reviewer queue this case is routed to
        #[arg(long)]
        routing: Option<String>,
        /// Free-text self-assessment comment
        #[arg(long, default_value = "")]
        comment: String,
        /// Per-item score, repeatable: --score attendance=8 --score mentoring=na
        #[arg(long = "score", value_name = "ITEM=SCORE")]
        scores: Vec<String>,
    },
    /// Submit an initial or secondary review for a pending case
    Review {
        /// Review stage: initial or secondary
        #[arg(long)]
        stage: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: String,
        /// Reviewer signature
        #[arg(long)]
        reviewer: String,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long = "score", value_name = "ITEM=SCORE")]
        scores: Vec<String>,
    },
    /// Record the final decision and close the case
    Finalize {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: String,
        /// Final approver signature
        #[arg(long)]
        approver: String,
        /// Outcome recommendation: pass, observe, coach, reassign, other
        #[arg(long)]
        action: String,
        /// Grade label, e.g. A or B+
        #[arg(long, default_value = "")]
        grade: String,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long = "score", value_name = "ITEM=SCORE")]
        scores: Vec<String>,
    },
    /// List every case with its stage progress
    Status,
    /// Show one case in detail
    Show {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = CaseflowConfig::load_env_file();
    let config = CaseflowConfig::load()?;
    init_tracing(&config.observability.log_level);

    match cli.command {
        Commands::Init { force } => init_command(&config, force),
        Commands::SubmitSelf {
            name,
            rank,
            date,
            role,
            routing,
            comment,
            scores,
        } => tokio::runtime::Runtime::new()?.block_on(async {
            let engine = build_engine(&config)?;
            let submission = SelfSubmission {
                name,
                rank,
                date,
                role: parse_role(&role)?,
                routing,
                scores: parse_scores(&scores)?,
                comment,
            };
            let case_id = engine.submit_self(submission).await?;
            println!(
                "Created case for {} on {}; awaiting the next review stage.",
                case_id.name, case_id.date
            );
            Ok(())
        }),
        Commands::Review {
            stage,
            name,
            date,
            reviewer,
            comment,
            scores,
        } => tokio::runtime::Runtime::new()?.block_on(async {
            let engine = build_engine(&config)?;
            let stage = parse_review_stage(&stage)?;
            let case_id = CaseId::new(&name, &date)?;
            let submission = ReviewSubmission {
                scores: parse_scores(&scores)?,
                comment,
                reviewer,
            };
            engine.submit_review(stage, &case_id, submission).await?;
            println!(
                "Recorded {stage} review for {} on {}.",
                case_id.name, case_id.date
            );
            Ok(())
        }),
        Commands::Finalize {
            name,
            date,
            approver,
            action,
            grade,
            comment,
            scores,
        } => tokio::runtime::Runtime::new()?.block_on(async {
            let engine = build_engine(&config)?;
            let case_id = CaseId::new(&name, &date)?;
            let submission = FinalSubmission {
                scores: parse_scores(&scores)?,
                comment,
                approver,
                action: FinalAction::parse(&action),
                grade,
            };
            engine.submit_final(&case_id, submission).await?;
            println!(
                "Case for {} on {} is completed.",
                case_id.name, case_id.date
            );
            Ok(())
        }),
        Commands::Status => tokio::runtime::Runtime::new()?.block_on(async {
            let engine = build_engine(&config)?;
            status_command(&engine).await
        }),
        Commands::Show { name, date } => tokio::runtime::Runtime::new()?.block_on(async {
            let engine = build_engine(&config)?;
            let case_id = CaseId::new(&name, &date)?;
            let view = engine.case_view(&case_id).await?;
            show_case(&view);
            Ok(())
        }),
    }
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn init_command(config: &CaseflowConfig, force: bool) -> Result<()> {
    if Path::new("caseflow.toml").exists() && !force {
        bail!("caseflow.toml already exists (use --force to overwrite)");
    }
    config.save_to_file("caseflow.toml")?;
    println!("Wrote caseflow.toml; set the table endpoint and CASEFLOW_TABLE_TOKEN to connect.");
    Ok(())
}

fn build_engine(config: &CaseflowConfig) -> Result<WorkflowEngine> {
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_toml(path)?,
        None => Catalog::builtin(),
    };
    let table = HttpTable::new(
        &config.table.base_url,
        &config.table.table_id,
        config.table.token.clone(),
    );
    let store = CaseStore::new(
        Arc::new(table),
        RetryPolicy::new(config.retry_config()),
        config.snapshot_ttl(),
    );
    Ok(WorkflowEngine::new(store, catalog, Arc::new(AllowAll)))
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::parse(raw).ok_or_else(|| {
        anyhow!("unknown role '{raw}' (expected line_staff, initial_manager, or senior_manager)")
    })
}

fn parse_review_stage(raw: &str) -> Result<Stage> {
    match raw.trim() {
        "initial" => Ok(Stage::Initial),
        "secondary" => Ok(Stage::Secondary),
        other => bail!("unknown review stage '{other}' (expected initial or secondary)"),
    }
}

fn parse_scores(raw: &[String]) -> Result<HashMap<String, Score>> {
    let mut scores = HashMap::new();
    for entry in raw {
        let (item, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("expected ITEM=SCORE, got '{entry}'"))?;
        let value = value.trim();
        let score = if value.eq_ignore_ascii_case("na") || value.eq_ignore_ascii_case("n/a") {
            Score::NotApplicable
        } else {
            let points: u8 = value
                .parse()
                .map_err(|_| anyhow!("score for '{item}' must be 0-{MAX_ITEM_SCORE} or 'na'"))?;
            if points > MAX_ITEM_SCORE {
                bail!("score for '{item}' must be 0-{MAX_ITEM_SCORE}");
            }
            Score::Value(points)
        };
        scores.insert(item.trim().to_string(), score);
    }
    Ok(scores)
}

async fn status_command(engine: &WorkflowEngine) -> Result<()> {
    let cases = engine.list_cases().await?;
    if cases.is_empty() {
        println!("No cases recorded yet.");
        return Ok(());
    }
    println!(
        "{:<20} {:<12} {:<18} {:>10} {:>10} {:>10} {:>10}",
        "NAME", "DATE", "STATUS", "SELF", "INITIAL", "SECONDARY", "FINAL"
    );
    for case in &cases {
        println!(
            "{:<20} {:<12} {:<18} {:>10} {:>10} {:>10} {:>10}",
            case.name,
            case.date,
            case.status,
            stage_summary(case.stage(Stage::SelfAssessment)),
            stage_summary(case.stage(Stage::Initial)),
            stage_summary(case.stage(Stage::Secondary)),
            stage_summary(case.stage(Stage::Final)),
        );
    }
    Ok(())
}

fn stage_summary(view: &StageView) -> String {
    match view {
        StageView::Exempt => "exempt".to_string(),
        StageView::Pending => "-".to_string(),
        StageView::Submitted { total, max, .. } => format!("{total}/{max}"),
    }
}

fn show_case(case: &CaseView) {
    println!("Case: {} ({})", case.name, case.date);
    if !case.rank.is_empty() {
        println!("Rank: {}", case.rank);
    }
    if let Some(role) = case.role {
        println!("Role: {role}");
    }
    if let Some(routing) = &case.routing {
        println!("Routing: {routing}");
    }
    println!("Status: {}", case.status);
    for (stage, view) in &case.stages {
        match view {
            StageView::Exempt => println!("  {stage}: exempt"),
            StageView::Pending => println!("  {stage}: pending"),
            StageView::Submitted {
                total,
                max,
                reviewer,
                comment,
                submitted_at,
            } => {
                let signer = reviewer.as_deref().unwrap_or(&case.name);
                println!("  {stage}: {total}/{max} by {signer} at {submitted_at}");
                if !comment.is_empty() {
                    println!("    comment: {comment}");
                }
            }
        }
    }
    if let Some(action) = case.final_action {
        println!("Final action: {action}");
    }
    if let Some(grade) = &case.grade {
        println!("Grade: {grade}");
    }
}
