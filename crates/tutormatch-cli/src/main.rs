//! tutormatch - ranked-preference tutor allocation CLI
//!
//! ## Commands
//!
//! - `import`: Load students, tutors, and preferences from JSON files
//! - `recompute`: Rebuild every assignment from the current preferences
//! - `clear`: Delete all assignments
//! - `report`: Show per-tutor load, rosters, and unassigned students
//! - `capacity`: Show the cap and current load of one tutor
//! - `stats`: Show preference submission statistics

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use tutormatch_core::{
    AllocationConfig, AssignmentService, Collaborators, DistributionReport, PreferenceRecord,
    PreferenceStats, RecomputeSummary, StudentRecord, TutorId, TutorRecord,
};
use tutormatch_state::{SurrealAssignmentLedger, SurrealHandle};

#[derive(Parser)]
#[command(name = "tutormatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assign students to tutors from ranked preferences", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON: log lines on stderr, command output on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Allocation config file (TOML)
    #[arg(short, long, global = true, env = "TUTORMATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load students, tutors, and preferences from JSON files
    Import {
        /// JSON array of `{ "name", "class_section" }`
        #[arg(long)]
        students: Option<PathBuf>,

        /// JSON array of `{ "tutor_id", "name", "category" }`
        #[arg(long)]
        tutors: Option<PathBuf>,

        /// JSON array of `{ "student_name", "class_section", "ranked_tutors", "submitted_at" }`
        #[arg(long)]
        preferences: Option<PathBuf>,
    },

    /// Rebuild every assignment from the current preferences
    Recompute,

    /// Delete all assignments without recomputing
    Clear,

    /// Show the current distribution
    Report,

    /// Show the cap and current load of a tutor
    Capacity {
        /// Tutor id
        tutor_id: String,
    },

    /// Show preference submission statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tutormatch_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    let handle = SurrealHandle::setup_from_env()
        .await
        .context("Failed to connect to tutormatch database")?;

    match cli.command {
        Commands::Import {
            students,
            tutors,
            preferences,
        } => {
            let counts = cmd_import(
                &handle,
                students.as_deref(),
                tutors.as_deref(),
                preferences.as_deref(),
            )
            .await?;
            emit(cli.json, &counts, render_import_text)
        }
        Commands::Recompute => {
            let summary = cmd_recompute(&handle, config).await?;
            emit(cli.json, &summary, render_summary_text)
        }
        Commands::Clear => {
            let service = build_service(&handle, config)?;
            let outcome = service.clear().await.context("Failed to clear assignments")?;
            emit(cli.json, &outcome, |o| {
                format!("Deleted {} assignments\n", o.deleted_count)
            })
        }
        Commands::Report => {
            let service = build_service(&handle, config)?;
            let report = service.report().await.context("Failed to build report")?;
            emit(cli.json, &report, render_report_text)
        }
        Commands::Capacity { tutor_id } => {
            let view = cmd_capacity(&handle, config, &tutor_id).await?;
            emit(cli.json, &view, |v| {
                format!(
                    "{}: {}/{} ({} remaining)\n",
                    v.tutor_id, v.load, v.capacity, v.remaining
                )
            })
        }
        Commands::Stats => {
            let service = build_service(&handle, config)?;
            let stats = service.stats().await.context("Failed to compute stats")?;
            emit(cli.json, &stats, render_stats_text)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AllocationConfig> {
    match path {
        Some(path) => AllocationConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(AllocationConfig::default()),
    }
}

fn build_service(handle: &SurrealHandle, config: AllocationConfig) -> Result<AssignmentService> {
    let shared = Arc::new(handle.clone());
    let stores = Collaborators {
        preferences: shared.clone(),
        students: shared.clone(),
        tutors: shared,
        ledger: Arc::new(SurrealAssignmentLedger::new(handle)),
    };
    AssignmentService::new(stores, config).context("Invalid allocation config")
}

/// Print `value` as pretty JSON or through the text renderer.
fn emit<T: Serialize>(json: bool, value: &T, render: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

// ---------------------------------------------------------------------------
// import
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StudentInput {
    name: String,
    class_section: String,
}

#[derive(Debug, Deserialize)]
struct TutorInput {
    tutor_id: String,
    name: String,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceInput {
    student_name: String,
    class_section: String,
    ranked_tutors: Vec<String>,
    /// Import time when absent
    #[serde(default)]
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
struct ImportCounts {
    students: usize,
    tutors: usize,
    preferences: usize,
}

async fn cmd_import(
    handle: &SurrealHandle,
    students: Option<&Path>,
    tutors: Option<&Path>,
    preferences: Option<&Path>,
) -> Result<ImportCounts> {
    if students.is_none() && tutors.is_none() && preferences.is_none() {
        anyhow::bail!("nothing to import: pass --students, --tutors, or --preferences");
    }

    let mut counts = ImportCounts::default();

    if let Some(path) = tutors {
        let rows: Vec<TutorInput> = read_json_file(path)?;
        for row in rows {
            let record = TutorRecord::new(row.tutor_id, row.name, row.category);
            handle
                .save_tutor(&record)
                .await
                .with_context(|| format!("Failed to save tutor '{}'", record.tutor_id))?;
            counts.tutors += 1;
        }
    }

    if let Some(path) = students {
        let rows: Vec<StudentInput> = read_json_file(path)?;
        for row in rows {
            let record = StudentRecord::new(row.name, row.class_section);
            handle
                .save_student(&record)
                .await
                .with_context(|| format!("Failed to save student '{}'", record.key()))?;
            counts.students += 1;
        }
    }

    if let Some(path) = preferences {
        let rows: Vec<PreferenceInput> = read_json_file(path)?;
        let now = Utc::now();
        for row in rows {
            let record = PreferenceRecord::new(
                row.student_name,
                row.class_section,
                row.ranked_tutors.into_iter().map(TutorId::new).collect(),
                row.submitted_at.unwrap_or(now),
            );
            handle
                .save_preference(&record)
                .await
                .with_context(|| format!("Failed to save preference of '{}'", record.key()))?;
            counts.preferences += 1;
        }
    }

    info!(
        students = counts.students,
        tutors = counts.tutors,
        preferences = counts.preferences,
        "import complete"
    );
    Ok(counts)
}

fn render_import_text(counts: &ImportCounts) -> String {
    format!(
        "Imported {} students, {} tutors, {} preferences\n",
        counts.students, counts.tutors, counts.preferences
    )
}

// ---------------------------------------------------------------------------
// recompute / capacity
// ---------------------------------------------------------------------------

async fn cmd_recompute(
    handle: &SurrealHandle,
    config: AllocationConfig,
) -> Result<RecomputeSummary> {
    let service = build_service(handle, config)?;
    service
        .recompute()
        .await
        .context("Recompute failed; previous assignments were kept")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct CapacityView {
    tutor_id: TutorId,
    capacity: u32,
    load: u64,
    remaining: u64,
}

async fn cmd_capacity(
    handle: &SurrealHandle,
    config: AllocationConfig,
    tutor_id: &str,
) -> Result<CapacityView> {
    let service = build_service(handle, config)?;
    let tutor_id = TutorId::new(tutor_id);
    let capacity = service
        .capacity_of(&tutor_id)
        .await
        .with_context(|| format!("Failed to look up tutor '{tutor_id}'"))?;
    let load = service.load_of(&tutor_id).await?;
    Ok(CapacityView {
        remaining: u64::from(capacity).saturating_sub(load),
        tutor_id,
        capacity,
        load,
    })
}

// ---------------------------------------------------------------------------
// text rendering
// ---------------------------------------------------------------------------

fn render_summary_text(summary: &RecomputeSummary) -> String {
    let mut out = String::new();
    let totals = &summary.report.totals;
    out.push_str(&format!(
        "Recompute {} finished in {} ms\n",
        summary.recompute_id, summary.duration_ms
    ));
    out.push_str(&format!(
        "  replaced {} assignments with {}\n",
        summary.swap.deleted, summary.swap.inserted
    ));
    out.push_str(&format!(
        "  preferred: {}  fallback: {}  unassigned: {}\n",
        totals.preferred, totals.fallback, totals.unassigned
    ));
    for student in &summary.missing_students {
        out.push_str(&format!("  warning: unknown student {student}\n"));
    }
    for tutor_id in &summary.unknown_tutors {
        out.push_str(&format!("  warning: unknown tutor {tutor_id}\n"));
    }
    out.push_str(&format!("  digest: {}\n", summary.report.ledger_digest));
    out
}

fn render_report_text(report: &DistributionReport) -> String {
    let mut out = String::new();
    let totals = &report.totals;
    out.push_str(&format!(
        "{} students, {} assigned ({} preferred, {} fallback), {} unassigned\n",
        totals.students, totals.assigned, totals.preferred, totals.fallback, totals.unassigned
    ));
    if totals.departed > 0 {
        out.push_str(&format!(
            "{} ledger rows belong to students no longer registered\n",
            totals.departed
        ));
    }

    for tutor in &report.tutors {
        let marker = if tutor.is_full() { "FULL" } else { "open" };
        let label = if tutor.name.is_empty() {
            tutor.tutor_id.to_string()
        } else {
            format!("{} ({})", tutor.name, tutor.tutor_id)
        };
        out.push_str(&format!(
            "\n{label} [{}] {}/{} {marker}\n",
            tutor.category, tutor.load, tutor.capacity
        ));
        for entry in &tutor.roster {
            out.push_str(&format!(
                "  {:<8} {} ({})\n",
                entry.placement.to_string(),
                entry.name,
                entry.class_section
            ));
        }
    }

    if !report.unassigned.is_empty() {
        out.push_str("\nUnassigned:\n");
        for student in &report.unassigned {
            out.push_str(&format!("  {} ({})\n", student.name, student.class_section));
        }
    }
    out
}

fn render_stats_text(stats: &PreferenceStats) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}/{} students submitted preferences\n\n",
        stats.submitted, stats.total_students
    ));

    out.push_str("Classes:\n");
    for class in &stats.classes {
        out.push_str(&format!(
            "  {:<6} {}/{} submitted, {} pending\n",
            class.class_section, class.submitted, class.total, class.pending
        ));
    }

    out.push_str("\nTutor rankings (by rank position):\n");
    for tutor in &stats.tutors {
        let ranks: Vec<String> = tutor.by_rank.iter().map(u32::to_string).collect();
        out.push_str(&format!(
            "  {:<10} {:<20} [{}] total {}\n",
            tutor.tutor_id.as_str(),
            tutor.name,
            ranks.join(" "),
            tutor.total
        ));
    }

    if !stats.pending.is_empty() {
        out.push_str("\nPending:\n");
        for student in &stats.pending {
            out.push_str(&format!("  {} ({})\n", student.name, student.class_section));
        }
    }
    out
}
