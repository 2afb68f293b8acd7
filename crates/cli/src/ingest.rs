//! `absentia ingest` — state and county snapshot ingestion.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use absentia_config::Settings;
use absentia_core::{CanonicalCandidate, CountyFormat};
use absentia_io::county::read_county_extract;
use absentia_io::normalize::normalize_state_row;
use absentia_io::state::read_state_extract;
use absentia_io::{AuditFile, ReadStats};
use absentia_recon::{
    check_watermark, ingest_county, ingest_state, run_removal_pass, CancelToken, IdentityResolver,
    IngestContext, IngestSummary, PartialRatio, ReconError, VoterStore,
};
use absentia_store::SqliteStore;

use crate::prompt::StdinPrompt;
use crate::CliError;

/// Audit label date portion, e.g. `10-26`.
fn label_of(date: NaiveDate) -> String {
    date.format("%m-%d").to_string()
}

fn recon_err(e: ReconError) -> CliError {
    match e {
        ReconError::StaleExtract { .. } => CliError::stale(e.to_string())
            .with_hint("extracts must be ingested in nondecreasing date order"),
        ReconError::Store(_) => CliError::store(e.to_string()),
        other => CliError::store(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Stop-file watcher
// ---------------------------------------------------------------------------

/// Polls the externally-settable stop file and trips the cancellation token
/// when it appears. Workers poll the token once per voter group.
struct StopFileWatcher {
    done: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl StopFileWatcher {
    fn spawn(stop_file: PathBuf, cancel: CancelToken) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let done_flag = done.clone();
        let handle = std::thread::spawn(move || {
            while !done_flag.load(Ordering::Relaxed) {
                if stop_file.exists() {
                    tracing::warn!(path = %stop_file.display(), "stop file detected, cancelling ingest");
                    cancel.cancel();
                    break;
                }
                std::thread::sleep(Duration::from_millis(500));
            }
        });
        Self { done, handle: Some(handle) }
    }

    fn finish(mut self) {
        self.done.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// State ingest
// ---------------------------------------------------------------------------

pub fn cmd_ingest_state(
    settings: &Settings,
    file: PathBuf,
    date: NaiveDate,
    workers: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    let label = label_of(date);
    let source_label = format!("SoS-{label}");

    let extract = read_state_extract(&file).map_err(|e| CliError::extract(e.to_string()))?;

    let mut groups: BTreeMap<i64, Vec<CanonicalCandidate>> = BTreeMap::new();
    for (reg, rows) in &extract.voters {
        groups.insert(*reg, rows.iter().map(|r| normalize_state_row(*reg, r)).collect());
    }

    let mut store =
        SqliteStore::open(&settings.db_path).map_err(|e| CliError::store(e.to_string()))?;
    check_watermark(&store, "sos", date).map_err(recon_err)?;

    let ctx = IngestContext {
        source_file: format!("{source_label}.csv"),
        label_date: date,
        non_reporting: settings.counties_not_reporting.iter().cloned().collect(),
    };
    let sink = AuditFile::open(&settings.log_dir, &source_label)
        .map_err(|e| CliError::io(e.to_string()))?;

    let cancel = CancelToken::new();
    let watcher = StopFileWatcher::spawn(settings.stop_file.clone(), cancel.clone());

    let workers = workers.unwrap_or_else(|| settings.workers());
    let db_path = settings.db_path.clone();
    let mut summary = ingest_state(
        || SqliteStore::open(&db_path),
        &groups,
        &ctx,
        &sink,
        workers,
        &cancel,
    );
    watcher.finish();

    if summary.cancelled {
        tracing::warn!("ingest cancelled; removal pass and watermark skipped");
    } else {
        let seen: BTreeSet<i64> = groups.keys().copied().collect();
        summary.removed_marked =
            run_removal_pass(&mut store, &sink, &ctx, &seen).map_err(recon_err)?;
        store
            .set_watermark("sos", date)
            .map_err(|e| CliError::store(e.to_string()))?;
    }

    sink.flush().map_err(|e| CliError::io(e.to_string()))?;
    render_state_summary(&source_label, &extract.stats, &summary, json);
    Ok(())
}

fn render_state_summary(
    source_label: &str,
    stats: &ReadStats,
    summary: &IngestSummary,
    json: bool,
) {
    if json {
        let value = serde_json::json!({
            "extract": source_label,
            "rows_read": stats.rows_read,
            "dropped_missing_fields": stats.dropped_missing_fields,
            "dropped_bad_id": stats.dropped_bad_id,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        return;
    }

    println!("{source_label}");
    println!(
        "  rows read: {} (dropped: {} missing fields, {} bad id)",
        stats.rows_read, stats.dropped_missing_fields, stats.dropped_bad_id
    );
    println!(
        "  voters: {} processed, {} inserted, {} updated, {} unchanged, {} county-authority",
        summary.voters_processed,
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.skipped_county_authority
    );
    println!(
        "  removed: {} marked; failures: {}",
        summary.removed_marked, summary.failures
    );
    if summary.cancelled {
        println!("  CANCELLED - re-run the same extract to resume");
    }
}

// ---------------------------------------------------------------------------
// County ingest
// ---------------------------------------------------------------------------

pub fn cmd_ingest_county(
    settings: &Settings,
    county: CountyFormat,
    file: PathBuf,
    date: NaiveDate,
) -> Result<(), CliError> {
    let label = label_of(date);
    let source_label = format!("{}-{label}", county.county());

    let rows =
        read_county_extract(&file, county).map_err(|e| CliError::extract(e.to_string()))?;

    let mut store =
        SqliteStore::open(&settings.db_path).map_err(|e| CliError::store(e.to_string()))?;
    let watermark_key = format!("county:{}", county.county());
    check_watermark(&store, &watermark_key, date).map_err(recon_err)?;

    let ctx = IngestContext {
        source_file: format!("{source_label}.csv"),
        label_date: date,
        non_reporting: settings.counties_not_reporting.iter().cloned().collect(),
    };
    let sink = AuditFile::open(&settings.log_dir, &source_label)
        .map_err(|e| CliError::io(e.to_string()))?;

    let scorer = PartialRatio;
    let mut prompt = StdinPrompt::new();
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);

    let summary =
        ingest_county(&mut store, &sink, &ctx, county, &rows, &mut resolver).map_err(recon_err)?;

    store
        .set_watermark(&watermark_key, date)
        .map_err(|e| CliError::store(e.to_string()))?;
    sink.flush().map_err(|e| CliError::io(e.to_string()))?;

    println!("{source_label}");
    println!(
        "  rows: {} processed, {} newly rejected, {} already rejected, {} unresolved",
        summary.rows_processed,
        summary.rejected_marked,
        summary.already_rejected,
        summary.unresolved
    );
    println!("  cured: {}", summary.cured);
    Ok(())
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

pub fn cmd_init(settings: &Settings) -> Result<(), CliError> {
    if let Some(parent) = settings.db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CliError::io(e.to_string()))?;
    }
    std::fs::create_dir_all(&settings.log_dir).map_err(|e| CliError::io(e.to_string()))?;

    // opening creates the schema
    let store =
        SqliteStore::open(&settings.db_path).map_err(|e| CliError::store(e.to_string()))?;
    drop(store);

    println!("store: {}", settings.db_path.display());
    println!("logs:  {}", settings.log_dir.display());
    Ok(())
}

/// Shared argument parser for `--date`.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))
}

/// Shared argument parser for county names.
pub fn parse_county(value: &str) -> Result<CountyFormat, String> {
    let normalized = value.to_lowercase().replace(['-', '_'], " ");
    match normalized.as_str() {
        "polk" => Ok(CountyFormat::Polk),
        "cerro gordo" => Ok(CountyFormat::CerroGordo),
        "des moines" => Ok(CountyFormat::DesMoines),
        _ => Err(format!(
            "unknown county '{value}' (expected polk, cerro-gordo, or des-moines)"
        )),
    }
}
