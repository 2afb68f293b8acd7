//! Orchestrator: fans voter groups out across a fixed pool of workers.
//!
//! Each worker owns its own store handle and processes a disjoint partition
//! of the extract's voter groups; all coordination happens through the
//! persisted store, never shared memory. Ordering across voters is neither
//! guaranteed nor required; each voter's own group is processed atomically
//! by exactly one worker.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use absentia_core::{AuditSink, CanonicalCandidate};

use crate::diff::{reconcile_voter, IngestContext, VoterOutcome};
use crate::error::ReconError;
use crate::status::reject_and_cure;
use crate::store::{StoreError, VoterStore};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation token, polled once per voter group. On a
/// positive read a worker stops accepting new groups; the in-flight group
/// finishes and committed work stands. Idempotent re-runs make this safe.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Outcome counts for one state-extract ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub voters_processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_county_authority: usize,
    /// Per-voter failures, already logged in full; never fatal to the batch.
    pub failures: usize,
    /// Filled in by the removal pass.
    pub removed_marked: usize,
    pub cancelled: bool,
}

impl IngestSummary {
    fn absorb(&mut self, other: &IngestSummary) {
        self.voters_processed += other.voters_processed;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped_county_authority += other.skipped_county_authority;
        self.failures += other.failures;
        self.cancelled |= other.cancelled;
    }
}

// ---------------------------------------------------------------------------
// Watermark guard
// ---------------------------------------------------------------------------

/// Extracts must be fed in nondecreasing label order; the diff engine
/// compares against "whatever is stored", so replaying an older extract
/// corrupts derived state. Equal labels are allowed: re-running the same
/// extract is the recovery mechanism.
pub fn check_watermark<S: VoterStore>(
    store: &S,
    source: &str,
    label: NaiveDate,
) -> Result<(), ReconError> {
    if let Some(watermark) = store.watermark(source)? {
        if label < watermark {
            return Err(ReconError::StaleExtract {
                source: source.to_string(),
                label,
                watermark,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Worker fan-out
// ---------------------------------------------------------------------------

/// Split the voter groups into `workers` contiguous partitions.
fn partition<'a>(
    groups: &'a BTreeMap<i64, Vec<CanonicalCandidate>>,
    workers: usize,
) -> Vec<Vec<(i64, &'a [CanonicalCandidate])>> {
    let entries: Vec<(i64, &[CanonicalCandidate])> =
        groups.iter().map(|(k, v)| (*k, v.as_slice())).collect();
    if entries.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, entries.len());
    let chunk_size = entries.len().div_ceil(workers);
    entries
        .chunks(chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Process one voter group end to end: diff-and-apply, then the reject/cure
/// state machine when the voter's county reports rejections to the state.
pub fn process_voter_group<S: VoterStore>(
    store: &mut S,
    sink: &dyn AuditSink,
    ctx: &IngestContext,
    registration_number: i64,
    rows: &[CanonicalCandidate],
) -> Result<VoterOutcome, ReconError> {
    let outcome = reconcile_voter(store, sink, ctx, rows)?;

    if outcome != VoterOutcome::SkippedCountyAuthority {
        let county = rows.last().map(|r| r.county.as_str()).unwrap_or_default();
        if ctx.county_reports(county) {
            reject_and_cure(store, ctx, registration_number, rows)?;
        }
    }

    Ok(outcome)
}

/// Ingest a full state extract across `workers` parallel workers.
///
/// `open_store` is called once per worker; each worker owns its handle.
/// A failure in one voter group is logged and counted, and processing
/// continues with the next group, never terminating the chunk.
pub fn ingest_state<S, F>(
    open_store: F,
    groups: &BTreeMap<i64, Vec<CanonicalCandidate>>,
    ctx: &IngestContext,
    sink: &dyn AuditSink,
    workers: usize,
    cancel: &CancelToken,
) -> IngestSummary
where
    S: VoterStore,
    F: Fn() -> Result<S, StoreError> + Sync,
{
    let partitions = partition(groups, workers);
    let mut summary = IngestSummary::default();

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(partitions.len());

        for chunk in &partitions {
            let open_store = &open_store;
            let cancel = cancel.clone();
            handles.push(scope.spawn(move || {
                let mut part = IngestSummary::default();

                let mut store = match open_store() {
                    Ok(store) => store,
                    Err(e) => {
                        tracing::error!(error = %e, "worker could not open store; chunk abandoned");
                        part.failures += chunk.len();
                        return part;
                    }
                };

                for (registration_number, rows) in chunk {
                    if cancel.is_cancelled() {
                        part.cancelled = true;
                        break;
                    }

                    match process_voter_group(&mut store, sink, ctx, *registration_number, rows) {
                        Ok(VoterOutcome::Inserted) => part.inserted += 1,
                        Ok(VoterOutcome::Updated) => part.updated += 1,
                        Ok(VoterOutcome::Unchanged) => part.unchanged += 1,
                        Ok(VoterOutcome::SkippedCountyAuthority) => {
                            part.skipped_county_authority += 1;
                        }
                        Err(e) => {
                            tracing::error!(
                                registration_number,
                                rows = rows.len(),
                                error = %e,
                                "voter group failed; continuing with next"
                            );
                            part.failures += 1;
                        }
                    }
                    part.voters_processed += 1;
                }

                part
            }));
        }

        for handle in handles {
            match handle.join() {
                Ok(part) => summary.absorb(&part),
                Err(_) => {
                    tracing::error!("ingest worker panicked; its remaining groups were not processed");
                    summary.failures += 1;
                }
            }
        }
    });

    summary
}
