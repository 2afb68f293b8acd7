//! Diff & audit engine.
//!
//! Compares a voter's selected candidate rows against the previously stored
//! record, emits the audit entries explaining every change, and persists the
//! result. All input is diffed against "whatever is currently stored", which
//! is what makes re-running an ingest safe.

use std::collections::HashSet;

use chrono::NaiveDate;

use absentia_core::model::display_name;
use absentia_core::{AuditEntry, AuditOp, AuditSink, CanonicalCandidate, OpBase, VoterRecord};

use crate::error::ReconError;
use crate::selector::{select_ballots, Selection};
use crate::store::VoterStore;

/// Per-ingest context shared by every voter group.
#[derive(Debug, Clone)]
pub struct IngestContext {
    /// Audit label of this extract, e.g. `SoS-10-26.csv`.
    pub source_file: String,
    /// The date this extract represents; stamps reject and cure dates.
    pub label_date: NaiveDate,
    /// Counties whose state-extract rejection data is not authoritative.
    /// Their `ballot_status` is owned by the county ingest instead.
    pub non_reporting: HashSet<String>,
}

impl IngestContext {
    pub fn county_reports(&self, county: &str) -> bool {
        !self.non_reporting.contains(county)
    }
}

/// What the engine did with one voter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterOutcome {
    Inserted,
    Updated,
    Unchanged,
    /// County-authority record; state ingest leaves it alone.
    SkippedCountyAuthority,
}

fn ballot_count_context(number_of_ballots: u32) -> Option<String> {
    Some(format!("Ballot Count: {number_of_ballots}"))
}

/// Reconcile one voter's candidate rows against the store.
pub fn reconcile_voter<S: VoterStore>(
    store: &mut S,
    sink: &dyn AuditSink,
    ctx: &IngestContext,
    rows: &[CanonicalCandidate],
) -> Result<VoterOutcome, ReconError> {
    let Some(selection) = select_ballots(rows) else {
        return Ok(VoterOutcome::Unchanged);
    };

    let voter = store.get(selection.active.registration_number)?;

    match voter {
        Some(voter) if voter.county_sourced => Ok(VoterOutcome::SkippedCountyAuthority),
        None => insert_voter(store, sink, ctx, &selection),
        Some(voter) => {
            let row_count = rows.len() as u32;
            let additional_rows = row_count > voter.number_of_rows;
            let removed_rows = voter.number_of_rows.saturating_sub(row_count);
            update_voter(store, sink, ctx, &voter, &selection, additional_rows, removed_rows)
        }
    }
}

// ---------------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------------

fn insert_voter<S: VoterStore>(
    store: &mut S,
    sink: &dyn AuditSink,
    ctx: &IngestContext,
    selection: &Selection,
) -> Result<VoterOutcome, ReconError> {
    let active = &selection.active;
    let number_of_ballots = selection.number_of_ballots();

    let mut entries = Vec::new();
    for _ in &selection.void_rows {
        entries.push(AuditEntry::op(
            &ctx.source_file,
            ballot_count_context(number_of_ballots),
            AuditOp::new(OpBase::Insert).void(),
        ));
    }

    // a ballot can appear for the first time already rejected or voided
    let mut op = AuditOp::new(OpBase::Insert);
    if active.ballot_status.is_some() {
        op = op.reject();
    }
    if active.is_void {
        op = op.void();
    }
    entries.push(AuditEntry::op(
        &ctx.source_file,
        ballot_count_context(number_of_ballots),
        op,
    ));

    let mut record = VoterRecord::from_candidate(active);
    record.number_of_rows = number_of_ballots;
    record.has_voided_ballot = !selection.void_rows.is_empty() || active.is_void;
    if let Some(status) = active.ballot_status {
        record.reject_date = Some(ctx.label_date);
        record.number_of_rejections = 1;
        record.was_ever_rejected = true;
        record.currently_rejected = !active.is_void;
        record.reject_reason = Some(status.into());
    }
    record.logs = entries.iter().map(AuditEntry::render).collect();

    for entry in &entries {
        sink.append(entry);
    }
    store.insert(&record)?;

    tracing::debug!(
        registration_number = record.registration_number,
        ballots = number_of_ballots,
        "voter inserted"
    );

    Ok(VoterOutcome::Inserted)
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

fn update_voter<S: VoterStore>(
    store: &mut S,
    sink: &dyn AuditSink,
    ctx: &IngestContext,
    voter: &VoterRecord,
    selection: &Selection,
    additional_rows: bool,
    removed_rows: u32,
) -> Result<VoterOutcome, ReconError> {
    let active = &selection.active;
    let reg = voter.registration_number;
    let number_of_ballots = selection.number_of_ballots();

    let row_entries =
        row_change_entries(ctx, voter, selection, additional_rows, removed_rows);
    for entry in &row_entries {
        sink.append(entry);
    }

    // bookkeeping updates that apply regardless of field changes
    if (additional_rows || removed_rows > 0) && voter.number_of_rows != number_of_ballots {
        store.set_number_of_rows(reg, number_of_ballots)?;
    }
    if (!selection.void_rows.is_empty() || active.is_void) && !voter.has_voided_ballot {
        store.set_has_voided_ballot(reg)?;
    }
    if voter.was_removed {
        store.clear_was_removed(reg)?;
    }

    if voter.is_void && selection.raw_active_count > 0 && !additional_rows {
        return Err(ReconError::VoidStatusLost {
            registration_number: reg,
        });
    }

    if voter.is_void && !additional_rows {
        // fully-void voter with no new rows: nothing left to compare
        return Ok(VoterOutcome::Unchanged);
    }

    let field_entries = compare_fields(ctx, voter, active, additional_rows, number_of_ballots);
    for entry in &field_entries.entries {
        sink.append(entry);
    }

    if !field_entries.has_changed {
        return Ok(VoterOutcome::Unchanged);
    }

    // Full overwrite of the comparable fields is acceptable only because
    // every change is in the audit trail: recent extract data wins, and the
    // log preserves provenance if it is ever needed.
    let mut updated = voter.clone();
    let keep_ballot_status = !ctx.county_reports(&active.county);
    updated.apply_candidate(active, keep_ballot_status);
    updated.number_of_rows = number_of_ballots;
    updated
        .logs
        .extend(row_entries.iter().chain(&field_entries.entries).map(AuditEntry::render));
    store.update_extract_fields(&updated)?;

    Ok(VoterOutcome::Updated)
}

/// Entries explaining a change in row count, emitted before the field
/// comparison.
fn row_change_entries(
    ctx: &IngestContext,
    voter: &VoterRecord,
    selection: &Selection,
    additional_rows: bool,
    removed_rows: u32,
) -> Vec<AuditEntry> {
    let number_of_ballots = selection.number_of_ballots();
    let mut entries = Vec::new();

    if additional_rows {
        // the stored row count includes the representative slot unless the
        // representative itself was a promoted void
        let previous_void_count = voter.number_of_rows.saturating_sub(u32::from(!voter.is_void));
        // one insert is covered by the UPDATE VOID note below
        let covered = u32::from(!voter.is_void);
        let new_void_inserts = (selection.raw_void_count as i64)
            - i64::from(previous_void_count)
            - i64::from(covered);

        for _ in 0..new_void_inserts.max(0) {
            entries.push(AuditEntry::op(
                &ctx.source_file,
                ballot_count_context(number_of_ballots),
                AuditOp::new(OpBase::Insert).void(),
            ));
        }

        // a still-active voter that picked up ballots without flipping void
        // status gets an explanatory note; the void transition itself would
        // otherwise explain the new rows
        if !voter.is_void && !selection.active.is_void {
            entries.push(
                AuditEntry::op(
                    &ctx.source_file,
                    ballot_count_context(number_of_ballots),
                    AuditOp::new(OpBase::Update).void(),
                )
                .with_note("new ballot(s) added"),
            );
        }
    } else if removed_rows > 0 {
        // extracts should be monotonic; tolerate shrinkage anyway
        for _ in 0..removed_rows {
            entries.push(AuditEntry::op(
                &ctx.source_file,
                ballot_count_context(number_of_ballots),
                AuditOp::new(OpBase::RemoveRow),
            ));
        }
    }

    entries
}

struct FieldComparison {
    has_changed: bool,
    entries: Vec<AuditEntry>,
}

/// Field-by-field comparison of the stored record against the new active
/// row. Dates have already been rendered with a representative year, so only
/// month/day differences register.
fn compare_fields(
    ctx: &IngestContext,
    voter: &VoterRecord,
    active: &CanonicalCandidate,
    additional_rows: bool,
    number_of_ballots: u32,
) -> FieldComparison {
    let base = if additional_rows { OpBase::UpdateNew } else { OpBase::Update };
    // an update that arrives on a void representative is VOID-qualified
    let base_op = if active.is_void && additional_rows {
        AuditOp::new(base).void()
    } else {
        AuditOp::new(base)
    };

    let stored = voter.comparable_fields();
    let incoming = active.comparable_fields();
    let county_reports = ctx.county_reports(&active.county);

    let mut has_changed = false;
    let mut entries = Vec::new();

    for ((field, old), (_, new)) in stored.iter().zip(incoming.iter()) {
        if old == new {
            continue;
        }
        has_changed = true;

        let context = ballot_count_context(number_of_ballots);
        match *field {
            "ballot_status" => {
                // only log status flips the engine is authoritative for
                if county_reports && !active.is_void {
                    let op = if old.is_none() { base_op.reject() } else { base_op };
                    entries.push(AuditEntry::field_change(
                        &ctx.source_file,
                        context,
                        op,
                        display_name(field),
                        old.as_deref(),
                        new.as_deref(),
                    ));
                }
            }
            "is_void" if new.as_deref() == Some("true") => {
                entries.push(AuditEntry::field_change(
                    &ctx.source_file,
                    context,
                    base_op.void(),
                    display_name(field),
                    old.as_deref(),
                    new.as_deref(),
                ));
            }
            _ => {
                entries.push(AuditEntry::field_change(
                    &ctx.source_file,
                    context,
                    base_op,
                    display_name(field),
                    old.as_deref(),
                    new.as_deref(),
                ));
            }
        }
    }

    FieldComparison { has_changed, entries }
}
