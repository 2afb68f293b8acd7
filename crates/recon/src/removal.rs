//! Removal detector: after a full state extract has been ingested, every
//! stored voter absent from the extract's key set is flagged removed.
//! Reappearance in a later extract clears the flag during normal update
//! processing.

use std::collections::BTreeSet;

use absentia_core::{AuditEntry, AuditOp, AuditSink, OpBase};

use crate::diff::IngestContext;
use crate::error::ReconError;
use crate::store::VoterStore;

/// Mark voters missing from `seen`. Voters already flagged are skipped so a
/// re-run of the same extract appends nothing. Returns the number marked.
pub fn run_removal_pass<S: VoterStore>(
    store: &mut S,
    sink: &dyn AuditSink,
    ctx: &IngestContext,
    seen: &BTreeSet<i64>,
) -> Result<usize, ReconError> {
    let mut marked = 0;

    for (registration_number, was_removed) in store.removal_scan()? {
        if was_removed || seen.contains(&registration_number) {
            continue;
        }

        let entry = AuditEntry::op(&ctx.source_file, None, AuditOp::new(OpBase::Remove));
        sink.append(&entry);
        store.mark_removed(registration_number, &entry.render())?;
        tracing::info!(registration_number, "voter absent from extract, marked removed");
        marked += 1;
    }

    Ok(marked)
}
