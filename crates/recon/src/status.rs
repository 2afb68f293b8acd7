//! Status/lifecycle updater: the reject/cure state machine.
//!
//! Runs after the diff engine for state extracts, and only for counties
//! whose state-extract rejection data is authoritative. Rejections are
//! detected by counting, not by flag: only when this batch shows more
//! rejected rows than the stored counter did a new rejection actually
//! happen.

use absentia_core::{CanonicalCandidate, RejectReason};

use crate::diff::IngestContext;
use crate::error::ReconError;
use crate::store::{RejectionUpdate, VoterStore};

pub fn reject_and_cure<S: VoterStore>(
    store: &mut S,
    ctx: &IngestContext,
    registration_number: i64,
    rows: &[CanonicalCandidate],
) -> Result<(), ReconError> {
    let Some(voter) = store.get(registration_number)? else {
        return Ok(());
    };

    let mut rejected_rows: u32 = 0;
    let mut currently_rejected = false;
    let mut reason: Option<RejectReason> = None;
    let mut active_ballot: Option<&CanonicalCandidate> = None;

    for row in rows {
        if !row.is_void {
            active_ballot = Some(row);
        }

        let Some(status) = row.ballot_status else {
            continue;
        };
        rejected_rows += 1;

        // the rejection is current only when the rejected row is the active one
        if !row.is_void {
            currently_rejected = true;
        }

        let row_reason = RejectReason::from(status);
        if voter.reject_reason == Some(RejectReason::Both) || reason == Some(RejectReason::Both) {
            reason = Some(RejectReason::Both);
        } else if voter.reject_reason.is_some() && voter.reject_reason != Some(row_reason) {
            // conflicts with what an earlier run stored
            reason = Some(RejectReason::Both);
        } else if reason.is_some() && reason != Some(row_reason) {
            // conflicts with another row in this same batch
            reason = Some(RejectReason::Both);
        } else {
            reason = Some(row_reason);
        }
    }

    // Rejected rows can disappear from one extract to the next; in that case
    // the stored rejection metadata is left alone, but the voter was already
    // marked rejected and can still be cured below.

    if rejected_rows > voter.number_of_rejections {
        let update = RejectionUpdate {
            reject_date: ctx.label_date,
            number_of_rejections: rejected_rows,
            currently_rejected,
            reject_reason: reason,
        };
        store.set_rejection(registration_number, &update)?;
        tracing::info!(
            registration_number,
            rejections = rejected_rows,
            currently_rejected,
            reason = reason.map(|r| r.as_str()),
            "rejection data updated"
        );
    } else {
        if rejected_rows > 0 && reason.is_some() && voter.reject_reason != reason {
            if let Some(reason) = reason {
                store.set_reject_reason(registration_number, reason)?;
                tracing::info!(registration_number, reason = reason.as_str(), "reject reason updated");
            }
        }

        // counter drift from earlier runs can leave the flag set with no
        // live status; correct it
        if voter.ballot_status.is_none() && voter.currently_rejected {
            store.set_currently_rejected(registration_number, false)?;
            tracing::info!(registration_number, "cleared stale currently_rejected flag");
        }
    }

    if rejected_rows <= voter.number_of_rejections {
        if let Some(active) = active_ballot {
            let not_rejected = active.ballot_status.is_none();
            let received = active.receive_date.is_some();
            if voter.cure_date.is_none() && voter.was_ever_rejected && received && not_rejected {
                store.set_cured(registration_number, ctx.label_date)?;
                tracing::info!(registration_number, cure_date = %ctx.label_date, "voter cured");
            }
        }
    }

    Ok(())
}
