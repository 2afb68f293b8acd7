//! County-authority ingest: a county's hand-produced rejection list sets
//! ballot status directly, and voters missing from today's list are cured.
//!
//! Sequential by design: the identity resolver may need the manual
//! resolution channel, which is interactive.

use std::collections::BTreeSet;

use absentia_core::model::display_name;
use absentia_core::{AuditEntry, AuditOp, AuditSink, CountyFormat, CountyRow, OpBase};

use crate::diff::IngestContext;
use crate::error::ReconError;
use crate::identity::{IdentityResolver, Resolution};
use crate::store::{CountyRejection, VoterStore};

/// Outcome counts for one county ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountySummary {
    pub rows_processed: usize,
    pub rejected_marked: usize,
    pub already_rejected: usize,
    pub unresolved: usize,
    pub cured: usize,
}

pub fn ingest_county<S: VoterStore>(
    store: &mut S,
    sink: &dyn AuditSink,
    ctx: &IngestContext,
    format: CountyFormat,
    rows: &[CountyRow],
    resolver: &mut IdentityResolver<'_>,
) -> Result<CountySummary, ReconError> {
    let county = format.county();
    let mut summary = CountySummary::default();

    // voters still rejected after this file are everyone rejected before it,
    // minus everyone on it
    let mut still_rejected: BTreeSet<i64> =
        store.rejected_ids_for_county(county)?.into_iter().collect();

    for row in rows {
        summary.rows_processed += 1;

        let voter = match resolver.resolve(store, row, county)? {
            Resolution::Resolved(voter) => voter,
            Resolution::Unresolved => {
                summary.unresolved += 1;
                tracing::warn!(
                    county,
                    last_name = %row.last_name,
                    first_name = %row.first_name,
                    "county row left unresolved"
                );
                continue;
            }
        };

        let reg = voter.registration_number;

        if voter.ballot_status.is_none() {
            let entry = AuditEntry::field_change(
                &ctx.source_file,
                None,
                AuditOp::new(OpBase::Update),
                display_name("ballot_status"),
                None,
                Some(row.situation.as_str()),
            );
            sink.append(&entry);

            let rejection = CountyRejection {
                reject_date: ctx.label_date,
                ballot_status: row.situation,
                reject_reason: row.situation.into(),
                // the counter never decreases, so increment rather than reset
                number_of_rejections: voter.number_of_rejections + 1,
                default_receive_method_mail: voter.absentee_receive_method.is_none(),
                log_line: entry.render(),
            };
            store.apply_county_rejection(reg, &rejection)?;
            summary.rejected_marked += 1;
        } else {
            summary.already_rejected += 1;
        }

        // anyone on today's list is still rejected and must not be cured
        still_rejected.remove(&reg);
    }

    // what remains are the voters whose rejection the county no longer
    // reports: cured
    for reg in still_rejected {
        let Some(voter) = store.get(reg)? else {
            continue;
        };
        let old_status = voter.ballot_status.map(|s| s.as_str().to_string());
        let entry = AuditEntry::field_change(
            &ctx.source_file,
            None,
            AuditOp::new(OpBase::Update),
            display_name("ballot_status"),
            old_status.as_deref(),
            None,
        );
        sink.append(&entry);
        store.apply_county_cure(reg, ctx.label_date, &entry.render())?;
        tracing::info!(registration_number = reg, county, "voter cured by county list");
        summary.cured += 1;
    }

    Ok(summary)
}
