//! Active/void collapse: reduce a voter's candidate rows for one extract to
//! a single representative "active" row plus void ballot history.

use absentia_core::CanonicalCandidate;

/// Result of collapsing one voter's rows.
///
/// `raw_active_count` / `raw_void_count` are the pre-collapse partition
/// sizes; the diff engine needs them because the stored representative may
/// itself be a promoted void row.
#[derive(Debug, Clone)]
pub struct Selection {
    pub active: CanonicalCandidate,
    pub void_rows: Vec<CanonicalCandidate>,
    pub raw_active_count: usize,
    pub raw_void_count: usize,
}

impl Selection {
    /// The externally visible ballot count: recorded voids plus the single
    /// representative slot. Anomalous multi-active cases never inflate it.
    pub fn number_of_ballots(&self) -> u32 {
        (1 + self.void_rows.len()) as u32
    }
}

/// Collapse a voter's rows, in file order.
///
/// Case A: exactly one active row, used as-is, voids kept as history.
/// Case B: no active rows; the last void row is promoted to serve as the
/// stored representative so every voter stays representable.
/// Case C: several active rows; the one with the most recent receive date
/// wins; the rest are dropped from canonical storage (their content survives
/// only in the audit trail).
pub fn select_ballots(rows: &[CanonicalCandidate]) -> Option<Selection> {
    let mut active_rows: Vec<&CanonicalCandidate> = Vec::new();
    let mut void_rows: Vec<&CanonicalCandidate> = Vec::new();

    for row in rows {
        if row.is_void {
            void_rows.push(row);
        } else {
            active_rows.push(row);
        }
    }

    let raw_active_count = active_rows.len();
    let raw_void_count = void_rows.len();

    let active = if active_rows.is_empty() {
        // only the promoted row leaves the void list
        void_rows.pop()?.clone()
    } else if active_rows.len() == 1 {
        active_rows[0].clone()
    } else {
        most_recent_active(&active_rows).clone()
    };

    Some(Selection {
        active,
        void_rows: void_rows.into_iter().cloned().collect(),
        raw_active_count,
        raw_void_count,
    })
}

/// Case C tie-break: most recent receive date wins; rows with no receive
/// date at all fall back to the last in file order.
fn most_recent_active<'a>(active_rows: &[&'a CanonicalCandidate]) -> &'a CanonicalCandidate {
    active_rows
        .iter()
        .filter(|r| r.receive_date.is_some())
        .max_by_key(|r| r.receive_date)
        .copied()
        .unwrap_or(active_rows[active_rows.len() - 1])
}
