//! Extract report: a pure reduction over one extract's normalized rows into
//! an explicit aggregation object. No global accumulators; the caller gets
//! the whole result back and decides how to render it.

use std::collections::BTreeMap;

use serde::Serialize;

use absentia_core::counties::COUNTY_NAMES;
use absentia_core::{CanonicalCandidate, Party};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartyTotals {
    pub tracked: usize,
    pub received: usize,
    pub rejected: usize,
}

impl PartyTotals {
    pub fn return_pct(&self) -> f64 {
        if self.tracked == 0 {
            0.0
        } else {
            100.0 * self.received as f64 / self.tracked as f64
        }
    }

    pub fn rejection_pct(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            100.0 * self.rejected as f64 / self.received as f64
        }
    }

    fn absorb(&mut self, row: &CanonicalCandidate) {
        self.tracked += 1;
        if row.receive_date.is_some() {
            self.received += 1;
            if row.ballot_status.is_some() {
                self.rejected += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountyTotals {
    pub dem: PartyTotals,
    pub rep: PartyTotals,
    pub oth: PartyTotals,
}

impl CountyTotals {
    pub fn received(&self) -> usize {
        self.dem.received + self.rep.received + self.oth.received
    }

    pub fn rejected(&self) -> usize {
        self.dem.rejected + self.rep.rejected + self.oth.rejected
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractReport {
    pub totals: CountyTotals,
    pub by_county: BTreeMap<String, CountyTotals>,
    /// Rows the reader dropped for missing first/last/address.
    pub missing_primary: usize,
}

impl ExtractReport {
    /// Counties reporting no rejections at all, with their received counts,
    /// highest volume first. High-volume silence usually means the county
    /// reports through its own channel instead.
    pub fn counties_not_reporting(&self) -> Vec<(String, usize)> {
        let mut silent: Vec<(String, usize)> = COUNTY_NAMES
            .iter()
            .map(|&name| {
                let received = self
                    .by_county
                    .get(name)
                    .map(CountyTotals::received)
                    .unwrap_or(0);
                (name.to_string(), received)
            })
            .filter(|(name, _)| {
                self.by_county
                    .get(name)
                    .map(|c| c.rejected() == 0)
                    .unwrap_or(true)
            })
            .collect();
        silent.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        silent
    }
}

/// Reduce one extract's rows into a report.
pub fn build_report<'a, I>(rows: I, missing_primary: usize) -> ExtractReport
where
    I: IntoIterator<Item = &'a CanonicalCandidate>,
{
    let mut report = ExtractReport {
        missing_primary,
        ..ExtractReport::default()
    };

    for row in rows {
        let county = report.by_county.entry(row.county.clone()).or_default();
        let (total_slot, county_slot) = match row.political_party {
            Party::Dem => (&mut report.totals.dem, &mut county.dem),
            Party::Rep => (&mut report.totals.rep, &mut county.rep),
            Party::Oth => (&mut report.totals.oth, &mut county.oth),
        };
        total_slot.absorb(row);
        county_slot.absorb(row);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use absentia_core::BallotStatus;
    use chrono::NaiveDate;

    fn row(county: &str, party: Party, received: bool, rejected: bool) -> CanonicalCandidate {
        CanonicalCandidate {
            registration_number: 1,
            county: county.into(),
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            middle_name: None,
            name_suffix: None,
            date_of_birth: None,
            political_party: party,
            resident_address: "100 Main St".into(),
            resident_city: None,
            resident_zip: None,
            mailing_address: None,
            request_date: None,
            receive_date: received.then(|| NaiveDate::from_ymd_opt(2020, 10, 9).unwrap()),
            absentee_issue_method: None,
            absentee_receive_method: None,
            ballot_status: rejected.then_some(BallotStatus::DeficientAffidavit),
            is_void: false,
        }
    }

    #[test]
    fn totals_roll_up_by_party() {
        let rows = vec![
            row("Story", Party::Dem, true, true),
            row("Story", Party::Dem, true, false),
            row("Story", Party::Rep, false, false),
            row("Polk", Party::Oth, true, false),
        ];
        let report = build_report(&rows, 2);
        assert_eq!(report.totals.dem.tracked, 2);
        assert_eq!(report.totals.dem.received, 2);
        assert_eq!(report.totals.dem.rejected, 1);
        assert_eq!(report.totals.rep.received, 0);
        assert_eq!(report.totals.oth.tracked, 1);
        assert_eq!(report.missing_primary, 2);
        assert_eq!(report.by_county["Story"].dem.rejected, 1);
        assert!((report.totals.dem.rejection_pct() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrejected_rows_need_a_receive_date_to_count_received() {
        // a rejected status on an unreceived ballot does not count
        let rows = vec![row("Story", Party::Dem, false, true)];
        let report = build_report(&rows, 0);
        assert_eq!(report.totals.dem.received, 0);
        assert_eq!(report.totals.dem.rejected, 0);
    }

    #[test]
    fn silent_counties_sorted_by_volume() {
        let rows = vec![
            row("Story", Party::Dem, true, true),
            row("Polk", Party::Dem, true, false),
            row("Polk", Party::Rep, true, false),
            row("Linn", Party::Dem, true, false),
        ];
        let report = build_report(&rows, 0);
        let silent = report.counties_not_reporting();
        // Story reported a rejection, so it is absent
        assert!(silent.iter().all(|(name, _)| name != "Story"));
        assert_eq!(silent[0], ("Polk".to_string(), 2));
        assert_eq!(silent[1], ("Linn".to_string(), 1));
    }
}
