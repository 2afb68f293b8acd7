use chrono::{Datelike, NaiveDate};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Party affiliation, folded to the three tracked codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Party {
    Dem,
    Rep,
    Oth,
}

impl Party {
    /// Fold the extract's free-form party name into a code.
    pub fn from_extract(value: &str) -> Self {
        match value {
            "Democrat" => Self::Dem,
            "Republican" => Self::Rep,
            _ => Self::Oth,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Dem => "DEM",
            Self::Rep => "REP",
            Self::Oth => "OTH",
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Rejection status carried on a ballot row.
///
/// Free text from the state extract counts as a rejection only when it
/// carries the affidavit marker; anything else is treated as not flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BallotStatus {
    DeficientAffidavit,
    DefectiveAffidavit,
}

impl BallotStatus {
    /// Classify extract free text. `None` when the text does not carry the
    /// affidavit marker.
    pub fn classify(text: &str) -> Option<Self> {
        if !text.to_lowercase().contains("affidavit") {
            return None;
        }
        let lower = text.to_lowercase();
        if lower.contains("defective") || lower.contains("envelope") {
            Some(Self::DefectiveAffidavit)
        } else {
            Some(Self::DeficientAffidavit)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeficientAffidavit => "Deficient Affidavit/Incomplete",
            Self::DefectiveAffidavit => "Defective Affidavit/Envelope",
        }
    }
}

impl std::fmt::Display for BallotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a voter is (or was) rejected. `Both` when distinct reasons were seen
/// across rows or runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    Deficient,
    Defective,
    Both,
}

impl From<BallotStatus> for RejectReason {
    fn from(status: BallotStatus) -> Self {
        match status {
            BallotStatus::DeficientAffidavit => Self::Deficient,
            BallotStatus::DefectiveAffidavit => Self::Defective,
        }
    }
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deficient => "Deficient",
            Self::Defective => "Defective",
            Self::Both => "Both",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Normalized candidate row
// ---------------------------------------------------------------------------

/// One state-extract row after normalization into the canonical vocabulary.
/// Still possibly one-of-many for a voter; the ballot selector collapses
/// these into one active row plus void history.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCandidate {
    pub registration_number: i64,
    pub county: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub name_suffix: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub political_party: Party,
    pub resident_address: String,
    pub resident_city: Option<String>,
    pub resident_zip: Option<String>,
    pub mailing_address: Option<String>,
    pub request_date: Option<NaiveDate>,
    pub receive_date: Option<NaiveDate>,
    pub absentee_issue_method: Option<String>,
    pub absentee_receive_method: Option<String>,
    pub ballot_status: Option<BallotStatus>,
    pub is_void: bool,
}

/// Render a date with a representative year so only month/day differences
/// register during field comparison.
pub fn comparable_date(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}

fn opt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(comparable_date)
}

impl CanonicalCandidate {
    /// The comparable field set, in a fixed order shared with
    /// [`VoterRecord::comparable_fields`]. The diff engine walks these pairs.
    pub fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("registration_number", Some(self.registration_number.to_string())),
            ("county", Some(self.county.clone())),
            ("last_name", Some(self.last_name.clone())),
            ("first_name", Some(self.first_name.clone())),
            ("middle_name", self.middle_name.clone()),
            ("name_suffix", self.name_suffix.clone()),
            ("date_of_birth", opt_date(self.date_of_birth)),
            ("political_party", Some(self.political_party.code().to_string())),
            ("resident_address", Some(self.resident_address.clone())),
            ("resident_city", self.resident_city.clone()),
            ("resident_zip", self.resident_zip.clone()),
            ("mailing_address", self.mailing_address.clone()),
            ("request_date", opt_date(self.request_date)),
            ("receive_date", opt_date(self.receive_date)),
            ("absentee_issue_method", self.absentee_issue_method.clone()),
            ("absentee_receive_method", self.absentee_receive_method.clone()),
            ("ballot_status", self.ballot_status.map(|s| s.as_str().to_string())),
            ("is_void", Some(self.is_void.to_string())),
        ]
    }
}

/// Audit display name for a comparable field.
pub fn display_name(field: &str) -> &str {
    match field {
        "registration_number" => "Registration Number",
        "county" => "County",
        "last_name" => "Last Name",
        "first_name" => "First Name",
        "middle_name" => "Middle Name",
        "name_suffix" => "Name Suffix",
        "date_of_birth" => "Date of Birth",
        "political_party" => "Political Party",
        "resident_address" => "Resident Address",
        "resident_city" => "Resident City",
        "resident_zip" => "Resident Zip",
        "mailing_address" => "Mailing Address",
        "request_date" => "Request Date",
        "receive_date" => "Ballot Received Date",
        "absentee_issue_method" => "Absentee Issue Method",
        "absentee_receive_method" => "Absentee Receive Method",
        "ballot_status" => "Ballot Status",
        "is_void" => "Void",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Canonical voter record
// ---------------------------------------------------------------------------

/// The canonical per-voter record, keyed by registration number. Created on
/// first sight, mutated by every subsequent ingest, never hard-deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct VoterRecord {
    pub registration_number: i64,
    pub county: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub name_suffix: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub political_party: Party,
    pub resident_address: String,
    pub resident_city: Option<String>,
    pub resident_zip: Option<String>,
    pub mailing_address: Option<String>,
    pub request_date: Option<NaiveDate>,
    pub receive_date: Option<NaiveDate>,
    pub absentee_issue_method: Option<String>,
    pub absentee_receive_method: Option<String>,
    pub ballot_status: Option<BallotStatus>,
    pub is_void: bool,

    // Bookkeeping, excluded from field comparison.
    pub reject_date: Option<NaiveDate>,
    pub cure_date: Option<NaiveDate>,
    pub number_of_rejections: u32,
    pub was_ever_rejected: bool,
    pub currently_rejected: bool,
    pub reject_reason: Option<RejectReason>,
    pub number_of_rows: u32,
    pub has_voided_ballot: bool,
    pub was_removed: bool,
    /// True when a county-authority source owns this record; state ingest
    /// must not touch it.
    pub county_sourced: bool,
    pub logs: Vec<String>,
}

impl VoterRecord {
    /// Build a fresh record from the selected active row. Bookkeeping fields
    /// start at their zero values; the caller layers INSERT-time adjustments
    /// (row counts, void history, reject date) on top.
    pub fn from_candidate(active: &CanonicalCandidate) -> Self {
        Self {
            registration_number: active.registration_number,
            county: active.county.clone(),
            last_name: active.last_name.clone(),
            first_name: active.first_name.clone(),
            middle_name: active.middle_name.clone(),
            name_suffix: active.name_suffix.clone(),
            date_of_birth: active.date_of_birth,
            political_party: active.political_party,
            resident_address: active.resident_address.clone(),
            resident_city: active.resident_city.clone(),
            resident_zip: active.resident_zip.clone(),
            mailing_address: active.mailing_address.clone(),
            request_date: active.request_date,
            receive_date: active.receive_date,
            absentee_issue_method: active.absentee_issue_method.clone(),
            absentee_receive_method: active.absentee_receive_method.clone(),
            ballot_status: active.ballot_status,
            is_void: active.is_void,
            reject_date: None,
            cure_date: None,
            number_of_rejections: 0,
            was_ever_rejected: false,
            currently_rejected: false,
            reject_reason: None,
            number_of_rows: 0,
            has_voided_ballot: false,
            was_removed: false,
            county_sourced: false,
            logs: Vec::new(),
        }
    }

    /// Same comparable field set and order as
    /// [`CanonicalCandidate::comparable_fields`].
    pub fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("registration_number", Some(self.registration_number.to_string())),
            ("county", Some(self.county.clone())),
            ("last_name", Some(self.last_name.clone())),
            ("first_name", Some(self.first_name.clone())),
            ("middle_name", self.middle_name.clone()),
            ("name_suffix", self.name_suffix.clone()),
            ("date_of_birth", opt_date(self.date_of_birth)),
            ("political_party", Some(self.political_party.code().to_string())),
            ("resident_address", Some(self.resident_address.clone())),
            ("resident_city", self.resident_city.clone()),
            ("resident_zip", self.resident_zip.clone()),
            ("mailing_address", self.mailing_address.clone()),
            ("request_date", opt_date(self.request_date)),
            ("receive_date", opt_date(self.receive_date)),
            ("absentee_issue_method", self.absentee_issue_method.clone()),
            ("absentee_receive_method", self.absentee_receive_method.clone()),
            ("ballot_status", self.ballot_status.map(|s| s.as_str().to_string())),
            ("is_void", Some(self.is_void.to_string())),
        ]
    }

    /// Overwrite the comparable fields from a candidate row.
    /// `keep_ballot_status` preserves the stored status for counties whose
    /// state-extract rejection data is not authoritative.
    pub fn apply_candidate(&mut self, active: &CanonicalCandidate, keep_ballot_status: bool) {
        let stored_status = self.ballot_status;
        self.county = active.county.clone();
        self.last_name = active.last_name.clone();
        self.first_name = active.first_name.clone();
        self.middle_name = active.middle_name.clone();
        self.name_suffix = active.name_suffix.clone();
        self.date_of_birth = active.date_of_birth;
        self.political_party = active.political_party;
        self.resident_address = active.resident_address.clone();
        self.resident_city = active.resident_city.clone();
        self.resident_zip = active.resident_zip.clone();
        self.mailing_address = active.mailing_address.clone();
        self.request_date = active.request_date;
        self.receive_date = active.receive_date;
        self.absentee_issue_method = active.absentee_issue_method.clone();
        self.absentee_receive_method = active.absentee_receive_method.clone();
        self.ballot_status = if keep_ballot_status { stored_status } else { active.ballot_status };
        self.is_void = active.is_void;
    }
}

// ---------------------------------------------------------------------------
// Identity mapping
// ---------------------------------------------------------------------------

/// Persisted association from a county-row identity to a registration
/// number. Append-only; consulted before re-querying or re-prompting for
/// the same identity in later runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMapping {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    /// First two whitespace tokens of the address, lowercased. None when
    /// the county row carried no address.
    pub address_prefix: Option<String>,
    pub registration_number: i64,
}

// ---------------------------------------------------------------------------
// County rejection row
// ---------------------------------------------------------------------------

/// One row from a county rejection list. County extracts carry no stable
/// voter key except Des Moines, which supplies the registration number
/// directly.
#[derive(Debug, Clone, PartialEq)]
pub struct CountyRow {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub address: Option<String>,
    pub situation: BallotStatus,
    pub registration_number: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_folding() {
        assert_eq!(Party::from_extract("Democrat"), Party::Dem);
        assert_eq!(Party::from_extract("Republican"), Party::Rep);
        assert_eq!(Party::from_extract("Libertarian"), Party::Oth);
        assert_eq!(Party::from_extract("No Party"), Party::Oth);
    }

    #[test]
    fn ballot_status_requires_affidavit_marker() {
        assert_eq!(BallotStatus::classify("Received"), None);
        assert_eq!(BallotStatus::classify(""), None);
        assert_eq!(
            BallotStatus::classify("Deficient Affidavit/Incomplete"),
            Some(BallotStatus::DeficientAffidavit)
        );
        assert_eq!(
            BallotStatus::classify("Defective Affidavit/Envelope"),
            Some(BallotStatus::DefectiveAffidavit)
        );
    }

    #[test]
    fn comparable_dates_ignore_year() {
        let a = NaiveDate::from_ymd_opt(2020, 10, 26).unwrap();
        let b = NaiveDate::from_ymd_opt(2019, 10, 26).unwrap();
        assert_eq!(comparable_date(a), comparable_date(b));
        assert_eq!(comparable_date(a), "10/26");
    }

    #[test]
    fn candidate_and_record_fields_align() {
        let cand = CanonicalCandidate {
            registration_number: 7,
            county: "Story".into(),
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            middle_name: None,
            name_suffix: None,
            date_of_birth: None,
            political_party: Party::Dem,
            resident_address: "100 Main St".into(),
            resident_city: Some("Ames".into()),
            resident_zip: None,
            mailing_address: None,
            request_date: None,
            receive_date: None,
            absentee_issue_method: None,
            absentee_receive_method: None,
            ballot_status: None,
            is_void: false,
        };
        let record = VoterRecord::from_candidate(&cand);
        let left = cand.comparable_fields();
        let right = record.comparable_fields();
        assert_eq!(left.len(), right.len());
        for ((lk, lv), (rk, rv)) in left.iter().zip(right.iter()) {
            assert_eq!(lk, rk);
            assert_eq!(lv, rv);
        }
    }
}
