//! Raw-to-canonical row normalization.
//!
//! A pure transform: raw rows are never mutated, every branch produces a
//! fresh [`CanonicalCandidate`].

use chrono::NaiveDate;

use absentia_core::{county_name, BallotStatus, CanonicalCandidate, Party};

use crate::read::clean_field;
use crate::state::RawRow;

/// Extract wire format for dates.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

fn clean(row: &RawRow, header: &str) -> Option<String> {
    row.get(header).and_then(clean_field)
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    // Malformed dates become None rather than raising
    value.and_then(|v| NaiveDate::parse_from_str(&v, DATE_FORMAT).ok())
}

/// Join the mail columns into one address, or None when every part is blank.
fn mailing_address(row: &RawRow) -> Option<String> {
    let parts: Vec<String> = ["MAIL_ADDRESS", "MAIL_CITY", "MAIL_STATE", "MAIL_ZIP", "MAIL_ZIP_PLUS"]
        .iter()
        .filter_map(|h| clean(row, h))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Map one raw state row into the canonical field vocabulary.
///
/// `registration_number` comes from the reader's grouping key, which has
/// already been validated numeric.
pub fn normalize_state_row(registration_number: i64, row: &RawRow) -> CanonicalCandidate {
    let county = clean(row, "COUNTY_CODE")
        .and_then(|code| county_name(&code).map(str::to_string))
        // an unrecognized code is carried through verbatim rather than dropped
        .or_else(|| clean(row, "COUNTY_CODE"))
        .unwrap_or_default();

    CanonicalCandidate {
        registration_number,
        county,
        last_name: clean(row, "LAST_NAME").unwrap_or_default(),
        first_name: clean(row, "FIRST_NAME").unwrap_or_default(),
        middle_name: clean(row, "MIDDLE_NAME"),
        name_suffix: clean(row, "NAME_SUFFIX"),
        date_of_birth: parse_date(clean(row, "DATE_OF_BIRTH")),
        political_party: Party::from_extract(clean(row, "POLITICAL_PARTY").as_deref().unwrap_or("")),
        resident_address: clean(row, "RESIDENTIAL_ADDRESS_LINE_1").unwrap_or_default(),
        resident_city: clean(row, "RESIDENTIAL_CITY"),
        resident_zip: clean(row, "RESIDENTIAL_ZIP"),
        mailing_address: mailing_address(row),
        request_date: parse_date(clean(row, "REQUEST_DATE")),
        receive_date: parse_date(clean(row, "RECEIVED_DATE")),
        absentee_issue_method: clean(row, "ABSENTEE_ISSUE_METHOD"),
        absentee_receive_method: clean(row, "ABSENTEE_RECEIVE_METHOD"),
        // free text counts as a rejection only with the affidavit marker
        ballot_status: clean(row, "BALLOT_STATUS").and_then(|s| BallotStatus::classify(&s)),
        is_void: row.get("IS_VOID").map(str::trim) == Some("1"),
    }
}
