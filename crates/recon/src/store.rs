//! Storage interface consumed by the engine.
//!
//! One implementation lives in `absentia-store` (SQLite); an in-memory
//! implementation for tests lives in [`crate::memory`]. Each ingest worker
//! owns its own store handle; the engine never shares one across threads.

use std::fmt;

use chrono::NaiveDate;

use absentia_core::{BallotStatus, IdentityMapping, RejectReason, VoterRecord};

#[derive(Debug)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

/// Rejection metadata written by the status updater when the state extract
/// shows new rejected rows. Also sets `was_ever_rejected` and clears
/// `cure_date` (a cure cannot coexist with a live rejection).
#[derive(Debug, Clone)]
pub struct RejectionUpdate {
    pub reject_date: NaiveDate,
    pub number_of_rejections: u32,
    pub currently_rejected: bool,
    pub reject_reason: Option<RejectReason>,
}

/// Rejection written from a county-authority list. Sets the ballot status
/// itself (counties are authoritative where the state data is not) and
/// appends the audit line.
#[derive(Debug, Clone)]
pub struct CountyRejection {
    pub reject_date: NaiveDate,
    pub ballot_status: BallotStatus,
    pub reject_reason: RejectReason,
    pub number_of_rejections: u32,
    /// Default the receive method to Mail when the state file never
    /// specified one.
    pub default_receive_method_mail: bool,
    pub log_line: String,
}

/// Canonical store read/write interface.
pub trait VoterStore {
    fn get(&self, registration_number: i64) -> Result<Option<VoterRecord>, StoreError>;

    fn insert(&mut self, record: &VoterRecord) -> Result<(), StoreError>;

    /// Full overwrite of the comparable extract fields plus the log
    /// sequence. Only called after the diff engine confirmed a change; every
    /// overwritten value is already audit-logged.
    fn update_extract_fields(&mut self, record: &VoterRecord) -> Result<(), StoreError>;

    fn set_number_of_rows(&mut self, registration_number: i64, n: u32) -> Result<(), StoreError>;

    fn set_has_voided_ballot(&mut self, registration_number: i64) -> Result<(), StoreError>;

    fn clear_was_removed(&mut self, registration_number: i64) -> Result<(), StoreError>;

    /// Flag a voter absent from the latest extract, appending the REMOVE
    /// audit line.
    fn mark_removed(&mut self, registration_number: i64, log_line: &str) -> Result<(), StoreError>;

    fn set_rejection(
        &mut self,
        registration_number: i64,
        update: &RejectionUpdate,
    ) -> Result<(), StoreError>;

    fn set_reject_reason(
        &mut self,
        registration_number: i64,
        reason: RejectReason,
    ) -> Result<(), StoreError>;

    fn set_currently_rejected(
        &mut self,
        registration_number: i64,
        value: bool,
    ) -> Result<(), StoreError>;

    /// State-extract cure: stamp the cure date and clear the current
    /// rejection flag.
    fn set_cured(&mut self, registration_number: i64, cure_date: NaiveDate)
        -> Result<(), StoreError>;

    fn apply_county_rejection(
        &mut self,
        registration_number: i64,
        rejection: &CountyRejection,
    ) -> Result<(), StoreError>;

    /// County cure: also clears the ballot status the county set earlier and
    /// appends the audit line.
    fn apply_county_cure(
        &mut self,
        registration_number: i64,
        cure_date: NaiveDate,
        log_line: &str,
    ) -> Result<(), StoreError>;

    /// `(registration_number, was_removed)` for every stored voter. Used
    /// only by the removal detector.
    fn removal_scan(&self) -> Result<Vec<(i64, bool)>, StoreError>;

    /// Registration numbers of this county's voters with a live ballot
    /// status. The county cure pass subtracts today's rejection list from
    /// this set.
    fn rejected_ids_for_county(&self, county: &str) -> Result<Vec<i64>, StoreError>;

    /// All voters matching (last, first, county), for identity resolution.
    fn find_candidates(
        &self,
        last_name: &str,
        first_name: &str,
        county: &str,
    ) -> Result<Vec<VoterRecord>, StoreError>;

    fn lookup_identity_by_address(
        &self,
        last_name: &str,
        first_name: &str,
        address_prefix: &str,
    ) -> Result<Option<i64>, StoreError>;

    fn lookup_identity_by_name(
        &self,
        last_name: &str,
        first_name: &str,
        middle_name: Option<&str>,
    ) -> Result<Option<i64>, StoreError>;

    /// Append-only; an existing mapping for the same identity is left
    /// untouched.
    fn record_identity_mapping(&mut self, mapping: &IdentityMapping) -> Result<(), StoreError>;

    fn watermark(&self, source: &str) -> Result<Option<NaiveDate>, StoreError>;

    fn set_watermark(&mut self, source: &str, label: NaiveDate) -> Result<(), StoreError>;
}
