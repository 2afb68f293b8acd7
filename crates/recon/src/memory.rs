//! In-memory store, the reference implementation of [`VoterStore`]. Used by
//! the engine's own tests; the production SQLite store lives in
//! `absentia-store` and must behave identically.
//!
//! Cloning yields another handle onto the same backing data, the way two
//! SQLite connections share one database file, so a worker-per-handle
//! pipeline test exercises the same shape as production.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use absentia_core::{IdentityMapping, RejectReason, VoterRecord};

use crate::store::{CountyRejection, RejectionUpdate, StoreError, VoterStore};

#[derive(Debug, Default)]
struct Inner {
    voters: BTreeMap<i64, VoterRecord>,
    mappings: Vec<IdentityMapping>,
    watermarks: HashMap<String, NaiveDate>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.voters.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mappings(&self) -> Vec<IdentityMapping> {
        self.inner.lock().map(|i| i.mappings.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError("memory store lock poisoned".into()))
    }
}

fn voter_mut(inner: &mut Inner, reg: i64) -> Result<&mut VoterRecord, StoreError> {
    inner
        .voters
        .get_mut(&reg)
        .ok_or_else(|| StoreError(format!("no voter {reg}")))
}

impl VoterStore for MemoryStore {
    fn get(&self, registration_number: i64) -> Result<Option<VoterRecord>, StoreError> {
        Ok(self.lock()?.voters.get(&registration_number).cloned())
    }

    fn insert(&mut self, record: &VoterRecord) -> Result<(), StoreError> {
        self.lock()?
            .voters
            .insert(record.registration_number, record.clone());
        Ok(())
    }

    fn update_extract_fields(&mut self, record: &VoterRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let stored = voter_mut(&mut inner, record.registration_number)?;
        let mut updated = record.clone();
        // bookkeeping stays owned by the targeted setters
        updated.reject_date = stored.reject_date;
        updated.cure_date = stored.cure_date;
        updated.number_of_rejections = stored.number_of_rejections;
        updated.was_ever_rejected = stored.was_ever_rejected;
        updated.currently_rejected = stored.currently_rejected;
        updated.reject_reason = stored.reject_reason;
        updated.number_of_rows = stored.number_of_rows;
        updated.has_voided_ballot = stored.has_voided_ballot;
        updated.was_removed = stored.was_removed;
        *stored = updated;
        Ok(())
    }

    fn set_number_of_rows(&mut self, reg: i64, n: u32) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        voter_mut(&mut inner, reg)?.number_of_rows = n;
        Ok(())
    }

    fn set_has_voided_ballot(&mut self, reg: i64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        voter_mut(&mut inner, reg)?.has_voided_ballot = true;
        Ok(())
    }

    fn clear_was_removed(&mut self, reg: i64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        voter_mut(&mut inner, reg)?.was_removed = false;
        Ok(())
    }

    fn mark_removed(&mut self, reg: i64, log_line: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let voter = voter_mut(&mut inner, reg)?;
        voter.was_removed = true;
        voter.logs.push(log_line.to_string());
        Ok(())
    }

    fn set_rejection(&mut self, reg: i64, update: &RejectionUpdate) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let voter = voter_mut(&mut inner, reg)?;
        voter.reject_date = Some(update.reject_date);
        voter.number_of_rejections = update.number_of_rejections;
        voter.was_ever_rejected = true;
        voter.currently_rejected = update.currently_rejected;
        voter.reject_reason = update.reject_reason;
        voter.cure_date = None;
        Ok(())
    }

    fn set_reject_reason(&mut self, reg: i64, reason: RejectReason) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        voter_mut(&mut inner, reg)?.reject_reason = Some(reason);
        Ok(())
    }

    fn set_currently_rejected(&mut self, reg: i64, value: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        voter_mut(&mut inner, reg)?.currently_rejected = value;
        Ok(())
    }

    fn set_cured(&mut self, reg: i64, cure_date: NaiveDate) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let voter = voter_mut(&mut inner, reg)?;
        voter.cure_date = Some(cure_date);
        voter.currently_rejected = false;
        Ok(())
    }

    fn apply_county_rejection(
        &mut self,
        reg: i64,
        rejection: &CountyRejection,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let voter = voter_mut(&mut inner, reg)?;
        voter.reject_date = Some(rejection.reject_date);
        voter.cure_date = None;
        voter.number_of_rejections = rejection.number_of_rejections;
        voter.was_ever_rejected = true;
        voter.currently_rejected = true;
        voter.reject_reason = Some(rejection.reject_reason);
        voter.ballot_status = Some(rejection.ballot_status);
        if rejection.default_receive_method_mail && voter.absentee_receive_method.is_none() {
            voter.absentee_receive_method = Some("Mail".to_string());
        }
        voter.logs.push(rejection.log_line.clone());
        Ok(())
    }

    fn apply_county_cure(
        &mut self,
        reg: i64,
        cure_date: NaiveDate,
        log_line: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let voter = voter_mut(&mut inner, reg)?;
        voter.cure_date = Some(cure_date);
        voter.currently_rejected = false;
        voter.ballot_status = None;
        voter.logs.push(log_line.to_string());
        Ok(())
    }

    fn removal_scan(&self) -> Result<Vec<(i64, bool)>, StoreError> {
        Ok(self
            .lock()?
            .voters
            .values()
            .map(|v| (v.registration_number, v.was_removed))
            .collect())
    }

    fn rejected_ids_for_county(&self, county: &str) -> Result<Vec<i64>, StoreError> {
        Ok(self
            .lock()?
            .voters
            .values()
            .filter(|v| v.county == county && v.ballot_status.is_some())
            .map(|v| v.registration_number)
            .collect())
    }

    fn find_candidates(
        &self,
        last_name: &str,
        first_name: &str,
        county: &str,
    ) -> Result<Vec<VoterRecord>, StoreError> {
        Ok(self
            .lock()?
            .voters
            .values()
            .filter(|v| {
                v.last_name == last_name && v.first_name == first_name && v.county == county
            })
            .cloned()
            .collect())
    }

    fn lookup_identity_by_address(
        &self,
        last_name: &str,
        first_name: &str,
        address_prefix: &str,
    ) -> Result<Option<i64>, StoreError> {
        Ok(self
            .lock()?
            .mappings
            .iter()
            .find(|m| {
                m.last_name == last_name
                    && m.first_name == first_name
                    && m.address_prefix.as_deref() == Some(address_prefix)
            })
            .map(|m| m.registration_number))
    }

    fn lookup_identity_by_name(
        &self,
        last_name: &str,
        first_name: &str,
        middle_name: Option<&str>,
    ) -> Result<Option<i64>, StoreError> {
        Ok(self
            .lock()?
            .mappings
            .iter()
            .find(|m| {
                m.last_name == last_name
                    && m.first_name == first_name
                    && m.middle_name.as_deref() == middle_name
            })
            .map(|m| m.registration_number))
    }

    fn record_identity_mapping(&mut self, mapping: &IdentityMapping) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        // append-only: an existing entry for the same identity wins
        let exists = inner.mappings.iter().any(|m| {
            m.last_name == mapping.last_name
                && m.first_name == mapping.first_name
                && m.middle_name == mapping.middle_name
                && m.address_prefix == mapping.address_prefix
        });
        if !exists {
            inner.mappings.push(mapping.clone());
        }
        Ok(())
    }

    fn watermark(&self, source: &str) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self.lock()?.watermarks.get(source).copied())
    }

    fn set_watermark(&mut self, source: &str, label: NaiveDate) -> Result<(), StoreError> {
        self.lock()?.watermarks.insert(source.to_string(), label);
        Ok(())
    }
}
