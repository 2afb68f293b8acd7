//! Identity resolution for county rows, which carry no stable voter key.
//!
//! Resolution order, each step short-circuiting on success: memoized
//! identity mapping, exact name+county lookup disambiguated by address
//! prefix, fuzzy address fallback, manual resolution. Fuzzy and manual
//! resolutions are persisted as identity mappings so the same case is never
//! re-queried or re-prompted in a later run.

use absentia_core::{CountyRow, IdentityMapping, VoterRecord};

use crate::error::ReconError;
use crate::similarity::Scorer;
use crate::store::VoterStore;

/// Fuzzy-match acceptance threshold on the 0–100 scale.
pub const FUZZY_THRESHOLD: u8 = 90;

/// Answer from the manual resolution channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Registration(i64),
    Skip,
}

/// Synchronous manual-resolution channel, invoked only for ambiguous
/// identities. Backed by an interactive prompt in the CLI and by canned
/// answers in tests.
pub trait RegistrationPrompt {
    fn ask(&mut self, row: &CountyRow) -> PromptAnswer;
}

/// Pre-seeded answers, consumed in order. Runs out to `Skip`.
#[derive(Debug, Default)]
pub struct SeededPrompt {
    answers: std::collections::VecDeque<PromptAnswer>,
    pub asked: usize,
}

impl SeededPrompt {
    pub fn new(answers: Vec<PromptAnswer>) -> Self {
        Self { answers: answers.into(), asked: 0 }
    }
}

impl RegistrationPrompt for SeededPrompt {
    fn ask(&mut self, _row: &CountyRow) -> PromptAnswer {
        self.asked += 1;
        self.answers.pop_front().unwrap_or(PromptAnswer::Skip)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(VoterRecord),
    /// Zero or several candidates and the manual channel skipped. Logged,
    /// never fatal to the batch.
    Unresolved,
}

/// First two whitespace tokens of an address, lowercased. The stable part
/// of an address across the county and state spellings.
pub fn address_prefix(address: &str) -> String {
    address
        .to_lowercase()
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct IdentityResolver<'a> {
    scorer: &'a dyn Scorer,
    prompt: &'a mut dyn RegistrationPrompt,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(scorer: &'a dyn Scorer, prompt: &'a mut dyn RegistrationPrompt) -> Self {
        Self { scorer, prompt }
    }

    pub fn resolve<S: VoterStore>(
        &mut self,
        store: &mut S,
        row: &CountyRow,
        county: &str,
    ) -> Result<Resolution, ReconError> {
        // rows that carry the registration number bypass resolution entirely
        if let Some(reg) = row.registration_number {
            return match store.get(reg)? {
                Some(voter) => Ok(Resolution::Resolved(voter)),
                None => Ok(Resolution::Unresolved),
            };
        }

        let prefix = row.address.as_deref().map(address_prefix);

        // 1. memoized identity mapping
        let mapped = match prefix.as_deref() {
            Some(p) => store.lookup_identity_by_address(&row.last_name, &row.first_name, p)?,
            None => store.lookup_identity_by_name(
                &row.last_name,
                &row.first_name,
                row.middle_name.as_deref(),
            )?,
        };
        if let Some(reg) = mapped {
            if let Some(voter) = store.get(reg)? {
                return Ok(Resolution::Resolved(voter));
            }
        }

        // 2-3. exact candidates, disambiguated by prefix then fuzzy score
        let candidates = store.find_candidates(&row.last_name, &row.first_name, county)?;
        let (matches, via_fuzzy) = self.narrow(&candidates, row, prefix.as_deref());

        if matches.len() == 1 {
            let voter = matches[0].clone();
            if via_fuzzy {
                store.record_identity_mapping(&mapping_for(row, &prefix, voter.registration_number))?;
            }
            return Ok(Resolution::Resolved(voter));
        }

        // 4. manual resolution
        tracing::warn!(
            last_name = %row.last_name,
            first_name = %row.first_name,
            candidates = matches.len(),
            "ambiguous identity, escalating to manual resolution"
        );
        match self.prompt.ask(row) {
            PromptAnswer::Registration(reg) => {
                store.record_identity_mapping(&mapping_for(row, &prefix, reg))?;
                match store.get(reg)? {
                    Some(voter) => Ok(Resolution::Resolved(voter)),
                    None => Ok(Resolution::Unresolved),
                }
            }
            PromptAnswer::Skip => Ok(Resolution::Unresolved),
        }
    }

    /// Narrow (last, first, county) candidates to a match set. Returns the
    /// matches and whether the winning set came from the fuzzy fallback.
    fn narrow<'v>(
        &self,
        candidates: &'v [VoterRecord],
        row: &CountyRow,
        prefix: Option<&str>,
    ) -> (Vec<&'v VoterRecord>, bool) {
        let Some(prefix) = prefix else {
            // no address to disambiguate with; fall back to exact middle-name
            // equality
            let matches: Vec<&VoterRecord> = candidates
                .iter()
                .filter(|c| c.middle_name.as_deref() == row.middle_name.as_deref())
                .collect();
            return (matches, false);
        };

        let mut prefix_matches: Vec<&VoterRecord> = Vec::new();
        let mut fuzzy_matches: Vec<&VoterRecord> = Vec::new();
        let incoming = row.address.as_deref().unwrap_or_default().to_lowercase();

        for candidate in candidates {
            let resident_prefix = address_prefix(&candidate.resident_address);
            let mailing_prefix = candidate.mailing_address.as_deref().map(address_prefix);
            // the county file sometimes carries the mailing address instead
            if resident_prefix == prefix || mailing_prefix.as_deref() == Some(prefix) {
                prefix_matches.push(candidate);
                continue;
            }

            let resident = candidate.resident_address.to_lowercase();
            let mailing = candidate
                .mailing_address
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            if self.scorer.score(&resident, &incoming) >= FUZZY_THRESHOLD
                || (!mailing.is_empty() && self.scorer.score(&mailing, &incoming) >= FUZZY_THRESHOLD)
            {
                fuzzy_matches.push(candidate);
            }
        }

        if prefix_matches.len() == 1 {
            return (prefix_matches, false);
        }

        // Prefix equality alone could not single a voter out. Re-score the
        // prefix candidates too: the fuzzy threshold can separate "100 Main
        // St" from "100 Main Street Apt 2" where the two-token prefix cannot.
        let mut rescored: Vec<&VoterRecord> = Vec::new();
        for candidate in prefix_matches.iter().copied() {
            let resident = candidate.resident_address.to_lowercase();
            let mailing = candidate
                .mailing_address
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            if self.scorer.score(&resident, &incoming) >= FUZZY_THRESHOLD
                || (!mailing.is_empty() && self.scorer.score(&mailing, &incoming) >= FUZZY_THRESHOLD)
            {
                rescored.push(candidate);
            }
        }
        rescored.extend(fuzzy_matches);

        if rescored.len() == 1 {
            return (rescored, true);
        }
        if !prefix_matches.is_empty() {
            return (prefix_matches, false);
        }
        (rescored, true)
    }
}

fn mapping_for(row: &CountyRow, prefix: &Option<String>, reg: i64) -> IdentityMapping {
    IdentityMapping {
        last_name: row.last_name.clone(),
        first_name: row.first_name.clone(),
        middle_name: row.middle_name.clone(),
        address_prefix: prefix.clone(),
        registration_number: reg,
    }
}
