//! `absentia-recon` — Absentee-ballot reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded, normalized voter groups and a
//! store handle, and produces canonical records plus audit entries. No file
//! or database IO dependencies; storage is behind [`store::VoterStore`].

pub mod county;
pub mod diff;
pub mod error;
pub mod identity;
pub mod memory;
pub mod pipeline;
pub mod removal;
pub mod report;
pub mod selector;
pub mod similarity;
pub mod status;
pub mod store;

pub use county::{ingest_county, CountySummary};
pub use diff::{reconcile_voter, IngestContext, VoterOutcome};
pub use error::ReconError;
pub use identity::{IdentityResolver, PromptAnswer, RegistrationPrompt, Resolution};
pub use memory::MemoryStore;
pub use pipeline::{check_watermark, ingest_state, CancelToken, IngestSummary};
pub use removal::run_removal_pass;
pub use report::{build_report, ExtractReport};
pub use selector::{select_ballots, Selection};
pub use similarity::{PartialRatio, Scorer};
pub use store::{StoreError, VoterStore};
