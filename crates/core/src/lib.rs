//! `absentia-core` — Canonical data model for absentee-ballot reconciliation.
//!
//! Types only: voter records, normalized ballot candidates, county rejection
//! rows, audit entries. No IO dependencies.

pub mod audit;
pub mod counties;
pub mod model;

pub use audit::{AuditEntry, AuditOp, AuditSink, MemorySink, OpBase};
pub use counties::{county_name, CountyFormat};
pub use model::{
    BallotStatus, CanonicalCandidate, CountyRow, IdentityMapping, Party, RejectReason,
    VoterRecord,
};
