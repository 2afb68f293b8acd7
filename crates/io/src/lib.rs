//! `absentia-io` — Extract file IO.
//!
//! Snapshot readers for the state extract and the three county variants,
//! the raw-to-canonical row normalizer, and the append-only audit log sink.

pub mod audit_log;
pub mod county;
pub mod error;
pub mod normalize;
pub mod read;
pub mod state;

pub use audit_log::AuditFile;
pub use error::ExtractError;
pub use state::{RawRow, ReadStats, StateExtract};
