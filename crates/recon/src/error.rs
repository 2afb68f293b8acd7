use std::fmt;

use chrono::NaiveDate;

use crate::store::StoreError;

#[derive(Debug)]
pub enum ReconError {
    /// Storage read/write failure.
    Store(StoreError),
    /// A voter's stored representative was void but the new snapshot shows
    /// active rows without any newly added rows. A voter cannot lose void
    /// status without a corresponding new ballot; fatal for that voter only.
    VoidStatusLost { registration_number: i64 },
    /// The extract is older than the store's last-ingested watermark for its
    /// source. The diff engine is not order-commutative, so replaying an
    /// older extract would corrupt derived state.
    StaleExtract {
        source: String,
        label: NaiveDate,
        watermark: NaiveDate,
    },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::VoidStatusLost { registration_number } => {
                write!(f, "voter {registration_number} lost void status without adding a row")
            }
            Self::StaleExtract { source, label, watermark } => {
                write!(
                    f,
                    "extract {source} {label} is older than the last ingested label {watermark}"
                )
            }
        }
    }
}

impl std::error::Error for ReconError {}

impl From<StoreError> for ReconError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
