//! State-extract snapshot reader.
//!
//! Parses one state file into per-voter groups of raw rows. Rows missing a
//! primary field or carrying a non-numeric voter ID are dropped and counted;
//! a header outside the known set fails the whole file.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::ExtractError;
use crate::read::read_file_as_utf8;

/// The state format's full header set. Anything else is schema drift and
/// rejects the file.
pub const STATE_HEADERS: [&str; 22] = [
    "VOTER_ID",
    "COUNTY_CODE",
    "LAST_NAME",
    "FIRST_NAME",
    "MIDDLE_NAME",
    "NAME_SUFFIX",
    "DATE_OF_BIRTH",
    "POLITICAL_PARTY",
    "RESIDENTIAL_ADDRESS_LINE_1",
    "RESIDENTIAL_CITY",
    "RESIDENTIAL_ZIP",
    "MAIL_ADDRESS",
    "MAIL_CITY",
    "MAIL_STATE",
    "MAIL_ZIP",
    "MAIL_ZIP_PLUS",
    "REQUEST_DATE",
    "RECEIVED_DATE",
    "ABSENTEE_ISSUE_METHOD",
    "ABSENTEE_RECEIVE_METHOD",
    "BALLOT_STATUS",
    "IS_VOID",
];

/// Headers a row must populate to be usable at all.
const PRIMARY_HEADERS: [&str; 3] = ["FIRST_NAME", "LAST_NAME", "RESIDENTIAL_ADDRESS_LINE_1"];

/// One parsed extract line, untouched by normalization. Ephemeral; consumed
/// during a single ingestion pass.
#[derive(Debug, Clone)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(String::as_str)
    }
}

/// Per-file read statistics, surfaced on the ingest summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub rows_read: usize,
    pub dropped_missing_fields: usize,
    pub dropped_bad_id: usize,
}

/// A state extract grouped by voter ID, in-file row order preserved within
/// each group.
#[derive(Debug)]
pub struct StateExtract {
    pub voters: BTreeMap<i64, Vec<RawRow>>,
    pub stats: ReadStats,
}

pub fn read_state_extract(path: &Path) -> Result<StateExtract, ExtractError> {
    let content = read_file_as_utf8(path)?;
    parse_state_extract(&content, &path.display().to_string())
}

pub fn parse_state_extract(content: &str, file: &str) -> Result<StateExtract, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    for header in &headers {
        if !header.is_empty() && !STATE_HEADERS.contains(&header.as_str()) {
            return Err(ExtractError::UnknownHeader {
                file: file.to_string(),
                header: header.clone(),
            });
        }
    }

    let idx = |name: &str| -> Result<usize, ExtractError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ExtractError::MissingColumn {
                file: file.to_string(),
                column: name.to_string(),
            })
    };

    let voter_id_idx = idx("VOTER_ID")?;
    let primary_idxs: Vec<usize> = PRIMARY_HEADERS
        .iter()
        .map(|h| idx(h))
        .collect::<Result<_, _>>()?;

    let mut voters: BTreeMap<i64, Vec<RawRow>> = BTreeMap::new();
    let mut stats = ReadStats::default();

    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        stats.rows_read += 1;

        if primary_idxs
            .iter()
            .any(|&i| record.get(i).map_or(true, |v| v.trim().is_empty()))
        {
            stats.dropped_missing_fields += 1;
            continue;
        }

        let raw_id = record.get(voter_id_idx).unwrap_or("").trim();
        let voter_id: i64 = match raw_id.parse() {
            Ok(id) => id,
            Err(_) => {
                stats.dropped_bad_id += 1;
                continue;
            }
        };

        let mut fields = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                fields.insert(header.clone(), value.to_string());
            }
        }

        voters.entry(voter_id).or_default().push(RawRow { fields });
    }

    tracing::debug!(
        file,
        rows = stats.rows_read,
        voters = voters.len(),
        dropped_missing = stats.dropped_missing_fields,
        dropped_bad_id = stats.dropped_bad_id,
        "state extract parsed"
    );

    Ok(StateExtract { voters, stats })
}
