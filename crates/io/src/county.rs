//! County rejection-list readers.
//!
//! Three variants, each with its own fixed schema. These files are small,
//! hand-produced lists of rejected ballots, so holes are fatal rather than
//! dropped: a malformed county file means someone exported the wrong thing.

use std::path::Path;

use absentia_core::{BallotStatus, CountyFormat, CountyRow};

use crate::error::ExtractError;
use crate::read::{clean_field, read_file_as_utf8};

const POLK_HEADERS: [&str; 9] = [
    "Last", "First", "Middle", "Address", "Zip", "State", "CITY", "Date", "situation",
];

const CERRO_GORDO_HEADERS: [&str; 9] = [
    "Last",
    "First",
    "Middle",
    "request #",
    "fax/email",
    "original rec'd",
    "situation",
    "Address",
    "City State Zip",
];

pub fn read_county_extract(
    path: &Path,
    format: CountyFormat,
) -> Result<Vec<CountyRow>, ExtractError> {
    let content = read_file_as_utf8(path)?;
    parse_county_extract(&content, &path.display().to_string(), format)
}

pub fn parse_county_extract(
    content: &str,
    file: &str,
    format: CountyFormat,
) -> Result<Vec<CountyRow>, ExtractError> {
    match format {
        CountyFormat::Polk => parse_name_list(content, file, &POLK_HEADERS, format),
        CountyFormat::CerroGordo => parse_name_list(content, file, &CERRO_GORDO_HEADERS, format),
        CountyFormat::DesMoines => parse_des_moines(content, file),
    }
}

fn parse_name_list(
    content: &str,
    file: &str,
    known_headers: &[&str],
    format: CountyFormat,
) -> Result<Vec<CountyRow>, ExtractError> {
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
        if !header.is_empty() && !known_headers.contains(&header.as_str()) {
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

    let last_idx = idx("Last")?;
    let first_idx = idx("First")?;
    let middle_idx = idx("Middle")?;
    let address_idx = idx("Address")?;
    let situation_idx = idx("situation")?;

    let mut rows = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;

        let get = |i: usize| record.get(i).and_then(clean_field);

        let last = get(last_idx);
        let first = get(first_idx);
        let (Some(last), Some(first)) = (last, first) else {
            return Err(ExtractError::MissingRequired {
                file: file.to_string(),
                row: line + 2,
            });
        };

        let row = match format {
            CountyFormat::Polk => CountyRow {
                last_name: last,
                first_name: first,
                // the Polk export's middle column is unreliable; discard it
                middle_name: None,
                address: get(address_idx),
                situation: BallotStatus::DeficientAffidavit,
                registration_number: None,
            },
            CountyFormat::CerroGordo => {
                // first column holds "FIRST MIDDLE"; names arrive mixed-case
                let mut names = first.split(' ');
                let first_name = names.next().unwrap_or_default().to_uppercase();
                let middle_name = names.next().map(str::to_uppercase);
                CountyRow {
                    last_name: last.to_uppercase(),
                    first_name,
                    middle_name: middle_name.or_else(|| get(middle_idx).map(|m| m.to_uppercase())),
                    address: get(address_idx),
                    situation: classify_situation(get(situation_idx).as_deref().unwrap_or("")),
                    registration_number: None,
                }
            }
            CountyFormat::DesMoines => unreachable!("handled by parse_des_moines"),
        };

        rows.push(row);
    }

    Ok(rows)
}

fn classify_situation(situation: &str) -> BallotStatus {
    let lower = situation.to_lowercase();
    if lower.contains("defective") || lower.contains("envelope") {
        BallotStatus::DefectiveAffidavit
    } else {
        BallotStatus::DeficientAffidavit
    }
}

/// Des Moines sends a bare list of registration numbers, one per line after
/// a header row. Any non-numeric value in the first column fails the file.
fn parse_des_moines(content: &str, file: &str) -> Result<Vec<CountyRow>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        let raw = record.get(0).unwrap_or("").trim();
        if raw.is_empty() {
            continue;
        }
        let registration_number: i64 =
            raw.parse().map_err(|_| ExtractError::NotRegistrationNumbers {
                file: file.to_string(),
                value: raw.to_string(),
            })?;
        rows.push(CountyRow {
            last_name: String::new(),
            first_name: String::new(),
            middle_name: None,
            address: None,
            situation: BallotStatus::DefectiveAffidavit,
            registration_number: Some(registration_number),
        });
    }

    Ok(rows)
}
