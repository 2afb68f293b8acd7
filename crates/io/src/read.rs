use std::io::Read;
use std::path::Path;

use crate::error::ExtractError;

/// Read an extract file and convert to UTF-8 if needed. The daily files are
/// shockingly badly encoded; malformed bytes must never fail an ingest.
/// Any leading BOM is stripped upstream, but tolerate a stray one anyway.
pub fn read_file_as_utf8(path: &Path) -> Result<String, ExtractError> {
    let mut file = std::fs::File::open(path).map_err(|e| ExtractError::Io(e.to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| ExtractError::Io(e.to_string()))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(content.trim_start_matches('\u{feff}').to_string())
}

/// Strip leading/trailing whitespace and collapse internal runs to one
/// space. Empty or whitespace-only input becomes `None`.
pub fn clean_field(value: &str) -> Option<String> {
    let cleaned = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
