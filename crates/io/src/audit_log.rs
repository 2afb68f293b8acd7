//! Per-extract audit log file. One file per extract-and-day label,
//! append-only, pipe-delimited lines.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use absentia_core::{AuditEntry, AuditSink};

use crate::error::ExtractError;

pub struct AuditFile {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl AuditFile {
    /// Open (or create) the audit log for one extract label, e.g.
    /// `<log_dir>/SoS-10-26.log`.
    pub fn open(log_dir: &Path, source_label: &str) -> Result<Self, ExtractError> {
        std::fs::create_dir_all(log_dir).map_err(|e| ExtractError::Io(e.to_string()))?;
        let path = log_dir.join(format!("{source_label}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ExtractError::Io(e.to_string()))?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<(), ExtractError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ExtractError::Io("audit log lock poisoned".into()))?;
        writer.flush().map_err(|e| ExtractError::Io(e.to_string()))
    }
}

impl AuditSink for AuditFile {
    fn append(&self, entry: &AuditEntry) {
        // a failed audit write must not abort the voter being processed
        match self.writer.lock() {
            Ok(mut writer) => {
                if let Err(e) = writeln!(writer, "{}", entry.render()) {
                    tracing::error!(error = %e, path = %self.path.display(), "audit write failed");
                }
            }
            Err(_) => {
                tracing::error!(path = %self.path.display(), "audit log lock poisoned");
            }
        }
    }
}

impl Drop for AuditFile {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use absentia_core::{AuditOp, OpBase};

    #[test]
    fn appends_rendered_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditFile::open(dir.path(), "SoS-10-26").unwrap();
        log.append(&AuditEntry::op(
            "SoS-10-26.csv",
            Some("Ballot Count: 1".into()),
            AuditOp::new(OpBase::Insert),
        ));
        log.flush().unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "SoS-10-26.csv | Ballot Count: 1 | INSERT\n");
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let log = AuditFile::open(dir.path(), "SoS-10-26").unwrap();
            log.append(&AuditEntry::op("SoS-10-26.csv", None, AuditOp::new(OpBase::Remove)));
        }
        let content = std::fs::read_to_string(dir.path().join("SoS-10-26.log")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
