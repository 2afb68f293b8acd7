//! Append-only audit entries. One entry renders as one pipe-delimited line
//! in the per-extract log file and on the voter record's `logs` sequence.

// ---------------------------------------------------------------------------
// Operation kinds
// ---------------------------------------------------------------------------

/// Base operation of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpBase {
    Insert,
    Update,
    UpdateNew,
    RemoveRow,
    Remove,
}

impl OpBase {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::UpdateNew => "UPDATE NEW",
            Self::RemoveRow => "REMOVE ROW",
            Self::Remove => "REMOVE",
        }
    }
}

/// Full operation kind: base plus composable REJECT / VOID qualifiers.
/// `INSERT VOID`, `UPDATE NEW REJECT`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOp {
    pub base: OpBase,
    pub reject: bool,
    pub void: bool,
}

impl AuditOp {
    pub fn new(base: OpBase) -> Self {
        Self { base, reject: false, void: false }
    }

    pub fn reject(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn void(mut self) -> Self {
        self.void = true;
        self
    }
}

impl std::fmt::Display for AuditOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.base.as_str())?;
        if self.reject {
            f.write_str(" REJECT")?;
        }
        if self.void {
            f.write_str(" VOID")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One immutable audit line. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Extract label, e.g. `SoS-10-26.csv` or `Polk-10-26.csv`.
    pub source_file: String,
    /// Optional context, e.g. `Ballot Count: 2`.
    pub context: Option<String>,
    pub op: AuditOp,
    /// Display name of the changed field, for field-level entries.
    pub field: Option<String>,
    /// `old => new` rendering for field-level entries.
    pub change: Option<(String, String)>,
    /// Trailing free-text note, e.g. `new ballot(s) added`.
    pub note: Option<String>,
}

impl AuditEntry {
    pub fn op(source_file: &str, context: Option<String>, op: AuditOp) -> Self {
        Self {
            source_file: source_file.to_string(),
            context,
            op,
            field: None,
            change: None,
            note: None,
        }
    }

    pub fn field_change(
        source_file: &str,
        context: Option<String>,
        op: AuditOp,
        field: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Self {
        Self {
            source_file: source_file.to_string(),
            context,
            op,
            field: Some(field.to_string()),
            change: Some((
                old.map_or_else(|| "None".to_string(), str::to_string),
                new.map_or_else(|| "None".to_string(), str::to_string),
            )),
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    /// Pipe-delimited rendering, the wire format of the audit sink.
    pub fn render(&self) -> String {
        let mut parts = vec![self.source_file.clone()];
        if let Some(ref ctx) = self.context {
            parts.push(ctx.clone());
        }
        parts.push(self.op.to_string());
        if let Some(ref field) = self.field {
            parts.push(field.clone());
        }
        if let Some((ref old, ref new)) = self.change {
            parts.push(format!("{old} => {new}"));
        }
        if let Some(ref note) = self.note {
            parts.push(note.clone());
        }
        parts.join(" | ")
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Append-only destination for rendered audit entries. Backed by a
/// per-extract log file in production and a vector in tests. Shared across
/// ingest workers, hence `Send + Sync`.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry);
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: std::sync::Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemorySink {
    fn append(&self, entry: &AuditEntry) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(entry.render());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_rendering_composes_qualifiers() {
        assert_eq!(AuditOp::new(OpBase::Insert).to_string(), "INSERT");
        assert_eq!(AuditOp::new(OpBase::Insert).void().to_string(), "INSERT VOID");
        assert_eq!(
            AuditOp::new(OpBase::Insert).reject().void().to_string(),
            "INSERT REJECT VOID"
        );
        assert_eq!(AuditOp::new(OpBase::UpdateNew).reject().to_string(), "UPDATE NEW REJECT");
        assert_eq!(AuditOp::new(OpBase::RemoveRow).to_string(), "REMOVE ROW");
    }

    #[test]
    fn entry_rendering() {
        let entry = AuditEntry::op(
            "SoS-10-26.csv",
            Some("Ballot Count: 2".into()),
            AuditOp::new(OpBase::Insert).void(),
        );
        assert_eq!(entry.render(), "SoS-10-26.csv | Ballot Count: 2 | INSERT VOID");

        let entry = AuditEntry::field_change(
            "SoS-10-27.csv",
            Some("Ballot Count: 1".into()),
            AuditOp::new(OpBase::Update).reject(),
            "Ballot Status",
            None,
            Some("Deficient Affidavit/Incomplete"),
        );
        assert_eq!(
            entry.render(),
            "SoS-10-27.csv | Ballot Count: 1 | UPDATE REJECT | Ballot Status | None => Deficient Affidavit/Incomplete"
        );

        let entry = AuditEntry::op(
            "SoS-10-27.csv",
            Some("Ballot Count: 2".into()),
            AuditOp::new(OpBase::Update).void(),
        )
        .with_note("new ballot(s) added");
        assert_eq!(
            entry.render(),
            "SoS-10-27.csv | Ballot Count: 2 | UPDATE VOID | new ballot(s) added"
        );
    }
}
