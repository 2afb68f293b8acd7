use std::fmt;

#[derive(Debug)]
pub enum ExtractError {
    /// IO error (file read, etc.).
    Io(String),
    /// CSV parse error.
    Csv(String),
    /// A column header outside the format's known set. Schema drift is
    /// unsafe to guess at, so the whole file is rejected.
    UnknownHeader { file: String, header: String },
    /// A header the format requires is absent.
    MissingColumn { file: String, column: String },
    /// A county row missing a required name field. County lists are small
    /// hand-built files; a hole there means the file is wrong.
    MissingRequired { file: String, row: usize },
    /// The Des Moines variant's key column held a non-numeric value.
    NotRegistrationNumbers { file: String, value: String },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::UnknownHeader { file, header } => {
                write!(f, "{file}: unexpected column header '{header}'")
            }
            Self::MissingColumn { file, column } => {
                write!(f, "{file}: missing required column '{column}'")
            }
            Self::MissingRequired { file, row } => {
                write!(f, "{file}: row {row} is missing a required name field")
            }
            Self::NotRegistrationNumbers { file, value } => {
                write!(f, "{file}: first column was not registration numbers (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ExtractError {}
