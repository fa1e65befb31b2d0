use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum ProtmapError {
    String(String),
    Io(std::io::Error),
    Serde(serde_json::Error),
    Csv(csv::Error),
    Http(reqwest::Error),
    /// A `source_kind` outside the enumerated set was asked to fetch.
    UnsupportedSourceKind(String),
    /// Snapshot written by a schema this reader cannot interpret.
    SchemaMismatch { found: u32, expected: u32 },
    NotFound(String),
}

impl Error for ProtmapError {}

impl fmt::Display for ProtmapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtmapError::String(message) => write!(f, "{message}"),
            ProtmapError::Io(e) => write!(f, "I/O error: {e}"),
            ProtmapError::Serde(e) => write!(f, "Serialization error: {e}"),
            ProtmapError::Csv(e) => write!(f, "Correspondence feed error: {e}"),
            ProtmapError::Http(e) => write!(f, "Transport error: {e}"),
            ProtmapError::UnsupportedSourceKind(kind) => {
                write!(f, "Unsupported structure source kind '{kind}'")
            }
            ProtmapError::SchemaMismatch { found, expected } => {
                write!(
                    f,
                    "Snapshot schema version {found} does not match expected version {expected}"
                )
            }
            ProtmapError::NotFound(what) => write!(f, "{what} not found"),
        }
    }
}

impl From<String> for ProtmapError {
    fn from(err: String) -> Self {
        ProtmapError::String(err)
    }
}

impl From<std::io::Error> for ProtmapError {
    fn from(err: std::io::Error) -> Self {
        ProtmapError::Io(err)
    }
}

impl From<serde_json::Error> for ProtmapError {
    fn from(err: serde_json::Error) -> Self {
        ProtmapError::Serde(err)
    }
}

impl From<csv::Error> for ProtmapError {
    fn from(err: csv::Error) -> Self {
        ProtmapError::Csv(err)
    }
}

impl From<reqwest::Error> for ProtmapError {
    fn from(err: reqwest::Error) -> Self {
        ProtmapError::Http(err)
    }
}
