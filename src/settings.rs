use crate::error::ProtmapError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_RECORD_ROOT: &str = "data/records";
pub const DEFAULT_CORRESPONDENCE_PATH: &str = "data/resources/pdb_chain_uniprot.tsv";
pub const DEFAULT_RESOLUTION_PATH: &str = "data/resources/resolution.json";
pub const DEFAULT_TAXONOMY_LOOKUP_PATH: &str = "data/resources/uniprot2taxid.json";
pub const DEFAULT_ARCHIVE_URL_TEMPLATE: &str = "https://files.rcsb.org/download/{code}.pdb";

/// Process configuration, constructed once at startup and passed by reference
/// into everything that needs paths or the archive endpoint. There is no
/// implicit global instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for persisted protein record snapshots.
    pub record_root: PathBuf,
    /// Tab-separated numbering-correspondence feed.
    pub correspondence_path: PathBuf,
    /// JSON resolution metadata feed.
    pub resolution_path: PathBuf,
    /// Accession-to-taxid lookup used only by the slow fallback path.
    pub taxonomy_lookup_path: PathBuf,
    /// Structure-archive endpoint; `{code}` is replaced by the structure id.
    pub archive_url_template: String,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            record_root: PathBuf::from(DEFAULT_RECORD_ROOT),
            correspondence_path: PathBuf::from(DEFAULT_CORRESPONDENCE_PATH),
            resolution_path: PathBuf::from(DEFAULT_RESOLUTION_PATH),
            taxonomy_lookup_path: PathBuf::from(DEFAULT_TAXONOMY_LOOKUP_PATH),
            archive_url_template: DEFAULT_ARCHIVE_URL_TEMPLATE.to_string(),
            verbose: false,
        }
    }
}

impl Settings {
    pub fn from_json_file(path: &str) -> Result<Self, ProtmapError> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Could not read settings '{path}': {e}"))?;
        let settings: Settings = serde_json::from_str(&text)
            .map_err(|e| format!("Could not parse settings '{path}': {e}"))?;
        Ok(settings)
    }

    pub fn archive_url(&self, code: &str) -> String {
        self.archive_url_template.replace("{code}", code)
    }
}
