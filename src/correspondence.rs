//! Row-oriented numbering-correspondence and resolution-metadata feeds.
//!
//! The feeds themselves are produced elsewhere; this module only reads the
//! already-tokenized rows from disk or memory.

use crate::error::ProtmapError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// One row of the per-structure, per-chain numbering-correspondence feed.
///
/// Fields are kept as the raw string tokens the feed delivers: `pdb_beg` and
/// `pdb_end` may be the literal `None` token (no crystallised start residue
/// recorded) or carry an insertion-code suffix such as `27A`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceRow {
    #[serde(rename = "PDB")]
    pub pdb: String,
    #[serde(rename = "CHAIN")]
    pub chain: String,
    #[serde(rename = "SP_PRIMARY")]
    pub sp_primary: String,
    #[serde(rename = "RES_BEG")]
    pub res_beg: String,
    #[serde(rename = "RES_END")]
    pub res_end: String,
    #[serde(rename = "PDB_BEG")]
    pub pdb_beg: String,
    #[serde(rename = "PDB_END")]
    pub pdb_end: String,
    #[serde(rename = "SP_BEG")]
    pub sp_beg: String,
    #[serde(rename = "SP_END")]
    pub sp_end: String,
}

/// Supplies correspondence rows keyed by structure code.
pub trait CorrespondenceSource {
    /// Every row for one structure code, all chains, case-insensitive match.
    fn rows_for(&self, code: &str) -> Result<Vec<CorrespondenceRow>, ProtmapError>;
}

/// The standard tab-separated correspondence feed on disk: `#` comment lines,
/// then a header row
/// (`PDB CHAIN SP_PRIMARY RES_BEG RES_END PDB_BEG PDB_END SP_BEG SP_END`).
#[derive(Debug, Clone)]
pub struct TsvCorrespondence {
    path: PathBuf,
}

impl TsvCorrespondence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorrespondenceSource for TsvCorrespondence {
    fn rows_for(&self, code: &str) -> Result<Vec<CorrespondenceRow>, ProtmapError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: CorrespondenceRow = result?;
            if row.pdb.eq_ignore_ascii_case(code) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

/// In-memory correspondence source, for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorrespondence {
    rows: Vec<CorrespondenceRow>,
}

impl MemoryCorrespondence {
    pub fn new(rows: Vec<CorrespondenceRow>) -> Self {
        Self { rows }
    }
}

impl CorrespondenceSource for MemoryCorrespondence {
    fn rows_for(&self, code: &str) -> Result<Vec<CorrespondenceRow>, ProtmapError> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.pdb.eq_ignore_ascii_case(code))
            .cloned()
            .collect())
    }
}

/// One record of the resolution metadata feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionEntry {
    #[serde(rename = "IDCODE")]
    pub idcode: String,
    #[serde(rename = "RESOLUTION")]
    pub resolution: String,
}

/// Supplies the crystallographic resolution string for a structure code.
/// A blank string means "unknown".
pub trait ResolutionSource {
    fn resolution_for(&self, code: &str) -> Result<Option<String>, ProtmapError>;
}

/// JSON array of `{IDCODE, RESOLUTION}` records on disk.
#[derive(Debug, Clone)]
pub struct JsonResolutionFile {
    path: PathBuf,
}

impl JsonResolutionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResolutionSource for JsonResolutionFile {
    fn resolution_for(&self, code: &str) -> Result<Option<String>, ProtmapError> {
        let file = File::open(&self.path)?;
        let entries: Vec<ResolutionEntry> = serde_json::from_reader(BufReader::new(file))?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.idcode.eq_ignore_ascii_case(code))
            .map(|entry| entry.resolution))
    }
}

/// In-memory resolution source for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolution {
    entries: Vec<ResolutionEntry>,
}

impl MemoryResolution {
    pub fn new(entries: Vec<ResolutionEntry>) -> Self {
        Self { entries }
    }
}

impl ResolutionSource for MemoryResolution {
    fn resolution_for(&self, code: &str) -> Result<Option<String>, ProtmapError> {
        Ok(self
            .entries
            .iter()
            .find(|entry| entry.idcode.eq_ignore_ascii_case(code))
            .map(|entry| entry.resolution.clone()))
    }
}
