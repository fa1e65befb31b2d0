//! One structural model mapped onto a span of the reference sequence.

use crate::chain_offset::ChainSelector;
use crate::correspondence::{CorrespondenceSource, ResolutionSource};
use crate::error::ProtmapError;
use crate::offset_resolver::{self, ChainDefinition};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::HashMap;
use std::fmt;
use std::fs;

/// Where a structural model's coordinates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    DepositedCrystal,
    HomologyModel,
    RemoteUrl,
    LocalFile,
    /// Catch-all for snapshots written by newer code. Loading succeeds;
    /// fetching fails explicitly.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let token = match self {
            SourceKind::DepositedCrystal => "deposited-crystal",
            SourceKind::HomologyModel => "homology-model",
            SourceKind::RemoteUrl => "remote-url",
            SourceKind::LocalFile => "local-file",
            SourceKind::Unknown => "unknown",
        };
        write!(f, "{token}")
    }
}

/// Outcome of a coordinate fetch. Soft failures (transport errors, missing
/// payloads) land in `warnings` so the caller may retry or audit them.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub payload: Option<String>,
    pub warnings: Vec<String>,
}

/// External collaborator that rewrites residue numbers in a raw coordinate
/// block into reference-sequence numbering, restricted to the selected chain.
/// Implemented by the geometry layer, not here.
pub trait CoordinateRenumberer {
    fn renumber(
        &self,
        raw: &str,
        chain_definitions: &[ChainDefinition],
        chain: ChainSelector,
    ) -> Result<String, ProtmapError>;
}

/// A crystallographic entry, homology model or externally hosted coordinate
/// file covering the reference span `[x, y]`.
///
/// Constructed with identifying data only; chain offsets and the coordinate
/// payload are populated on first demand and cached for the record's
/// lifetime. Not designed for concurrent first-population from multiple
/// threads; callers serialize mutating access.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureRecord {
    /// Accession or archive code.
    pub id: String,
    pub description: String,
    /// Reference-sequence span, inclusive, 1-indexed.
    pub x: i64,
    pub y: i64,
    pub source_kind: SourceKind,
    pub chain: ChainSelector,
    /// Primary shift for the selected chain.
    pub offset: i64,
    #[serde_as(as = "Vec<(_, _)>")]
    pub offsets: HashMap<char, i64>,
    pub chain_definitions: Vec<ChainDefinition>,
    /// Crystallographic resolution; 0 or negative means unknown/not applicable.
    pub resolution: f64,
    pub coordinate_payload: Option<String>,
    /// URL or path, used for remote-url, local-file and homology-model kinds.
    pub source_locator: String,
    /// Extension mapping for side-channel annotations. Permitted keys are up
    /// to the consumer; nothing in this crate reads it.
    pub extra: HashMap<String, serde_json::Value>,
}

impl StructureRecord {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        x: i64,
        y: i64,
        source_kind: SourceKind,
    ) -> Self {
        let (x, y) = if x <= y { (x, y) } else { (y, x) };
        Self {
            id: id.into(),
            description: description.into(),
            x,
            y,
            source_kind,
            ..Default::default()
        }
    }

    pub fn with_chain(mut self, chain: ChainSelector, offset: i64) -> Self {
        self.chain = chain;
        self.offset = offset;
        if let ChainSelector::Chain(c) = chain {
            self.offsets.insert(c, offset);
        }
        self
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.source_locator = locator.into();
        self
    }

    /// True iff `position` falls inside the reference span, bounds included.
    pub fn includes(&self, position: i64) -> bool {
        self.includes_offset(position, 0)
    }

    /// Span test for callers still working in a shifted local frame. `x` and
    /// `y` are already reference coordinates, so `offset` is normally zero.
    pub fn includes_offset(&self, position: i64, offset: i64) -> bool {
        position >= self.x + offset && position <= self.y + offset
    }

    pub fn is_resolved(&self) -> bool {
        !self.chain_definitions.is_empty()
    }

    /// Forget a previous resolution pass so the next access recomputes it.
    pub fn invalidate_resolution(&mut self) {
        self.chain_definitions.clear();
        self.offsets.clear();
    }

    /// Populate per-chain shifts from the numbering-correspondence feed.
    ///
    /// Only deposited crystal structures carry feed entries; for every other
    /// source kind this is a no-op. Already-resolved records are left alone,
    /// so repeated calls cannot accumulate duplicate chain definitions.
    /// Returns diagnostics for the caller's audit log.
    pub fn resolve_offsets(
        &mut self,
        source: &dyn CorrespondenceSource,
    ) -> Result<Vec<String>, ProtmapError> {
        if self.source_kind != SourceKind::DepositedCrystal || self.is_resolved() {
            return Ok(vec![]);
        }
        let rows = source.rows_for(&self.id)?;
        let resolution = offset_resolver::resolve(&self.id, &rows, self.chain);
        self.chain_definitions = resolution.chain_definitions;
        match resolution.primary_offset {
            Some(shift) => {
                self.offset = shift;
                self.offsets = resolution.offsets;
            }
            // A specifically requested chain was not found: keep whatever
            // offset data the record already carried.
            None if matches!(self.chain, ChainSelector::Chain(_)) => {}
            None => self.offsets = resolution.offsets,
        }
        Ok(resolution.warnings)
    }

    /// The shift for one chain, falling back to the primary offset when the
    /// record-wide selector covers it.
    pub fn shift_for(&self, chain: char) -> Option<i64> {
        self.offsets.get(&chain).copied().or_else(|| {
            if self.chain.matches(chain) {
                Some(self.offset)
            } else {
                None
            }
        })
    }

    /// Retrieve the raw coordinate text, dispatching strictly on `source_kind`.
    ///
    /// The payload is cached on success. Transport failures (unreachable
    /// source, non-success status) are soft: they are reported as warnings,
    /// nothing is cached, and the next call retries. An unrecognized kind
    /// fails explicitly.
    pub fn fetch_coordinates(&mut self, settings: &Settings) -> Result<FetchOutcome, ProtmapError> {
        let mut outcome = FetchOutcome::default();
        if let Some(payload) = &self.coordinate_payload {
            outcome.payload = Some(payload.clone());
            return Ok(outcome);
        }
        let url = match self.source_kind {
            SourceKind::DepositedCrystal => settings.archive_url(&self.id),
            SourceKind::HomologyModel | SourceKind::RemoteUrl => self.source_locator.clone(),
            SourceKind::LocalFile => {
                match fs::read_to_string(&self.source_locator) {
                    Ok(text) => {
                        self.coordinate_payload = Some(text.clone());
                        outcome.payload = Some(text);
                    }
                    Err(e) => outcome.warnings.push(format!(
                        "Could not read coordinates for {} from '{}': {e}",
                        self.id, self.source_locator
                    )),
                }
                return Ok(outcome);
            }
            SourceKind::Unknown => {
                return Err(ProtmapError::UnsupportedSourceKind(format!(
                    "{} (structure {})",
                    self.source_kind, self.id
                )));
            }
        };
        match reqwest::blocking::get(&url) {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.text() {
                        Ok(text) => {
                            self.coordinate_payload = Some(text.clone());
                            outcome.payload = Some(text);
                        }
                        Err(e) => outcome
                            .warnings
                            .push(format!("Model {} fetch from {url} failed: {e}", self.id)),
                    }
                } else {
                    outcome.warnings.push(format!(
                        "Model {} fetch from {url} failed with status {status}",
                        self.id
                    ));
                }
            }
            Err(e) => outcome
                .warnings
                .push(format!("Model {} fetch from {url} failed: {e}", self.id)),
        }
        Ok(outcome)
    }

    /// Fetch coordinates renumbered into reference-sequence coordinates,
    /// resolving chain offsets first if this record has none yet. Renumbering
    /// is delegated to the external collaborator; the aligned text replaces
    /// the cached payload.
    pub fn fetch_offset_aligned_coordinates(
        &mut self,
        settings: &Settings,
        source: &dyn CorrespondenceSource,
        renumberer: &dyn CoordinateRenumberer,
    ) -> Result<FetchOutcome, ProtmapError> {
        let mut warnings = self.resolve_offsets(source)?;
        let mut outcome = self.fetch_coordinates(settings)?;
        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;
        if let Some(raw) = &outcome.payload {
            let aligned = renumberer.renumber(raw, &self.chain_definitions, self.chain)?;
            self.coordinate_payload = Some(aligned.clone());
            outcome.payload = Some(aligned);
        }
        Ok(outcome)
    }

    /// Crystallographic resolution from the metadata feed. Crystal entries
    /// only; a blank or missing value is a warning and leaves the field at
    /// its "unknown" default.
    pub fn lookup_resolution(
        &mut self,
        source: &dyn ResolutionSource,
    ) -> Result<Vec<String>, ProtmapError> {
        if self.source_kind != SourceKind::DepositedCrystal {
            return Ok(vec![]);
        }
        let mut warnings = Vec::new();
        match source.resolution_for(&self.id)? {
            Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<f64>() {
                Ok(value) => self.resolution = value,
                Err(_) => warnings.push(format!(
                    "Unparseable resolution '{}' for {}",
                    raw.trim(),
                    self.id
                )),
            },
            _ => warnings.push(format!("No resolution info for {}", self.id)),
        }
        Ok(warnings)
    }

    /// Minimal description used by feature-viewer style consumers.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "description": self.description,
            "x": self.x,
            "y": self.y,
        })
    }
}

impl fmt::Display for StructureRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}-{}]", self.id, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correspondence::{
        CorrespondenceRow, MemoryCorrespondence, MemoryResolution, ResolutionEntry,
    };
    use std::io::Write;

    fn crystal(id: &str) -> StructureRecord {
        StructureRecord::new(id, "test model", 10, 20, SourceKind::DepositedCrystal)
    }

    fn row(chain: &str, pdb_beg: &str, sp_beg: &str) -> CorrespondenceRow {
        CorrespondenceRow {
            pdb: "1abc".to_string(),
            chain: chain.to_string(),
            sp_primary: "P12345".to_string(),
            res_beg: "1".to_string(),
            res_end: "100".to_string(),
            pdb_beg: pdb_beg.to_string(),
            pdb_end: "104".to_string(),
            sp_beg: sp_beg.to_string(),
            sp_end: "100".to_string(),
        }
    }

    #[test]
    fn test_includes_boundaries() {
        let record = crystal("1abc");
        assert!(!record.includes(9));
        assert!(record.includes(10));
        assert!(record.includes(15));
        assert!(record.includes(20));
        assert!(!record.includes(21));
    }

    #[test]
    fn test_includes_offset_shifts_the_span() {
        let record = crystal("1abc");
        assert!(record.includes_offset(12, 2));
        assert!(!record.includes_offset(11, 2));
        assert!(record.includes_offset(22, 2));
        assert!(!record.includes_offset(23, 2));
    }

    #[test]
    fn test_new_normalizes_inverted_span() {
        let record = StructureRecord::new("1abc", "", 20, 10, SourceKind::DepositedCrystal);
        assert_eq!((record.x, record.y), (10, 20));
    }

    #[test]
    fn test_resolve_offsets_two_chains_and_primary_selection() {
        let source = MemoryCorrespondence::new(vec![
            row("A", "10", "15"),
            row("B", "10", "7"),
        ]);
        let mut record = crystal("1abc").with_chain(ChainSelector::Chain('B'), 0);
        let warnings = record.resolve_offsets(&source).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(record.offsets.get(&'A'), Some(&5));
        assert_eq!(record.offsets.get(&'B'), Some(&-3));
        assert_eq!(record.offset, -3);
        assert_eq!(record.chain_definitions.len(), 2);
    }

    #[test]
    fn test_resolve_offsets_is_idempotent() {
        let source = MemoryCorrespondence::new(vec![row("A", "5", "15")]);
        let mut record = crystal("1abc");
        record.resolve_offsets(&source).unwrap();
        let first = record.clone();
        record.resolve_offsets(&source).unwrap();
        assert_eq!(record, first);
        assert_eq!(record.chain_definitions.len(), 1);
    }

    #[test]
    fn test_resolve_offsets_missing_chain_keeps_existing_data() {
        let source = MemoryCorrespondence::new(vec![row("A", "1", "1")]);
        let mut record = crystal("1abc").with_chain(ChainSelector::Chain('Z'), 4);
        let warnings = record.resolve_offsets(&source).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(record.offset, 4);
        assert_eq!(record.offsets.get(&'Z'), Some(&4));
        assert_eq!(record.offsets.get(&'A'), None);
    }

    #[test]
    fn test_resolve_offsets_noop_for_non_crystal_kinds() {
        let source = MemoryCorrespondence::new(vec![row("A", "1", "50")]);
        let mut record =
            StructureRecord::new("1abc", "model", 1, 100, SourceKind::HomologyModel);
        let warnings = record.resolve_offsets(&source).unwrap();
        assert!(warnings.is_empty());
        assert!(record.chain_definitions.is_empty());
        assert_eq!(record.offset, 0);
    }

    #[test]
    fn test_invalidate_resolution_allows_recompute() {
        let source = MemoryCorrespondence::new(vec![row("A", "5", "15")]);
        let mut record = crystal("1abc");
        record.resolve_offsets(&source).unwrap();
        assert!(record.is_resolved());
        record.invalidate_resolution();
        assert!(!record.is_resolved());
        let richer = MemoryCorrespondence::new(vec![row("A", "5", "15"), row("B", "1", "1")]);
        record.resolve_offsets(&richer).unwrap();
        assert_eq!(record.chain_definitions.len(), 2);
    }

    #[test]
    fn test_shift_for_falls_back_to_selector() {
        let record = crystal("1abc").with_chain(ChainSelector::Chain('A'), 6);
        assert_eq!(record.shift_for('A'), Some(6));
        assert_eq!(record.shift_for('B'), None);
        let wildcard = crystal("1abc").with_chain(ChainSelector::All, 2);
        assert_eq!(wildcard.shift_for('Q'), Some(2));
    }

    #[test]
    fn test_fetch_unknown_kind_fails_explicitly() {
        let mut record: StructureRecord =
            serde_json::from_str(r#"{"id":"9zzz","source_kind":"neural-guess"}"#).unwrap();
        assert_eq!(record.source_kind, SourceKind::Unknown);
        let err = record.fetch_coordinates(&Settings::default()).unwrap_err();
        assert!(matches!(err, ProtmapError::UnsupportedSourceKind(_)));
        assert!(record.coordinate_payload.is_none());
    }

    #[test]
    fn test_fetch_local_file_reads_and_caches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ATOM      1  N   MET A   1\n").unwrap();
        let mut record = StructureRecord::new("model01", "", 1, 10, SourceKind::LocalFile)
            .with_locator(file.path().to_string_lossy().to_string());
        let outcome = record.fetch_coordinates(&Settings::default()).unwrap();
        assert!(outcome.payload.unwrap().starts_with("ATOM"));
        assert!(record.coordinate_payload.is_some());
        // Second call is served from the cache even if the file vanishes.
        drop(file);
        let outcome = record.fetch_coordinates(&Settings::default()).unwrap();
        assert!(outcome.payload.is_some());
    }

    #[test]
    fn test_fetch_missing_local_file_is_soft() {
        let mut record = StructureRecord::new("model02", "", 1, 10, SourceKind::LocalFile)
            .with_locator("/nonexistent/coords.pdb");
        let outcome = record.fetch_coordinates(&Settings::default()).unwrap();
        assert!(outcome.payload.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(record.coordinate_payload.is_none());
    }

    #[test]
    fn test_offset_aligned_coordinates_resolves_then_renumbers() {
        struct FakeRenumberer;
        impl CoordinateRenumberer for FakeRenumberer {
            fn renumber(
                &self,
                raw: &str,
                chain_definitions: &[ChainDefinition],
                chain: ChainSelector,
            ) -> Result<String, ProtmapError> {
                Ok(format!(
                    "renumbered({} bytes, {} chains, {})",
                    raw.len(),
                    chain_definitions.len(),
                    chain
                ))
            }
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ATOM\n").unwrap();
        // Local-file record with a synthetic chain definition: resolution is a
        // no-op for this kind, so the definition must be supplied up front.
        let mut record = StructureRecord::new("model03", "", 1, 10, SourceKind::LocalFile)
            .with_locator(file.path().to_string_lossy().to_string());
        record.chain_definitions.push(ChainDefinition {
            chain: 'A',
            reference_accession: "P12345".to_string(),
            x: 1,
            y: 10,
            offset: 0,
            range: "1-10".to_string(),
        });
        let source = MemoryCorrespondence::default();
        let outcome = record
            .fetch_offset_aligned_coordinates(&Settings::default(), &source, &FakeRenumberer)
            .unwrap();
        let aligned = outcome.payload.unwrap();
        assert!(aligned.starts_with("renumbered(5 bytes, 1 chains"));
        assert_eq!(record.coordinate_payload.as_deref(), Some(aligned.as_str()));
    }

    #[test]
    fn test_lookup_resolution() {
        let source = MemoryResolution::new(vec![
            ResolutionEntry {
                idcode: "1ABC".to_string(),
                resolution: "2.1".to_string(),
            },
            ResolutionEntry {
                idcode: "2DEF".to_string(),
                resolution: "   ".to_string(),
            },
        ]);
        let mut record = crystal("1abc");
        assert!(record.lookup_resolution(&source).unwrap().is_empty());
        assert_eq!(record.resolution, 2.1);

        let mut blank = crystal("2def");
        let warnings = blank.lookup_resolution(&source).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(blank.resolution, 0.0);

        let mut model = StructureRecord::new("m1", "", 1, 5, SourceKind::HomologyModel);
        assert!(model.lookup_resolution(&source).unwrap().is_empty());
    }

    #[test]
    fn test_serde_round_trip_with_offsets_map() {
        let mut record = crystal("1abc").with_chain(ChainSelector::Chain('A'), 5);
        record.offsets.insert('B', -3);
        record
            .extra
            .insert("ligand".to_string(), serde_json::json!("HEM"));
        let json = serde_json::to_string(&record).unwrap();
        let back: StructureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
