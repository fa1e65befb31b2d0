//! The persisted protein aggregate: sequence, annotations, structures.

use crate::correspondence::CorrespondenceSource;
use crate::error::ProtmapError;
use crate::settings::Settings;
use crate::structure_record::{SourceKind, StructureRecord};
use crate::task::BackgroundTask;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Bumped whenever the snapshot layout changes; see `migrate_snapshot`.
pub const SCHEMA_VERSION: u32 = 1;

fn now_unix_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Sequence annotation span in reference coordinates (1-indexed, inclusive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub x: i64,
    pub y: i64,
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Organism {
    pub common: String,
    pub scientific: String,
    pub taxid: Option<u32>,
}

impl Default for Organism {
    fn default() -> Self {
        Self {
            common: "NA".to_string(),
            scientific: "NA".to_string(),
            taxid: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Disease {
    pub id: String,
    pub name: String,
    pub description: String,
    pub mim: String,
}

/// One population variant, as delivered by the external ingestion layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variant {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub impact: String,
    pub description: String,
    pub homozygous: Option<u32>,
}

/// Constraint classification derived from the population-genetics scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExacType {
    Dominant,
    Recessive,
    None,
    Unknown,
}

/// A protein keyed by reference-sequence accession: canonical sequence,
/// annotations, structural models and an audit log, persisted as one
/// versioned snapshot.
///
/// A single instance is not designed for concurrent mutation from multiple
/// threads; background tasks hand their results back as patches applied on
/// the caller's thread (see [`BackgroundTask`]).
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProteinRecord {
    pub gene_name: String,
    /// Reference-sequence accession; the persistence key.
    pub uniprot: String,
    pub uniprot_name: String,
    pub recommended_name: String,
    pub organism: Organism,
    /// Canonical amino-acid sequence; all coordinate math is 1-indexed
    /// against it, and its length bounds every structure span.
    pub sequence: String,
    pub accession_list: Vec<String>,
    pub ensg: String,
    pub enst: String,
    pub ensp: String,
    /// Dataset-quality flag, e.g. `Swiss-Prot` (reviewed) or `TrEMBL`.
    pub uniprot_dataset: String,
    /// Feature-type name to ordered feature spans.
    pub features: HashMap<String, Vec<Feature>>,
    pub diseases: Vec<Disease>,
    pub gnomad: Vec<Variant>,
    /// Population-genetics scores; -1 means unknown.
    pub pli: f64,
    pub prec: f64,
    pub pnull: f64,
    /// Experimentally deposited structures. A model lives either here or in
    /// `homology_models`, never both.
    pub structures: Vec<StructureRecord>,
    pub homology_models: Vec<StructureRecord>,
    pub percent_modelled: f64,
    /// Append-only, timestamped; audit trail for non-fatal events.
    pub event_log: Vec<String>,
    pub schema_version: u32,
    pub created_at_unix_ms: u128,
    #[serde(skip)]
    tasks: Vec<BackgroundTask>,
}

impl Default for ProteinRecord {
    fn default() -> Self {
        Self {
            gene_name: String::new(),
            uniprot: String::new(),
            uniprot_name: String::new(),
            recommended_name: String::new(),
            organism: Organism::default(),
            sequence: String::new(),
            accession_list: vec![],
            ensg: String::new(),
            enst: String::new(),
            ensp: String::new(),
            uniprot_dataset: String::new(),
            features: HashMap::new(),
            diseases: vec![],
            gnomad: vec![],
            pli: -1.0,
            prec: -1.0,
            pnull: -1.0,
            structures: vec![],
            homology_models: vec![],
            percent_modelled: -1.0,
            event_log: vec![],
            schema_version: SCHEMA_VERSION,
            created_at_unix_ms: now_unix_ms(),
            tasks: vec![],
        }
    }
}

impl ProteinRecord {
    pub fn new(gene_name: &str, uniprot: &str, taxid: Option<u32>) -> Self {
        let mut record = Self {
            gene_name: gene_name.to_string(),
            uniprot: uniprot.trim().to_string(),
            ..Default::default()
        };
        if taxid.is_some() {
            record.organism.taxid = taxid;
        }
        record
    }

    /// Sequence length; the upper bound for any structure span.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Append a timestamped line to the audit log.
    pub fn log(&mut self, message: impl Into<String>) {
        self.event_log
            .push(format!("[{}]\t{}", now_unix_ms(), message.into()));
    }

    pub fn exac_type(&self) -> ExacType {
        if self.pli < 0.0 {
            ExacType::Unknown
        } else if self.pli > self.prec.max(self.pnull) {
            ExacType::Dominant
        } else if self.prec > self.pli.max(self.pnull) {
            ExacType::Recessive
        } else if self.pnull > self.pli.max(self.prec) {
            ExacType::None
        } else {
            ExacType::Unknown
        }
    }

    pub fn add_feature(&mut self, feature_type: &str, feature: Feature) {
        self.features
            .entry(feature_type.to_string())
            .or_default()
            .push(feature);
    }

    /// Register a structural model. Homology models are kept apart from
    /// experimentally deposited entries; ownership is exclusive. A span
    /// beyond the sequence end is recorded as suspicious but kept as-is.
    pub fn add_structure(&mut self, structure: StructureRecord) {
        if !self.sequence.is_empty() && structure.y > self.sequence.len() as i64 {
            self.log(format!(
                "Structure {} spans to {} beyond sequence end {}",
                structure.id,
                structure.y,
                self.sequence.len()
            ));
        }
        match structure.source_kind {
            SourceKind::HomologyModel => self.homology_models.push(structure),
            _ => self.structures.push(structure),
        }
    }

    /// Resolve chain offsets for every registered structure, folding the
    /// diagnostics into the audit log.
    pub fn resolve_structure_offsets(
        &mut self,
        source: &dyn CorrespondenceSource,
    ) -> Result<(), ProtmapError> {
        let mut warnings = Vec::new();
        for structure in self
            .structures
            .iter_mut()
            .chain(self.homology_models.iter_mut())
        {
            warnings.extend(structure.resolve_offsets(source)?);
        }
        for warning in warnings {
            self.log(warning);
        }
        Ok(())
    }

    /// Track a background population task; it will be joined before any save.
    pub fn track_task(&mut self, task: BackgroundTask) {
        self.tasks.push(task);
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Join every tracked background task and apply its patch, then clear the
    /// tracking set. Returns only once all side effects are committed, which
    /// is why every persistence entry point calls it first.
    pub fn complete(&mut self) {
        let tasks = std::mem::take(&mut self.tasks);
        for task in tasks {
            match task.join() {
                Ok(patch) => patch(self),
                Err(message) => self.log(message),
            }
        }
    }

    pub fn save(&mut self, path: &Path) -> Result<(), ProtmapError> {
        self.complete();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        self.log(format!("Data saved to {} as JSON snapshot", path.display()));
        Ok(())
    }

    pub fn save_compressed(&mut self, path: &Path) -> Result<(), ProtmapError> {
        self.complete();
        let bytes = serde_json::to_vec(self)?;
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
        self.log(format!(
            "Data saved to {} as gzipped JSON snapshot",
            path.display()
        ));
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ProtmapError> {
        let text = fs::read_to_string(path).map_err(|e| missing_as_not_found(e, path))?;
        let mut record = Self::from_snapshot_json(&text)?;
        record.log(format!("Data loaded from {}", path.display()));
        Ok(record)
    }

    pub fn load_compressed(path: &Path) -> Result<Self, ProtmapError> {
        let file = File::open(path).map_err(|e| missing_as_not_found(e, path))?;
        let mut text = String::new();
        GzDecoder::new(file).read_to_string(&mut text)?;
        let mut record = Self::from_snapshot_json(&text)?;
        record.log(format!("Data loaded from {}", path.display()));
        Ok(record)
    }

    /// Restore the entire attribute set from one snapshot, refusing schema
    /// versions this reader does not understand.
    fn from_snapshot_json(text: &str) -> Result<Self, ProtmapError> {
        let mut snapshot: serde_json::Value = serde_json::from_str(text)?;
        let found = snapshot
            .get("schema_version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        if found > SCHEMA_VERSION {
            return Err(ProtmapError::SchemaMismatch {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        if found < SCHEMA_VERSION {
            migrate_snapshot(&mut snapshot, found)?;
        }
        Ok(serde_json::from_value(snapshot)?)
    }

    /// Canonical snapshot location:
    /// `<record_root>/taxid<ID>/<accession>.json`, directories created as
    /// needed. An unknown taxonomy id triggers the accession lookup — an
    /// explicit, logged slow path; supply the taxid up front to avoid it.
    pub fn locate_default_path(&mut self, settings: &Settings) -> Result<PathBuf, ProtmapError> {
        let taxid = match self.organism.taxid {
            Some(taxid) => taxid,
            None => {
                let message = format!(
                    "Taxonomy id unknown for {}, falling back to accession lookup",
                    self.uniprot
                );
                if settings.verbose {
                    println!("{message}");
                }
                self.log(message);
                let taxid = lookup_taxid(settings, &self.uniprot)?;
                self.organism.taxid = Some(taxid);
                taxid
            }
        };
        let dir = settings.record_root.join(format!("taxid{taxid}"));
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{}.json", self.uniprot)))
    }

    /// Save at the canonical location; compressed snapshots get the
    /// `.json.gz` extension. Returns the path written.
    pub fn save_default(
        &mut self,
        settings: &Settings,
        compressed: bool,
    ) -> Result<PathBuf, ProtmapError> {
        let path = self.locate_default_path(settings)?;
        if compressed {
            let path = path.with_extension("json.gz");
            self.save_compressed(&path)?;
            Ok(path)
        } else {
            self.save(&path)?;
            Ok(path)
        }
    }

    /// Probe the canonical locations for an existing snapshot, raw first,
    /// then compressed.
    pub fn load_default(
        settings: &Settings,
        uniprot: &str,
        taxid: Option<u32>,
    ) -> Result<Self, ProtmapError> {
        let mut probe = Self::new("", uniprot, taxid);
        let path = probe.locate_default_path(settings)?;
        if path.exists() {
            return Self::load(&path);
        }
        let compressed = path.with_extension("json.gz");
        if compressed.exists() {
            return Self::load_compressed(&compressed);
        }
        Err(ProtmapError::NotFound(format!(
            "Snapshot for '{uniprot}'"
        )))
    }
}

impl fmt::Display for ProteinRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.gene_name.is_empty() {
            write!(f, "{}", self.uniprot)
        } else {
            write!(f, "{}", self.gene_name)
        }
    }
}

fn missing_as_not_found(err: std::io::Error, path: &Path) -> ProtmapError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ProtmapError::NotFound(format!("Snapshot '{}'", path.display()))
    } else {
        ProtmapError::Io(err)
    }
}

/// Migration hook for snapshots written by older crate versions, keyed on the
/// stored schema version. No migrations are defined yet, so older snapshots
/// are refused rather than silently coerced.
fn migrate_snapshot(_snapshot: &mut serde_json::Value, found: u32) -> Result<(), ProtmapError> {
    // Future migrations dispatch on `found` here and rewrite the snapshot in
    // place before deserialization.
    Err(ProtmapError::SchemaMismatch {
        found,
        expected: SCHEMA_VERSION,
    })
}

fn lookup_taxid(settings: &Settings, accession: &str) -> Result<u32, ProtmapError> {
    let text = fs::read_to_string(&settings.taxonomy_lookup_path)
        .map_err(|e| missing_as_not_found(e, &settings.taxonomy_lookup_path))?;
    let table: HashMap<String, u32> = serde_json::from_str(&text)?;
    table
        .get(accession)
        .copied()
        .ok_or_else(|| ProtmapError::NotFound(format!("Taxonomy id for accession '{accession}'")))
}
