//! Reconciles residue numbering between deposited macromolecular structures
//! and a canonical reference sequence, and persists the resulting annotated
//! protein records as versioned snapshots.
//!
//! Numbering in a deposited structure rarely lines up with the reference
//! sequence: start residues go uncrystallised, chains carry distinct offsets,
//! numbering fields hold insertion codes or nothing at all. The
//! [`offset_resolver`] turns the raw correspondence feed into one
//! self-consistent shift per chain; [`structure_record::StructureRecord`]
//! caches those shifts alongside lazily fetched coordinates; and
//! [`protein_record::ProteinRecord`] owns the whole aggregate and its
//! save/restore cycle.

pub mod chain_offset;
pub mod correspondence;
pub mod error;
pub mod offset_resolver;
pub mod protein_record;
pub mod settings;
pub mod structure_record;
pub mod task;

pub use chain_offset::{ChainSelector, CoordinateOffset};
pub use correspondence::{CorrespondenceRow, CorrespondenceSource, ResolutionSource};
pub use error::ProtmapError;
pub use offset_resolver::{ChainDefinition, Resolution};
pub use protein_record::{Disease, ExacType, Feature, Organism, ProteinRecord, Variant, SCHEMA_VERSION};
pub use settings::Settings;
pub use structure_record::{CoordinateRenumberer, FetchOutcome, SourceKind, StructureRecord};
pub use task::{BackgroundTask, RecordPatch};
