//! Computes per-chain numbering shifts from correspondence rows.
//!
//! Numbering between a deposited structure and the reference sequence is
//! frequently inconsistent: missing start residues, per-chain offsets,
//! insertion-code suffixed numbering fields. The resolver produces one
//! self-consistent shift per chain and degrades gracefully when the feed is
//! incomplete or contradictory.

use crate::chain_offset::ChainSelector;
use crate::correspondence::CorrespondenceRow;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Feed token for "no crystallised start residue recorded".
const ABSENT_TOKEN: &str = "None";

lazy_static! {
    /// First signed integer embedded in a numbering token, e.g. `27A` -> 27.
    static ref LEADING_INT: Regex = Regex::new(r"(-?\d+)").unwrap();
}

/// Per-chain numbering correspondence, as resolved from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub chain: char,
    /// Reference-sequence accession this chain maps onto.
    pub reference_accession: String,
    /// Reference-sequence span covered by the chain, inclusive.
    pub x: i64,
    pub y: i64,
    /// Shift converting structure-native numbering to reference numbering.
    pub offset: i64,
    /// Human-readable reference span, e.g. `15-114`.
    pub range: String,
}

/// Outcome of one resolution pass. Pure data: resolving the same rows twice
/// yields the same value, with no duplicate definitions.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub chain_definitions: Vec<ChainDefinition>,
    pub offsets: HashMap<char, i64>,
    /// Shift of the specifically requested chain, if one was requested and found.
    pub primary_offset: Option<i64>,
    pub warnings: Vec<String>,
}

/// Shift for one row: `SP_BEG - effective structure start`.
///
/// The effective start is the leading integer of `PDB_BEG`, or `RES_BEG` when
/// no crystallised start was recorded. A present but digit-free `PDB_BEG`
/// yields `None` and the row is dropped without comment; the feed provider
/// semantics make it impossible to tell a typo from a genuinely unmappable
/// chain here.
fn row_shift(row: &CorrespondenceRow, warnings: &mut Vec<String>) -> Option<i64> {
    let sp_beg = match row.sp_beg.trim().parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            warnings.push(format!(
                "{} chain {}: unparseable SP_BEG '{}'",
                row.pdb, row.chain, row.sp_beg
            ));
            return None;
        }
    };
    let pdb_beg = row.pdb_beg.trim();
    let effective_start = if pdb_beg == ABSENT_TOKEN {
        let res_beg = match row.res_beg.trim().parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                warnings.push(format!(
                    "{} chain {}: unparseable RES_BEG '{}'",
                    row.pdb, row.chain, row.res_beg
                ));
                return None;
            }
        };
        if res_beg != 1 {
            // Unexpected but not fatal: assuming the model starts at the
            // first observed residue.
            warnings.push(format!(
                "{} chain {}: RES_BEG is {res_beg}, yet PDB_BEG has no crystallised start",
                row.pdb, row.chain
            ));
        }
        res_beg
    } else {
        let capture = LEADING_INT.captures(pdb_beg)?;
        capture[1].parse::<i64>().ok()?
    };
    Some(sp_beg - effective_start)
}

/// Compute a shift for every chain present in `rows`, plus the primary shift
/// for `selector` when it names a specific chain.
///
/// A requested chain missing from the feed is a warning, not an error; the
/// caller keeps whatever offset data it already had.
pub fn resolve(code: &str, rows: &[CorrespondenceRow], selector: ChainSelector) -> Resolution {
    let mut resolution = Resolution::default();
    for row in rows {
        let Some(chain) = row.chain.trim().chars().next() else {
            continue;
        };
        let Some(shift) = row_shift(row, &mut resolution.warnings) else {
            continue;
        };
        let sp_end = row.sp_end.trim().parse::<i64>().unwrap_or(0);
        let sp_beg = row.sp_beg.trim().parse::<i64>().unwrap_or(0);
        resolution.chain_definitions.push(ChainDefinition {
            chain,
            reference_accession: row.sp_primary.trim().to_string(),
            x: sp_beg,
            y: sp_end,
            offset: shift,
            range: format!("{}-{}", row.sp_beg.trim(), row.sp_end.trim()),
        });
        resolution.offsets.insert(chain, shift);
    }
    if let ChainSelector::Chain(wanted) = selector {
        match resolution
            .chain_definitions
            .iter()
            .find(|definition| definition.chain == wanted)
        {
            Some(definition) => resolution.primary_offset = Some(definition.offset),
            None => resolution.warnings.push(format!(
                "{code} chain {wanted} not found among correspondence rows"
            )),
        }
    }
    resolution
}
