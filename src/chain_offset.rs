//! Chain selection and per-chain numbering shifts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One chain by letter, or every chain in the model. Serialized as the chain
/// letter, with `*` meaning "all chains".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChainSelector {
    #[default]
    All,
    Chain(char),
}

impl ChainSelector {
    pub fn matches(&self, chain: char) -> bool {
        match self {
            ChainSelector::All => true,
            ChainSelector::Chain(c) => *c == chain,
        }
    }
}

impl fmt::Display for ChainSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainSelector::All => write!(f, "*"),
            ChainSelector::Chain(c) => write!(f, "{c}"),
        }
    }
}

impl From<ChainSelector> for String {
    fn from(selector: ChainSelector) -> Self {
        selector.to_string()
    }
}

impl TryFrom<String> for ChainSelector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed == "*" {
            return Ok(ChainSelector::All);
        }
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(ChainSelector::Chain(c)),
            _ => Err(format!("Invalid chain selector '{value}'")),
        }
    }
}

/// Signed shift converting structure-native residue numbering to
/// reference-sequence numbering for one chain:
/// reference position = structure-native position + shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateOffset {
    pub chain: ChainSelector,
    pub shift: i64,
}

impl CoordinateOffset {
    pub fn new(chain: ChainSelector, shift: i64) -> Self {
        Self { chain, shift }
    }

    pub fn apply(&self, structure_position: i64) -> i64 {
        structure_position + self.shift
    }
}

/// The authoritative shift for a chain: a chain-specific entry wins, a
/// wildcard entry applies only when no chain-specific one exists.
pub fn shift_for(offsets: &[CoordinateOffset], chain: char) -> Option<i64> {
    offsets
        .iter()
        .find(|o| o.chain == ChainSelector::Chain(chain))
        .or_else(|| offsets.iter().find(|o| o.chain == ChainSelector::All))
        .map(|o| o.shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!(
            ChainSelector::try_from("*".to_string()),
            Ok(ChainSelector::All)
        );
        assert_eq!(
            ChainSelector::try_from("A".to_string()),
            Ok(ChainSelector::Chain('A'))
        );
        assert!(ChainSelector::try_from("AB".to_string()).is_err());
        assert!(ChainSelector::try_from("".to_string()).is_err());
    }

    #[test]
    fn test_selector_serde_wire_form() {
        let json = serde_json::to_string(&ChainSelector::All).unwrap();
        assert_eq!(json, r#""*""#);
        let back: ChainSelector = serde_json::from_str(r#""B""#).unwrap();
        assert_eq!(back, ChainSelector::Chain('B'));
    }

    #[test]
    fn test_apply() {
        let offset = CoordinateOffset::new(ChainSelector::Chain('A'), 10);
        assert_eq!(offset.apply(5), 15);
        let negative = CoordinateOffset::new(ChainSelector::Chain('B'), -3);
        assert_eq!(negative.apply(5), 2);
    }

    #[test]
    fn test_shift_for_prefers_specific_over_wildcard() {
        let offsets = vec![
            CoordinateOffset::new(ChainSelector::All, 7),
            CoordinateOffset::new(ChainSelector::Chain('A'), 5),
        ];
        assert_eq!(shift_for(&offsets, 'A'), Some(5));
        assert_eq!(shift_for(&offsets, 'B'), Some(7));
        let specific_only = vec![CoordinateOffset::new(ChainSelector::Chain('A'), 5)];
        assert_eq!(shift_for(&specific_only, 'C'), None);
    }
}
