//! Leaf and sub-leaf extraction from CPUID field-name cells.
//!
//! Specification tables introduce a leaf group with a header row such as
//! `Leaf 0x7, Sub-Leaf 0x1` or `Leaf 0x4, Sub-Leaves 0x0-0x3`, then list the
//! group's bit-fields on the following rows without repeating the leaf.

use std::sync::LazyLock;

use compliance_model::parse_hex;
use regex::Regex;
use thiserror::Error;

/// Sub-leaf used when a leaf has none.
pub const DEFAULT_SUBLEAF: &str = "0x0";

/// Most sub-leaves a single range header may expand to.
pub const MAX_SUBLEAF_SPAN: u64 = 0x100;

static LEAF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w-])Leaf (\w+)").expect("leaf pattern"));
static SUBLEAF_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Sub-Leaves (\w+)-(\w+)").expect("sub-leaf range pattern"));
static SUBLEAF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Sub-Leaf (\w+)").expect("sub-leaf pattern"));

/// A leaf and the sub-leaves its bit-fields apply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafGroup {
    /// Leaf token as written.
    pub leaf: String,
    /// Sub-leaf tokens, never empty.
    pub subleaves: Vec<String>,
}

impl LeafGroup {
    /// The sub-leaf a group marker is attributed to.
    #[must_use]
    pub fn first_subleaf(&self) -> &str {
        self.subleaves.first().map_or(DEFAULT_SUBLEAF, String::as_str)
    }
}

/// A leaf header that names a leaf but cannot be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeafParseError {
    /// A range bound is not hexadecimal.
    #[error("sub-leaf bound '{0}' is not hexadecimal")]
    InvalidBound(String),
    /// The range runs backwards.
    #[error("sub-leaf range {from}-{to} is inverted")]
    InvertedRange {
        /// Lower bound as written.
        from: String,
        /// Upper bound as written.
        to: String,
    },
    /// The range expands to more than [`MAX_SUBLEAF_SPAN`] sub-leaves.
    #[error("sub-leaf range {from}-{to} spans more than {max:#x} sub-leaves", max = MAX_SUBLEAF_SPAN)]
    RangeTooWide {
        /// Lower bound as written.
        from: String,
        /// Upper bound as written.
        to: String,
    },
}

/// Parses a field-name cell into a leaf group.
///
/// Returns `Ok(None)` when the text does not introduce a leaf; callers keep
/// the previous group in that case.
///
/// # Errors
///
/// Returns [`LeafParseError`] for a sub-leaf range that is not hex, runs
/// backwards or exceeds [`MAX_SUBLEAF_SPAN`].
pub fn parse_leaf(field_name: &str) -> Result<Option<LeafGroup>, LeafParseError> {
    let Some(leaf) = LEAF.captures(field_name).map(|c| c[1].to_string()) else {
        return Ok(None);
    };

    let subleaves = if let Some(range) = SUBLEAF_RANGE.captures(field_name) {
        expand_range(&range[1], &range[2])?
    } else if let Some(single) = SUBLEAF.captures(field_name) {
        match &single[1] {
            "N" => vec![DEFAULT_SUBLEAF.to_string()],
            token => vec![token.to_string()],
        }
    } else {
        vec![DEFAULT_SUBLEAF.to_string()]
    };

    Ok(Some(LeafGroup { leaf, subleaves }))
}

fn expand_range(from: &str, to: &str) -> Result<Vec<String>, LeafParseError> {
    let start = parse_hex(from).map_err(|_| LeafParseError::InvalidBound(from.to_string()))?;
    let end = parse_hex(to).map_err(|_| LeafParseError::InvalidBound(to.to_string()))?;
    if start > end {
        return Err(LeafParseError::InvertedRange {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    if end - start >= MAX_SUBLEAF_SPAN {
        return Err(LeafParseError::RangeTooWide {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok((start..=end).map(|v| format!("{v:#x}")).collect())
}
