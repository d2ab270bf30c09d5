use crate::numeric::parse_hex;
use crate::outcome::{Direction, ExceptionOutcome};
use crate::register::CpuidRegister;

/// Separator between alternative values fused from several specification
/// sources. Reads as "either is acceptable" in the generated C.
pub const ALTERNATIVE_SEPARATOR: &str = " | ";

/// Field size of a group marker entry.
pub const MARKER_SIZE: i32 = -1;

/// One CPUID expectation, or a group marker when `size == -1`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuidEntry {
    /// Leaf token as written in the specification (`0x7`, `1`).
    pub leaf: String,
    /// Sub-leaf token (`0x0` when not applicable).
    pub subleaf: String,
    /// Output register; absent on group markers.
    pub register: Option<CpuidRegister>,
    /// Most significant bit of the field.
    pub msb: i32,
    /// Least significant bit of the field.
    pub lsb: i32,
    /// Field width in bits, or [`MARKER_SIZE`].
    pub size: i32,
    /// Field name, informational only.
    pub field_name: String,
    /// Expected value text, possibly several alternatives.
    pub expected_value: String,
    /// Specification version tag(s), e.g. `VER1_0 | VER1_5`.
    pub spec_version: String,
}

impl CpuidEntry {
    /// Builds the group marker that precedes the bit-fields of a leaf group.
    #[must_use]
    pub fn marker(leaf: &str, subleaf: &str, field_name: &str, spec_version: &str) -> Self {
        Self {
            leaf: leaf.to_string(),
            subleaf: subleaf.to_string(),
            register: None,
            msb: MARKER_SIZE,
            lsb: MARKER_SIZE,
            size: MARKER_SIZE,
            field_name: field_name.to_string(),
            expected_value: String::new(),
            spec_version: spec_version.to_string(),
        }
    }

    /// Whether this entry is a group marker rather than a bit definition.
    #[must_use]
    pub const fn is_marker(&self) -> bool {
        self.size == MARKER_SIZE
    }

    /// Leaf as an integer; tokens are read as hexadecimal.
    #[must_use]
    pub fn leaf_value(&self) -> Option<u64> {
        parse_hex(&self.leaf).ok()
    }

    /// Sub-leaf as an integer; tokens are read as hexadecimal.
    #[must_use]
    pub fn subleaf_value(&self) -> Option<u64> {
        parse_hex(&self.subleaf).ok()
    }
}

/// One MSR access expectation for a single direction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MsrEntry {
    /// Architectural MSR name.
    pub field_name: String,
    /// First MSR index, normalized hex (`0x10a`).
    pub first_bit: String,
    /// Number of MSRs covered, normalized hex (`0x1`).
    pub size: String,
    /// Expected outcome of the access.
    pub outcome: ExceptionOutcome,
    /// Access direction.
    pub direction: Direction,
    /// Specification version tag(s).
    pub spec_version: String,
}

impl MsrEntry {
    /// First MSR index as an integer.
    #[must_use]
    pub fn first_bit_value(&self) -> Option<u64> {
        parse_hex(&self.first_bit).ok()
    }

    /// Covered MSR count as an integer.
    #[must_use]
    pub fn size_value(&self) -> Option<u64> {
        parse_hex(&self.size).ok()
    }

    /// Whether the entry covers exactly one MSR.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.size_value() == Some(1)
    }
}

/// Appends `incoming` alternatives to `existing`, skipping any already present.
///
/// Both sides may already hold several alternatives joined by
/// [`ALTERNATIVE_SEPARATOR`]. Returns whether `existing` changed.
pub fn merge_alternatives(existing: &mut String, incoming: &str) -> bool {
    let mut changed = false;
    for candidate in incoming.split(ALTERNATIVE_SEPARATOR).map(str::trim) {
        if candidate.is_empty() {
            continue;
        }
        if existing.is_empty() {
            existing.push_str(candidate);
            changed = true;
            continue;
        }
        let present = existing
            .split(ALTERNATIVE_SEPARATOR)
            .any(|part| part.trim() == candidate);
        if !present {
            existing.push_str(ALTERNATIVE_SEPARATOR);
            existing.push_str(candidate);
            changed = true;
        }
    }
    changed
}

/// Converts a configured version (`1.0`) into the C version constant
/// (`VER1_0`). Values already spelled as a constant pass through.
#[must_use]
pub fn version_tag(version: &str) -> String {
    let trimmed = version.trim();
    if trimmed.starts_with("VER") {
        trimmed.to_string()
    } else {
        format!("VER{}", trimmed.replace('.', "_"))
    }
}
