//! Typed vocabulary for TDX CPUID and MSR compliance test cases.

/// Generated artifact families.
pub mod kind;
pub use kind::{CaseKind, UnknownCaseKind};

/// CPUID output registers and their canonical ordering.
pub mod register;
pub use register::{CpuidRegister, UnknownRegister};

/// Exception outcomes expected from virtualized MSR accesses.
pub mod outcome;
pub use outcome::{
    Direction, ExceptionOutcome, TrapKind, NO_EXCEPTION_TOKEN, NO_PRECONDITION_TOKEN,
};

/// Test-case entries produced from specification rows.
pub mod entry;
pub use entry::{
    merge_alternatives, version_tag, CpuidEntry, MsrEntry, ALTERNATIVE_SEPARATOR, MARKER_SIZE,
};

/// Numeric cell parsing for hex and decimal specification fields.
pub mod numeric;
pub use numeric::{normalize_hex, parse_hex, parse_int_cell, NumericCellError};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
