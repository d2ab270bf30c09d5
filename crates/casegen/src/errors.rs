//! Error and skip taxonomy for generation passes.
//!
//! Fatal errors abort the pass for one case kind only:
//! - [`ConfigError`]: the run configuration is unreadable or incomplete
//! - [`SpecReadError`]: a specification table is unreadable or lacks a column
//! - [`PreconditionError`]: the precondition map or header is unusable
//! - [`WriteError`]: the header artifact could not be written
//!
//! Rows that carry no testable contract are not errors. They are recorded as
//! [`RowSkip`] entries so callers can report them:
//! ```text
//! msr.csv:42: skipped: write: unknown precondition 'not_in_vmx_root'
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use compliance_model::{CaseKind, Direction};
use thiserror::Error;

use crate::leaf::LeafParseError;
use crate::precondition::Unresolved;

/// The run configuration is unusable for a case kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {message}", .path.display())]
    Io {
        /// Configuration path.
        path: PathBuf,
        /// Underlying I/O error text.
        message: String,
    },
    /// The configuration file is not a JSON object.
    #[error("invalid config {}: {message}", .path.display())]
    Parse {
        /// Configuration path.
        path: PathBuf,
        /// Parser error text.
        message: String,
    },
    /// The configuration has no section for the requested kind.
    #[error("config has no `{0}` section")]
    MissingSection(CaseKind),
    /// The section exists but misses keys or has wrong value types.
    #[error("invalid `{kind}` section: {message}")]
    InvalidSection {
        /// Section kind.
        kind: CaseKind,
        /// Deserializer error text.
        message: String,
    },
    /// The section lists no specification sources.
    #[error("`{0}` section lists no specification sources")]
    NoSources(CaseKind),
}

/// A specification table could not be loaded or bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecReadError {
    /// The table file could not be read.
    #[error("failed to read {}: {message}", .path.display())]
    Io {
        /// Table path.
        path: PathBuf,
        /// Underlying I/O error text.
        message: String,
    },
    /// The CSV text is not well formed.
    #[error("{}:{line}: malformed table: {reason}", .path.display())]
    Malformed {
        /// Table path.
        path: PathBuf,
        /// 1-indexed line where the record starts.
        line: usize,
        /// What is wrong.
        reason: String,
    },
    /// No header row follows the skipped leading rows.
    #[error("{}: no header row after skipping {offset} rows", .path.display())]
    MissingHeader {
        /// Table path.
        path: PathBuf,
        /// Number of rows skipped before the header.
        offset: usize,
    },
    /// A column required by a builder is not declared in the header.
    #[error("{}: missing column '{column}'", .path.display())]
    MissingColumn {
        /// Table path.
        path: PathBuf,
        /// Column name (or candidate list) that was looked up.
        column: String,
    },
    /// A cell a builder must interpret holds an unusable value.
    #[error("{}:{line}: column '{column}': {reason}", .path.display())]
    InvalidCell {
        /// Table path.
        path: PathBuf,
        /// 1-indexed line of the row.
        line: usize,
        /// Column name.
        column: String,
        /// What is wrong with the value.
        reason: String,
    },
}

/// The precondition resources for an MSR pass are unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// A resource file could not be read.
    #[error("failed to read {}: {message}", .path.display())]
    Io {
        /// Resource path.
        path: PathBuf,
        /// Underlying I/O error text.
        message: String,
    },
    /// The precondition map is not a JSON object of strings.
    #[error("invalid precondition map {}: {message}", .path.display())]
    Parse {
        /// Resource path.
        path: PathBuf,
        /// Parser error text.
        message: String,
    },
}

/// The header artifact could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to write {}: {message}", .path.display())]
pub struct WriteError {
    /// Artifact path.
    pub path: PathBuf,
    /// Underlying I/O error text.
    pub message: String,
}

impl WriteError {
    /// Wraps an I/O error raised while writing `path`.
    #[must_use]
    pub fn new(path: PathBuf, err: &io::Error) -> Self {
        Self {
            path,
            message: err.to_string(),
        }
    }
}

/// Any fatal error of a generation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Specification table problem.
    #[error(transparent)]
    SpecRead(#[from] SpecReadError),
    /// Precondition resource problem.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    /// Artifact write problem.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Why a specification row produced no entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Every cell the builder reads is empty.
    Blank,
    /// The virtualization type is not generated automatically.
    UnsupportedVirtType(String),
    /// A bit-field row appears before any usable leaf header.
    NoLeafContext,
    /// A leaf header row could not be parsed.
    MalformedLeaf(LeafParseError),
    /// A fixed bit-field row has no expected value.
    MissingExpectedValue,
    /// The MSR is architecturally reserved.
    Reserved,
    /// The row describes the default behaviour of unlisted MSRs.
    DefaultRow,
    /// One access direction has no resolvable outcome.
    Unresolved {
        /// Direction that was dropped.
        direction: Direction,
        /// Why its description did not resolve.
        unresolved: Unresolved,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => write!(f, "blank row"),
            Self::UnsupportedVirtType(kind) => {
                write!(f, "virtualization type '{kind}' is not generated")
            }
            Self::NoLeafContext => write!(f, "bit-field row outside any leaf group"),
            Self::MalformedLeaf(e) => write!(f, "malformed leaf header: {e}"),
            Self::MissingExpectedValue => write!(f, "fixed field without expected value"),
            Self::Reserved => write!(f, "reserved MSR"),
            Self::DefaultRow => write!(f, "default MSR behaviour row"),
            Self::Unresolved {
                direction,
                unresolved,
            } => write!(f, "{direction}: {unresolved}"),
        }
    }
}

/// A specification row that produced no entries (or lost one direction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkip {
    /// Table the row belongs to.
    pub source: PathBuf,
    /// 1-indexed line of the row.
    pub line: usize,
    /// Why it was skipped.
    pub reason: SkipReason,
}

impl fmt::Display for RowSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: skipped: {}",
            self.source.display(),
            self.line,
            self.reason
        )
    }
}
