//! The shared read → build → fuse → sort → render contract.
//!
//! CPUID and MSR generation follow the same pipeline and differ only in how
//! rows become entries, which fields identify an entry across sources, how
//! entries are ordered and how they are written out. [`CaseBuilder`] captures
//! exactly those differences; [`crate::fusion`] and [`crate::pipeline`] drive
//! any implementation.

use std::hash::Hash;

use compliance_model::CaseKind;

use crate::errors::{RowSkip, SkipReason, SpecReadError};
use crate::table::{ColumnId, SpecRow, SpecTable};

/// Entries built from one specification table plus the rows that produced
/// none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput<E> {
    /// Entries in row order.
    pub entries: Vec<E>,
    /// Rows (or row directions) dropped without a fatal error.
    pub skipped: Vec<RowSkip>,
}

impl<E> BuildOutput<E> {
    /// Creates an empty output.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Records a skipped row.
    pub fn skip(&mut self, table: &SpecTable, row: &SpecRow, reason: SkipReason) {
        log::debug!(
            "{}:{}: skipped: {reason}",
            table.path().display(),
            row.line()
        );
        self.skipped.push(RowSkip {
            source: table.path().to_path_buf(),
            line: row.line(),
            reason,
        });
    }
}

impl<E> Default for BuildOutput<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// One family of generated test cases.
pub trait CaseBuilder {
    /// Entry produced per specification row (or row direction).
    type Entry: Clone;
    /// Identity of an entry across specification sources.
    type FuseKey: Eq + Hash;
    /// Final ordering of entries.
    type SortKey: Ord;

    /// The artifact family this builder produces.
    const KIND: CaseKind;

    /// Walks a table and produces entries in row order.
    ///
    /// # Errors
    ///
    /// Returns [`SpecReadError`] when a required column is missing or a cell
    /// the builder must interpret is unusable.
    fn build(&self, table: &SpecTable) -> Result<BuildOutput<Self::Entry>, SpecReadError>;

    /// Identity used when fusing later sources into the first.
    fn fuse_key(entry: &Self::Entry) -> Self::FuseKey;

    /// Folds `other` (same fuse key) into `into`.
    fn merge(into: &mut Self::Entry, other: &Self::Entry);

    /// Ordering key of the final artifact.
    fn sort_key(entry: &Self::Entry) -> Self::SortKey;

    /// One formatted body line.
    fn render_line(entry: &Self::Entry) -> String;

    /// Body lines including the enclosing function or array.
    fn render_body(entries: &[Self::Entry]) -> Vec<String>;
}

/// Converts a cell error into a fatal [`SpecReadError::InvalidCell`].
pub(crate) fn invalid_cell(
    table: &SpecTable,
    row: &SpecRow,
    column: ColumnId,
    reason: impl ToString,
) -> SpecReadError {
    SpecReadError::InvalidCell {
        path: table.path().to_path_buf(),
        line: row.line(),
        column: table.column_name(column).to_string(),
        reason: reason.to_string(),
    }
}
