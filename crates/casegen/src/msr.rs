//! MSR case generation.
//!
//! Each specification row describes one MSR (or a contiguous range of MSRs)
//! and how the TDX module virtualizes reads and writes to it. A row yields up
//! to two entries, one per direction whose description resolves.

use compliance_model::{
    merge_alternatives, normalize_hex, parse_hex, version_tag, CaseKind, Direction, MsrEntry,
    TrapKind,
};

use crate::builder::{invalid_cell, BuildOutput, CaseBuilder};
use crate::errors::{SkipReason, SpecReadError};
use crate::precondition::{PreconditionResolver, Unresolved};
use crate::table::{ColumnId, SpecRow, SpecTable};

/// Architectural name column header.
pub const NAME_COLUMN: &str = "MSR Architectural Name";
/// First MSR index column header.
pub const FIRST_COLUMN: &str = "First (H)";
/// Last MSR index column header.
pub const LAST_COLUMN: &str = "Last (H)";
/// MSR count column header.
pub const SIZE_COLUMN: &str = "Size (H)";
/// Name of rows describing reserved MSRs.
pub const RESERVED: &str = "Reserved";
/// First-index value of the row describing unlisted MSRs.
pub const DEFAULT: &str = "Default";

/// Source-specific column names of an MSR table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsrColumns {
    /// Read description column candidates.
    pub read: Vec<String>,
    /// Write description column candidates.
    pub write: Vec<String>,
}

/// Builds MSR entries from one specification source.
#[derive(Debug, Clone)]
pub struct MsrBuilder<'a> {
    columns: MsrColumns,
    version: String,
    resolver: &'a PreconditionResolver,
}

impl<'a> MsrBuilder<'a> {
    /// Creates a builder tagging entries with `version` (`1.5` → `VER1_5`).
    #[must_use]
    pub fn new(columns: MsrColumns, version: &str, resolver: &'a PreconditionResolver) -> Self {
        Self {
            columns,
            version: version_tag(version),
            resolver,
        }
    }
}

struct Bound {
    name: ColumnId,
    first: ColumnId,
    last: ColumnId,
    size: ColumnId,
    read: ColumnId,
    write: ColumnId,
}

impl Bound {
    fn bind(table: &SpecTable, columns: &MsrColumns) -> Result<Self, SpecReadError> {
        Ok(Self {
            name: table.column(NAME_COLUMN)?,
            first: table.column(FIRST_COLUMN)?,
            last: table.column(LAST_COLUMN)?,
            size: table.column(SIZE_COLUMN)?,
            read: table.first_column(&columns.read)?,
            write: table.first_column(&columns.write)?,
        })
    }

    const fn description(&self, direction: Direction) -> ColumnId {
        match direction {
            Direction::Read => self.read,
            Direction::Write => self.write,
        }
    }
}

fn hex_cell(table: &SpecTable, row: &SpecRow, column: ColumnId) -> Result<u64, SpecReadError> {
    parse_hex(row.cell(column).unwrap_or_default()).map_err(|e| invalid_cell(table, row, column, e))
}

/// Normalized `(first, size)` of a row's MSR range.
///
/// A missing `Last (H)` means a single MSR; a missing `Size (H)` is derived
/// from the range.
fn geometry(
    table: &SpecTable,
    row: &SpecRow,
    cols: &Bound,
) -> Result<(String, String), SpecReadError> {
    let first_value = hex_cell(table, row, cols.first)?;

    let last_value = match row.cell(cols.last) {
        Some(_) => hex_cell(table, row, cols.last)?,
        None => first_value,
    };
    if last_value < first_value {
        return Err(invalid_cell(
            table,
            row,
            cols.last,
            format!("{last_value:#x} is below first MSR {first_value:#x}"),
        ));
    }

    let size = match row.cell(cols.size) {
        Some(text) => normalize_hex(text).map_err(|e| invalid_cell(table, row, cols.size, e))?,
        None => format!("{:#x}", (last_value - first_value).saturating_add(1)),
    };
    Ok((format!("{first_value:#x}"), size))
}

fn report_unresolved(table: &SpecTable, row: &SpecRow, direction: Direction, why: &Unresolved) {
    let at = format!("{}:{}", table.path().display(), row.line());
    match why {
        Unresolved::UnknownPrecondition { .. } | Unresolved::Unbalanced(_) => {
            log::warn!("{at}: dropping {direction} case: {why}");
        }
        Unresolved::Unrecognized(_) => log::info!("{at}: dropping {direction} case: {why}"),
        Unresolved::Empty => {}
    }
}

impl CaseBuilder for MsrBuilder<'_> {
    type Entry = MsrEntry;
    type FuseKey = (String, String, Option<TrapKind>, Option<String>, Direction);
    type SortKey = (u64, u64, u8);

    const KIND: CaseKind = CaseKind::Msr;

    fn build(&self, table: &SpecTable) -> Result<BuildOutput<MsrEntry>, SpecReadError> {
        let cols = Bound::bind(table, &self.columns)?;
        let mut out = BuildOutput::new();

        for row in table.rows() {
            let name = row.cell(cols.name);
            let first = row.cell(cols.first);

            match (name, first) {
                (None, None) => {
                    out.skip(table, row, SkipReason::Blank);
                    continue;
                }
                (Some(RESERVED), _) => {
                    out.skip(table, row, SkipReason::Reserved);
                    continue;
                }
                (_, Some(DEFAULT)) => {
                    out.skip(table, row, SkipReason::DefaultRow);
                    continue;
                }
                _ => {}
            }

            let (first_bit, size) = geometry(table, row, &cols)?;

            for direction in Direction::BOTH {
                let description = row.cell(cols.description(direction)).unwrap_or_default();
                match self.resolver.classify(description) {
                    Ok(outcome) => out.entries.push(MsrEntry {
                        field_name: name.unwrap_or_default().to_string(),
                        first_bit: first_bit.clone(),
                        size: size.clone(),
                        outcome,
                        direction,
                        spec_version: self.version.clone(),
                    }),
                    Err(unresolved) => {
                        report_unresolved(table, row, direction, &unresolved);
                        out.skip(
                            table,
                            row,
                            SkipReason::Unresolved {
                                direction,
                                unresolved,
                            },
                        );
                    }
                }
            }
        }

        Ok(out)
    }

    fn fuse_key(entry: &MsrEntry) -> Self::FuseKey {
        (
            entry.first_bit.clone(),
            entry.size.clone(),
            entry.outcome.trap(),
            entry.outcome.precondition().map(str::to_string),
            entry.direction,
        )
    }

    fn merge(into: &mut MsrEntry, other: &MsrEntry) {
        merge_alternatives(&mut into.spec_version, &other.spec_version);
    }

    fn sort_key(entry: &MsrEntry) -> Self::SortKey {
        (
            entry.first_bit_value().unwrap_or(u64::MAX),
            entry.size_value().unwrap_or(u64::MAX),
            entry.direction.rank(),
        )
    }

    fn render_line(entry: &MsrEntry) -> String {
        let name = entry.field_name.replace('\\', "\\\\").replace('"', "\\\"");
        let macro_name = entry.direction.macro_name();
        let first = &entry.first_bit;
        let trap = entry.outcome.trap_token();
        let pre = entry.outcome.precondition_token();
        let version = &entry.spec_version;
        if entry.is_single() {
            format!("\t{macro_name}(\"{name}\", {first}, {trap}, {pre}, {version}),")
        } else {
            let size = &entry.size;
            format!("\t{macro_name}_SIZE(\"{name}\", {first}, {trap}, {pre}, {size}, {version}),")
        }
    }

    fn render_body(entries: &[MsrEntry]) -> Vec<String> {
        let mut body = Vec::with_capacity(entries.len() + 2);
        body.push("struct test_msr msr_cases[] = {".to_string());
        body.extend(entries.iter().map(Self::render_line));
        body.push("};".to_string());
        body
    }
}
