//! Specification table loading.
//!
//! Specification sources are spreadsheet exports in CSV form. A configurable
//! number of leading records (title rows, notes) precede the header record.
//! Builders bind the columns they need once per table with [`SpecTable::column`]
//! or [`SpecTable::first_column`], so a missing column fails before any row is
//! interpreted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::SpecReadError;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// A column bound against a table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnId(usize);

/// One data record of a specification table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRow {
    cells: Vec<String>,
    line: usize,
}

impl SpecRow {
    /// Returns the trimmed cell text, or `None` when the cell is empty.
    ///
    /// Empty cells are the spreadsheet's "no value" marker.
    #[must_use]
    pub fn cell(&self, column: ColumnId) -> Option<&str> {
        self.cells
            .get(column.0)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// 1-indexed line where the record starts in the source file.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }
}

/// A loaded specification table: header plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTable {
    path: PathBuf,
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<SpecRow>,
}

impl SpecTable {
    /// Reads a CSV table, skipping `header_row_offset` records before the header.
    ///
    /// # Errors
    ///
    /// Returns [`SpecReadError`] when the file cannot be read, the CSV is
    /// malformed, or no header remains after the skipped records.
    pub fn read(path: &Path, header_row_offset: usize) -> Result<Self, SpecReadError> {
        let content = fs::read(path).map_err(|e| SpecReadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse_bytes(path, &content, header_row_offset)
    }

    /// Parses CSV text already in memory. `path` is used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`SpecReadError`] when the CSV is malformed or no header
    /// remains after the skipped records.
    pub fn parse(
        path: &Path,
        content: &str,
        header_row_offset: usize,
    ) -> Result<Self, SpecReadError> {
        Self::parse_bytes(path, content.as_bytes(), header_row_offset)
    }

    fn parse_bytes(
        path: &Path,
        content: &[u8],
        header_row_offset: usize,
    ) -> Result<Self, SpecReadError> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        let mut records = read_records(content).map_err(|e| SpecReadError::Malformed {
            path: path.to_path_buf(),
            line: e.position().map_or(0, |p| line_number(p.line())),
            reason: e.to_string(),
        })?;

        if records.len() <= header_row_offset {
            return Err(SpecReadError::MissingHeader {
                path: path.to_path_buf(),
                offset: header_row_offset,
            });
        }

        let mut data = records.split_off(header_row_offset);
        let header = data.remove(0);
        let columns: Vec<String> = header.cells.iter().map(|c| c.trim().to_string()).collect();

        // First declaration wins when a header repeats a name.
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }

        let mut rows = Vec::with_capacity(data.len());
        for record in data {
            if record.cells.len() > columns.len() {
                return Err(SpecReadError::Malformed {
                    path: path.to_path_buf(),
                    line: record.line,
                    reason: format!(
                        "expected {} fields, saw {}",
                        columns.len(),
                        record.cells.len()
                    ),
                });
            }
            rows.push(SpecRow {
                cells: record.cells,
                line: record.line,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            index,
            rows,
        })
    }

    /// Binds a column by its exact header name.
    ///
    /// # Errors
    ///
    /// Returns [`SpecReadError::MissingColumn`] naming the column.
    pub fn column(&self, name: &str) -> Result<ColumnId, SpecReadError> {
        self.index
            .get(name)
            .copied()
            .map(ColumnId)
            .ok_or_else(|| SpecReadError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    /// Binds the first candidate name present in the header.
    ///
    /// Specification revisions rename columns; sources list every spelling
    /// they accept.
    ///
    /// # Errors
    ///
    /// Returns [`SpecReadError::MissingColumn`] listing every candidate.
    pub fn first_column(&self, candidates: &[String]) -> Result<ColumnId, SpecReadError> {
        candidates
            .iter()
            .find_map(|name| self.index.get(name.as_str()).copied())
            .map(ColumnId)
            .ok_or_else(|| SpecReadError::MissingColumn {
                path: self.path.clone(),
                column: candidates.join("' or '"),
            })
    }

    /// Header name of a bound column.
    #[must_use]
    pub fn column_name(&self, column: ColumnId) -> &str {
        self.columns.get(column.0).map_or("", String::as_str)
    }

    /// Header name to position map.
    #[must_use]
    pub const fn column_index(&self) -> &HashMap<String, usize> {
        &self.index
    }

    /// Header names in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[SpecRow] {
        &self.rows
    }

    /// Source path of the table.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A raw CSV record with the line it starts on.
struct Record {
    cells: Vec<String>,
    line: usize,
}

/// Reads every record without header handling.
///
/// Records may differ in length; the caller checks them against the header.
/// Lines with no content at all are skipped by the reader.
fn read_records(content: &[u8]) -> Result<Vec<Record>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(Record {
            line: record.position().map_or(0, |p| line_number(p.line())),
            cells: record.iter().map(str::to_string).collect(),
        });
    }
    Ok(records)
}

fn line_number(line: u64) -> usize {
    usize::try_from(line).unwrap_or(usize::MAX)
}
