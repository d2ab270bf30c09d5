//! CPUID case generation.
//!
//! A CPUID specification table interleaves leaf header rows (register cell
//! empty, field name `Leaf 0x7, Sub-Leaf 0x0`) with bit-field rows. Only
//! bit-fields whose virtualization type is `Fixed` have a value the guest can
//! check unconditionally, so only those become cases.

use compliance_model::{
    merge_alternatives, parse_int_cell, version_tag, CaseKind, CpuidEntry, CpuidRegister,
};

use crate::builder::{invalid_cell, BuildOutput, CaseBuilder};
use crate::errors::{SkipReason, SpecReadError};
use crate::leaf::{parse_leaf, LeafGroup};
use crate::table::{ColumnId, SpecRow, SpecTable};

/// Register column header.
pub const REGISTER_COLUMN: &str = "Reg.";
/// Most significant bit column header.
pub const MSB_COLUMN: &str = "MSB";
/// Least significant bit column header.
pub const LSB_COLUMN: &str = "LSB";
/// Field width column header.
pub const FIELD_SIZE_COLUMN: &str = "Field Size";
/// Virtualization type of generated bit-fields.
pub const FIXED: &str = "Fixed";

/// Source-specific column names of a CPUID table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuidColumns {
    /// Field name column.
    pub field_name: String,
    /// Virtualization type column candidates.
    pub virt_type: Vec<String>,
    /// Virtualization detail (expected value) column candidates.
    pub virt_detail: Vec<String>,
}

/// Builds CPUID entries from one specification source.
#[derive(Debug, Clone)]
pub struct CpuidBuilder {
    columns: CpuidColumns,
    version: String,
}

impl CpuidBuilder {
    /// Creates a builder tagging entries with `version` (`1.0` → `VER1_0`).
    #[must_use]
    pub fn new(columns: CpuidColumns, version: &str) -> Self {
        Self {
            columns,
            version: version_tag(version),
        }
    }
}

struct Bound {
    field_name: ColumnId,
    register: ColumnId,
    msb: ColumnId,
    lsb: ColumnId,
    size: ColumnId,
    virt_type: ColumnId,
    virt_detail: ColumnId,
}

impl Bound {
    fn bind(table: &SpecTable, columns: &CpuidColumns) -> Result<Self, SpecReadError> {
        Ok(Self {
            field_name: table.column(&columns.field_name)?,
            register: table.column(REGISTER_COLUMN)?,
            msb: table.column(MSB_COLUMN)?,
            lsb: table.column(LSB_COLUMN)?,
            size: table.column(FIELD_SIZE_COLUMN)?,
            virt_type: table.first_column(&columns.virt_type)?,
            virt_detail: table.first_column(&columns.virt_detail)?,
        })
    }
}

fn int_cell(table: &SpecTable, row: &SpecRow, column: ColumnId) -> Result<i32, SpecReadError> {
    let value = parse_int_cell(row.cell(column).unwrap_or_default())
        .map_err(|e| invalid_cell(table, row, column, e))?;
    i32::try_from(value).map_err(|e| invalid_cell(table, row, column, e))
}

impl CaseBuilder for CpuidBuilder {
    type Entry = CpuidEntry;
    type FuseKey = (
        String,
        String,
        Option<CpuidRegister>,
        i32,
        i32,
        i32,
        Option<String>,
    );
    type SortKey = (u64, u64, u8, i32, i32);

    const KIND: CaseKind = CaseKind::Cpuid;

    fn build(&self, table: &SpecTable) -> Result<BuildOutput<CpuidEntry>, SpecReadError> {
        let cols = Bound::bind(table, &self.columns)?;
        let mut out = BuildOutput::new();
        let mut group: Option<LeafGroup> = None;
        let mut pending_marker: Option<String> = None;

        for row in table.rows() {
            let field_name = row.cell(cols.field_name);

            let Some(register) = row.cell(cols.register) else {
                let Some(field_name) = field_name else {
                    out.skip(table, row, SkipReason::Blank);
                    continue;
                };
                match parse_leaf(field_name) {
                    Ok(Some(parsed)) => group = Some(parsed),
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!(
                            "{}:{}: malformed leaf header '{field_name}': {e}",
                            table.path().display(),
                            row.line()
                        );
                        group = None;
                        out.skip(table, row, SkipReason::MalformedLeaf(e));
                    }
                }
                pending_marker = Some(field_name.to_string());
                continue;
            };

            let virt_type = row.cell(cols.virt_type).unwrap_or_default();
            if virt_type != FIXED {
                out.skip(
                    table,
                    row,
                    SkipReason::UnsupportedVirtType(virt_type.to_string()),
                );
                continue;
            }

            let Some(current) = &group else {
                out.skip(table, row, SkipReason::NoLeafContext);
                continue;
            };

            let register = register
                .parse::<CpuidRegister>()
                .map_err(|e| invalid_cell(table, row, cols.register, e))?;
            let msb = int_cell(table, row, cols.msb)?;
            let lsb = int_cell(table, row, cols.lsb)?;
            let size = int_cell(table, row, cols.size)?;

            let Some(expected_value) = row.cell(cols.virt_detail) else {
                log::warn!(
                    "{}:{}: fixed field '{}' has no expected value",
                    table.path().display(),
                    row.line(),
                    field_name.unwrap_or_default()
                );
                out.skip(table, row, SkipReason::MissingExpectedValue);
                continue;
            };

            if let Some(marker) = pending_marker.take() {
                out.entries.push(CpuidEntry::marker(
                    &current.leaf,
                    current.first_subleaf(),
                    &marker,
                    &self.version,
                ));
            }

            for subleaf in &current.subleaves {
                out.entries.push(CpuidEntry {
                    leaf: current.leaf.clone(),
                    subleaf: subleaf.clone(),
                    register: Some(register),
                    msb,
                    lsb,
                    size,
                    field_name: field_name.unwrap_or_default().to_string(),
                    expected_value: expected_value.to_string(),
                    spec_version: self.version.clone(),
                });
            }
        }

        Ok(out)
    }

    fn fuse_key(entry: &CpuidEntry) -> Self::FuseKey {
        (
            numeric_token(&entry.leaf, entry.leaf_value()),
            numeric_token(&entry.subleaf, entry.subleaf_value()),
            entry.register,
            entry.msb,
            entry.lsb,
            entry.size,
            // Markers carry no geometry, so their caption tells groups apart.
            entry.is_marker().then(|| entry.field_name.clone()),
        )
    }

    fn merge(into: &mut CpuidEntry, other: &CpuidEntry) {
        merge_alternatives(&mut into.expected_value, &other.expected_value);
        merge_alternatives(&mut into.spec_version, &other.spec_version);
    }

    fn sort_key(entry: &CpuidEntry) -> Self::SortKey {
        (
            entry.leaf_value().unwrap_or(u64::MAX),
            entry.subleaf_value().unwrap_or(u64::MAX),
            CpuidRegister::rank(entry.register),
            entry.msb,
            entry.lsb,
        )
    }

    fn render_line(entry: &CpuidEntry) -> String {
        let CpuidEntry {
            leaf,
            subleaf,
            msb,
            lsb,
            field_name,
            expected_value,
            spec_version,
            ..
        } = entry;
        let reg = entry.register.map_or("none", CpuidRegister::as_str);

        match entry.size {
            _ if entry.is_marker() => format!("\n\t// {field_name}"),
            32 => format!(
                "\tEXP_CPUID_BYTE({leaf}, {subleaf}, {reg}, {expected_value}, {spec_version});\t//{field_name}"
            ),
            1 => format!(
                "\tEXP_CPUID_BIT({leaf}, {subleaf}, {reg}, {msb}, {expected_value}, {spec_version});\t//{field_name}"
            ),
            _ => format!(
                "\tEXP_CPUID_RES_BITS({leaf}, {subleaf}, {reg}, {lsb}, {msb}, {spec_version});\t//{field_name}"
            ),
        }
    }

    fn render_body(entries: &[CpuidEntry]) -> Vec<String> {
        let mut body = Vec::with_capacity(entries.len() + 2);
        body.push("void initial_cpuid(void) {".to_string());
        body.extend(entries.iter().map(Self::render_line));
        body.push("}".to_string());
        body
    }
}

/// Canonical spelling of a hex token so `7` and `0x7` fuse.
fn numeric_token(text: &str, value: Option<u64>) -> String {
    value.map_or_else(|| text.to_string(), |v| format!("{v:#x}"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fusion::fuse;
    use crate::leaf::LeafParseError;

    const HEADER: &str =
        "Field Name,Reg.,MSB,LSB,Field Size,Virtualization Type,Virtualization Details\n";

    fn columns() -> CpuidColumns {
        CpuidColumns {
            field_name: "Field Name".into(),
            virt_type: vec!["Virtualization Type".into()],
            virt_detail: vec!["Virtualization Details".into()],
        }
    }

    fn build(rows: &str) -> BuildOutput<CpuidEntry> {
        let table = SpecTable::parse(Path::new("cpuid.csv"), &format!("{HEADER}{rows}"), 0)
            .expect("table parses");
        CpuidBuilder::new(columns(), "1.0")
            .build(&table)
            .expect("table builds")
    }

    #[test]
    fn leaf_header_then_fixed_bit() {
        let out = build("Leaf 1,,,,,,\nAESNI,ECX,25,25,1,Fixed,1\n");
        assert_eq!(out.entries.len(), 2);

        let marker = &out.entries[0];
        assert!(marker.is_marker());
        assert_eq!(marker.field_name, "Leaf 1");
        assert_eq!((marker.leaf.as_str(), marker.subleaf.as_str()), ("1", "0x0"));

        let bit = &out.entries[1];
        assert_eq!(bit.register, Some(CpuidRegister::Ecx));
        assert_eq!((bit.msb, bit.lsb, bit.size), (25, 25, 1));
        assert_eq!(
            CpuidBuilder::render_line(bit),
            "\tEXP_CPUID_BIT(1, 0x0, ecx, 25, 1, VER1_0);\t//AESNI"
        );
        assert_eq!(CpuidBuilder::render_line(marker), "\n\t// Leaf 1");
    }

    #[test]
    fn marker_emitted_once_per_group() {
        let out = build(
            "\"Leaf 0x7, Sub-Leaf 0x0\",,,,,,\n\
             FSGSBASE,EBX,0,0,1,Fixed,0x1\n\
             SGX,EBX,2,2,1,Fixed,0x0\n",
        );
        let markers = out.entries.iter().filter(|e| e.is_marker()).count();
        assert_eq!(markers, 1);
        assert_eq!(out.entries.len(), 3);
    }

    #[test]
    fn sub_leaf_range_fans_out() {
        let out = build(
            "\"Leaf 0x4, Sub-Leaves 0x0-0x2\",,,,,,\n\
             Reserved_31_26,EAX,31,26,6,Fixed,0x0\n",
        );
        let subleaves: Vec<&str> = out
            .entries
            .iter()
            .filter(|e| !e.is_marker())
            .map(|e| e.subleaf.as_str())
            .collect();
        assert_eq!(subleaves, vec!["0x0", "0x1", "0x2"]);
        assert_eq!(out.entries[0].subleaf, "0x0");
        assert_eq!(
            CpuidBuilder::render_line(&out.entries[1]),
            "\tEXP_CPUID_RES_BITS(0x4, 0x0, eax, 26, 31, VER1_0);\t//Reserved_31_26"
        );
    }

    #[test]
    fn non_fixed_rows_are_skipped() {
        let out = build("Leaf 1,,,,,,\nx2APIC,ECX,21,21,1,Configured,\nMSR,EDX,5,5,1,Fixed,1\n");
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(
            out.skipped[0].reason,
            SkipReason::UnsupportedVirtType("Configured".into())
        );
        assert_eq!(out.skipped[0].line, 3);
    }

    #[test]
    fn non_leaf_header_keeps_leaf_but_renames_marker() {
        let out = build(
            "Leaf 0x1,,,,,,\nSSE3,ECX,0,0,1,Fixed,1\nFeature Flags,,,,,,\nFPU,EDX,0,0,1,Fixed,1\n",
        );
        let markers: Vec<(&str, &str)> = out
            .entries
            .iter()
            .filter(|e| e.is_marker())
            .map(|e| (e.leaf.as_str(), e.field_name.as_str()))
            .collect();
        assert_eq!(markers, vec![("0x1", "Leaf 0x1"), ("0x1", "Feature Flags")]);
    }

    #[test]
    fn full_register_uses_byte_form() {
        let out = build("Leaf 0x0,,,,,,\nMaxIndex,EAX,31,0,32,Fixed,0x21\n");
        assert_eq!(
            CpuidBuilder::render_line(&out.entries[1]),
            "\tEXP_CPUID_BYTE(0x0, 0x0, eax, 0x21, VER1_0);\t//MaxIndex"
        );
    }

    #[test]
    fn fixed_row_before_any_leaf_is_skipped() {
        let out = build("SSE3,ECX,0,0,1,Fixed,1\n");
        assert!(out.entries.is_empty());
        assert_eq!(out.skipped[0].reason, SkipReason::NoLeafContext);
    }

    #[test]
    fn malformed_leaf_drops_its_fields() {
        let out = build(
            "Leaf 0x1,,,,,,\n\"Leaf 0x4, Sub-Leaves 0x3-0x1\",,,,,,\nX,EAX,0,0,1,Fixed,1\n",
        );
        assert!(out.entries.is_empty());
        assert!(matches!(
            out.skipped[0].reason,
            SkipReason::MalformedLeaf(_)
        ));
        assert_eq!(out.skipped[1].reason, SkipReason::NoLeafContext);
    }

    #[test]
    fn oversized_sub_leaf_range_is_skipped() {
        let out = build("\"Leaf 4, Sub-Leaves 0x0-0xffffffff\",,,,,,\nX,EAX,0,0,1,Fixed,1\n");
        assert!(out.entries.is_empty());
        assert_eq!(
            out.skipped[0].reason,
            SkipReason::MalformedLeaf(LeafParseError::RangeTooWide {
                from: "0x0".into(),
                to: "0xffffffff".into(),
            })
        );
    }

    #[test]
    fn fixed_row_without_value_is_skipped() {
        let out = build("Leaf 1,,,,,,\nSSE3,ECX,0,0,1,Fixed,\n");
        assert!(out.entries.is_empty());
        assert_eq!(out.skipped[0].reason, SkipReason::MissingExpectedValue);
    }

    #[test]
    fn float_cells_are_integers() {
        let out = build("Leaf 1,,,,,,\nSSE3,ECX,0.0,0.0,1.0,Fixed,1\n");
        assert_eq!(out.entries[1].size, 1);
    }

    #[test]
    fn bad_msb_is_fatal() {
        let table = SpecTable::parse(
            Path::new("cpuid.csv"),
            &format!("{HEADER}Leaf 1,,,,,,\nSSE3,ECX,high,0,1,Fixed,1\n"),
            0,
        )
        .unwrap();
        let err = CpuidBuilder::new(columns(), "1.0").build(&table).unwrap_err();
        assert!(matches!(
            err,
            SpecReadError::InvalidCell { line: 3, ref column, .. } if column == "MSB"
        ));
    }

    #[test]
    fn unknown_register_is_fatal() {
        let table = SpecTable::parse(
            Path::new("cpuid.csv"),
            &format!("{HEADER}Leaf 1,,,,,,\nSSE3,RAX,0,0,1,Fixed,1\n"),
            0,
        )
        .unwrap();
        let err = CpuidBuilder::new(columns(), "1.0").build(&table).unwrap_err();
        assert!(err.to_string().contains("unknown CPUID register 'RAX'"));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let table =
            SpecTable::parse(Path::new("cpuid.csv"), "Field Name,Reg.,MSB\n", 0).unwrap();
        let err = CpuidBuilder::new(columns(), "1.0").build(&table).unwrap_err();
        assert!(matches!(err, SpecReadError::MissingColumn { ref column, .. } if column == "LSB"));
    }

    #[test]
    fn sort_places_registers_then_marker() {
        let marker = CpuidEntry::marker("0x1", "0x0", "Leaf 1", "VER1_0");
        let mut edx = CpuidEntry {
            leaf: "0x1".into(),
            subleaf: "0x0".into(),
            register: Some(CpuidRegister::Edx),
            msb: 0,
            lsb: 0,
            size: 1,
            field_name: "FPU".into(),
            expected_value: "1".into(),
            spec_version: "VER1_0".into(),
        };
        let ecx = CpuidEntry {
            register: Some(CpuidRegister::Ecx),
            ..edx.clone()
        };
        assert!(CpuidBuilder::sort_key(&ecx) < CpuidBuilder::sort_key(&edx));
        assert!(CpuidBuilder::sort_key(&edx) < CpuidBuilder::sort_key(&marker));
        edx.leaf = "0x2".into();
        assert!(CpuidBuilder::sort_key(&marker) < CpuidBuilder::sort_key(&edx));
    }

    #[test]
    fn fuse_key_ignores_name_and_value_spelling() {
        let a = CpuidEntry {
            leaf: "7".into(),
            subleaf: "0".into(),
            register: Some(CpuidRegister::Ebx),
            msb: 3,
            lsb: 3,
            size: 1,
            field_name: "BMI1".into(),
            expected_value: "1".into(),
            spec_version: "VER1_0".into(),
        };
        let b = CpuidEntry {
            leaf: "0x7".into(),
            subleaf: "0x0".into(),
            field_name: "BMI1 (renamed)".into(),
            expected_value: "0".into(),
            ..a.clone()
        };
        assert_eq!(CpuidBuilder::fuse_key(&a), CpuidBuilder::fuse_key(&b));
    }

    #[test]
    fn markers_fuse_by_caption() {
        let leaf = CpuidEntry::marker("0x1", "0x0", "Leaf 0x1", "VER1_0");
        let flags = CpuidEntry::marker("0x1", "0x0", "Feature Flags", "VER1_0");
        let leaf_again = CpuidEntry::marker("1", "0", "Leaf 0x1", "VER1_5");
        assert_ne!(CpuidBuilder::fuse_key(&leaf), CpuidBuilder::fuse_key(&flags));
        assert_eq!(CpuidBuilder::fuse_key(&leaf), CpuidBuilder::fuse_key(&leaf_again));

        let mut base = vec![leaf];
        assert_eq!(fuse::<CpuidBuilder>(&mut base, vec![flags, leaf_again]), 1);
        let captions: Vec<&str> = base.iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(captions, vec!["Leaf 0x1", "Feature Flags"]);
        assert_eq!(base[0].spec_version, "VER1_0 | VER1_5");
    }

    #[test]
    fn body_is_wrapped_in_initializer() {
        let body = CpuidBuilder::render_body(&[]);
        assert_eq!(body, vec!["void initial_cpuid(void) {", "}"]);
    }
}
