//! Generation passes.
//!
//! A pass reads every configured source of one case kind, builds entries,
//! fuses and sorts them, and renders the header. Passes are independent: a
//! failure in the MSR pass never prevents the CPUID artifact from being
//! written, and nothing is written for a pass that failed part-way.

use std::path::PathBuf;

use compliance_model::{CaseKind, CpuidEntry, MsrEntry};

use crate::builder::{BuildOutput, CaseBuilder};
use crate::config::{CpuidConfig, MsrConfig, RunConfig};
use crate::cpuid::{CpuidBuilder, CpuidColumns};
use crate::emitter::{emit, render_header};
use crate::errors::{GenerateError, PreconditionError, RowSkip, SpecReadError, WriteError};
use crate::fusion::assemble;
use crate::msr::{MsrBuilder, MsrColumns};
use crate::precondition::{KnownPreconditions, PreconditionMap, PreconditionResolver};
use crate::table::SpecTable;

/// A rendered, not yet written, header artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedHeader {
    /// Case kind.
    pub kind: CaseKind,
    /// Output path.
    pub path: PathBuf,
    /// Body lines including the wrapper.
    pub lines: Vec<String>,
    /// Number of fused entries (markers included).
    pub entries: usize,
    /// Rows that produced no entry.
    pub skipped: Vec<RowSkip>,
}

impl GeneratedHeader {
    fn from_output<B: CaseBuilder>(path: PathBuf, output: BuildOutput<B::Entry>) -> Self {
        Self {
            kind: B::KIND,
            path,
            lines: B::render_body(&output.entries),
            entries: output.entries.len(),
            skipped: output.skipped,
        }
    }

    /// Full header text.
    #[must_use]
    pub fn render(&self) -> String {
        render_header(self.kind, &self.lines)
    }

    /// Writes the header to its output path.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] on any I/O failure.
    pub fn write(&self) -> Result<(), WriteError> {
        emit(&self.path, self.kind, &self.lines)
    }
}

/// Reads, builds and assembles every source of one kind.
///
/// # Errors
///
/// Returns the first [`SpecReadError`]; later sources are not read.
pub fn collect<B: CaseBuilder>(
    sources: impl IntoIterator<Item = (B, PathBuf, usize)>,
) -> Result<BuildOutput<B::Entry>, SpecReadError> {
    let mut batches = Vec::new();
    let mut skipped = Vec::new();
    for (builder, path, bias) in sources {
        let table = SpecTable::read(&path, bias)?;
        let output = builder.build(&table)?;
        log::info!(
            "{}: {} {} entries, {} rows skipped",
            path.display(),
            output.entries.len(),
            B::KIND,
            output.skipped.len()
        );
        batches.push(output.entries);
        skipped.extend(output.skipped);
    }
    Ok(BuildOutput {
        entries: assemble::<B>(batches),
        skipped,
    })
}

fn cpuid_pass(config: &CpuidConfig) -> Result<BuildOutput<CpuidEntry>, SpecReadError> {
    collect(config.sources.iter().map(|source| {
        let columns = CpuidColumns {
            field_name: source.fname.clone(),
            virt_type: source.vtype.clone(),
            virt_detail: source.vdetail.clone(),
        };
        (
            CpuidBuilder::new(columns, &source.version),
            source.csv_path.clone(),
            source.bias,
        )
    }))
}

/// Loads the precondition map and harvested hook names of an MSR section.
///
/// # Errors
///
/// Returns [`PreconditionError`] when either resource is unusable.
pub fn load_resolver(config: &MsrConfig) -> Result<PreconditionResolver, PreconditionError> {
    let known = KnownPreconditions::load(&config.precondition_header)?;
    let map = match &config.prepath {
        Some(path) => PreconditionMap::load(path)?,
        None => PreconditionMap::default(),
    };
    log::info!(
        "{}: {} precondition hooks",
        config.precondition_header.display(),
        known.len()
    );
    Ok(PreconditionResolver::new(map, known))
}

fn msr_pass(
    config: &MsrConfig,
    resolver: &PreconditionResolver,
) -> Result<BuildOutput<MsrEntry>, SpecReadError> {
    collect(config.sources.iter().map(|source| {
        let columns = MsrColumns {
            read: source.rdname.clone(),
            write: source.wrname.clone(),
        };
        (
            MsrBuilder::new(columns, &source.version, resolver),
            source.csv_path.clone(),
            source.bias,
        )
    }))
}

/// Fused, sorted CPUID entries of a configuration.
///
/// # Errors
///
/// Returns [`GenerateError`] when the section or any source is unusable.
pub fn collect_cpuid(config: &RunConfig) -> Result<BuildOutput<CpuidEntry>, GenerateError> {
    cpuid_pass(&config.cpuid()?).map_err(GenerateError::from)
}

/// Fused, sorted MSR entries of a configuration.
///
/// # Errors
///
/// Returns [`GenerateError`] when the section, the precondition resources or
/// any source is unusable.
pub fn collect_msr(config: &RunConfig) -> Result<BuildOutput<MsrEntry>, GenerateError> {
    let msr = config.msr()?;
    let resolver = load_resolver(&msr)?;
    msr_pass(&msr, &resolver).map_err(GenerateError::from)
}

/// Runs one generation pass without writing.
///
/// # Errors
///
/// Returns [`GenerateError`] for any fatal configuration, input or
/// precondition problem.
pub fn generate(kind: CaseKind, config: &RunConfig) -> Result<GeneratedHeader, GenerateError> {
    match kind {
        CaseKind::Cpuid => {
            let cpuid = config.cpuid()?;
            let output = cpuid_pass(&cpuid)?;
            Ok(GeneratedHeader::from_output::<CpuidBuilder>(
                cpuid.header_path,
                output,
            ))
        }
        CaseKind::Msr => {
            let msr = config.msr()?;
            let resolver = load_resolver(&msr)?;
            let output = msr_pass(&msr, &resolver)?;
            Ok(GeneratedHeader::from_output::<MsrBuilder<'_>>(
                msr.header_path,
                output,
            ))
        }
    }
}

/// Runs each requested pass independently, writing artifacts when `write`.
///
/// Returns one result per kind in request order.
#[must_use]
pub fn run(
    config: &RunConfig,
    kinds: &[CaseKind],
    write: bool,
) -> Vec<(CaseKind, Result<GeneratedHeader, GenerateError>)> {
    kinds
        .iter()
        .map(|&kind| {
            let result = generate(kind, config).and_then(|header| {
                if write {
                    header.write()?;
                }
                Ok(header)
            });
            if let Err(e) = &result {
                log::error!("{kind} generation failed: {e}");
            }
            (kind, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    const CPUID_CSV: &str = "\
Field Name,Reg.,MSB,LSB,Field Size,Virtualization Type,Virtualization Details
Leaf 1,,,,,,
AESNI,ECX,25,25,1,Fixed,1
";

    fn write_config(dir: &Path, body: &str) -> RunConfig {
        let path = dir.join("config.json");
        fs::write(&path, body).unwrap();
        RunConfig::load(&path).unwrap()
    }

    #[test]
    fn cpuid_pass_renders_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpuid.csv"), CPUID_CSV).unwrap();
        let config = write_config(
            dir.path(),
            r#"{"cpuid": {"header_path": "cpuid_case.h", "sources": [
                {"csv_path": "cpuid.csv", "vtype": "Virtualization Type",
                 "vdetail": "Virtualization Details"}]}}"#,
        );

        let header = generate(CaseKind::Cpuid, &config).unwrap();

        assert_eq!(header.entries, 2);
        assert_eq!(
            header.lines,
            vec![
                "void initial_cpuid(void) {",
                "\n\t// Leaf 1",
                "\tEXP_CPUID_BIT(1, 0x0, ecx, 25, 1, VER1_0);\t//AESNI",
                "}",
            ]
        );
        assert!(header.render().starts_with("#define AUTOGEN_CPUID\n"));
        assert!(!dir.path().join("cpuid_case.h").exists());
    }

    #[test]
    fn failed_pass_does_not_block_the_other() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpuid.csv"), CPUID_CSV).unwrap();
        let config = write_config(
            dir.path(),
            r#"{"cpuid": {"header_path": "cpuid_case.h", "sources": [
                    {"csv_path": "cpuid.csv", "vtype": "Virtualization Type",
                     "vdetail": "Virtualization Details"}]},
                "msr": {"header_path": "msr_case.h", "precondition_header": "missing.h",
                        "sources": [{"csv_path": "msr.csv", "rdname": "R", "wrname": "W"}]}}"#,
        );

        let results = run(&config, &config.kinds(), true);

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(GenerateError::Precondition(PreconditionError::Io { .. }))
        ));
        assert!(dir.path().join("cpuid_case.h").exists());
        assert!(!dir.path().join("msr_case.h").exists());
    }

    #[test]
    fn missing_second_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cpuid.csv"), CPUID_CSV).unwrap();
        let config = write_config(
            dir.path(),
            r#"{"cpuid": {"header_path": "cpuid_case.h", "sources": [
                {"csv_path": "cpuid.csv", "vtype": "Virtualization Type",
                 "vdetail": "Virtualization Details"},
                {"csv_path": "gone.csv", "vtype": "Virtualization Type",
                 "vdetail": "Virtualization Details"}]}}"#,
        );

        let results = run(&config, &[CaseKind::Cpuid], true);

        assert!(matches!(
            results[0].1,
            Err(GenerateError::SpecRead(SpecReadError::Io { .. }))
        ));
        assert!(!dir.path().join("cpuid_case.h").exists());
    }
}
