//! End-to-end generation over specification fixtures.

use std::fs;
use std::path::Path;

use casegen::config::RunConfig;
use casegen::errors::{GenerateError, SkipReason, SpecReadError};
use casegen::pipeline::{collect_msr, generate, run};
use compliance_model::{CaseKind, Direction};

use clap as _;
use csv as _;
use env_logger as _;
use log as _;
use proptest as _;
use regex as _;
use rstest as _;
use serde as _;
use serde_json as _;
use thiserror as _;

const CPUID_1_0: &str = "\
TDX CPUID Virtualization,,,,,,
Field Name,Reg.,MSB,LSB,Field Size,Virtualization Type,Virtualization Details
Leaf 0x1,,,,,,
SSE3,ECX,0,0,1,Fixed,1
x2APIC,ECX,21,21,1,Configured,
AESNI,ECX,25,25,1,Fixed,1
\"Leaf 0x7, Sub-Leaf 0x0\",,,,,,
MaxSubLeaf,EAX,31,0,32,Fixed,0x2
Reserved_31_24,EDX,31,24,8,Fixed,0x0
";

const CPUID_1_5: &str = "\
Field Name,Reg.,MSB,LSB,Field Size,Virtualization Type,Virtualization Details (1.5)
\"Leaf 0x7, Sub-Leaf 0x0\",,,,,,
MaxSubLeaf,EAX,31,0,32,Fixed,0x1
Leaf 0x1,,,,,,
SSE3,ECX,0,0,1,Fixed,1
";

const MSR_CSV: &str = "\
MSR Architectural Name,First (H),Last (H),Size (H),On RDMSR,On WRMSR
IA32_TIME_STAMP_COUNTER,10,10,1,Native,Native
IA32_ARCH_CAPABILITIES,10A,10A,1,Native,#GP(0)
Reserved,11,11,1,#GP(0),#GP(0)
IA32_PKRS,6E1,6E1,1,\"Inject_GP_or_VE(CPUID(0x7,0x0).ecx[31])\",Inject_GP(not_in_vmx_root)
IA32_MTRR_PHYSBASE0,200,213,14,#VE,#VE
Any MSR not listed,Default,,,#VE,#VE
";

const PRE_CONDITION_H: &str = "\
static void pre_pks(struct test_msr *c)
{
\tc->excp.expect = X86_TRAP_GP;
}
";

const PRECONDITIONS_JSON: &str = r#"{ "CPUID(0x7,0x0).ecx[31]": "pre_pks" }"#;

const CONFIG: &str = r#"{
    "cpuid": {
        "header_path": "cpuid_case.h",
        "sources": [
            { "csv_path": "cpuid_1_0.csv", "bias": 1,
              "vtype": "Virtualization Type", "vdetail": "Virtualization Details" },
            { "csv_path": "cpuid_1_5.csv", "version": "1.5",
              "vtype": "Virtualization Type",
              "vdetail": ["Virtualization Details", "Virtualization Details (1.5)"] }
        ]
    },
    "msr": {
        "header_path": "msr_case.h",
        "prepath": "preconditions.json",
        "precondition_header": "pre_condition.h",
        "sources": [
            { "csv_path": "msr.csv", "rdname": "On RDMSR", "wrname": "On WRMSR" }
        ]
    }
}"#;

const EXPECTED_CPUID: &str = "\
#define AUTOGEN_CPUID
void initial_cpuid(void) {
\tEXP_CPUID_BIT(0x1, 0x0, ecx, 0, 1, VER1_0 | VER1_5);\t//SSE3
\tEXP_CPUID_BIT(0x1, 0x0, ecx, 25, 1, VER1_0);\t//AESNI

\t// Leaf 0x1
\tEXP_CPUID_BYTE(0x7, 0x0, eax, 0x2 | 0x1, VER1_0 | VER1_5);\t//MaxSubLeaf
\tEXP_CPUID_RES_BITS(0x7, 0x0, edx, 24, 31, VER1_0);\t//Reserved_31_24

\t// Leaf 0x7, Sub-Leaf 0x0
}
";

const EXPECTED_MSR: &str = "\
#define AUTOGEN_MSR
struct test_msr msr_cases[] = {
\tDEF_READ_MSR(\"IA32_TIME_STAMP_COUNTER\", 0x10, NO_EXCP, NO_PRE_COND, VER1_0),
\tDEF_WRITE_MSR(\"IA32_TIME_STAMP_COUNTER\", 0x10, NO_EXCP, NO_PRE_COND, VER1_0),
\tDEF_READ_MSR(\"IA32_ARCH_CAPABILITIES\", 0x10a, NO_EXCP, NO_PRE_COND, VER1_0),
\tDEF_WRITE_MSR(\"IA32_ARCH_CAPABILITIES\", 0x10a, X86_TRAP_GP, NO_PRE_COND, VER1_0),
\tDEF_READ_MSR(\"IA32_PKRS\", 0x6e1, X86_TRAP_VE, pre_pks, VER1_0),
\tDEF_READ_MSR_SIZE(\"IA32_MTRR_PHYSBASE0\", 0x200, X86_TRAP_VE, NO_PRE_COND, 0x14, VER1_0),
\tDEF_WRITE_MSR_SIZE(\"IA32_MTRR_PHYSBASE0\", 0x200, X86_TRAP_VE, NO_PRE_COND, 0x14, VER1_0),
};
";

fn fixture(dir: &Path) -> RunConfig {
    for (name, content) in [
        ("cpuid_1_0.csv", CPUID_1_0),
        ("cpuid_1_5.csv", CPUID_1_5),
        ("msr.csv", MSR_CSV),
        ("pre_condition.h", PRE_CONDITION_H),
        ("preconditions.json", PRECONDITIONS_JSON),
        ("config.json", CONFIG),
    ] {
        fs::write(dir.join(name), content).unwrap();
    }
    RunConfig::load(&dir.join("config.json")).unwrap()
}

#[test]
fn two_cpuid_sources_fuse_into_one_sorted_header() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());

    let header = generate(CaseKind::Cpuid, &config).unwrap();

    assert_eq!(header.render(), EXPECTED_CPUID);
    assert_eq!(header.skipped.len(), 1);
    assert_eq!(
        header.skipped[0].reason,
        SkipReason::UnsupportedVirtType("Configured".into())
    );
    assert_eq!(header.skipped[0].line, 5);
}

#[test]
fn msr_header_keeps_row_order_and_drops_unresolved_directions() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());

    let header = generate(CaseKind::Msr, &config).unwrap();

    assert_eq!(header.render(), EXPECTED_MSR);
    let reasons: Vec<&SkipReason> = header.skipped.iter().map(|s| &s.reason).collect();
    assert_eq!(reasons.len(), 3);
    assert_eq!(reasons[0], &SkipReason::Reserved);
    assert!(matches!(
        reasons[1],
        SkipReason::Unresolved {
            direction: Direction::Write,
            ..
        }
    ));
    assert_eq!(reasons[2], &SkipReason::DefaultRow);
}

#[test]
fn run_writes_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());

    let results = run(&config, &config.kinds(), true);

    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(
        fs::read_to_string(dir.path().join("cpuid_case.h")).unwrap(),
        EXPECTED_CPUID
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("msr_case.h")).unwrap(),
        EXPECTED_MSR
    );
}

#[test]
fn regeneration_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());

    assert!(run(&config, &config.kinds(), true).iter().all(|(_, r)| r.is_ok()));
    let first = fs::read(dir.path().join("cpuid_case.h")).unwrap();
    assert!(run(&config, &config.kinds(), true).iter().all(|(_, r)| r.is_ok()));
    let second = fs::read(dir.path().join("cpuid_case.h")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn broken_cpuid_source_leaves_msr_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    fs::write(
        dir.path().join("cpuid_1_5.csv"),
        "Field Name,Reg.,MSB,LSB,Field Size,Virtualization Type,Virtualization Details\n\
         Leaf 0x1,,,,,,\nSSE3,ECX,zero,0,1,Fixed,1\n",
    )
    .unwrap();

    let results = run(&config, &config.kinds(), true);

    assert!(matches!(
        &results[0],
        (
            CaseKind::Cpuid,
            Err(GenerateError::SpecRead(SpecReadError::InvalidCell { line: 3, .. }))
        )
    ));
    assert!(results[1].1.is_ok());
    assert!(!dir.path().join("cpuid_case.h").exists());
    assert!(dir.path().join("msr_case.h").exists());
}

#[test]
fn missing_column_names_the_column() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    fs::write(
        dir.path().join("msr.csv"),
        "MSR Architectural Name,First (H),Last (H),On RDMSR,On WRMSR\n",
    )
    .unwrap();

    let err = collect_msr(&config).unwrap_err();

    assert!(err.to_string().contains("missing column 'Size (H)'"));
}

#[test]
fn unknown_precondition_everywhere_yields_empty_msr_array() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    fs::write(
        dir.path().join("msr.csv"),
        "MSR Architectural Name,First (H),Last (H),Size (H),On RDMSR,On WRMSR\n\
         IA32_VMX_BASIC,480,480,1,Inject_GP(not_in_vmx_root),Inject_GP(not_in_vmx_root)\n",
    )
    .unwrap();

    let header = generate(CaseKind::Msr, &config).unwrap();

    assert_eq!(header.entries, 0);
    assert_eq!(
        header.render(),
        "#define AUTOGEN_MSR\nstruct test_msr msr_cases[] = {\n};\n"
    );
}
