//! CLI entry point for the `tdx-casegen` binary.

use std::path::{Path, PathBuf};
use std::process;

use casegen::config::RunConfig;
use casegen::pipeline::{collect_cpuid, collect_msr, run};
use casegen::precondition::{KnownPreconditions, PreconditionMap, PreconditionResolver};
use clap::{Parser, Subcommand};
use csv as _;
use compliance_model::CaseKind;
use env_logger::{Builder, Env};
use log as _;
use regex as _;
use serde as _;
use thiserror as _;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;

#[derive(Debug, Parser)]
#[command(
    name = "tdx-casegen",
    version,
    about = "Generate TDX CPUID and MSR compliance cases from specification tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Generate header artifacts for every configured kind.
    Generate {
        /// Run configuration.
        #[arg(short, long, value_name = "PATH", default_value = "config.json")]
        config: PathBuf,
        /// Generate only this kind (cpuid or msr).
        #[arg(long)]
        only: Option<CaseKind>,
        /// Print headers to stdout instead of writing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print fused, sorted entries of one kind as JSON.
    Dump {
        /// Run configuration.
        #[arg(short, long, value_name = "PATH", default_value = "config.json")]
        config: PathBuf,
        /// Kind to dump (cpuid or msr).
        #[arg(long)]
        kind: CaseKind,
    },
    /// List precondition hooks and map entries naming unknown hooks.
    Preconditions {
        /// C source declaring `static void pre_x(struct test_msr *c)` hooks.
        #[arg(long, value_name = "PATH")]
        header: PathBuf,
        /// Precondition map to check against the header.
        #[arg(long, value_name = "PATH")]
        map: Option<PathBuf>,
    },
}

fn load_config(path: &Path) -> Result<RunConfig, i32> {
    RunConfig::load(path).map_err(|e| {
        eprintln!("error: {e}");
        1
    })
}

fn run_generate(config: &Path, only: Option<CaseKind>, dry_run: bool) -> Result<(), i32> {
    let config = load_config(config)?;
    let kinds = only.map_or_else(|| config.kinds(), |kind| vec![kind]);
    if kinds.is_empty() {
        eprintln!(
            "error: {} has no `cpuid` or `msr` section",
            config.path().display()
        );
        return Err(1);
    }

    let mut failed = false;
    for (kind, result) in run(&config, &kinds, !dry_run) {
        match result {
            Ok(header) => {
                let summary = format!(
                    "{kind}: {} entries, {} rows skipped -> {}",
                    header.entries,
                    header.skipped.len(),
                    header.path.display()
                );
                if dry_run {
                    print!("{}", header.render());
                    eprintln!("{summary}");
                } else {
                    println!("{summary}");
                }
            }
            Err(e) => {
                eprintln!("error: {kind}: {e}");
                failed = true;
            }
        }
    }

    if failed {
        Err(1)
    } else {
        Ok(())
    }
}

fn run_dump(config: &Path, kind: CaseKind) -> Result<(), i32> {
    let config = load_config(config)?;
    let json = match kind {
        CaseKind::Cpuid => {
            collect_cpuid(&config).map(|out| serde_json::to_string_pretty(&out.entries))
        }
        CaseKind::Msr => collect_msr(&config).map(|out| serde_json::to_string_pretty(&out.entries)),
    };
    match json {
        Ok(Ok(text)) => {
            println!("{text}");
            Ok(())
        }
        Ok(Err(e)) => {
            eprintln!("error: failed to serialize {kind} entries: {e}");
            Err(1)
        }
        Err(e) => {
            eprintln!("error: {kind}: {e}");
            Err(1)
        }
    }
}

fn run_preconditions(header: &Path, map: Option<&Path>) -> Result<(), i32> {
    let known = KnownPreconditions::load(header).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    for name in known.iter() {
        println!("{name}");
    }

    let Some(map) = map else {
        return Ok(());
    };
    let map = PreconditionMap::load(map).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let resolver = PreconditionResolver::new(map, known);
    let mut dangling = 0usize;
    for (description, hook) in resolver.dangling() {
        eprintln!("dangling: '{description}' -> {hook}");
        dangling += 1;
    }
    if dangling == 0 {
        Ok(())
    } else {
        eprintln!("error: {dangling} map entries name undeclared hooks");
        Err(1)
    }
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Generate {
            config,
            only,
            dry_run,
        } => run_generate(config, *only, *dry_run),
        Command::Dump { config, kind } => run_dump(config, *kind),
        Command::Preconditions { header, map } => run_preconditions(header, map.as_deref()),
    };

    process::exit(match result {
        Ok(()) => 0,
        Err(code) => code,
    });
}
