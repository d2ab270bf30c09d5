//! Generator of TDX CPUID and MSR compliance test cases.
//!
//! Specification tables (CSV exports) are turned into C header files that the
//! compliance module compiles in. See [`pipeline::run`] for the entry point.

use clap as _;
use env_logger as _;

/// Shared build, fuse, sort and render contract.
pub mod builder;
/// Run configuration loading.
pub mod config;
/// CPUID case builder.
pub mod cpuid;
/// Header artifact output.
pub mod emitter;
/// Fatal errors and skip reasons.
pub mod errors;
/// Multi-source fusion and ordering.
pub mod fusion;
/// Leaf and sub-leaf parsing.
pub mod leaf;
/// MSR case builder.
pub mod msr;
/// Generation passes.
pub mod pipeline;
/// MSR description classification.
pub mod precondition;
/// CSV specification tables.
pub mod table;
