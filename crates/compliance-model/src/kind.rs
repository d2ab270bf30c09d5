use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A family of generated test cases. Each kind is generated independently
/// and lands in its own header artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CaseKind {
    /// CPUID leaf/sub-leaf bit-field expectations.
    Cpuid,
    /// MSR read/write exception expectations.
    Msr,
}

impl CaseKind {
    /// All kinds in generation order.
    pub const ALL: [Self; 2] = [Self::Cpuid, Self::Msr];

    /// Key of this kind's section in the run configuration.
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::Cpuid => "cpuid",
            Self::Msr => "msr",
        }
    }

    /// Upper-case tag used in the `AUTOGEN_<TAG>` guard macro.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Cpuid => "CPUID",
            Self::Msr => "MSR",
        }
    }
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Returned when a case kind name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown case kind '{0}' (expected 'cpuid' or 'msr')")]
pub struct UnknownCaseKind(pub String);

impl FromStr for CaseKind {
    type Err = UnknownCaseKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpuid" => Ok(Self::Cpuid),
            "msr" => Ok(Self::Msr),
            _ => Err(UnknownCaseKind(s.to_string())),
        }
    }
}
