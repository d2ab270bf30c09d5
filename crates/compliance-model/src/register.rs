use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One of the four CPUID output registers.
///
/// The declaration order is the canonical ordering used when sorting
/// generated cases: `eax < ebx < ecx < edx`. Entries without a register
/// (group markers) rank after all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CpuidRegister {
    /// `EAX`
    Eax,
    /// `EBX`
    Ebx,
    /// `ECX`
    Ecx,
    /// `EDX`
    Edx,
}

impl CpuidRegister {
    /// Lower-case register token as written into generated C.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eax => "eax",
            Self::Ebx => "ebx",
            Self::Ecx => "ecx",
            Self::Edx => "edx",
        }
    }

    /// Sort rank of an optional register; `None` ranks last.
    #[must_use]
    pub const fn rank(register: Option<Self>) -> u8 {
        match register {
            Some(Self::Eax) => 0,
            Some(Self::Ebx) => 1,
            Some(Self::Ecx) => 2,
            Some(Self::Edx) => 3,
            None => 4,
        }
    }
}

impl fmt::Display for CpuidRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a register cell does not name a CPUID output register.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown CPUID register '{0}'")]
pub struct UnknownRegister(pub String);

impl FromStr for CpuidRegister {
    type Err = UnknownRegister;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eax" => Ok(Self::Eax),
            "ebx" => Ok(Self::Ebx),
            "ecx" => Ok(Self::Ecx),
            "edx" => Ok(Self::Edx),
            _ => Err(UnknownRegister(s.to_string())),
        }
    }
}
