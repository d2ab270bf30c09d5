use std::fmt;

/// Token written for "no exception expected".
pub const NO_EXCEPTION_TOKEN: &str = "NO_EXCP";
/// Token written when a case has no precondition hook.
pub const NO_PRECONDITION_TOKEN: &str = "NO_PRE_COND";

/// Trap raised by a virtualized MSR access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TrapKind {
    /// General protection fault, `#GP(0)`.
    Gp,
    /// Virtualization exception, `#VE`.
    Ve,
}

impl TrapKind {
    /// Trap number constant used by the compliance module.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Gp => "X86_TRAP_GP",
            Self::Ve => "X86_TRAP_VE",
        }
    }
}

/// What the guest should observe when it performs an MSR access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExceptionOutcome {
    /// The access completes natively.
    NoException,
    /// The access always traps.
    FixedTrap(TrapKind),
    /// The access traps when the named precondition hook says so.
    PreconditionTrap(TrapKind, String),
}

impl ExceptionOutcome {
    /// The trap kind, if the access can trap at all.
    #[must_use]
    pub const fn trap(&self) -> Option<TrapKind> {
        match self {
            Self::NoException => None,
            Self::FixedTrap(kind) | Self::PreconditionTrap(kind, _) => Some(*kind),
        }
    }

    /// The precondition hook name, if the trap is contingent.
    #[must_use]
    pub fn precondition(&self) -> Option<&str> {
        match self {
            Self::PreconditionTrap(_, name) => Some(name),
            _ => None,
        }
    }

    /// Trap argument as written into a case declaration.
    #[must_use]
    pub const fn trap_token(&self) -> &'static str {
        match self.trap() {
            Some(kind) => kind.token(),
            None => NO_EXCEPTION_TOKEN,
        }
    }

    /// Precondition argument as written into a case declaration.
    #[must_use]
    pub fn precondition_token(&self) -> &str {
        self.precondition().unwrap_or(NO_PRECONDITION_TOKEN)
    }
}

impl fmt::Display for ExceptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoException => f.write_str("native"),
            Self::FixedTrap(kind) => write!(f, "{}", kind.token()),
            Self::PreconditionTrap(kind, name) => write!(f, "{} if {name}", kind.token()),
        }
    }
}

/// Direction of an MSR access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// `RDMSR`
    Read,
    /// `WRMSR`
    Write,
}

impl Direction {
    /// Both directions in emission order.
    pub const BOTH: [Self; 2] = [Self::Read, Self::Write];

    /// Declaration macro for this direction (without the `_SIZE` suffix).
    #[must_use]
    pub const fn macro_name(self) -> &'static str {
        match self {
            Self::Read => "DEF_READ_MSR",
            Self::Write => "DEF_WRITE_MSR",
        }
    }

    /// Sort rank; reads come before writes.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Read => 0,
            Self::Write => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_match_compliance_module_constants() {
        assert_eq!(ExceptionOutcome::NoException.trap_token(), "NO_EXCP");
        assert_eq!(
            ExceptionOutcome::FixedTrap(TrapKind::Gp).trap_token(),
            "X86_TRAP_GP"
        );
        assert_eq!(
            ExceptionOutcome::FixedTrap(TrapKind::Ve).trap_token(),
            "X86_TRAP_VE"
        );
    }

    #[test]
    fn precondition_token_defaults_to_no_pre_cond() {
        assert_eq!(
            ExceptionOutcome::FixedTrap(TrapKind::Gp).precondition_token(),
            "NO_PRE_COND"
        );
        let contingent = ExceptionOutcome::PreconditionTrap(TrapKind::Ve, "pre_pks".into());
        assert_eq!(contingent.precondition_token(), "pre_pks");
        assert_eq!(contingent.trap(), Some(TrapKind::Ve));
    }

    #[test]
    fn reads_rank_before_writes() {
        assert!(Direction::Read.rank() < Direction::Write.rank());
        assert_eq!(Direction::Write.macro_name(), "DEF_WRITE_MSR");
    }
}
