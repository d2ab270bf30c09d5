//! Classification of MSR virtualization descriptions.
//!
//! Each read/write description cell of the MSR table is reduced to an
//! [`ExceptionOutcome`]. Contingent traps (`Inject_GP(...)`) name a condition
//! in prose; the precondition map translates that prose into the name of a
//! hook function in the compliance module's `pre_condition.h`, and only hooks
//! that actually exist there are accepted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use compliance_model::{ExceptionOutcome, TrapKind};
use regex::Regex;

use crate::errors::PreconditionError;

static HOOK_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"static\s+void\s+(\w+)\s*\(\s*struct\s+test_msr\s*\*\s*c\s*\)")
        .expect("hook signature pattern")
});

/// Precondition hook names declared by the compliance module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownPreconditions(BTreeSet<String>);

impl KnownPreconditions {
    /// Harvests hook names from C source text.
    ///
    /// A hook is any `static void <name>(struct test_msr *c)` definition.
    #[must_use]
    pub fn from_source(source: &str) -> Self {
        Self(
            HOOK_SIGNATURE
                .captures_iter(source)
                .map(|c| c[1].to_string())
                .collect(),
        )
    }

    /// Reads and harvests a header file.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::Io`] when the header cannot be read.
    pub fn load(path: &Path) -> Result<Self, PreconditionError> {
        let source = fs::read_to_string(path).map_err(|e| PreconditionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_source(&source))
    }

    /// Whether `name` is a declared hook.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Hook names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no hooks were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownPreconditions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Condition prose to hook name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreconditionMap(BTreeMap<String, String>);

impl PreconditionMap {
    /// Parses a JSON object of `"description": "hook_name"` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::Parse`] when the text is not such an object.
    pub fn from_json(path: &Path, text: &str) -> Result<Self, PreconditionError> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| PreconditionError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Reads and parses a precondition map file.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError`] when the file is unreadable or invalid.
    pub fn load(path: &Path) -> Result<Self, PreconditionError> {
        let text = fs::read_to_string(path).map_err(|e| PreconditionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(path, &text)
    }

    /// Hook name for a condition description.
    #[must_use]
    pub fn get(&self, description: &str) -> Option<&str> {
        self.0.get(description).map(String::as_str)
    }

    /// `(description, hook)` pairs in description order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PreconditionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Why a description produced no outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// The description is empty.
    Empty,
    /// The description matches no known form.
    Unrecognized(String),
    /// The condition's parentheses do not balance.
    Unbalanced(String),
    /// The condition names no declared hook.
    UnknownPrecondition {
        /// The full description.
        description: String,
        /// The hook name it resolved to.
        name: String,
    },
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no description"),
            Self::Unrecognized(d) => write!(f, "unrecognized description '{d}'"),
            Self::Unbalanced(d) => write!(f, "unbalanced parentheses in '{d}'"),
            Self::UnknownPrecondition { description, name } => {
                write!(f, "unknown precondition '{name}' in '{description}'")
            }
        }
    }
}

/// Classifies descriptions against one run's precondition resources.
#[derive(Debug, Clone)]
pub struct PreconditionResolver {
    map: PreconditionMap,
    known: KnownPreconditions,
}

impl PreconditionResolver {
    /// Creates a resolver, warning about map entries that name no declared hook.
    #[must_use]
    pub fn new(map: PreconditionMap, known: KnownPreconditions) -> Self {
        let resolver = Self { map, known };
        for (description, hook) in resolver.dangling() {
            log::warn!("precondition '{description}' maps to undeclared hook '{hook}'");
        }
        resolver
    }

    /// Map entries whose hook is not declared.
    pub fn dangling(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map
            .iter()
            .filter(|(_, hook)| !self.known.contains(hook))
    }

    /// Declared hooks.
    #[must_use]
    pub const fn known(&self) -> &KnownPreconditions {
        &self.known
    }

    /// Classifies one description cell.
    ///
    /// # Errors
    ///
    /// Returns [`Unresolved`] when the description has no testable outcome;
    /// the caller drops that access direction.
    pub fn classify(&self, description: &str) -> Result<ExceptionOutcome, Unresolved> {
        let text = description.trim();
        if text.is_empty() {
            return Err(Unresolved::Empty);
        }

        if starts_with_ignore_case(text, "native") {
            Ok(ExceptionOutcome::NoException)
        } else if starts_with_ignore_case(text, "#GP(0)") {
            Ok(ExceptionOutcome::FixedTrap(TrapKind::Gp))
        } else if starts_with_ignore_case(text, "#VE") {
            Ok(ExceptionOutcome::FixedTrap(TrapKind::Ve))
        } else if starts_with_ignore_case(text, "Inject_GP(") {
            self.contingent(text, TrapKind::Gp)
        } else if starts_with_ignore_case(text, "Inject_GP_or_VE") {
            self.contingent(text, TrapKind::Ve)
        } else {
            Err(Unresolved::Unrecognized(text.to_string()))
        }
    }

    fn contingent(&self, text: &str, kind: TrapKind) -> Result<ExceptionOutcome, Unresolved> {
        let condition =
            extract_balanced(text).ok_or_else(|| Unresolved::Unbalanced(text.to_string()))?;
        let name = self.map.get(condition).unwrap_or(condition);
        if self.known.contains(name) {
            Ok(ExceptionOutcome::PreconditionTrap(kind, name.to_string()))
        } else {
            Err(Unresolved::UnknownPrecondition {
                description: text.to_string(),
                name: name.to_string(),
            })
        }
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Returns the trimmed text between the first `(` and its matching `)`.
#[must_use]
pub fn extract_balanced(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[open + 1..open + i].trim());
                }
            }
            _ => {}
        }
    }
    None
}
