//! Run configuration.
//!
//! A run configuration is one JSON object keyed by case kind:
//! ```json
//! {
//!   "cpuid": { "header_path": "cpuid_case.h",
//!              "sources": [{ "csv_path": "cpuid.csv", "bias": 1,
//!                            "vtype": "Virtualization Type",
//!                            "vdetail": ["Virtualization Details"] }] },
//!   "msr":   { "header_path": "msr_case.h", "prepath": "preconditions.json",
//!              "precondition_header": "pre_condition.h",
//!              "sources": [{ "csv_path": "msr.csv",
//!                            "rdname": "On RDMSR", "wrname": "On WRMSR",
//!                            "version": "1.5" }] }
//! }
//! ```
//! Each section is decoded on demand, so a broken `msr` section does not
//! prevent CPUID generation. Relative paths are resolved against the
//! directory holding the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use compliance_model::CaseKind;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::errors::ConfigError;

/// Default field-name column of CPUID tables.
pub const DEFAULT_FIELD_NAME: &str = "Field Name";
/// Default specification version.
pub const DEFAULT_VERSION: &str = "1.0";

/// A loaded run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    path: PathBuf,
    base_dir: PathBuf,
    sections: Map<String, Value>,
}

impl RunConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or not a JSON
    /// object.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(path, &text)
    }

    /// Parses configuration text as if read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not a JSON object.
    pub fn from_json(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let sections: Map<String, Value> =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            base_dir,
            sections,
        })
    }

    /// Path the configuration was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Case kinds that have a section, in generation order.
    #[must_use]
    pub fn kinds(&self) -> Vec<CaseKind> {
        CaseKind::ALL
            .into_iter()
            .filter(|kind| self.sections.contains_key(kind.config_key()))
            .collect()
    }

    /// Decodes the `cpuid` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the section is missing, malformed or
    /// lists no sources.
    pub fn cpuid(&self) -> Result<CpuidConfig, ConfigError> {
        let mut config: CpuidConfig = self.section(CaseKind::Cpuid)?;
        config.validate()?;
        config.header_path = self.resolve(&config.header_path);
        for source in &mut config.sources {
            source.csv_path = self.resolve(&source.csv_path);
        }
        Ok(config)
    }

    /// Decodes the `msr` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the section is missing, malformed or
    /// lists no sources.
    pub fn msr(&self) -> Result<MsrConfig, ConfigError> {
        let mut config: MsrConfig = self.section(CaseKind::Msr)?;
        config.validate()?;
        config.header_path = self.resolve(&config.header_path);
        config.precondition_header = self.resolve(&config.precondition_header);
        config.prepath = config.prepath.map(|p| self.resolve(&p));
        for source in &mut config.sources {
            source.csv_path = self.resolve(&source.csv_path);
        }
        Ok(config)
    }

    /// Resolves a configured path against the configuration's directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn section<T: DeserializeOwned>(&self, kind: CaseKind) -> Result<T, ConfigError> {
        let value = self
            .sections
            .get(kind.config_key())
            .ok_or(ConfigError::MissingSection(kind))?;
        T::deserialize(value).map_err(|e| ConfigError::InvalidSection {
            kind,
            message: e.to_string(),
        })
    }
}

/// The `cpuid` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CpuidConfig {
    /// Output header path.
    pub header_path: PathBuf,
    /// Specification sources in fusion order.
    pub sources: Vec<CpuidSource>,
}

impl CpuidConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources(CaseKind::Cpuid));
        }
        for (i, source) in self.sources.iter().enumerate() {
            require_candidates(CaseKind::Cpuid, i, "vtype", &source.vtype)?;
            require_candidates(CaseKind::Cpuid, i, "vdetail", &source.vdetail)?;
        }
        Ok(())
    }
}

/// One CPUID specification source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CpuidSource {
    /// CSV export of the specification table.
    pub csv_path: PathBuf,
    /// Records preceding the header record.
    #[serde(default, deserialize_with = "row_count")]
    pub bias: usize,
    /// Field-name column.
    #[serde(default = "default_field_name")]
    pub fname: String,
    /// Virtualization type column candidates.
    #[serde(deserialize_with = "one_or_many")]
    pub vtype: Vec<String>,
    /// Virtualization detail column candidates.
    #[serde(deserialize_with = "one_or_many")]
    pub vdetail: Vec<String>,
    /// Specification version, e.g. `1.0`.
    #[serde(default = "default_version", deserialize_with = "version_text")]
    pub version: String,
}

/// The `msr` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MsrConfig {
    /// Output header path.
    pub header_path: PathBuf,
    /// Precondition map (description → hook name); absent means empty.
    #[serde(default)]
    pub prepath: Option<PathBuf>,
    /// C source declaring the precondition hooks.
    pub precondition_header: PathBuf,
    /// Specification sources in fusion order.
    pub sources: Vec<MsrSource>,
}

impl MsrConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources(CaseKind::Msr));
        }
        for (i, source) in self.sources.iter().enumerate() {
            require_candidates(CaseKind::Msr, i, "rdname", &source.rdname)?;
            require_candidates(CaseKind::Msr, i, "wrname", &source.wrname)?;
        }
        Ok(())
    }
}

/// One MSR specification source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MsrSource {
    /// CSV export of the specification table.
    pub csv_path: PathBuf,
    /// Records preceding the header record.
    #[serde(default, deserialize_with = "row_count")]
    pub bias: usize,
    /// Read description column candidates.
    #[serde(alias = "rdnmae", deserialize_with = "one_or_many")]
    pub rdname: Vec<String>,
    /// Write description column candidates.
    #[serde(deserialize_with = "one_or_many")]
    pub wrname: Vec<String>,
    /// Specification version, e.g. `1.5`.
    #[serde(default = "default_version", deserialize_with = "version_text")]
    pub version: String,
}

fn require_candidates(
    kind: CaseKind,
    index: usize,
    key: &str,
    candidates: &[String],
) -> Result<(), ConfigError> {
    if candidates.iter().any(|c| !c.trim().is_empty()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSection {
            kind,
            message: format!("source {index}: `{key}` names no column"),
        })
    }
}

fn default_field_name() -> String {
    DEFAULT_FIELD_NAME.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(serde_json::Number),
    Text(String),
}

fn row_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let text = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n.to_string(),
        NumberOrText::Text(s) => s,
    };
    text.trim()
        .parse()
        .map_err(|_| D::Error::custom(format!("`bias` must be a row count, got '{text}'")))
}

fn version_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n.to_string(),
        NumberOrText::Text(s) => s,
    })
}
