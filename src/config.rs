//! Run configuration: backend, rule resolution bounds, output and parameters

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on rule resolution passes
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Where the relational store lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    File(PathBuf),
}

impl FromStr for Backend {
    type Err = std::convert::Infallible;

    /// `memory` (or `:memory:`) selects the in-memory store, anything else is a file path
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "memory" | ":memory:" => Backend::Memory,
            path => Backend::File(PathBuf::from(path.strip_prefix("sqlite:").unwrap_or(path))),
        })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "in-memory"),
            Backend::File(path) => write!(f, "file {:?}", path),
        }
    }
}

/// How the clauses of a rule body (or query) combine into one fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPolicy {
    /// Every clause joins on shared variables
    #[default]
    JoinAll,
    /// Only the first clause is compiled
    FirstClause,
}

/// Result rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (expected text or json)", other)),
        }
    }
}

/// Configuration for one compilation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub max_passes: usize,
    pub body_policy: BodyPolicy,
    pub output: OutputFormat,
    /// Values for `:name` parameters in queries
    pub params: BTreeMap<String, String>,
    /// Emit generated SQL with the results
    pub show_sql: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            max_passes: DEFAULT_MAX_PASSES,
            body_policy: BodyPolicy::JoinAll,
            output: OutputFormat::Text,
            params: BTreeMap::new(),
            show_sql: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }

    pub fn body_policy(mut self, policy: BodyPolicy) -> Self {
        self.body_policy = policy;
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn show_sql(mut self, show: bool) -> Self {
        self.show_sql = show;
        self
    }
}
