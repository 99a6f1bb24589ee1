//! Error types for the compiler pipeline

use thiserror::Error;

use crate::program::{ParseError, RuleKey};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error("Arity mismatch: {functor}/{found} used, but {functor} is defined with arity {expected:?}")]
    ArityMismatch {
        functor: String,
        found: usize,
        expected: Vec<usize>,
    },

    #[error("Unknown relation: {functor}/{arity}")]
    UnknownRelation { functor: String, arity: usize },

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Unsupported arity {arity} for fact {functor} (max {max})")]
    UnsupportedArity {
        functor: String,
        arity: usize,
        max: usize,
    },

    #[error("Unsupported rule cascade: rule {rule} references {reference}, which is neither a fact relation nor a resolvable rule")]
    UnsupportedRuleCascade { rule: RuleKey, reference: String },

    #[error("Recursive rule depth passed after {passes} passes, check for circular dependencies between rules: {pending:?}")]
    CyclicRuleDependency { passes: usize, pending: Vec<String> },

    #[error("Rule {rule} failed to compile: {reason}")]
    RuleFailed { rule: RuleKey, reason: String },

    #[error("Required parameter {0} missing at execution")]
    MissingBinding(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must stop the whole run rather than a single query or rule
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Syntax(_)
                | Error::UnsupportedArity { .. }
                | Error::UnsupportedRuleCascade { .. }
                | Error::CyclicRuleDependency { .. }
                | Error::Storage(_)
                | Error::Io(_)
                | Error::Config(_)
        )
    }
}
