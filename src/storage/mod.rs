//! Relational storage: schema, symbol interning, SQLite store, materializer

pub mod schema;
pub mod symbol_table;
pub mod sqlite;
pub mod materialize;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use schema::MAX_ARITY;
pub use symbol_table::{SymbolId, SymbolTable};
pub use sqlite::SqliteStore;
pub use materialize::materialize;

/// One row of a `fact_<n>ary` relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
    pub functor: SymbolId,
    pub args: Vec<SymbolId>,
}

impl FactRow {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// A single result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Truth value of an existence column
    pub fn is_truthy(&self) -> bool {
        match self {
            Cell::Null => false,
            Cell::Integer(i) => *i != 0,
            Cell::Real(r) => *r != 0.0,
            Cell::Text(s) => !s.is_empty() && s != "0",
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Column names and rows returned by a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Backing store contract
pub trait RelationalStore {
    // === SCHEMA ===

    /// Create the symbol relation and the per-arity fact relations
    fn bootstrap(&mut self) -> Result<()>;

    /// Delete every fact and symbol row, keeping the schema
    fn clear(&mut self) -> Result<()>;

    // === WRITES (each call is one committed transaction) ===

    /// Persist every symbol of the table with its id
    fn insert_symbols(&mut self, symbols: &SymbolTable) -> Result<usize>;

    /// Persist fact rows into the relation matching their arity
    fn insert_facts(&mut self, rows: &[FactRow]) -> Result<usize>;

    // === READS ===

    /// Run a statement with positional text parameters (`?1`, `?2`, ...)
    fn query(&self, sql: &str, params: &[String]) -> Result<ResultSet>;

    /// Number of rows in a relation
    fn count_rows(&self, table: &str) -> Result<usize>;
}
