//! SQLite implementation of the store, in memory or file backed

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use crate::config::Backend;
use crate::error::Result;
use crate::storage::schema::{self, SYMBOL_TABLE};
use crate::storage::{Cell, FactRow, RelationalStore, ResultSet, SymbolTable};

/// Store owning one SQLite connection for the whole run
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the configured backend; foreign keys are enforced
    pub fn open(backend: &Backend) -> Result<Self> {
        let conn = match backend {
            Backend::Memory => Connection::open_in_memory()?,
            Backend::File(path) => Connection::open(path)?,
        };
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        tracing::info!("Opened {} store", backend);
        Ok(Self { conn })
    }

    /// In-memory store with the schema already created
    pub fn in_memory() -> Result<Self> {
        let mut store = Self::open(&Backend::Memory)?;
        store.bootstrap()?;
        Ok(store)
    }
}

impl RelationalStore for SqliteStore {
    fn bootstrap(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for statement in schema::create_statements() {
            tx.execute(&statement, [])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        // fact rows reference symbols
        for arity in 0..=schema::MAX_ARITY {
            tx.execute(&format!("DELETE FROM {}", schema::fact_table(arity)), [])?;
        }
        tx.execute(&format!("DELETE FROM {}", SYMBOL_TABLE), [])?;
        tx.commit()?;
        Ok(())
    }

    fn insert_symbols(&mut self, symbols: &SymbolTable) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (id, symbol, arity) VALUES (?1, ?2, ?3)",
                SYMBOL_TABLE
            ))?;
            for (symbol, id) in symbols.iter() {
                stmt.execute(params![id.0, symbol.text(), symbol.arity() as i64])?;
            }
        }
        tx.commit()?;
        tracing::debug!("Committed {} symbols", symbols.len());
        Ok(symbols.len())
    }

    fn insert_facts(&mut self, rows: &[FactRow]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for row in rows {
            let mut stmt = tx.prepare_cached(&schema::insert_fact_statement(row.arity()))?;
            let values = std::iter::once(row.functor.0).chain(row.args.iter().map(|id| id.0));
            stmt.execute(params_from_iter(values))?;
        }
        tx.commit()?;
        tracing::debug!("Committed {} fact rows", rows.len());
        Ok(rows.len())
    }

    fn query(&self, sql: &str, params: &[String]) -> Result<ResultSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut result = ResultSet {
            columns,
            rows: Vec::new(),
        };
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let cell = match row.get::<_, Value>(i)? {
                    Value::Null => Cell::Null,
                    Value::Integer(v) => Cell::Integer(v),
                    Value::Real(v) => Cell::Real(v),
                    Value::Text(v) => Cell::Text(v),
                    Value::Blob(v) => Cell::Text(String::from_utf8_lossy(&v).into_owned()),
                };
                cells.push(cell);
            }
            result.rows.push(cells);
        }
        Ok(result)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
