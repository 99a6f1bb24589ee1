//! Executor: the whole pipeline from source text to answers
//!
//! parse → bootstrap → materialize → resolve rules → run each query.
//! Fatal errors stop the run; per-query errors become that query's answer.

pub mod output;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::compile::{CompiledQuery, ParamKey, ParamOwner, PatternCompiler, ResolutionReport, RuleResolver};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::program::{parse_program, Program, Query};
use crate::storage::{materialize, RelationalStore, SqliteStore};

/// Result of one query
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "answer", rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
    /// Bindings of the free variables, one row per solution
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Error {
        message: String,
    },
}

impl Answer {
    fn failed(err: &Error) -> Self {
        Answer::Error {
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(flatten)]
    pub answer: Answer,
}

/// Everything a run produced
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    pub symbols: usize,
    pub facts: usize,
    pub resolution: ResolutionReport,
    pub queries: Vec<QueryOutcome>,
}

/// Runs programs against a store
pub struct Executor<S: RelationalStore> {
    store: S,
    config: Config,
}

impl Executor<SqliteStore> {
    /// Executor over the SQLite backend named by the configuration
    pub fn open(config: Config) -> Result<Self> {
        let store = SqliteStore::open(&config.backend)?;
        Ok(Executor { store, config })
    }
}

impl<S: RelationalStore> Executor<S> {
    pub fn with_store(store: S, config: Config) -> Self {
        Executor { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse and run a source text
    pub fn run(&mut self, source: &str) -> Result<Report> {
        let program = parse_program(source)?;
        self.run_program(&program)
    }

    /// Run an already parsed program; the store is rebuilt from it
    pub fn run_program(&mut self, program: &Program) -> Result<Report> {
        self.store.bootstrap()?;
        self.store.clear()?;
        let symbols = materialize(&mut self.store, program)?;

        let mut compiler = PatternCompiler::new(program, &symbols, self.config.body_policy);
        let resolution = RuleResolver::new(self.config.max_passes).resolve(&mut compiler)?;

        let mut queries = Vec::with_capacity(program.queries().len());
        let mut used: BTreeSet<String> = BTreeSet::new();
        for query in program.queries() {
            queries.push(self.execute(&mut compiler, query, &mut used)?);
        }

        for name in self.config.params.keys() {
            if !used.contains(name) {
                tracing::warn!(param = %name, "Dropping extraneous binding: no query references it");
            }
        }

        tracing::info!("Executed {} queries", queries.len());
        Ok(Report {
            symbols: symbols.len(),
            facts: program.facts().len(),
            resolution,
            queries,
        })
    }

    /// Compile and run one query; only fatal errors escape
    fn execute(
        &self,
        compiler: &mut PatternCompiler<'_>,
        query: &Query,
        used: &mut BTreeSet<String>,
    ) -> Result<QueryOutcome> {
        let mut outcome = QueryOutcome {
            query: query.text().to_string(),
            sql: None,
            answer: Answer::No,
        };

        let compiled = match compiler.compile_query(query) {
            Ok(compiled) => compiled,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                tracing::warn!(query = %query.text(), "Query failed: {}", err);
                outcome.answer = Answer::failed(&err);
                return Ok(outcome);
            }
        };

        let rendered = compiled.fragment.render();
        tracing::debug!(query = %query.text(), sql = %rendered.sql, "Compiled query");
        if self.config.show_sql {
            outcome.sql = Some(rendered.sql.clone());
        }

        if compiled.unsatisfiable {
            outcome.answer = empty_answer(&compiled);
            return Ok(outcome);
        }

        let values = match self.bind(&compiled, &rendered.params, used) {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(query = %query.text(), "Query failed: {}", err);
                outcome.answer = Answer::failed(&err);
                return Ok(outcome);
            }
        };

        let result = self.store.query(&rendered.sql, &values)?;
        outcome.answer = if compiled.fragment.is_existence() {
            let holds = result
                .rows
                .first()
                .and_then(|row| row.first())
                .map(|cell| cell.is_truthy())
                .unwrap_or(false);
            if holds {
                Answer::Yes
            } else {
                Answer::No
            }
        } else {
            Answer::Rows {
                columns: compiled.fragment.columns().to_vec(),
                rows: result
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                    .collect(),
            }
        };
        Ok(outcome)
    }

    /// Values for the positional parameters, in order
    fn bind(
        &self,
        compiled: &CompiledQuery,
        params: &[ParamKey],
        used: &mut BTreeSet<String>,
    ) -> Result<Vec<String>> {
        for key in compiled.bindings.keys() {
            if !params.contains(key) {
                tracing::warn!(param = %key, "Dropping extraneous binding");
            }
        }

        params
            .iter()
            .map(|key| {
                let value = match &key.owner {
                    ParamOwner::Rule(_) => compiled.bindings.get(key).cloned(),
                    ParamOwner::External => {
                        used.insert(key.name.clone());
                        self.config.params.get(&key.name).cloned()
                    }
                };
                value.ok_or_else(|| Error::MissingBinding(key.to_string()))
            })
            .collect()
    }
}

fn empty_answer(compiled: &CompiledQuery) -> Answer {
    if compiled.fragment.is_existence() {
        Answer::No
    } else {
        Answer::Rows {
            columns: compiled.fragment.columns().to_vec(),
            rows: Vec::new(),
        }
    }
}

/// Run `source` with `config` on a fresh SQLite store
pub fn run(source: &str, config: Config) -> Result<Report> {
    Executor::open(config)?.run(source)
}
