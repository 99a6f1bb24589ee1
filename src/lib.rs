//! hornsql - compiles a Prolog subset into SQL over a relational store
//!
//! # Architecture
//!
//! - **Front end**: recursive-descent parser, syntax tree, program collector
//! - **Symbols**: every `(text, arity)` pair interned once, ids in first-occurrence order
//! - **Storage**: `symbol` relation plus one `fact_<n>ary` relation per arity
//! - **Compilation**: patterns, rule bodies and queries become SQL fragments;
//!   rules are resolved in bounded passes and cached for reuse
//! - **Execution**: queries answer yes/no or rows of variable bindings
//!
//! # Usage example
//!
//! ```no_run
//! use hornsql::{run, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = run(
//!     "parent(tom, bob). parent(bob, ann).\n\
//!      grandparent(X, Z) :- parent(X, Y), parent(Y, Z).\n\
//!      ?- grandparent(tom, Who).",
//!     Config::default(),
//! )?;
//! print!("{}", hornsql::exec::output::render_text(&report));
//! # Ok(())
//! # }
//! ```

pub mod program;
pub mod storage;
pub mod compile;
pub mod exec;
pub mod config;
pub mod error;

pub use program::{parse_program, Program, ParseError};
pub use storage::{RelationalStore, SqliteStore, SymbolTable};
pub use compile::{Fragment, PatternCompiler, RuleResolver};
pub use exec::{run, Answer, Executor, Report};
pub use config::{Backend, BodyPolicy, Config, OutputFormat};
pub use error::{Error, Result};
