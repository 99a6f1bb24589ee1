//! Source language front end: parser, syntax tree and program model
//!
//! # Example
//! ```ignore
//! parent(tom, bob).
//! ancestor(X, Y) :- parent(X, Y).
//! ?- ancestor(tom, bob).
//! ```

mod types;
mod syntax;
mod parser;
mod collector;

pub use types::*;
pub use syntax::*;
pub use parser::*;
pub use collector::ProgramBuilder;
