//! Compilation of fact patterns, rules and queries into SQL fragments
//!
//! # Example
//! ```ignore
//! grandparent(X, Z) :- parent(X, Y), parent(Y, Z).
//! ?- grandparent(tom, Who).
//! ```

pub mod fragment;
mod pattern;
mod resolve;

pub use fragment::{Fragment, ParamKey, ParamOwner, Rendered, Shape};
pub use pattern::*;
pub use resolve::*;

#[cfg(test)]
mod tests;
