//! Core program types: Symbol, Term, Clause, Fact, RuleDef, Query, Program

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// A `(text, arity)` pair. Arity 0 is a constant, arity > 0 a fact functor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    text: String,
    arity: usize,
}

impl Symbol {
    pub fn new(text: &str, arity: usize) -> Self {
        Symbol {
            text: text.to_string(),
            arity,
        }
    }

    /// Create an arity-0 symbol
    pub fn constant(text: &str) -> Self {
        Symbol::new(text, 0)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.text, self.arity)
    }
}

/// A term in a clause - variable, constant, or externally supplied parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// Variable (starts with uppercase, e.g., X, Person)
    Var(String),
    /// Constant symbol (atom or numeral)
    Const(String),
    /// Parameter supplied at execution time (written `:name`)
    Param(String),
}

impl Term {
    /// Create a variable term
    pub fn var(name: &str) -> Self {
        Term::Var(name.to_string())
    }

    /// Create a constant term
    pub fn constant(value: &str) -> Self {
        Term::Const(value.to_string())
    }

    /// Create a parameter reference
    pub fn param(name: &str) -> Self {
        Term::Param(name.to_string())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Term::Const(_))
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Term::Param(_))
    }

    /// Get variable name if this is a variable
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Term::Var(name) => Some(name),
            _ => None,
        }
    }

    /// Get constant value if this is a constant
    pub fn const_value(&self) -> Option<&str> {
        match self {
            Term::Const(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) | Term::Const(name) => write!(f, "{}", name),
            Term::Param(name) => write!(f, ":{}", name),
        }
    }
}

/// A functor applied to terms: `parent(X, bob)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    functor: String,
    args: Vec<Term>,
}

impl Clause {
    pub fn new(functor: &str, args: Vec<Term>) -> Self {
        Clause {
            functor: functor.to_string(),
            args,
        }
    }

    pub fn functor(&self) -> &str {
        &self.functor
    }

    pub fn args(&self) -> &[Term] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Variable names in first-occurrence order, without repeats
    pub fn variables(&self) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for name in self.args.iter().filter_map(|t| t.var_name()) {
            seen.insert(name);
        }
        seen.into_iter().collect()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            return write!(f, "{}", self.functor);
        }
        let args: Vec<String> = self.args.iter().map(|t| t.to_string()).collect();
        write!(f, "{}({})", self.functor, args.join(", "))
    }
}

/// A ground fact: functor plus constant arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    functor: String,
    args: Vec<String>,
}

impl Fact {
    pub fn new(functor: &str, args: Vec<String>) -> Self {
        Fact {
            functor: functor.to_string(),
            args,
        }
    }

    pub fn functor(&self) -> &str {
        &self.functor
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// The functor symbol this fact is stored under
    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.functor, self.args.len())
    }
}

/// Rule identity: name and arity
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub name: String,
    pub arity: usize,
}

impl RuleKey {
    pub fn new(name: &str, arity: usize) -> Self {
        RuleKey {
            name: name.to_string(),
            arity,
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A rule: `head :- clause, clause, ...`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    key: RuleKey,
    head: Vec<Term>,
    body: Vec<Clause>,
}

impl RuleDef {
    pub fn new(name: &str, head: Vec<Term>, body: Vec<Clause>) -> Self {
        RuleDef {
            key: RuleKey::new(name, head.len()),
            head,
            body,
        }
    }

    pub fn key(&self) -> &RuleKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn arity(&self) -> usize {
        self.key.arity
    }

    /// Head terms in declaration order
    pub fn head(&self) -> &[Term] {
        &self.head
    }

    pub fn body(&self) -> &[Clause] {
        &self.body
    }

    /// Declared parameter names (head variables), first occurrence order
    pub fn params(&self) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for name in self.head.iter().filter_map(|t| t.var_name()) {
            seen.insert(name);
        }
        seen.into_iter().collect()
    }

    /// Whether a clause variable is one of the rule's declared parameters
    pub fn is_param(&self, name: &str) -> bool {
        self.head.iter().any(|t| t.var_name() == Some(name))
    }

    /// `(functor, arity)` of every body clause
    pub fn references(&self) -> Vec<(&str, usize)> {
        self.body.iter().map(|c| (c.functor(), c.arity())).collect()
    }
}

impl fmt::Display for RuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = Clause::new(&self.key.name, self.head.clone());
        let body: Vec<String> = self.body.iter().map(|c| c.to_string()).collect();
        write!(f, "{} :- {}.", head, body.join(", "))
    }
}

/// A query: `?- goal, goal, ... .`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    goals: Vec<Clause>,
    text: String,
}

impl Query {
    pub fn new(goals: Vec<Clause>, text: &str) -> Self {
        Query {
            goals,
            text: text.to_string(),
        }
    }

    pub fn goals(&self) -> &[Clause] {
        &self.goals
    }

    /// First goal of the query
    pub fn head(&self) -> &Clause {
        &self.goals[0]
    }

    pub fn functor(&self) -> &str {
        self.head().functor()
    }

    pub fn arity(&self) -> usize {
        self.head().arity()
    }

    pub fn args(&self) -> &[Term] {
        self.head().args()
    }

    /// Variables across all goals in first-occurrence order
    pub fn free_variables(&self) -> Vec<&str> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for goal in &self.goals {
            for name in goal.variables() {
                seen.insert(name);
            }
        }
        seen.into_iter().collect()
    }

    /// Source text between `?-` and the terminating `.`
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A parsed program: deduplicated symbols plus facts, rules and queries
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub(crate) symbols: IndexSet<Symbol>,
    pub(crate) variables: IndexSet<String>,
    pub(crate) functors: IndexMap<(String, usize), Vec<Vec<String>>>,
    pub(crate) facts: Vec<Fact>,
    pub(crate) relations: IndexSet<Symbol>,
    pub(crate) rules: IndexMap<RuleKey, RuleDef>,
    pub(crate) queries: Vec<Query>,
}

impl Program {
    /// Distinct symbols in first-occurrence order
    pub fn symbols(&self) -> &IndexSet<Symbol> {
        &self.symbols
    }

    /// Distinct variable names in first-occurrence order
    pub fn variables(&self) -> &IndexSet<String> {
        &self.variables
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn rules(&self) -> &IndexMap<RuleKey, RuleDef> {
        &self.rules
    }

    pub fn rule(&self, name: &str, arity: usize) -> Option<&RuleDef> {
        self.rules.get(&RuleKey::new(name, arity))
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Recorded argument lists for every application of `functor/arity`
    pub fn occurrences(&self, functor: &str, arity: usize) -> &[Vec<String>] {
        self.functors
            .get(&(functor.to_string(), arity))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether facts of `functor/arity` exist
    pub fn has_fact_relation(&self, functor: &str, arity: usize) -> bool {
        self.relations.contains(&Symbol::new(functor, arity))
    }

    /// Every arity `functor` is defined with, as a fact relation or a rule
    pub fn defined_arities(&self, functor: &str) -> Vec<usize> {
        let mut arities: IndexSet<usize> = IndexSet::new();
        for relation in self.relations.iter().filter(|s| s.text() == functor) {
            arities.insert(relation.arity());
        }
        for key in self.rules.keys().filter(|k| k.name == functor) {
            arities.insert(key.arity);
        }
        let mut arities: Vec<usize> = arities.into_iter().collect();
        arities.sort_unstable();
        arities
    }
}
