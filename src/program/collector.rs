//! Program collector: walks the syntax tree once and builds the program model
//!
//! Symbols and variables are registered with set semantics in first-occurrence
//! order, so identifier assignment downstream is reproducible.

use indexmap::{IndexMap, IndexSet};

use crate::program::parser::ParseError;
use crate::program::syntax::{Node, Spanned};
use crate::program::types::*;

/// Where a term appears; decides which term kinds are legal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Context {
    Fact,
    RuleHead,
    RuleBody,
    Query,
}

/// Mutable builder threaded through the traversal, finalized once
pub struct ProgramBuilder<'a> {
    source: &'a str,
    position: usize,
    symbols: IndexSet<Symbol>,
    variables: IndexSet<String>,
    functors: IndexMap<(String, usize), Vec<Vec<String>>>,
    facts: Vec<Fact>,
    relations: IndexSet<Symbol>,
    rules: IndexMap<RuleKey, RuleDef>,
    queries: Vec<Query>,
    comments: usize,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(source: &'a str) -> Self {
        ProgramBuilder {
            source,
            position: 0,
            symbols: IndexSet::new(),
            variables: IndexSet::new(),
            functors: IndexMap::new(),
            facts: Vec::new(),
            relations: IndexSet::new(),
            rules: IndexMap::new(),
            queries: Vec::new(),
            comments: 0,
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::at(self.source, self.position, message)
    }

    /// Visit one top-level clause
    pub fn visit(&mut self, clause: &Spanned) -> Result<(), ParseError> {
        self.position = clause.position;
        match &clause.node {
            Node::Comment(_) => {
                self.comments += 1;
                Ok(())
            }
            Node::Query { goals, text } => self.visit_query(goals, text),
            Node::Rule { head, body } => self.visit_rule(head, body),
            Node::Fact(term) => self.visit_fact(term),
            Node::Functor { .. } | Node::Symbol(_) | Node::Variable(_) | Node::Param(_) => {
                Err(self.error(&format!("expected a clause, found a bare {}", clause.node.kind())))
            }
        }
    }

    fn store_symbol(&mut self, text: &str, arity: usize) {
        self.symbols.insert(Symbol::new(text, arity));
    }

    fn store_occurrence(&mut self, functor: &str, args: &[Term]) {
        let texts = args.iter().map(|t| t.to_string()).collect();
        self.functors
            .entry((functor.to_string(), args.len()))
            .or_default()
            .push(texts);
    }

    fn visit_term(&mut self, node: &Node, context: Context) -> Result<Term, ParseError> {
        match node {
            Node::Symbol(text) => {
                self.store_symbol(text, 0);
                Ok(Term::constant(text))
            }
            Node::Variable(name) => {
                if context == Context::Fact {
                    return Err(self.error(&format!("facts must be ground, found variable {}", name)));
                }
                self.variables.insert(name.clone());
                Ok(Term::var(name))
            }
            Node::Param(name) => {
                if context != Context::Query {
                    return Err(self.error(&format!(
                        "parameter :{} is only allowed in queries",
                        name
                    )));
                }
                Ok(Term::param(name))
            }
            Node::Functor { name, .. } => Err(self.error(&format!(
                "compound argument {}(...) is not supported",
                name
            ))),
            Node::Comment(_) | Node::Query { .. } | Node::Rule { .. } | Node::Fact(_) => {
                Err(self.error(&format!("unexpected {} inside a term", node.kind())))
            }
        }
    }

    /// A goal or head: functor application, or a bare atom as an arity-0 functor
    fn visit_functor(&mut self, node: &Node, context: Context) -> Result<Clause, ParseError> {
        match node {
            Node::Functor { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.visit_term(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                self.store_occurrence(name, &args);
                Ok(Clause::new(name, args))
            }
            Node::Symbol(name) => {
                self.store_symbol(name, 0);
                self.store_occurrence(name, &[]);
                Ok(Clause::new(name, vec![]))
            }
            other => Err(self.error(&format!(
                "expected a predicate, found a {}",
                other.kind()
            ))),
        }
    }

    fn visit_fact(&mut self, term: &Node) -> Result<(), ParseError> {
        // functor symbol first: it is the first thing in the text
        if let Node::Functor { name, args } = term {
            self.store_symbol(name, args.len());
        }
        let clause = self.visit_functor(term, Context::Fact)?;
        let args = clause
            .args()
            .iter()
            .filter_map(|t| t.const_value().map(|s| s.to_string()))
            .collect();
        let fact = Fact::new(clause.functor(), args);
        self.relations.insert(fact.symbol());
        self.facts.push(fact);
        Ok(())
    }

    fn visit_rule(&mut self, head: &Node, body: &[Node]) -> Result<(), ParseError> {
        let head = self.visit_functor(head, Context::RuleHead)?;
        let body = body
            .iter()
            .map(|goal| self.visit_functor(goal, Context::RuleBody))
            .collect::<Result<Vec<_>, _>>()?;

        let rule = RuleDef::new(head.functor(), head.args().to_vec(), body);
        if self.rules.contains_key(rule.key()) {
            return Err(self.error(&format!(
                "rule {} is defined more than once; alternative rule clauses are not supported",
                rule.key()
            )));
        }
        self.rules.insert(rule.key().clone(), rule);
        Ok(())
    }

    fn visit_query(&mut self, goals: &[Node], text: &str) -> Result<(), ParseError> {
        let goals = goals
            .iter()
            .map(|goal| self.visit_functor(goal, Context::Query))
            .collect::<Result<Vec<_>, _>>()?;
        self.queries.push(Query::new(goals, text));
        Ok(())
    }

    /// Finalize into an immutable program
    pub fn finish(self) -> Program {
        tracing::trace!(comments = self.comments, "Collected program");
        Program {
            symbols: self.symbols,
            variables: self.variables,
            functors: self.functors,
            facts: self.facts,
            relations: self.relations,
            rules: self.rules,
            queries: self.queries,
        }
    }
}
