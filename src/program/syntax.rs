//! Syntax tree produced by the parser
//!
//! One tagged union covers every node kind; the collector walks it with
//! exhaustive matching.

/// A node of the syntax tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// `% ...` line comment (text after the `%`)
    Comment(String),
    /// `?- goal, goal .`
    Query { goals: Vec<Node>, text: String },
    /// `head :- goal, goal .`
    Rule { head: Box<Node>, body: Vec<Node> },
    /// `term .`
    Fact(Box<Node>),
    /// `name(arg, arg, ...)`
    Functor { name: String, args: Vec<Node> },
    /// Atom, quoted atom (unquoted here) or numeral
    Symbol(String),
    /// Identifier starting with an uppercase letter
    Variable(String),
    /// `:name`, supplied at execution time
    Param(String),
}

impl Node {
    /// Short name of the node kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Comment(_) => "comment",
            Node::Query { .. } => "query",
            Node::Rule { .. } => "rule",
            Node::Fact(_) => "fact",
            Node::Functor { .. } => "functor",
            Node::Symbol(_) => "symbol",
            Node::Variable(_) => "variable",
            Node::Param(_) => "parameter",
        }
    }
}

/// A top-level clause with the byte offset where it starts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned {
    pub node: Node,
    pub position: usize,
}
