//! Recursive-descent parser for the Prolog subset
//!
//! Supports:
//! - Comments: % to end of line
//! - Terms: variables (X, Who), atoms (tom, 'Hello World'), numerals (42, 3.5),
//!   functor applications (parent(X, bob)), parameters (:name, queries only)
//! - Queries: ?- goal, goal .
//! - Rules: head :- goal, goal .
//! - Facts: term .
//!
//! Disjunction (`;`) is recognized and rejected.

use crate::program::collector::ProgramBuilder;
use crate::program::syntax::{Node, Spanned};
use crate::program::types::Program;

/// Parse error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    /// Build an error at byte `position` of `source`, computing line and column
    pub fn at(source: &str, position: usize, message: &str) -> Self {
        let position = position.min(source.len());
        let before = &source[..position];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map(|nl| before[nl + 1..].chars().count())
            .unwrap_or_else(|| before.chars().count())
            + 1;
        ParseError {
            message: message.to_string(),
            position,
            line,
            column,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at {}:{} (offset {}): {}",
            self.line, self.column, self.position, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser { input, pos: 0 }
    }

    fn error(&self, message: &str, position: usize) -> ParseError {
        ParseError::at(self.input, position, message)
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }

    fn current(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Skip whitespace and comments inside a clause
    fn skip_whitespace(&mut self) {
        loop {
            self.skip_blank();
            if self.remaining().starts_with('%') {
                self.skip_line();
            } else {
                break;
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.current() {
            self.pos += c.len_utf8();
            if c == '\n' {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.current()
    }

    fn expect(&mut self, expected: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.remaining().starts_with(expected) {
            self.pos += expected.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected), self.pos))
        }
    }

    /// Read `[A-Za-z0-9_]*` starting at the current position
    fn take_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.current() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let body_start = self.pos;
        while let Some(c) = self.current() {
            if c == '\'' {
                let value = self.input[body_start..self.pos].to_string();
                self.pos += 1;
                return Ok(value);
            }
            if c == '\n' {
                break;
            }
            self.pos += c.len_utf8();
        }
        Err(self.error("unterminated quoted atom", start))
    }

    /// `[0-9]+` or `[0-9]*.[0-9]+`
    fn parse_number(&mut self) -> String {
        let start = self.pos;
        let digits = |p: &mut Self| {
            while let Some(c) = p.current() {
                if c.is_ascii_digit() {
                    p.pos += 1;
                } else {
                    break;
                }
            }
        };
        digits(self);
        let rest = self.remaining().as_bytes();
        if rest.len() > 1 && rest[0] == b'.' && rest[1].is_ascii_digit() {
            self.pos += 1;
            digits(self);
        }
        self.input[start..self.pos].to_string()
    }

    fn starts_number(&self) -> bool {
        let rest = self.remaining().as_bytes();
        match rest.first() {
            Some(b) if b.is_ascii_digit() => true,
            Some(b'.') => rest.get(1).map_or(false, |b| b.is_ascii_digit()),
            _ => false,
        }
    }

    fn parse_term(&mut self) -> Result<Node, ParseError> {
        let c = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of input, expected term", self.pos))?;

        if self.starts_number() {
            return Ok(Node::Symbol(self.parse_number()));
        }

        if c == ':' {
            self.pos += 1;
            let name = self.take_identifier();
            if name.is_empty() {
                return Err(self.error("expected parameter name after ':'", self.pos));
            }
            return Ok(Node::Param(name.to_string()));
        }

        if c.is_ascii_uppercase() {
            return Ok(Node::Variable(self.take_identifier().to_string()));
        }

        let name = if c.is_ascii_lowercase() {
            self.take_identifier().to_string()
        } else if c == '\'' {
            self.parse_quoted()?
        } else {
            return Err(self.error(&format!("unexpected character '{}'", c), self.pos));
        };

        // A functor's opening parenthesis must follow the name directly
        if self.current() == Some('(') {
            self.pos += 1;
            let mut args = vec![self.parse_term()?];
            while self.peek() == Some(',') {
                self.pos += 1;
                args.push(self.parse_term()?);
            }
            self.expect(")")?;
            Ok(Node::Functor { name, args })
        } else {
            Ok(Node::Symbol(name))
        }
    }

    /// `term (, term)*`; `;` is rejected
    fn parse_goals(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut goals = vec![self.parse_term()?];
        loop {
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    goals.push(self.parse_term()?);
                }
                Some(';') => {
                    return Err(self.error("disjunction (;) is not supported", self.pos));
                }
                _ => break,
            }
        }
        Ok(goals)
    }

    fn parse_clause(&mut self) -> Result<Spanned, ParseError> {
        let position = self.pos;

        if self.remaining().starts_with('%') {
            let start = self.pos + 1;
            self.skip_line();
            let text = self.input[start..self.pos].trim_end_matches(|c| c == '\r' || c == '\n');
            return Ok(Spanned {
                node: Node::Comment(text.to_string()),
                position,
            });
        }

        if self.remaining().starts_with("?-") {
            self.pos += 2;
            self.skip_whitespace();
            let text_start = self.pos;
            let goals = self.parse_goals()?;
            let text = self.input[text_start..self.pos].trim().to_string();
            self.expect(".")?;
            return Ok(Spanned {
                node: Node::Query { goals, text },
                position,
            });
        }

        let head = self.parse_term()?;
        self.skip_whitespace();

        // Check for :- (rule) or . (fact)
        let node = if self.remaining().starts_with(":-") {
            self.pos += 2;
            let body = self.parse_goals()?;
            self.expect(".")?;
            Node::Rule {
                head: Box::new(head),
                body,
            }
        } else {
            self.expect(".")?;
            Node::Fact(Box::new(head))
        };

        Ok(Spanned { node, position })
    }

    fn parse_tree(&mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut clauses = Vec::new();

        loop {
            self.skip_blank();
            if self.pos >= self.input.len() {
                break;
            }
            clauses.push(self.parse_clause()?);
        }

        Ok(clauses)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse source text into top-level syntax nodes
pub fn parse_tree(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_tree()
}

/// Parse a single term
pub fn parse_term(input: &str) -> Result<Node, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse_term()
}

/// Parse a complete program and collect it into the program model
pub fn parse_program(input: &str) -> Result<Program, ParseError> {
    let tree = parse_tree(input)?;
    let mut builder = ProgramBuilder::new(input);
    for clause in &tree {
        builder.visit(clause)?;
    }
    let program = builder.finish();
    tracing::debug!(
        clauses = tree.len(),
        symbols = program.symbols().len(),
        facts = program.facts().len(),
        rules = program.rules().len(),
        queries = program.queries().len(),
        "Parsed program"
    );
    Ok(program)
}
