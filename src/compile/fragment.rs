//! Relational fragments: a small SQL AST that composes and renders
//!
//! Every scalar expression is a symbol id (or the arity/text column of an
//! alias). Parameter placeholders stay symbolic until rendering, so a cached
//! fragment can be rebound when it is embedded in another compilation.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

use crate::program::RuleKey;
use crate::storage::schema::SYMBOL_TABLE;

/// Who supplies a parameter's value
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ParamOwner {
    /// A rule's declared parameter, bound by the caller of the rule
    Rule(RuleKey),
    /// A `:name` reference, bound from the run configuration
    External,
}

/// Placeholder identity: `(owner, name)`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParamKey {
    pub owner: ParamOwner,
    pub name: String,
}

impl ParamKey {
    pub fn rule(rule: &RuleKey, name: &str) -> Self {
        ParamKey {
            owner: ParamOwner::Rule(rule.clone()),
            name: name.to_string(),
        }
    }

    pub fn external(name: &str) -> Self {
        ParamKey {
            owner: ParamOwner::External,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            ParamOwner::Rule(rule) => write!(f, "({}, {})", rule, self.name),
            ParamOwner::External => write!(f, ":{}", self.name),
        }
    }
}

/// Scalar expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    /// `source.column`
    Column { source: String, column: String },
    /// Integer literal (symbol ids, arity)
    Int(i64),
    /// Symbol id looked up from a text value bound at execution
    Param(ParamKey),
}

impl Expr {
    pub fn column(source: &str, column: &str) -> Self {
        Expr::Column {
            source: source.to_string(),
            column: column.to_string(),
        }
    }
}

/// Filter or join predicate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Eq(Expr, Expr),
    /// Semi-join against an embedded scan
    Exists(Box<Scan>),
}

/// `table AS alias`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub table: String,
    pub alias: String,
}

/// One SELECT block: sources, conditions, labelled projection.
/// Labels are generated (`c0`, `c1`, ...); `Shape::Rows` carries the names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scan {
    pub sources: Vec<Source>,
    pub conditions: Vec<Condition>,
    pub projection: Vec<(String, Expr)>,
}

impl Scan {
    /// Replace placeholders found in `bindings`, recursively
    pub fn substitute(&self, bindings: &HashMap<ParamKey, Expr>) -> Scan {
        let expr = |e: &Expr| match e {
            Expr::Param(key) => bindings.get(key).cloned().unwrap_or_else(|| e.clone()),
            other => other.clone(),
        };
        Scan {
            sources: self.sources.clone(),
            conditions: self
                .conditions
                .iter()
                .map(|c| match c {
                    Condition::Eq(l, r) => Condition::Eq(expr(l), expr(r)),
                    Condition::Exists(inner) => Condition::Exists(Box::new(inner.substitute(bindings))),
                })
                .collect(),
            projection: self
                .projection
                .iter()
                .map(|(label, e)| (label.clone(), expr(e)))
                .collect(),
        }
    }

    fn collect_params(&self, out: &mut IndexSet<ParamKey>) {
        let mut visit = |e: &Expr| {
            if let Expr::Param(key) = e {
                out.insert(key.clone());
            }
        };
        for (_, e) in &self.projection {
            visit(e);
        }
        let mut nested = Vec::new();
        for condition in &self.conditions {
            match condition {
                Condition::Eq(l, r) => {
                    visit(l);
                    visit(r);
                }
                Condition::Exists(inner) => nested.push(inner),
            }
        }
        for inner in nested {
            inner.collect_params(out);
        }
    }
}

/// What a fragment answers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Does at least one row satisfy the conditions (yes/no)
    Exists,
    /// Rows of the listed variable columns, in this order
    Rows(Vec<String>),
}

/// A compiled pattern, query or rule body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    scan: Scan,
    shape: Shape,
}

impl Fragment {
    pub fn new(scan: Scan, shape: Shape) -> Self {
        Fragment { scan, shape }
    }

    pub fn scan(&self) -> &Scan {
        &self.scan
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_existence(&self) -> bool {
        matches!(self.shape, Shape::Exists)
    }

    /// Externally visible columns (empty for existence checks)
    pub fn columns(&self) -> &[String] {
        match &self.shape {
            Shape::Exists => &[],
            Shape::Rows(columns) => columns,
        }
    }

    /// Every placeholder still unbound in the fragment, first-occurrence order
    pub fn params(&self) -> IndexSet<ParamKey> {
        let mut out = IndexSet::new();
        self.scan.collect_params(&mut out);
        out
    }

    /// Render to SQL; placeholders become `?1..?N` in the order of `Rendered::params`
    pub fn render(&self) -> Rendered {
        let mut renderer = Renderer::default();
        let sql = match &self.shape {
            Shape::Exists => format!("SELECT EXISTS ({}) AS holds", renderer.scan(&self.scan, false)),
            Shape::Rows(_) => {
                let outer: Vec<String> = self
                    .scan
                    .projection
                    .iter()
                    .map(|(label, _)| quote(label))
                    .collect();
                format!(
                    "SELECT {} FROM ({}) AS scan",
                    outer.join(", "),
                    renderer.scan(&self.scan, true)
                )
            }
        };
        Rendered {
            sql,
            params: renderer.params.into_iter().collect(),
        }
    }
}

/// SQL text plus the placeholder bound to each positional parameter
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<ParamKey>,
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[derive(Default)]
struct Renderer {
    params: IndexSet<ParamKey>,
}

impl Renderer {
    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Column { source, column } => format!("{}.{}", source, column),
            Expr::Int(value) => value.to_string(),
            Expr::Param(key) => {
                let (index, _) = self.params.insert_full(key.clone());
                format!(
                    "(SELECT id FROM {} WHERE symbol = ?{} AND arity = 0)",
                    SYMBOL_TABLE,
                    index + 1
                )
            }
        }
    }

    fn scan(&mut self, scan: &Scan, project: bool) -> String {
        let columns = if project && !scan.projection.is_empty() {
            scan.projection
                .iter()
                .map(|(label, e)| format!("{} AS {}", self.expr(e), quote(label)))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            "1".to_string()
        };

        let mut sql = format!("SELECT {}", columns);
        if !scan.sources.is_empty() {
            let sources: Vec<String> = scan
                .sources
                .iter()
                .map(|s| format!("{} AS {}", s.table, s.alias))
                .collect();
            sql.push_str(" FROM ");
            sql.push_str(&sources.join(", "));
        }
        if !scan.conditions.is_empty() {
            let conditions: Vec<String> = scan
                .conditions
                .iter()
                .map(|c| match c {
                    Condition::Eq(l, r) => format!("{} = {}", self.expr(l), self.expr(r)),
                    Condition::Exists(inner) => format!("EXISTS ({})", self.scan(inner, false)),
                })
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql
    }
}
