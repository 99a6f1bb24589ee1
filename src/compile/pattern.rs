//! Query compiler: fact patterns to relational fragments
//!
//! One `Scope` is one compilation (a query or a rule body). Inside a scope
//! every variable owns exactly one alias of the symbol relation, so repeated
//! occurrences become join predicates against the same alias instead of
//! independent joins.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::compile::fragment::*;
use crate::config::BodyPolicy;
use crate::error::{Error, Result};
use crate::program::{Clause, Program, Query, RuleDef, RuleKey, Symbol, Term};
use crate::storage::schema::{arg_column, fact_table, SYMBOL_TABLE};
use crate::storage::SymbolTable;

/// Per-compilation state: table instances, aliases, conditions.
///
/// SQL identifiers are numbered, never derived from variable names: SQLite
/// folds identifier case while `Ab` and `AB` are distinct variables.
#[derive(Debug)]
pub struct Scope {
    number: usize,
    tables: usize,
    aliases: IndexMap<String, String>,
    scan: Scan,
}

impl Scope {
    fn new(number: usize) -> Self {
        Scope {
            number,
            tables: 0,
            aliases: IndexMap::new(),
            scan: Scan::default(),
        }
    }

    /// Add a fact relation instance, return its alias
    fn add_table(&mut self, table: String) -> String {
        let alias = format!("f{}_{}", self.number, self.tables);
        self.tables += 1;
        self.scan.sources.push(Source {
            table,
            alias: alias.clone(),
        });
        alias
    }

    /// Id column of the alias bound to `name`, creating the alias on first use
    fn variable(&mut self, name: &str) -> Expr {
        if let Some(alias) = self.aliases.get(name) {
            return Expr::column(alias, "id");
        }

        let alias = format!("v{}_{}", self.number, self.aliases.len());
        self.scan.sources.push(Source {
            table: SYMBOL_TABLE.to_string(),
            alias: alias.clone(),
        });
        self.scan
            .conditions
            .push(Condition::Eq(Expr::column(&alias, "arity"), Expr::Int(0)));
        self.aliases.insert(name.to_string(), alias.clone());
        Expr::column(&alias, "id")
    }

    fn filter(&mut self, left: Expr, right: Expr) {
        self.scan.conditions.push(Condition::Eq(left, right));
    }

    /// Close the scope: project `free_variables` in order, or check existence
    fn finish(mut self, free_variables: &[&str]) -> Fragment {
        let mut columns = Vec::new();
        for name in free_variables {
            if let Some(alias) = self.aliases.get(*name) {
                let label = format!("c{}", columns.len());
                self.scan.projection.push((label, Expr::column(alias, "symbol")));
                columns.push(name.to_string());
            }
        }

        if columns.is_empty() {
            Fragment::new(self.scan, Shape::Exists)
        } else {
            Fragment::new(self.scan, Shape::Rows(columns))
        }
    }
}

/// A query ready to execute
#[derive(Clone, Debug)]
pub struct CompiledQuery {
    pub fragment: Fragment,
    /// Rule parameter values taken from the query's literal arguments
    pub bindings: IndexMap<ParamKey, String>,
    /// A head literal or a repeated head variable cannot match the arguments
    pub unsatisfiable: bool,
}

/// Compiles patterns against the materialized symbols and the rule cache
pub struct PatternCompiler<'p> {
    program: &'p Program,
    symbols: &'p SymbolTable,
    policy: BodyPolicy,
    rules: IndexMap<RuleKey, Fragment>,
    failed: IndexMap<RuleKey, String>,
    next_scope: usize,
}

impl<'p> PatternCompiler<'p> {
    pub fn new(program: &'p Program, symbols: &'p SymbolTable, policy: BodyPolicy) -> Self {
        PatternCompiler {
            program,
            symbols,
            policy,
            rules: IndexMap::new(),
            failed: IndexMap::new(),
            next_scope: 0,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Cached fragment of a compiled rule
    pub fn rule_fragment(&self, key: &RuleKey) -> Option<&Fragment> {
        self.rules.get(key)
    }

    pub fn is_compiled(&self, key: &RuleKey) -> bool {
        self.rules.contains_key(key)
    }

    pub fn compiled_rules(&self) -> impl Iterator<Item = (&RuleKey, &Fragment)> {
        self.rules.iter()
    }

    /// Record that a rule will never compile
    pub fn mark_failed(&mut self, key: &RuleKey, reason: &str) {
        self.failed.insert(key.clone(), reason.to_string());
    }

    fn new_scope(&mut self) -> Scope {
        self.next_scope += 1;
        Scope::new(self.next_scope)
    }

    /// Clauses of a body (or query) that take part under the configured policy
    pub fn selected<'c>(&self, clauses: &'c [Clause]) -> &'c [Clause] {
        match self.policy {
            BodyPolicy::JoinAll => clauses,
            BodyPolicy::FirstClause => &clauses[..clauses.len().min(1)],
        }
    }

    /// Compile a single fact pattern in a fresh scope.
    ///
    /// Projects `free_variables` in the given order; with none, the fragment
    /// is an existence check.
    pub fn compile_pattern(
        &mut self,
        functor: &str,
        arity: usize,
        args: &[Term],
        free_variables: &[&str],
    ) -> Result<Fragment> {
        if args.len() != arity {
            return Err(Error::ArityMismatch {
                functor: functor.to_string(),
                found: args.len(),
                expected: vec![arity],
            });
        }
        let clause = Clause::new(functor, args.to_vec());
        let mut scope = self.new_scope();
        self.add_clause(&mut scope, &clause, None)?;
        Ok(scope.finish(free_variables))
    }

    /// Compile a rule body into its fragment; cached, so compiling twice is free
    pub fn compile_rule(&mut self, rule: &RuleDef) -> Result<&Fragment> {
        if !self.rules.contains_key(rule.key()) {
            let fragment = self.compile_rule_body(rule)?;
            tracing::debug!(rule = %rule.key(), sql = %fragment.render().sql, "Compiled rule");
            self.rules.insert(rule.key().clone(), fragment);
        }
        Ok(&self.rules[rule.key()])
    }

    fn compile_rule_body(&mut self, rule: &RuleDef) -> Result<Fragment> {
        let clauses = self.selected(rule.body());
        let mut scope = self.new_scope();
        let mut free: IndexSet<&str> = IndexSet::new();
        for clause in clauses {
            self.add_clause(&mut scope, clause, Some(rule))?;
            for name in clause.variables() {
                if !rule.is_param(name) {
                    free.insert(name);
                }
            }
        }
        let free: Vec<&str> = free.into_iter().collect();
        Ok(scope.finish(&free))
    }

    /// Compile a query. A single goal on a compiled rule with only literal
    /// or parameter arguments reuses the cached rule fragment and binds its
    /// parameters at execution.
    pub fn compile_query(&mut self, query: &Query) -> Result<CompiledQuery> {
        let goals = self.selected(query.goals());
        if let [goal] = goals {
            let key = RuleKey::new(goal.functor(), goal.arity());
            let closed = goal.args().iter().all(|t| t.is_const() || t.is_param());
            if closed && self.is_compiled(&key) {
                if let Some(compiled) = self.bind_cached_rule(&key, goal) {
                    return Ok(compiled);
                }
            }
        }

        let mut scope = self.new_scope();
        let mut free: IndexSet<&str> = IndexSet::new();
        for goal in goals {
            self.add_clause(&mut scope, goal, None)?;
            free.extend(goal.variables());
        }
        let free: Vec<&str> = free.into_iter().collect();
        Ok(CompiledQuery {
            fragment: scope.finish(&free),
            bindings: IndexMap::new(),
            unsatisfiable: false,
        })
    }

    /// Bind a cached rule fragment to a goal whose arguments are literals or
    /// `:name` references. `None` when the goal needs the embedding path.
    fn bind_cached_rule(&self, key: &RuleKey, goal: &Clause) -> Option<CompiledQuery> {
        let rule = self.program.rules().get(key)?;
        let mut bindings: IndexMap<ParamKey, String> = IndexMap::new();
        let mut external: HashMap<ParamKey, Expr> = HashMap::new();
        let mut unsatisfiable = false;

        for (head, arg) in rule.head().iter().zip(goal.args()) {
            match (head, arg) {
                (Term::Var(name), Term::Const(value)) => {
                    let param = ParamKey::rule(key, name);
                    if external.contains_key(&param) {
                        return None;
                    }
                    match bindings.get(&param) {
                        Some(previous) if previous != value => unsatisfiable = true,
                        Some(_) => {}
                        None => {
                            bindings.insert(param, value.clone());
                        }
                    }
                }
                (Term::Var(name), Term::Param(outer)) => {
                    let param = ParamKey::rule(key, name);
                    if bindings.contains_key(&param) || external.contains_key(&param) {
                        return None;
                    }
                    external.insert(param, Expr::Param(ParamKey::external(outer)));
                }
                (Term::Const(expected), Term::Const(value)) => unsatisfiable |= expected != value,
                _ => return None,
            }
        }

        let scan = self.rules.get(key)?.scan();
        let scan = if external.is_empty() {
            scan.clone()
        } else {
            scan.substitute(&external)
        };
        // no free variables in the goal: the answer is yes or no
        Some(CompiledQuery {
            fragment: Fragment::new(scan, Shape::Exists),
            bindings,
            unsatisfiable,
        })
    }

    /// Expression for one argument: alias id, placeholder, or literal id
    fn arg_expr(&self, scope: &mut Scope, term: &Term, rule: Option<&RuleDef>) -> Result<Expr> {
        match term {
            Term::Var(name) => match rule {
                Some(rule) if rule.is_param(name) => Ok(Expr::Param(ParamKey::rule(rule.key(), name))),
                _ => Ok(scope.variable(name)),
            },
            Term::Param(name) => Ok(Expr::Param(ParamKey::external(name))),
            Term::Const(text) => self
                .symbols
                .constant(text)
                .map(|id| Expr::Int(id.0))
                .ok_or_else(|| Error::UnknownSymbol(Symbol::constant(text).to_string())),
        }
    }

    fn literal(&self, text: &str) -> Result<Expr> {
        self.symbols
            .constant(text)
            .map(|id| Expr::Int(id.0))
            .ok_or_else(|| Error::UnknownSymbol(Symbol::constant(text).to_string()))
    }

    /// Add one clause to a scope. Compiled rules shadow fact relations.
    fn add_clause(&self, scope: &mut Scope, clause: &Clause, rule: Option<&RuleDef>) -> Result<()> {
        let functor = clause.functor();
        let arity = clause.arity();
        let key = RuleKey::new(functor, arity);

        if let Some(fragment) = self.rules.get(&key) {
            return self.embed_rule(scope, &key, fragment, clause, rule);
        }

        if let Some(reason) = self.failed.get(&key) {
            return Err(Error::RuleFailed {
                rule: key,
                reason: reason.clone(),
            });
        }

        if self.program.rules().contains_key(&key) {
            return Err(Error::RuleFailed {
                rule: key,
                reason: "rule is not compiled yet".to_string(),
            });
        }

        if self.program.has_fact_relation(functor, arity) {
            let functor_id = self
                .symbols
                .get(&Symbol::new(functor, arity))
                .ok_or_else(|| Error::UnknownSymbol(Symbol::new(functor, arity).to_string()))?;
            let table = scope.add_table(fact_table(arity));
            scope.filter(Expr::column(&table, "functor_id"), Expr::Int(functor_id.0));
            for (i, term) in clause.args().iter().enumerate() {
                let value = self.arg_expr(scope, term, rule)?;
                scope.filter(Expr::column(&table, &arg_column(i + 1)), value);
            }
            return Ok(());
        }

        let expected = self.program.defined_arities(functor);
        if expected.is_empty() {
            Err(Error::UnknownRelation {
                functor: functor.to_string(),
                arity,
            })
        } else {
            Err(Error::ArityMismatch {
                functor: functor.to_string(),
                found: arity,
                expected,
            })
        }
    }

    /// Semi-join a compiled rule: its placeholders are rebound to this
    /// scope's expressions for the clause arguments.
    fn embed_rule(
        &self,
        scope: &mut Scope,
        key: &RuleKey,
        fragment: &Fragment,
        clause: &Clause,
        rule: Option<&RuleDef>,
    ) -> Result<()> {
        let callee = self
            .program
            .rules()
            .get(key)
            .ok_or_else(|| Error::UnknownRelation {
                functor: key.name.clone(),
                arity: key.arity,
            })?;

        let mut bindings: HashMap<ParamKey, Expr> = HashMap::new();
        for (head, arg) in callee.head().iter().zip(clause.args()) {
            let value = self.arg_expr(scope, arg, rule)?;
            match head {
                Term::Var(name) => {
                    let param = ParamKey::rule(key, name);
                    match bindings.get(&param) {
                        Some(previous) => scope.filter(previous.clone(), value),
                        None => {
                            bindings.insert(param, value);
                        }
                    }
                }
                Term::Const(text) => {
                    let expected = self.literal(text)?;
                    scope.filter(value, expected);
                }
                Term::Param(_) => {}
            }
        }

        scope
            .scan
            .conditions
            .push(Condition::Exists(Box::new(fragment.scan().substitute(&bindings))));
        Ok(())
    }
}
