//! Rule resolution: compile rules in dependency order within bounded passes

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::compile::pattern::PatternCompiler;
use crate::error::{Error, Result};
use crate::program::{Program, RuleDef, RuleKey};

/// Lifecycle of one rule during resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleState {
    Pending,
    Compiled { pass: usize },
    Failed { reason: String },
}

/// Final outcome of one rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RuleOutcome {
    Compiled { pass: usize },
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule: String,
    #[serde(flatten)]
    pub outcome: RuleOutcome,
}

/// Passes used and the outcome of every rule, in declaration order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub passes: usize,
    pub rules: Vec<RuleReport>,
}

impl ResolutionReport {
    pub fn compiled(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Compiled { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.rules.len() - self.compiled()
    }
}

/// What a body clause refers to, as seen at the start of a pass
enum Dependency {
    Ready,
    Waiting,
    FailedRule,
    WrongArity(Vec<usize>),
    Undefined,
}

/// Drives the pattern compiler over every rule of a program
pub struct RuleResolver {
    max_passes: usize,
}

impl RuleResolver {
    pub fn new(max_passes: usize) -> Self {
        RuleResolver { max_passes }
    }

    /// Compile every rule into the compiler's cache.
    ///
    /// A rule is attempted in a pass only when each clause it references is
    /// a fact relation or a rule that was compiled before the pass began, so
    /// a dependency chain of depth d takes d passes.
    pub fn resolve(&self, compiler: &mut PatternCompiler<'_>) -> Result<ResolutionReport> {
        let program = compiler.program();
        let mut states: IndexMap<RuleKey, RuleState> = program
            .rules()
            .keys()
            .map(|key| (key.clone(), RuleState::Pending))
            .collect();

        let mut passes = 0;
        while passes < self.max_passes && states.values().any(|s| *s == RuleState::Pending) {
            passes += 1;
            let snapshot = states.clone();
            let mut progress = false;

            for (key, rule) in program.rules() {
                if snapshot.get(key) != Some(&RuleState::Pending) {
                    continue;
                }

                let mut ready = true;
                let mut failure = None;
                for clause in compiler.selected(rule.body()) {
                    match classify(program, &snapshot, clause.functor(), clause.arity()) {
                        Dependency::Ready => {}
                        Dependency::WrongArity(expected) => {
                            failure = Some(Error::ArityMismatch {
                                functor: clause.functor().to_string(),
                                found: clause.arity(),
                                expected,
                            });
                            break;
                        }
                        Dependency::Waiting | Dependency::FailedRule | Dependency::Undefined => {
                            ready = false;
                        }
                    }
                }

                if let Some(err) = failure {
                    fail(compiler, &mut states, key, &err);
                    progress = true;
                    continue;
                }
                if !ready {
                    continue;
                }

                match compiler.compile_rule(rule).map(|_| ()) {
                    Ok(_) => {
                        tracing::debug!(rule = %key, pass = passes, "Rule compiled");
                        states.insert(key.clone(), RuleState::Compiled { pass: passes });
                    }
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => fail(compiler, &mut states, key, &err),
                }
                progress = true;
            }

            tracing::trace!(pass = passes, progress, "Resolution pass finished");
            if !progress {
                break;
            }
        }

        let stuck: Vec<&RuleKey> = states
            .iter()
            .filter(|(_, s)| **s == RuleState::Pending)
            .map(|(k, _)| k)
            .collect();
        if !stuck.is_empty() {
            return Err(stuck_error(compiler, program, &states, &stuck, passes));
        }

        let rules: Vec<RuleReport> = states
            .into_iter()
            .map(|(key, state)| RuleReport {
                rule: key.to_string(),
                outcome: match state {
                    RuleState::Compiled { pass } => RuleOutcome::Compiled { pass },
                    RuleState::Failed { reason } => RuleOutcome::Failed { reason },
                    RuleState::Pending => RuleOutcome::Failed {
                        reason: "not resolved".to_string(),
                    },
                },
            })
            .collect();
        let report = ResolutionReport { passes, rules };
        tracing::info!(
            "Resolved {} rules in {} passes ({} failed)",
            report.compiled(),
            report.passes,
            report.failed()
        );
        Ok(report)
    }
}

fn fail(compiler: &mut PatternCompiler<'_>, states: &mut IndexMap<RuleKey, RuleState>, key: &RuleKey, err: &Error) {
    let reason = err.to_string();
    tracing::warn!(rule = %key, "Rule failed: {}", reason);
    compiler.mark_failed(key, &reason);
    states.insert(key.clone(), RuleState::Failed { reason });
}

fn classify(program: &Program, states: &IndexMap<RuleKey, RuleState>, functor: &str, arity: usize) -> Dependency {
    let key = RuleKey::new(functor, arity);
    match states.get(&key) {
        Some(RuleState::Compiled { .. }) => return Dependency::Ready,
        Some(RuleState::Failed { .. }) => return Dependency::FailedRule,
        Some(RuleState::Pending) => return Dependency::Waiting,
        None => {}
    }

    if program.has_fact_relation(functor, arity) {
        return Dependency::Ready;
    }
    let expected = program.defined_arities(functor);
    if expected.is_empty() {
        Dependency::Undefined
    } else {
        Dependency::WrongArity(expected)
    }
}

/// Error for rules left pending: a cascade from an undefined or failed
/// reference takes precedence over a cycle
fn stuck_error(
    compiler: &PatternCompiler<'_>,
    program: &Program,
    states: &IndexMap<RuleKey, RuleState>,
    stuck: &[&RuleKey],
    passes: usize,
) -> Error {
    for key in stuck {
        let rule: &RuleDef = &program.rules()[*key];
        for clause in compiler.selected(rule.body()) {
            if let Dependency::Undefined | Dependency::FailedRule =
                classify(program, states, clause.functor(), clause.arity())
            {
                let err = Error::UnsupportedRuleCascade {
                    rule: (*key).clone(),
                    reference: format!("{}/{}", clause.functor(), clause.arity()),
                };
                tracing::error!("{}", err);
                return err;
            }
        }
    }

    let pending: IndexSet<String> = stuck.iter().map(|k| k.to_string()).collect();
    let err = Error::CyclicRuleDependency {
        passes,
        pending: pending.into_iter().collect(),
    };
    tracing::error!("{}", err);
    err
}
