//! Tests for pattern compilation and rule resolution

use super::*;
use crate::config::BodyPolicy;
use crate::error::Error;
use crate::program::{parse_program, Program, RuleKey, Term};
use crate::storage::{materialize, RelationalStore, SqliteStore, SymbolTable};

fn load(source: &str) -> (Program, SqliteStore, SymbolTable) {
    let program = parse_program(source).unwrap();
    let mut store = SqliteStore::in_memory().unwrap();
    let symbols = materialize(&mut store, &program).unwrap();
    (program, store, symbols)
}

/// Run a compiled query, binding rule parameters from the query and
/// external parameters from `external`
fn rows(store: &SqliteStore, compiled: &CompiledQuery, external: &[(&str, &str)]) -> Vec<Vec<String>> {
    let rendered = compiled.fragment.render();
    let values: Vec<String> = rendered
        .params
        .iter()
        .map(|key| match &key.owner {
            ParamOwner::Rule(_) => compiled.bindings[key].clone(),
            ParamOwner::External => external
                .iter()
                .find(|(name, _)| *name == key.name)
                .map(|(_, value)| value.to_string())
                .unwrap(),
        })
        .collect();
    let result = store.query(&rendered.sql, &values).unwrap();
    result
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

fn holds(store: &SqliteStore, compiled: &CompiledQuery) -> bool {
    assert!(compiled.fragment.is_existence());
    !compiled.unsatisfiable && rows(store, compiled, &[])[0][0] == "1"
}

// ============================================================================
// Patterns and queries
// ============================================================================

mod pattern_tests {
    use super::*;

    #[test]
    fn test_shared_variable_joins_once() {
        let (program, store, symbols) = load("parent(tom, tom). parent(tom, bob). ?- parent(X, X).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let compiled = compiler.compile_query(&program.queries()[0]).unwrap();

        assert_eq!(compiled.fragment.columns(), ["X".to_string()]);
        assert_eq!(rows(&store, &compiled, &[]), vec![vec!["tom".to_string()]]);
        // one alias for X, used by both argument positions
        let sql = compiled.fragment.render().sql;
        assert_eq!(sql.matches("symbol AS v").count(), 1);
    }

    #[test]
    fn test_existence_query() {
        let (program, store, symbols) = load("edge(a, b). ?- edge(a, b). ?- edge(b, a).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);

        let yes = compiler.compile_query(&program.queries()[0]).unwrap();
        let no = compiler.compile_query(&program.queries()[1]).unwrap();
        assert!(yes.fragment.render().sql.starts_with("SELECT EXISTS"));
        assert!(holds(&store, &yes));
        assert!(!holds(&store, &no));
    }

    #[test]
    fn test_projection_follows_first_occurrence() {
        let (program, store, symbols) = load("parent(tom, bob). ?- parent(Y, X).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let compiled = compiler.compile_query(&program.queries()[0]).unwrap();

        assert_eq!(compiled.fragment.columns(), ["Y".to_string(), "X".to_string()]);
        assert_eq!(
            rows(&store, &compiled, &[]),
            vec![vec!["tom".to_string(), "bob".to_string()]]
        );
    }

    #[test]
    fn test_variables_differing_only_in_case() {
        let (program, store, symbols) = load("edge(a, b). edge(b, c). ?- edge(Ab, AB).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let compiled = compiler.compile_query(&program.queries()[0]).unwrap();

        assert_eq!(compiled.fragment.columns(), ["Ab".to_string(), "AB".to_string()]);
        let sql = compiled.fragment.render().sql;
        assert_eq!(sql.matches("symbol AS v").count(), 2);
        assert!(!sql.contains("\"Ab\""));

        let mut found = rows(&store, &compiled, &[]);
        found.sort();
        assert_eq!(
            found,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["b".to_string(), "c".to_string()],
            ]
        );
    }

    #[test]
    fn test_compile_pattern_with_explicit_projection() {
        let (program, store, symbols) = load("between(a, b, c). between(a, c, d).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let args = vec![Term::constant("a"), Term::var("M"), Term::var("E")];
        let fragment = compiler.compile_pattern("between", 3, &args, &["E"]).unwrap();

        assert_eq!(fragment.columns(), ["E".to_string()]);
        let compiled = CompiledQuery {
            fragment,
            bindings: Default::default(),
            unsatisfiable: false,
        };
        let mut found = rows(&store, &compiled, &[]);
        found.sort();
        assert_eq!(found, vec![vec!["c".to_string()], vec!["d".to_string()]]);
    }

    #[test]
    fn test_compile_pattern_checks_argument_count() {
        let (program, _store, symbols) = load("edge(a, b).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let err = compiler
            .compile_pattern("edge", 2, &[Term::constant("a")], &[])
            .unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { found: 1, .. }));
    }

    #[test]
    fn test_unknown_relation_and_wrong_arity() {
        let (program, _store, symbols) = load("parent(tom, bob). ?- parent(tom). ?- sibling(tom, X).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);

        let err = compiler.compile_query(&program.queries()[0]).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { ref expected, found: 1, .. } if expected == &vec![2]));
        let err = compiler.compile_query(&program.queries()[1]).unwrap_err();
        assert!(matches!(err, Error::UnknownRelation { arity: 2, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_external_parameter() {
        let (program, store, symbols) = load("parent(tom, bob). parent(ann, bob). ?- parent(X, :child).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let compiled = compiler.compile_query(&program.queries()[0]).unwrap();

        let params: Vec<ParamKey> = compiled.fragment.params().into_iter().collect();
        assert_eq!(params, vec![ParamKey::external("child")]);
        let mut found = rows(&store, &compiled, &[("child", "bob")]);
        found.sort();
        assert_eq!(found, vec![vec!["ann".to_string()], vec!["tom".to_string()]]);
        assert!(rows(&store, &compiled, &[("child", "nobody")]).is_empty());
    }
}

// ============================================================================
// Rules
// ============================================================================

mod rule_tests {
    use super::*;

    const FAMILY: &str = "\
        parent(tom, bob). parent(bob, ann). parent(bob, liz).\n\
        grandparent(X, Z) :- parent(X, Y), parent(Y, Z).\n\
        ?- grandparent(tom, ann).\n\
        ?- grandparent(tom, W).\n\
        ?- grandparent(bob, ann).\n";

    #[test]
    fn test_rule_parameters_round_trip() {
        let (program, store, symbols) = load(FAMILY);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        RuleResolver::new(10).resolve(&mut compiler).unwrap();

        let key = RuleKey::new("grandparent", 2);
        let params: Vec<ParamKey> = compiler.rule_fragment(&key).unwrap().params().into_iter().collect();
        assert_eq!(params, vec![ParamKey::rule(&key, "X"), ParamKey::rule(&key, "Z")]);

        let cached = compiler.compile_query(&program.queries()[0]).unwrap();
        assert_eq!(cached.bindings.get(&ParamKey::rule(&key, "X")).map(String::as_str), Some("tom"));
        assert_eq!(cached.bindings.get(&ParamKey::rule(&key, "Z")).map(String::as_str), Some("ann"));
        assert!(holds(&store, &cached));

        let negative = compiler.compile_query(&program.queries()[2]).unwrap();
        assert!(!holds(&store, &negative));
    }

    #[test]
    fn test_cached_rule_with_external_parameter() {
        let source = format!("{}?- grandparent(:who, ann).\n", FAMILY);
        let (program, store, symbols) = load(&source);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        RuleResolver::new(10).resolve(&mut compiler).unwrap();

        let compiled = compiler.compile_query(&program.queries()[3]).unwrap();
        assert!(compiled.fragment.is_existence());
        let key = RuleKey::new("grandparent", 2);
        assert_eq!(compiled.bindings.get(&ParamKey::rule(&key, "Z")).map(String::as_str), Some("ann"));
        let rendered = compiled.fragment.render();
        assert_eq!(rendered.params, vec![ParamKey::external("who"), ParamKey::rule(&key, "Z")]);
        assert_eq!(rows(&store, &compiled, &[("who", "tom")]), vec![vec!["1".to_string()]]);
        assert_eq!(rows(&store, &compiled, &[("who", "bob")]), vec![vec!["0".to_string()]]);
    }

    #[test]
    fn test_rule_embedded_in_open_query() {
        let (program, store, symbols) = load(FAMILY);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        RuleResolver::new(10).resolve(&mut compiler).unwrap();

        let compiled = compiler.compile_query(&program.queries()[1]).unwrap();
        assert!(compiled.bindings.is_empty());
        assert!(compiled.fragment.params().is_empty());
        let mut found = rows(&store, &compiled, &[]);
        found.sort();
        assert_eq!(found, vec![vec!["ann".to_string()], vec!["liz".to_string()]]);
    }

    #[test]
    fn test_head_literal_mismatch_is_unsatisfiable() {
        let (program, store, symbols) = load(
            "friend(bob). likes(X, tom) :- friend(X).\n\
             ?- likes(bob, tom). ?- likes(bob, ann).",
        );
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        RuleResolver::new(10).resolve(&mut compiler).unwrap();

        assert!(holds(&store, &compiler.compile_query(&program.queries()[0]).unwrap()));
        let mismatch = compiler.compile_query(&program.queries()[1]).unwrap();
        assert!(mismatch.unsatisfiable);
    }

    #[test]
    fn test_repeated_head_variable_must_agree() {
        let (program, store, symbols) = load(
            "node(a). same(X, X) :- node(X).\n\
             ?- same(a, a). ?- same(a, b). ?- same(Y, Y).",
        );
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        RuleResolver::new(10).resolve(&mut compiler).unwrap();

        assert!(holds(&store, &compiler.compile_query(&program.queries()[0]).unwrap()));
        assert!(compiler.compile_query(&program.queries()[1]).unwrap().unsatisfiable);
        let open = compiler.compile_query(&program.queries()[2]).unwrap();
        assert_eq!(rows(&store, &open, &[]), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_join_all_versus_first_clause() {
        let source = "a(one). a(two). b(two). p(X) :- a(X), b(X). ?- p(one). ?- p(two).";
        let (program, store, symbols) = load(source);

        let mut join_all = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        RuleResolver::new(10).resolve(&mut join_all).unwrap();
        assert!(!holds(&store, &join_all.compile_query(&program.queries()[0]).unwrap()));
        assert!(holds(&store, &join_all.compile_query(&program.queries()[1]).unwrap()));

        let mut first = PatternCompiler::new(&program, &symbols, BodyPolicy::FirstClause);
        RuleResolver::new(10).resolve(&mut first).unwrap();
        assert!(holds(&store, &first.compile_query(&program.queries()[0]).unwrap()));
    }

    #[test]
    fn test_compile_rule_is_cached() {
        let (program, _store, symbols) = load(FAMILY);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let rule = program.rule("grandparent", 2).unwrap();

        let first = compiler.compile_rule(rule).unwrap().clone();
        let second = compiler.compile_rule(rule).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(compiler.compiled_rules().count(), 1);
    }
}

// ============================================================================
// Resolution
// ============================================================================

mod resolve_tests {
    use super::*;

    const CHAIN: &str = "\
        edge(a, b).\n\
        r1(X, Y) :- edge(X, Y).\n\
        r2(X, Y) :- r1(X, Y).\n\
        r3(X, Y) :- r2(X, Y).\n";

    #[test]
    fn test_base_only_rules_take_one_pass() {
        let (program, _store, symbols) = load(
            "edge(a, b). out(X) :- edge(X, Y). in(Y) :- edge(X, Y).",
        );
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let report = RuleResolver::new(10).resolve(&mut compiler).unwrap();

        assert_eq!(report.passes, 1);
        assert_eq!(report.compiled(), 2);
    }

    #[test]
    fn test_chain_takes_depth_passes() {
        let (program, _store, symbols) = load(CHAIN);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let report = RuleResolver::new(10).resolve(&mut compiler).unwrap();

        assert_eq!(report.passes, 3);
        assert_eq!(report.rules[2].rule, "r3/2");
        assert_eq!(report.rules[2].outcome, RuleOutcome::Compiled { pass: 3 });
    }

    #[test]
    fn test_pass_bound_stops_deep_chains() {
        let (program, _store, symbols) = load(CHAIN);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let err = RuleResolver::new(2).resolve(&mut compiler).unwrap_err();

        match err {
            Error::CyclicRuleDependency { passes, pending } => {
                assert_eq!(passes, 2);
                assert_eq!(pending, vec!["r3/2".to_string()]);
            }
            other => panic!("expected CyclicRuleDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_is_detected() {
        let (program, _store, symbols) = load(
            "edge(a, b). p(X) :- q(X). q(X) :- p(X). ok(X) :- edge(X, Y).",
        );
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let err = RuleResolver::new(10).resolve(&mut compiler).unwrap_err();

        assert!(err.is_fatal());
        match err {
            Error::CyclicRuleDependency { passes, pending } => {
                // pass 1 compiles ok/1, pass 2 makes no progress
                assert_eq!(passes, 2);
                assert_eq!(pending, vec!["p/1".to_string(), "q/1".to_string()]);
            }
            other => panic!("expected CyclicRuleDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_reference_cascades() {
        let (program, _store, symbols) = load("edge(a, b). p(X) :- missing(X).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let err = RuleResolver::new(10).resolve(&mut compiler).unwrap_err();

        match err {
            Error::UnsupportedRuleCascade { rule, reference } => {
                assert_eq!(rule, RuleKey::new("p", 1));
                assert_eq!(reference, "missing/1");
            }
            other => panic!("expected UnsupportedRuleCascade, got {:?}", other),
        }
    }

    #[test]
    fn test_arity_mismatch_fails_only_that_rule() {
        let (program, _store, symbols) = load(
            "edge(a, b). bad(X) :- edge(X). good(X) :- edge(X, Y). ?- bad(a).",
        );
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let report = RuleResolver::new(10).resolve(&mut compiler).unwrap();

        assert_eq!(report.compiled(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.rules[0].outcome, RuleOutcome::Failed { .. }));

        let err = compiler.compile_query(&program.queries()[0]).unwrap_err();
        assert!(matches!(err, Error::RuleFailed { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_rule_depending_on_failed_rule_cascades() {
        let (program, _store, symbols) = load("edge(a, b). bad(X) :- edge(X). worse(X) :- bad(X).");
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let err = RuleResolver::new(10).resolve(&mut compiler).unwrap_err();
        assert!(matches!(err, Error::UnsupportedRuleCascade { .. }));
    }

    #[test]
    fn test_report_serializes() {
        let (program, _store, symbols) = load(CHAIN);
        let mut compiler = PatternCompiler::new(&program, &symbols, BodyPolicy::JoinAll);
        let report = RuleResolver::new(10).resolve(&mut compiler).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["passes"], 3);
        assert_eq!(json["rules"][0]["rule"], "r1/2");
        assert_eq!(json["rules"][0]["status"], "compiled");
        assert_eq!(json["rules"][0]["pass"], 1);
    }
}
