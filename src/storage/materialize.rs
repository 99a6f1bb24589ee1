//! Fact materializer: symbols commit first, then facts

use crate::error::{Error, Result};
use crate::program::{Program, Symbol};
use crate::storage::{FactRow, RelationalStore, SymbolTable, MAX_ARITY};

/// Assign ids to every symbol of the program and persist symbols and facts.
///
/// Two phases, each its own committed transaction: no fact row is written
/// until every symbol id it references is committed.
pub fn materialize<S: RelationalStore + ?Sized>(store: &mut S, program: &Program) -> Result<SymbolTable> {
    let table = SymbolTable::from_symbols(program.symbols());

    // Resolve every row up front so nothing is written for a bad program
    let mut rows = Vec::with_capacity(program.facts().len());
    for fact in program.facts() {
        if fact.arity() > MAX_ARITY {
            return Err(Error::UnsupportedArity {
                functor: fact.functor().to_string(),
                arity: fact.arity(),
                max: MAX_ARITY,
            });
        }

        let functor = table
            .get(&fact.symbol())
            .ok_or_else(|| Error::UnknownSymbol(fact.symbol().to_string()))?;
        let args = fact
            .args()
            .iter()
            .map(|arg| {
                table
                    .constant(arg)
                    .ok_or_else(|| Error::UnknownSymbol(Symbol::constant(arg).to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(FactRow { functor, args });
    }

    let symbols = store.insert_symbols(&table)?;
    let facts = store.insert_facts(&rows)?;
    tracing::info!("Materialized {} symbols, {} facts", symbols, facts);

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::parse_program;
    use crate::storage::SqliteStore;

    #[test]
    fn test_symbol_rows_are_distinct_pairs() {
        let program = parse_program(
            "parent(tom, bob). parent(tom, tom). parent(bob, ann).\n\
             likes(tom, bob).\n\
             ?- parent(tom, X).",
        )
        .unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let table = materialize(&mut store, &program).unwrap();

        // parent/2, tom, bob, ann, likes/2
        assert_eq!(table.len(), 5);
        assert_eq!(store.count_rows("symbol").unwrap(), 5);
        assert_eq!(store.count_rows("fact_2ary").unwrap(), 4);
    }

    #[test]
    fn test_facts_land_in_relation_for_their_arity() {
        let program = parse_program("sunny. human(socrates). edge(a, b). between(a, b, c).").unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        materialize(&mut store, &program).unwrap();

        assert_eq!(store.count_rows("fact_0ary").unwrap(), 1);
        assert_eq!(store.count_rows("fact_1ary").unwrap(), 1);
        assert_eq!(store.count_rows("fact_2ary").unwrap(), 1);
        assert_eq!(store.count_rows("fact_3ary").unwrap(), 1);
    }

    #[test]
    fn test_oversized_fact_writes_nothing() {
        let program = parse_program("tom(a). wide(a, b, c, d, e).").unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let err = materialize(&mut store, &program).unwrap_err();

        assert!(matches!(err, Error::UnsupportedArity { arity: 5, .. }));
        assert_eq!(store.count_rows("symbol").unwrap(), 0);
    }

    #[test]
    fn test_ids_are_reproducible() {
        let source = "b(x). a(y, x). c(z).";
        let first = materialize(&mut SqliteStore::in_memory().unwrap(), &parse_program(source).unwrap()).unwrap();
        let second = materialize(&mut SqliteStore::in_memory().unwrap(), &parse_program(source).unwrap()).unwrap();

        let first: Vec<_> = first.iter().map(|(s, id)| (s.clone(), id)).collect();
        let second: Vec<_> = second.iter().map(|(s, id)| (s.clone(), id)).collect();
        assert_eq!(first, second);
    }
}
