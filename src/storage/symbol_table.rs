//! Symbol table: interns `(text, arity)` pairs and assigns stable ids

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::program::Symbol;

/// Storage identifier of a symbol (primary key of the `symbol` relation)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub i64);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Symbols in first-insertion order; the id is the 1-based insertion index
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    index: IndexMap<Symbol, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            index: IndexMap::new(),
        }
    }

    /// Build a table from symbols in the order given
    pub fn from_symbols<'s>(symbols: impl IntoIterator<Item = &'s Symbol>) -> Self {
        let mut table = Self::new();
        for symbol in symbols {
            table.intern(symbol);
        }
        table
    }

    /// Add a symbol, return its id (existing id if already interned)
    pub fn intern(&mut self, symbol: &Symbol) -> SymbolId {
        if let Some(&id) = self.index.get(symbol) {
            return id;
        }

        let id = SymbolId(self.index.len() as i64 + 1);
        self.index.insert(symbol.clone(), id);
        id
    }

    pub fn get(&self, symbol: &Symbol) -> Option<SymbolId> {
        self.index.get(symbol).copied()
    }

    /// Id of an arity-0 symbol
    pub fn constant(&self, text: &str) -> Option<SymbolId> {
        self.get(&Symbol::constant(text))
    }

    /// Symbol for an id
    pub fn lookup(&self, id: SymbolId) -> Option<&Symbol> {
        let position = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.index.get_index(position).map(|(symbol, _)| symbol)
    }

    /// Symbols with their ids, in id order
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, SymbolId)> {
        self.index.iter().map(|(symbol, &id)| (symbol, id))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern(&Symbol::constant("tom"));
        let b = table.intern(&Symbol::constant("tom"));
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut table = SymbolTable::new();
        assert_eq!(table.intern(&Symbol::new("parent", 2)), SymbolId(1));
        assert_eq!(table.intern(&Symbol::constant("tom")), SymbolId(2));
        assert_eq!(table.intern(&Symbol::constant("bob")), SymbolId(3));
        assert_eq!(table.lookup(SymbolId(2)), Some(&Symbol::constant("tom")));
        assert_eq!(table.lookup(SymbolId(0)), None);
        assert_eq!(table.lookup(SymbolId(4)), None);
    }

    #[test]
    fn test_arity_distinguishes_symbols() {
        let mut table = SymbolTable::new();
        let constant = table.intern(&Symbol::constant("likes"));
        let functor = table.intern(&Symbol::new("likes", 2));
        assert_ne!(constant, functor);
        assert_eq!(table.constant("likes"), Some(constant));
    }
}
