//! Relational schema: one symbol relation plus one fact relation per arity

/// Highest fact arity with a backing relation
pub const MAX_ARITY: usize = 4;

/// Name of the symbol relation
pub const SYMBOL_TABLE: &str = "symbol";

/// Fact relation for an arity, e.g. `fact_2ary`
pub fn fact_table(arity: usize) -> String {
    format!("fact_{}ary", arity)
}

/// Argument column for a 1-based position, e.g. `arg1_id`
pub fn arg_column(position: usize) -> String {
    format!("arg{}_id", position)
}

/// DDL for the whole schema, safe to run against an existing database
pub fn create_statements() -> Vec<String> {
    let mut statements = vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, symbol TEXT NOT NULL, arity INTEGER NOT NULL)",
            SYMBOL_TABLE
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS symbol_arity ON {} (symbol, arity)",
            SYMBOL_TABLE
        ),
    ];

    for arity in 0..=MAX_ARITY {
        let mut columns = vec![format!(
            "functor_id INTEGER NOT NULL REFERENCES {}(id)",
            SYMBOL_TABLE
        )];
        for position in 1..=arity {
            columns.push(format!(
                "{} INTEGER NOT NULL REFERENCES {}(id)",
                arg_column(position),
                SYMBOL_TABLE
            ));
        }
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            fact_table(arity),
            columns.join(", ")
        ));
    }

    statements
}

/// Parameterized insert for one fact row of the given arity
pub fn insert_fact_statement(arity: usize) -> String {
    let mut columns = vec!["functor_id".to_string()];
    columns.extend((1..=arity).map(arg_column));
    let placeholders: Vec<String> = (1..=arity + 1).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        fact_table(arity),
        columns.join(", "),
        placeholders.join(", ")
    )
}
