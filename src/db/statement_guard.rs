//! Statement allow-list applied before anything reaches the store.
//!
//! Generated SQL is untrusted text. Under [`StatementPolicy::ReadOnly`] it must
//! parse as exactly one read-only query; [`StatementPolicy::Trust`] runs it verbatim.

use serde::{Deserialize, Serialize};
use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementPolicy {
    /// Only a single SELECT-shaped query (or a plain EXPLAIN of one) may run.
    #[default]
    ReadOnly,
    /// Execute whatever the generator produced.
    Trust,
}

impl StatementPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::Trust => "trust",
        }
    }

    /// Returns the reason a statement may not run, or `None` if it may.
    pub fn violation(&self, sql: &str) -> Option<String> {
        match self {
            Self::Trust => None,
            Self::ReadOnly => read_only_violation(sql),
        }
    }
}

fn read_only_violation(sql: &str) -> Option<String> {
    let statements = match Parser::parse_sql(&DuckDbDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => return Some(format!("statement could not be parsed: {}", e)),
    };

    match statements.as_slice() {
        [] => Some("no statement found".to_string()),
        [statement] if statement_is_read_only(statement) => None,
        [_] => Some("only read-only queries may run".to_string()),
        many => Some(format!("expected one statement, found {}", many.len())),
    }
}

fn statement_is_read_only(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => query_is_read_only(query),
        // EXPLAIN ANALYZE executes its statement
        Statement::Explain {
            analyze, statement, ..
        } => !*analyze && statement_is_read_only(statement),
        _ => false,
    }
}

fn query_is_read_only(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .is_none_or(|with| with.cte_tables.iter().all(|cte| query_is_read_only(&cte.query)));

    ctes_read_only && set_expr_is_read_only(&query.body)
}

fn set_expr_is_read_only(set_expr: &SetExpr) -> bool {
    match set_expr {
        // SELECT ... INTO creates a table
        SetExpr::Select(select) => {
            select.into.is_none() && select.from.iter().all(table_with_joins_is_read_only)
        }
        SetExpr::Query(query) => query_is_read_only(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read_only(left) && set_expr_is_read_only(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
        _ => false,
    }
}

fn table_with_joins_is_read_only(twj: &TableWithJoins) -> bool {
    table_factor_is_read_only(&twj.relation)
        && twj.joins.iter().all(|join| table_factor_is_read_only(&join.relation))
}

fn table_factor_is_read_only(factor: &TableFactor) -> bool {
    match factor {
        TableFactor::Derived { subquery, .. } => query_is_read_only(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_is_read_only(table_with_joins),
        _ => true,
    }
}
