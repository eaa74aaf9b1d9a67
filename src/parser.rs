//! SQL helpers for detecting the operation of a statement and counting its placeholders.

use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::sea_query::{Token, Tokenizer};
use sea_orm::DbBackend;

use crate::query::QueryOperation;

static LEADING_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(SELECT|WITH|INSERT|UPDATE|DELETE)\b").unwrap());

/// Parse the DML operation of a query string.
///
/// Returns `None` for anything that is not a select, insert, update or delete.
pub fn parse_operation(sql: &str) -> Option<QueryOperation> {
    let caps = LEADING_KEYWORD.captures(sql)?;

    match caps[1].to_ascii_uppercase().as_str() {
        "SELECT" | "WITH" => Some(QueryOperation::Select),
        "INSERT" => Some(QueryOperation::Insert),
        "UPDATE" => Some(QueryOperation::Update),
        "DELETE" => Some(QueryOperation::Delete),
        _ => None,
    }
}

/// Number of bind parameters a statement expects.
///
/// The statement is tokenized the same way SeaORM inlines values, so quoted
/// strings and identifiers never count. Postgres statements use numbered `$N`
/// placeholders and the highest index wins. MySQL and SQLite use positional `?`
/// markers.
///
/// Returns `None` when a Postgres statement references `$0`, which has no value.
pub fn placeholder_count(sql: &str, backend: DbBackend) -> Option<usize> {
    let tokens: Vec<Token> = Tokenizer::new(sql).iter().collect();

    match backend {
        DbBackend::Postgres => {
            let mut highest = 0;
            for pair in tokens.windows(2) {
                let (Token::Punctuation(mark), Token::Unquoted(next)) = (&pair[0], &pair[1]) else {
                    continue;
                };
                if mark != "$" {
                    continue;
                }
                match next.parse::<usize>() {
                    Ok(0) => return None,
                    Ok(index) => highest = highest.max(index),
                    Err(_) => {}
                }
            }
            Some(highest)
        }
        DbBackend::MySql | DbBackend::Sqlite => Some(
            tokens
                .iter()
                .filter(|token| matches!(token, Token::Punctuation(mark) if mark == "?"))
                .count(),
        ),
    }
}
