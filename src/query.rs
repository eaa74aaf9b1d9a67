//! Query representations handed to hooks.

use std::borrow::Cow;
use std::fmt::Write;

use sea_orm::Statement;

use crate::error::{Error, Result};
use crate::parser;

/// The semantic kind of a query, as reported by the query itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOperation {
    Select,
    Insert,
    Update,
    Delete,
    /// Any other operation name, e.g. `CREATE TABLE`.
    Other(Cow<'static, str>),
}

impl QueryOperation {
    /// Returns the operation as a string suitable for span names.
    pub fn as_str(&self) -> &str {
        match self {
            QueryOperation::Select => "SELECT",
            QueryOperation::Insert => "INSERT",
            QueryOperation::Update => "UPDATE",
            QueryOperation::Delete => "DELETE",
            QueryOperation::Other(name) => name,
        }
    }
}

impl std::fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query that can be rendered to text.
///
/// Implementors that know their own operation override [`Query::operation`];
/// everything else is named from its text.
pub trait Query: Send + Sync {
    /// The query text with placeholders left in place.
    fn unformatted(&self) -> Result<String>;

    /// The query text with bound parameters interpolated.
    fn formatted(&self) -> Result<String>;

    fn operation(&self) -> Option<QueryOperation> {
        None
    }
}

impl Query for Statement {
    fn unformatted(&self) -> Result<String> {
        Ok(self.sql.clone())
    }

    fn formatted(&self) -> Result<String> {
        let bound = self.values.as_ref().map_or(0, |values| values.0.len());
        let expected = parser::placeholder_count(&self.sql, self.db_backend)
            .ok_or(Error::InvalidPlaceholder)?;
        if expected > bound {
            return Err(Error::ParameterMismatch { expected, bound });
        }

        let mut rendered = String::with_capacity(self.sql.len());
        write!(rendered, "{}", self)?;
        Ok(rendered)
    }

    fn operation(&self) -> Option<QueryOperation> {
        parser::parse_operation(&self.sql)
    }
}

/// Unprepared SQL text, as passed to `execute_unprepared`.
#[derive(Debug, Clone, Copy)]
pub struct RawSql<'a>(pub &'a str);

impl<'a> RawSql<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self(sql)
    }
}

impl Query for RawSql<'_> {
    fn unformatted(&self) -> Result<String> {
        Ok(self.0.to_owned())
    }

    fn formatted(&self) -> Result<String> {
        Ok(self.0.to_owned())
    }
}
