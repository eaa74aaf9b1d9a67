//! The query hook contract.
//!
//! A [`QueryHook`] is called by [`TracedConnection`](crate::TracedConnection)
//! immediately before a statement is sent and again once it has completed.
//! Both calls see a [`QueryEvent`] describing the query; the second one also
//! sees its outcome.

use std::time::Instant;

use sea_orm::DbErr;
use tracing::Span;

use crate::error::Result;
use crate::options::ConnectionOptions;
use crate::query::Query;

/// Per-query extension point.
pub trait QueryHook: Send + Sync {
    /// Called before the query is sent.
    ///
    /// The returned context is the one the query runs in and the one passed
    /// to [`QueryHook::after_query`]. Returning an error aborts the query.
    fn before_query(&self, ctx: QueryContext, event: &QueryEvent<'_>) -> Result<QueryContext>;

    /// Called after the query completed, successfully or not.
    fn after_query(&self, ctx: QueryContext, event: &QueryEvent<'_>) -> Result<()>;
}

/// The tracing context a query runs in.
#[derive(Debug, Clone)]
pub struct QueryContext {
    span: Span,
}

impl QueryContext {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// The context of the caller, taken from the current span.
    pub fn current() -> Self {
        Self::new(Span::current())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn into_span(self) -> Span {
        self.span
    }

    /// Whether the context span is being recorded by a subscriber.
    pub fn is_recording(&self) -> bool {
        !self.span.is_disabled()
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

impl From<Span> for QueryContext {
    fn from(span: Span) -> Self {
        Self::new(span)
    }
}

/// Rows touched by a successful query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub affected: u64,
    pub returned: u64,
}

impl RowCounts {
    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            returned: 0,
        }
    }

    pub fn returned(returned: u64) -> Self {
        Self {
            affected: 0,
            returned,
        }
    }

    /// Rows affected, or rows returned when nothing was affected.
    pub fn affected_or_returned(&self) -> u64 {
        if self.affected == 0 {
            self.returned
        } else {
            self.affected
        }
    }
}

/// A query as seen by hooks.
#[derive(Clone, Copy)]
pub struct QueryEvent<'a> {
    pub start_time: Instant,
    pub query: &'a dyn Query,
    /// Details of the connection, when known.
    pub connection: Option<&'a ConnectionOptions>,
    /// Set once the query has failed.
    pub error: Option<&'a DbErr>,
    /// Set once the query has succeeded, if it reports row counts.
    pub result: Option<RowCounts>,
}

impl<'a> QueryEvent<'a> {
    /// An event for a query that is about to run.
    pub fn new(query: &'a dyn Query) -> Self {
        Self {
            start_time: Instant::now(),
            query,
            connection: None,
            error: None,
            result: None,
        }
    }

    pub fn with_connection(mut self, connection: Option<&'a ConnectionOptions>) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_start_time(mut self, start_time: Instant) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_error(mut self, error: &'a DbErr) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_result(mut self, result: RowCounts) -> Self {
        self.result = Some(result);
        self
    }
}

impl std::fmt::Debug for QueryEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEvent")
            .field("start_time", &self.start_time)
            .field("operation", &self.query.operation())
            .field("connection", &self.connection)
            .field("error", &self.error)
            .field("result", &self.result)
            .finish()
    }
}
