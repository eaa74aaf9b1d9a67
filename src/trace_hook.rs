//! The query hook that turns each query into a `db.query` span.

use std::sync::Arc;

use sea_orm::DbErr;
use tracing::{field, Span};

use crate::caller::FrameLocator;
use crate::config::TracingConfig;
use crate::error::Result;
use crate::hook::{QueryContext, QueryEvent, QueryHook};
use crate::query::QueryOperation;
use crate::tracer::Tracer;

/// Name of the spans created for queries.
pub const QUERY_SPAN: &str = "db.query";

// Longest span name derived from query text
const NAME_LIMIT: usize = 20;

/// Status given to a query span after a failed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    /// The query matched no rows, or not the number of rows it needed.
    NotFound,
    /// Any other failure. The span is also marked as an error.
    Internal,
}

impl SpanStatus {
    /// Classify a failed query.
    pub fn from_error(err: &DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) | DbErr::RecordNotInserted | DbErr::RecordNotUpdated => {
                SpanStatus::NotFound
            }
            _ => SpanStatus::Internal,
        }
    }

    /// The value recorded in the span's `status.code` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::NotFound => "NOT_FOUND",
            SpanStatus::Internal => "INTERNAL",
        }
    }
}

/// A [`QueryHook`] that records every query as a tracing span.
///
/// Spans are only created when the query runs inside a span that is itself
/// recorded, so queries issued outside of any traced request cost nothing.
///
/// | Field | Description |
/// |-------|-------------|
/// | `otel.name` | Query operation, or the first word of the statement |
/// | `db.system` | Database system, "postgres" by default |
/// | `db.statement` | Statement text, bound values inlined except for inserts |
/// | `frame.func`, `frame.file`, `frame.line` | Application code that issued the query |
/// | `db.connection_string`, `db.user`, `db.name` | Connection details, when configured |
/// | `db.rows_affected` | Rows affected, or rows returned (success only) |
/// | `status.code` | `NOT_FOUND` or `INTERNAL` (failure only) |
/// | `otel.status_code` | "ERROR" for internal failures |
/// | `error.message` | Error details for internal failures |
#[derive(Debug, Clone)]
pub struct QueryTraceHook {
    config: Arc<TracingConfig>,
    locator: FrameLocator,
}

impl QueryTraceHook {
    pub fn new(config: impl Into<Arc<TracingConfig>>) -> Self {
        let config = config.into();
        let locator = config.frame_locator();
        Self { config, locator }
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    fn tracer(&self) -> &Tracer {
        &self.config.tracer
    }

    fn start_span(&self, parent: &Span) -> Span {
        self.tracer().in_scope(|| {
            tracing::info_span!(
                parent: parent,
                QUERY_SPAN,
                otel.name = field::Empty,
                otel.kind = "client",
                otel.status_code = field::Empty,
                status.code = field::Empty,
                db.system = field::Empty,
                db.statement = field::Empty,
                db.connection_string = field::Empty,
                db.user = field::Empty,
                db.name = field::Empty,
                db.rows_affected = field::Empty,
                frame.func = field::Empty,
                frame.file = field::Empty,
                frame.line = field::Empty,
                error.message = field::Empty,
            )
        })
    }

    fn record_outcome(&self, span: &Span, event: &QueryEvent<'_>) {
        if let Some(err) = event.error {
            let status = SpanStatus::from_error(err);
            span.record("status.code", status.as_str());
            if status == SpanStatus::Internal {
                span.record("otel.status_code", "ERROR");
                span.record("error.message", field::display(err));
                tracing::error!(
                    parent: span,
                    error = %err,
                    "Database query failed"
                );
            }
        } else if let Some(counts) = event.result {
            if self.config.record_row_counts {
                span.record("db.rows_affected", counts.affected_or_returned());
            }
        }

        let elapsed = event.start_time.elapsed();
        if elapsed > self.config.slow_query_threshold {
            tracing::warn!(
                parent: span,
                duration_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_query_threshold.as_millis() as u64,
                "Slow query detected"
            );
        }
    }
}

impl Default for QueryTraceHook {
    fn default() -> Self {
        Self::new(TracingConfig::default())
    }
}

impl QueryHook for QueryTraceHook {
    fn before_query(&self, ctx: QueryContext, _event: &QueryEvent<'_>) -> Result<QueryContext> {
        if !ctx.is_recording() {
            return Ok(ctx);
        }

        Ok(QueryContext::new(self.start_span(ctx.span())))
    }

    fn after_query(&self, ctx: QueryContext, event: &QueryEvent<'_>) -> Result<()> {
        if !ctx.is_recording() {
            return Ok(());
        }
        // closes when dropped, including on the early return below
        let span = ctx.into_span();

        let operation = event
            .query
            .operation()
            .filter(|operation| !operation.as_str().is_empty());

        let mut statement = match operation {
            Some(QueryOperation::Insert) => event.query.unformatted()?,
            _ => event.query.formatted()?,
        };

        if let Some(name) = span_name(operation.as_ref(), &statement) {
            span.record("otel.name", name);
        }

        truncate_chars(&mut statement, self.config.max_statement_len);

        span.record("db.system", self.config.db_system);
        span.record("db.statement", statement.as_str());

        if let Some(frame) = self.locator.locate() {
            span.record("frame.func", frame.function.as_str());
            span.record("frame.file", frame.file.as_str());
            span.record("frame.line", frame.line);
        }

        if let Some(connection) = event.connection {
            span.record("db.connection_string", connection.addr.as_str());
            span.record("db.user", connection.user.as_str());
            span.record("db.name", connection.database.as_str());
        }

        self.tracer().in_scope(|| self.record_outcome(&span, event));

        Ok(())
    }
}

/// Pick a span name for a query.
///
/// A known operation wins. Otherwise the statement text up to its first space,
/// capped at 20 bytes, is used. Statements without a space get no name.
fn span_name<'a>(operation: Option<&'a QueryOperation>, statement: &'a str) -> Option<&'a str> {
    if let Some(operation) = operation {
        return Some(operation.as_str());
    }

    let mut end = statement.find(' ')?.min(NAME_LIMIT);
    while !statement.is_char_boundary(end) {
        end -= 1;
    }

    Some(statement[..end].trim()).filter(|name| !name.is_empty())
}

/// Cut `text` down to at most `limit` characters.
fn truncate_chars(text: &mut String, limit: usize) {
    if let Some((end, _)) = text.char_indices().nth(limit) {
        text.truncate(end);
    }
}
