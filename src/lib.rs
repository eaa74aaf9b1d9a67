//! # sea-orm-query-trace
//!
//! Query hooks for SeaORM, and a hook that turns every query into a tracing span.
//!
//! Wrap a `DatabaseConnection` in a [`TracedConnection`] and every statement
//! it runs becomes a `db.query` span, nested under whatever span issued it
//! (an HTTP request span from axum or actix-web, for example). The span
//! carries the statement, the application function that issued the query,
//! the number of rows it touched and, on failure, an error status.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_query_trace::TracedConnection;
//!
//! // Wrap your existing connection
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let traced_db = TracedConnection::from(db);
//!
//! // Use it exactly like a normal DatabaseConnection
//! let users = Users::find().all(&traced_db).await?;
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use sea_orm_query_trace::{ConnectionOptions, TracedConnection, TracingConfig};
//!
//! let config = TracingConfig::default()
//!     .with_connection(ConnectionOptions::from_url(&database_url)?)
//!     .with_caller_namespace("my_app::repository")
//!     .with_slow_query_threshold(Duration::from_millis(100));
//!
//! let traced_db = TracedConnection::new(db, config);
//! ```
//!
//! ## Custom hooks
//!
//! Anything implementing [`QueryHook`] can be registered with
//! [`TracedConnection::add_query_hook`]. Hooks are called before each query is
//! sent and again once it has completed.
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `otel.name` | Query operation (SELECT, INSERT, UPDATE, DELETE) or the statement's first word |
//! | `db.system` | "postgres" unless configured otherwise |
//! | `db.statement` | The statement, at most 5000 characters. Bound values are inlined except for inserts |
//! | `frame.func` / `frame.file` / `frame.line` | Application code that issued the query |
//! | `db.connection_string` / `db.user` / `db.name` | Connection details (when configured) |
//! | `db.rows_affected` | Number of rows affected, or returned |
//! | `status.code` | `NOT_FOUND` for row-count mismatches, `INTERNAL` for other failures |
//! | `otel.status_code` | "ERROR" for internal failures |
//! | `error.message` | Error details (on internal failure) |

mod caller;
mod config;
mod connection;
mod error;
mod hook;
mod options;
mod parser;
mod query;
mod trace_hook;
mod tracer;

#[cfg(test)]
mod test_utils;

pub use caller::{Frame, FrameLocator};
pub use config::TracingConfig;
pub use connection::{TracedConnection, TracingExt};
pub use error::{Error, Result};
pub use hook::{QueryContext, QueryEvent, QueryHook, RowCounts};
pub use options::ConnectionOptions;
pub use query::{Query, QueryOperation, RawSql};
pub use trace_hook::{QueryTraceHook, SpanStatus, QUERY_SPAN};
pub use tracer::Tracer;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{QueryHook, TracedConnection, TracingConfig, TracingExt};
}
