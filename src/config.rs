//! Configuration for query tracing.

use std::time::Duration;

use crate::caller::{self, FrameLocator};
use crate::options::ConnectionOptions;
use crate::tracer::Tracer;

/// Configuration options for query tracing.
///
/// # Example
///
/// ```rust
/// use sea_orm_query_trace::{ConnectionOptions, TracingConfig};
/// use std::time::Duration;
///
/// let config = TracingConfig::default()
///     .with_connection(ConnectionOptions::new("localhost:5432", "app", "orders"))
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Where query spans are reported.
    /// Default: the thread's default subscriber at query time
    pub tracer: Tracer,

    /// Value of the `db.system` attribute.
    /// Default: "postgres"
    pub db_system: &'static str,

    /// Longest statement, in characters, attached as `db.statement`.
    /// Default: 5000
    pub max_statement_len: usize,

    /// Queries slower than this emit a WARN event inside their span.
    /// Default: 500ms
    pub slow_query_threshold: Duration,

    /// Whether to record the number of rows affected/returned.
    /// Default: `true`
    pub record_row_counts: bool,

    /// Function-name substrings treated as library code when resolving the
    /// caller of a query.
    /// Default: this crate, SeaORM, sea-query, sqlx and future polling glue
    pub caller_namespaces: Vec<String>,

    /// Number of stack frames inspected when resolving the caller.
    /// Default: 16
    pub frame_depth: usize,

    /// Connection details recorded as `db.connection_string`, `db.user` and `db.name`.
    /// Default: `None`
    pub connection: Option<ConnectionOptions>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            tracer: Tracer::default(),
            db_system: "postgres",
            max_statement_len: 5000,
            slow_query_threshold: Duration::from_millis(500),
            record_row_counts: true,
            caller_namespaces: caller::default_namespaces(),
            frame_depth: caller::DEFAULT_DEPTH,
            connection: None,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report query spans to a specific tracer.
    pub fn with_tracer(mut self, tracer: impl Into<Tracer>) -> Self {
        self.tracer = tracer.into();
        self
    }

    /// Set the `db.system` attribute value.
    pub fn with_db_system(mut self, db_system: &'static str) -> Self {
        self.db_system = db_system;
        self
    }

    /// Set the longest statement attached to spans, in characters.
    pub fn with_max_statement_len(mut self, len: usize) -> Self {
        self.max_statement_len = len;
        self
    }

    /// Set the threshold for slow query warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Enable or disable row count recording.
    pub fn with_row_count_recording(mut self, enabled: bool) -> Self {
        self.record_row_counts = enabled;
        self
    }

    /// Treat functions containing `namespace` as library code when resolving callers.
    ///
    /// Useful for skipping your own repository layer so spans point at the
    /// code that called it.
    pub fn with_caller_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.caller_namespaces.push(namespace.into());
        self
    }

    /// Set the number of stack frames inspected when resolving callers.
    pub fn with_frame_depth(mut self, depth: usize) -> Self {
        self.frame_depth = depth;
        self
    }

    /// Set the connection details recorded on every span.
    pub fn with_connection(mut self, connection: ConnectionOptions) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Create a development-friendly configuration that flags slow queries early.
    pub fn development() -> Self {
        Self {
            slow_query_threshold: Duration::from_millis(100),
            ..Self::default()
        }
    }

    /// Create a production configuration with a relaxed slow query threshold.
    pub fn production() -> Self {
        Self {
            slow_query_threshold: Duration::from_secs(1),
            ..Self::default()
        }
    }

    pub(crate) fn frame_locator(&self) -> FrameLocator {
        FrameLocator::new(self.caller_namespaces.clone(), self.frame_depth)
    }
}
