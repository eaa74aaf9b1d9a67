//! Traced database connection wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, IsolationLevel, QueryResult, Statement, StreamTrait, TransactionError,
    TransactionTrait,
};
use tracing::Instrument;

use crate::config::TracingConfig;
use crate::hook::{QueryContext, QueryEvent, QueryHook, RowCounts};
use crate::query::{Query, RawSql};
use crate::trace_hook::QueryTraceHook;

/// A wrapper around SeaORM's `DatabaseConnection` that runs query hooks.
///
/// This wrapper implements `ConnectionTrait`, `StreamTrait`, and `TransactionTrait`,
/// making it a drop-in replacement for `DatabaseConnection`. Every statement
/// goes through the registered [`QueryHook`]s; a [`QueryTraceHook`] built from
/// the configuration is registered by default.
///
/// # Span Nesting
///
/// Query spans are children of the span the query is issued from. If you're
/// using tracing middleware in your web framework (e.g., `tower-http`'s
/// `TraceLayer`), database spans will appear nested under HTTP request spans.
/// Queries issued outside of any recorded span are not traced.
///
/// Clones share the underlying connection, configuration and hooks.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::Database;
/// use sea_orm_query_trace::TracedConnection;
///
/// let db = Database::connect("postgres://localhost/mydb").await?;
/// let traced = TracedConnection::from(db);
///
/// // All queries are now traced
/// let users = Users::find().all(&traced).await?;
/// ```
#[derive(Clone)]
pub struct TracedConnection {
    inner: Arc<DatabaseConnection>,
    config: Arc<TracingConfig>,
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl TracedConnection {
    /// Create a new traced connection with the given configuration.
    pub fn new(connection: DatabaseConnection, config: TracingConfig) -> Self {
        let config = Arc::new(config);
        let trace_hook: Arc<dyn QueryHook> = Arc::new(QueryTraceHook::new(config.clone()));
        Self {
            inner: Arc::new(connection),
            config,
            hooks: vec![trace_hook],
        }
    }

    /// Create a new traced connection with default configuration.
    pub fn wrap(connection: DatabaseConnection) -> Self {
        Self::new(connection, TracingConfig::default())
    }

    /// Register another hook.
    ///
    /// Hooks see queries in registration order before they run and in
    /// reverse order once they complete.
    pub fn add_query_hook(&mut self, hook: impl QueryHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Get the tracing configuration.
    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    ///
    /// Hands the wrapper back while clones of it are still alive.
    pub fn into_inner(self) -> Result<DatabaseConnection, Self> {
        let Self {
            inner,
            config,
            hooks,
        } = self;
        Arc::try_unwrap(inner).map_err(|inner| Self {
            inner,
            config,
            hooks,
        })
    }

    fn event<'a>(&'a self, query: &'a dyn Query, start_time: Instant) -> QueryEvent<'a> {
        QueryEvent::new(query)
            .with_start_time(start_time)
            .with_connection(self.config.connection.as_ref())
    }

    /// Run `fut` between the hooks, reporting its outcome to them.
    async fn run<T, F>(
        &self,
        query: &dyn Query,
        fut: F,
        row_counts: impl FnOnce(&T) -> Option<RowCounts>,
    ) -> Result<T, DbErr>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        let start_time = Instant::now();
        let ctx = self.before_query(&self.event(query, start_time))?;

        let result = fut.instrument(ctx.span().clone()).await;

        let mut event = self.event(query, start_time);
        match &result {
            Ok(value) => event.result = row_counts(value),
            Err(err) => event.error = Some(err),
        }
        self.after_query(ctx, &event);

        result
    }

    fn before_query(&self, event: &QueryEvent<'_>) -> Result<QueryContext, DbErr> {
        let mut ctx = QueryContext::current();

        for (index, hook) in self.hooks.iter().enumerate() {
            match hook.before_query(ctx.clone(), event) {
                Ok(next) => ctx = next,
                Err(err) => {
                    tracing::debug!(error = %err, "Query hook rejected query");
                    let rejection = DbErr::Custom(err.to_string());
                    self.unwind(&self.hooks[..index], ctx, &event.with_error(&rejection));
                    return Err(rejection);
                }
            }
        }

        Ok(ctx)
    }

    fn after_query(&self, ctx: QueryContext, event: &QueryEvent<'_>) {
        self.unwind(&self.hooks, ctx, event);
    }

    /// Run `after_query` on `hooks` in reverse order.
    fn unwind(&self, hooks: &[Arc<dyn QueryHook>], ctx: QueryContext, event: &QueryEvent<'_>) {
        let Some((first, rest)) = hooks.split_first() else {
            return;
        };

        for hook in rest.iter().rev() {
            if let Err(err) = hook.after_query(ctx.clone(), event) {
                tracing::warn!(error = %err, "Query hook failed after query");
            }
        }
        // the last hook to run takes the context itself, so its span can close
        if let Err(err) = first.after_query(ctx, event) {
            tracing::warn!(error = %err, "Query hook failed after query");
        }
    }
}

impl std::fmt::Debug for TracedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedConnection")
            .field("inner", &*self.inner)
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl From<DatabaseConnection> for TracedConnection {
    fn from(connection: DatabaseConnection) -> Self {
        Self::wrap(connection)
    }
}

impl AsRef<DatabaseConnection> for TracedConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

#[async_trait]
impl ConnectionTrait for TracedConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let query = stmt.clone();
        self.run(&query, self.inner.execute(stmt), |res| {
            Some(RowCounts::affected(res.rows_affected()))
        })
        .await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        self.run(&RawSql::new(sql), self.inner.execute_unprepared(sql), |res| {
            Some(RowCounts::affected(res.rows_affected()))
        })
        .await
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let query = stmt.clone();
        self.run(&query, self.inner.query_one(stmt), |row| {
            Some(RowCounts::returned(u64::from(row.is_some())))
        })
        .await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let query = stmt.clone();
        self.run(&query, self.inner.query_all(stmt), |rows| {
            Some(RowCounts::returned(rows.len() as u64))
        })
        .await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

impl StreamTrait for TracedConnection {
    type Stream<'a> = <DatabaseConnection as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        Box::pin(async move {
            let query = stmt.clone();
            // rows are only known once the caller drains the stream
            self.run(&query, self.inner.stream(stmt), |_| None).await
        })
    }
}

#[async_trait]
impl TransactionTrait for TracedConnection {
    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        self.run(&RawSql::new("BEGIN"), self.inner.begin(), |_| None)
            .await
    }

    async fn begin_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<DatabaseTransaction, DbErr> {
        self.run(
            &RawSql::new("BEGIN"),
            self.inner.begin_with_config(isolation_level, access_mode),
            |_| None,
        )
        .await
    }

    async fn transaction<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let transaction = self.begin().await.map_err(TransactionError::Connection)?;
        run_transaction(transaction, callback).await
    }

    async fn transaction_with_config<F, T, E>(
        &self,
        callback: F,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let transaction = self
            .begin_with_config(isolation_level, access_mode)
            .await
            .map_err(TransactionError::Connection)?;
        run_transaction(transaction, callback).await
    }
}

/// Run `callback` inside `transaction`, committing on success and rolling back on error.
async fn run_transaction<F, T, E>(
    transaction: DatabaseTransaction,
    callback: F,
) -> Result<T, TransactionError<E>>
where
    F: for<'c> FnOnce(
            &'c DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
        + Send,
    T: Send,
    E: std::fmt::Display + std::fmt::Debug + Send,
{
    let result = callback(&transaction).await;
    match result {
        Ok(value) => {
            transaction
                .commit()
                .await
                .map_err(TransactionError::Connection)?;
            Ok(value)
        }
        Err(err) => {
            transaction
                .rollback()
                .await
                .map_err(TransactionError::Connection)?;
            Err(TransactionError::Transaction(err))
        }
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait TracingExt {
    /// Wrap this connection with tracing instrumentation.
    fn with_tracing(self) -> TracedConnection;

    /// Wrap this connection with custom tracing configuration.
    fn with_tracing_config(self, config: TracingConfig) -> TracedConnection;
}

impl TracingExt for DatabaseConnection {
    fn with_tracing(self) -> TracedConnection {
        TracedConnection::wrap(self)
    }

    fn with_tracing_config(self, config: TracingConfig) -> TracedConnection {
        TracedConnection::new(self, config)
    }
}
