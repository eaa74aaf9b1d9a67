//! The span factory used by the query trace hook.

use tracing::Dispatch;

/// Where query spans and events are sent.
///
/// By default spans go to whatever subscriber is the default for the thread
/// running the query, which is what `tracing_subscriber::registry().init()`
/// sets up. A tracer built with [`Tracer::new`] pins them to one subscriber
/// instead. That subscriber should be the one the application's own spans
/// are recorded in, otherwise query spans lose their parent.
#[derive(Debug, Clone, Default)]
pub struct Tracer {
    dispatch: Option<Dispatch>,
}

impl Tracer {
    /// A tracer that always reports to `dispatch`.
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// A tracer pinned to the subscriber that is the default right now.
    pub fn from_default() -> Self {
        Self::new(tracing::dispatcher::get_default(Dispatch::clone))
    }

    /// Run `f` with this tracer's subscriber as the default.
    ///
    /// Spans and events created inside `f` are reported to it.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl From<Dispatch> for Tracer {
    fn from(dispatch: Dispatch) -> Self {
        Self::new(dispatch)
    }
}
