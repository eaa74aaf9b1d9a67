//! Error types.

use thiserror::Error;

/// Errors produced by query hooks and connection setup.
#[derive(Debug, Error)]
pub enum Error {
    /// The query could not be rendered to text.
    #[error("failed to render query text")]
    Render(#[from] std::fmt::Error),

    /// The statement refers to more placeholders than it has bound values.
    #[error("statement references {expected} parameters but only {bound} were bound")]
    ParameterMismatch { expected: usize, bound: usize },

    /// The statement uses `$0`, which no bound value answers to.
    #[error("statement references parameter $0, numbering starts at $1")]
    InvalidPlaceholder,

    /// The connection URL could not be parsed.
    #[error("invalid connection url")]
    InvalidUrl(#[from] url::ParseError),

    /// The connection URL has no host component.
    #[error("connection url has no host")]
    MissingHost,

    /// A hook refused to let the query run.
    #[error("query rejected by hook: {0}")]
    Rejected(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
