//! Error type shared by the figure query engine.

use thiserror::Error;

/// Errors that abort a figure or table resolution.
///
/// Fail-soft conditions (missing table bounds, unknown period names, rows
/// that cannot be decoded) are logged where they happen and never surface
/// here.
#[derive(Error, Debug)]
pub enum FigureError {
    /// The descriptor's `type` does not name a known parser.
    #[error("unknown query type: {0}")]
    UnknownQueryType(String),

    /// A query descriptor is missing a required field or has one of the wrong type.
    #[error("malformed query descriptor: {0}")]
    MalformedQuery(String),

    /// The figure document does not have the shape its `type` requires.
    #[error("malformed figure: {0}")]
    MalformedFigure(String),

    /// A query tag points at a path the query results do not contain.
    #[error("query tag '{0}' does not resolve against the query results")]
    UnresolvedTag(String),

    /// `min(date)`/`max(date)` came back empty.
    #[error("table '{table}' has no rows for period '{period}'")]
    EmptyTable { table: String, period: String },

    #[error("figure JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("figure query failed: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("figure template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Convenience alias.
pub type FigureResult<T> = std::result::Result<T, FigureError>;
