//! Query dispatch: descriptor parsing, window resolution and the parsers.
//!
//! [`resolve_query`] is the single entry point. It parses the descriptor,
//! settles the period and time window against the table's own date bounds,
//! then hands off to the parser for the descriptor's kind.

pub mod descriptor;
pub mod output;
pub mod parsers;
pub mod sql;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::Value;

pub use descriptor::{QueryDescriptor, QueryKind};
pub use output::{MISSING, QueryOutput, SeriesData};

use crate::error::{FigureError, FigureResult};
use crate::period::{align_range, beginning_of, end_of};
use crate::types::{FilterSpec, ParseArgs, PeriodKind, ResolvedArgs};
use sql::{DATE_COLUMN, PERIOD_COLUMN, SelectBuilder, query_rows, quote_ident, row_date};

/// Earliest and latest `date` of `table` at `period`, under `filters`.
pub fn table_date_range(
    conn: &Connection,
    table: &str,
    period: PeriodKind,
    filters: &[FilterSpec],
) -> FigureResult<(NaiveDateTime, NaiveDateTime)> {
    let date = quote_ident(DATE_COLUMN);
    let builder = SelectBuilder::new(
        [format!("min({date})"), format!("max({date})")],
        table,
    )
    .where_eq(
        PERIOD_COLUMN,
        rusqlite::types::Value::Text(period.as_str().to_string()),
    )
    .filters(filters);

    let rows = query_rows(conn, builder.to_sql(), |row| {
        Some((
            row_date(row.get_ref(0).ok()?),
            row_date(row.get_ref(1).ok()?),
        ))
    })?;

    match rows.first() {
        Some((Some(min), Some(max))) => Ok((*min, *max)),
        _ => Err(FigureError::EmptyTable {
            table: table.to_string(),
            period: period.to_string(),
        }),
    }
}

/// Settle the query window.
///
/// Missing bounds are filled from the standard range ending at the caller's
/// `end`, or at the table's latest date when no end is given. That default
/// start is raised to the table's earliest date when the data starts later,
/// but never past the end. Caller bounds are only snapped outward to whole
/// periods. Without table bounds the standard range ending now applies. An
/// inverted window collapses to the single period at `start`.
pub fn resolve_window(
    args: &ParseArgs,
    period: PeriodKind,
    bounds: Option<(NaiveDateTime, NaiveDateTime)>,
) -> ResolvedArgs {
    let anchor = args.end.or(bounds.map(|(_, max)| max));
    let (mut default_start, default_end) = align_range(None, anchor, period);
    if let Some((min, _)) = bounds {
        let floor = beginning_of(min, period);
        if floor > default_start && floor <= default_end {
            default_start = floor;
        }
    }

    let start = args
        .start
        .map(|t| beginning_of(t, period))
        .unwrap_or(default_start);
    let mut end = args.end.map(|t| end_of(t, period)).unwrap_or(default_end);
    if start > end {
        end = end_of(start, period);
    }

    ResolvedArgs {
        start,
        end,
        period,
        filters: args.filters.clone(),
    }
}

/// Parse `descriptor`, resolve its window and run the matching parser.
pub fn resolve_query(
    conn: &Connection,
    descriptor: &Value,
    args: &ParseArgs,
) -> FigureResult<QueryOutput> {
    let query = QueryDescriptor::from_json(descriptor)?;
    let period = query
        .period()
        .map(|name| PeriodKind::resolve_or(name, args.period))
        .unwrap_or(args.period);

    let bounds = match table_date_range(conn, query.table(), period, &args.filters) {
        Ok(bounds) => Some(bounds),
        Err(e) => {
            tracing::warn!(
                table = %query.table(),
                %period,
                error = %e,
                "could not read table date bounds; using the default window"
            );
            None
        }
    };
    let resolved = resolve_window(args, period, bounds);
    tracing::debug!(
        kind = %query.kind(),
        table = %query.table(),
        start = %resolved.start,
        end = %resolved.end,
        %period,
        "resolved query window"
    );

    match &query {
        QueryDescriptor::Element(q) => parsers::element(conn, q, &resolved),
        QueryDescriptor::SelectColumn(q) => parsers::select_column(conn, q, &resolved),
        QueryDescriptor::Aggregate(q) => parsers::aggregate(conn, q, &resolved),
        QueryDescriptor::PeriodSeries(q) => parsers::period_series(conn, q, &resolved),
        QueryDescriptor::Xox(q) => parsers::xox(conn, q, &resolved),
        QueryDescriptor::Distinct(q) => parsers::distinct(conn, q),
    }
}
