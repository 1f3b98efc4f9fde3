//! The six figure query parsers.
//!
//! Each parser receives an already resolved window and runs one or two
//! statements against the table named by its descriptor. Series results are
//! dense: every label of [`period_range`] appears exactly once, in order,
//! with [`MISSING`] where the table has no row.

use std::collections::{BTreeMap, HashMap};

use rusqlite::Connection;

use super::descriptor::{
    AggregateQuery, DistinctQuery, ElementQuery, PeriodSeriesQuery, SelectColumnQuery, XoxQuery,
};
use super::output::{MISSING, QueryOutput, SeriesData};
use super::sql::{DATE_COLUMN, SelectBuilder, column_expr, query_rows, quote_ident, row_date, row_text};
use crate::error::FigureResult;
use crate::period::{backward, beginning_of, end_of, format_period, next_level, period_range, xox_name};
use crate::types::{PeriodKind, ResolvedArgs};

/// Tolerance used when comparing the current and previous xox values.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// `1` when `a` is greater than or equal to `b` within [`FLOAT_EPSILON`],
/// `-1` otherwise.
pub fn cmp_float(a: f64, b: f64) -> i32 {
    let x = a - b;
    if x.abs() < FLOAT_EPSILON || x > FLOAT_EPSILON {
        1
    } else {
        -1
    }
}

/// Left-join `(label, value)` records onto `labels`. The first record for a
/// label wins.
pub(crate) fn densify(labels: &[String], records: impl IntoIterator<Item = (String, String)>) -> Vec<String> {
    let mut by_label: HashMap<String, String> = HashMap::new();
    for (label, value) in records {
        by_label.entry(label).or_insert(value);
    }
    labels
        .iter()
        .map(|label| by_label.get(label).cloned().unwrap_or_else(|| MISSING.to_string()))
        .collect()
}

fn order_by_date() -> String {
    format!("{} ASC", quote_ident(DATE_COLUMN))
}

// ---------------------------------------------------------------------------
// element
// ---------------------------------------------------------------------------

/// Value of `function` over the window, as text. `None` when the store
/// returns no row, NULL or an empty string.
pub fn element_value(
    conn: &Connection,
    query: &ElementQuery,
    args: &ResolvedArgs,
) -> FigureResult<Option<String>> {
    let mut args = args.clone();
    if query.one {
        args.start = beginning_of(args.end, args.period);
    }
    let builder = SelectBuilder::new([query.function.clone()], &query.table).window(&args);
    let values = query_rows(conn, builder.to_sql(), |row| {
        row.get_ref(0).ok().and_then(row_text)
    })?;
    Ok(values.into_iter().last().filter(|v| !v.is_empty()))
}

pub fn element(
    conn: &Connection,
    query: &ElementQuery,
    args: &ResolvedArgs,
) -> FigureResult<QueryOutput> {
    Ok(QueryOutput::Element {
        data: element_value(conn, query, args)?,
    })
}

// ---------------------------------------------------------------------------
// select_column
// ---------------------------------------------------------------------------

pub fn select_column(
    conn: &Connection,
    query: &SelectColumnQuery,
    args: &ResolvedArgs,
) -> FigureResult<QueryOutput> {
    let period = args.period;
    let builder = SelectBuilder::new(
        [
            quote_ident(DATE_COLUMN),
            format!("{} AS \"value\"", column_expr(&query.column)),
        ],
        &query.table,
    )
    .window(args)
    .order_by(order_by_date());

    let records = query_rows(conn, builder.to_sql(), |row| {
        let date = row_date(row.get_ref(0).ok()?)?;
        let value = row_text(row.get_ref(1).ok()?)?;
        Some((format_period(date, period), value))
    })?;

    let date_range = period_range(args.start, args.end, period);
    let series = densify(&date_range, records);
    let data = if query.raise_dimension {
        SeriesData::Raised(vec![series])
    } else {
        SeriesData::Flat(series)
    };
    Ok(QueryOutput::Series { date_range, data })
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

pub fn aggregate(
    conn: &Connection,
    query: &AggregateQuery,
    args: &ResolvedArgs,
) -> FigureResult<QueryOutput> {
    let period = args.period;
    let group = column_expr(&query.group_key);
    let builder = SelectBuilder::new(
        [
            quote_ident(DATE_COLUMN),
            format!("{group} AS \"group_value\""),
            format!("{} AS \"value\"", query.function),
        ],
        &query.table,
    )
    .window(args)
    .group_by([quote_ident(DATE_COLUMN), group.clone()])
    .order_by(order_by_date());

    let records = query_rows(conn, builder.to_sql(), |row| {
        let date = row_date(row.get_ref(0).ok()?)?;
        let group_value = row_text(row.get_ref(1).ok()?)?;
        let value = row_text(row.get_ref(2).ok()?)?;
        Some((group_value, format_period(date, period), value))
    })?;

    let mut by_group: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (group_value, label, value) in records {
        by_group.entry(group_value).or_default().push((label, value));
    }

    let date_range = period_range(args.start, args.end, period);
    let mut group_values = Vec::with_capacity(by_group.len());
    let mut data = Vec::with_capacity(by_group.len());
    for (group_value, records) in by_group {
        data.push(densify(&date_range, records));
        group_values.push(group_value);
    }

    Ok(QueryOutput::Grouped {
        date_range,
        group_values,
        data,
    })
}

// ---------------------------------------------------------------------------
// period_series
// ---------------------------------------------------------------------------

pub fn period_series(
    conn: &Connection,
    query: &PeriodSeriesQuery,
    args: &ResolvedArgs,
) -> FigureResult<QueryOutput> {
    let period = args.period;
    let builder = SelectBuilder::new(
        [
            quote_ident(DATE_COLUMN),
            format!("{} AS \"value\"", column_expr(&query.column)),
        ],
        &query.table,
    )
    .window(args)
    .order_by(order_by_date());

    let records = query_rows(conn, builder.to_sql(), |row| {
        let date = row_date(row.get_ref(0).ok()?)?;
        let value = row_text(row.get_ref(1).ok()?)?;
        Some((format_period(date, period), value))
    })?;

    let mut buckets: HashMap<String, Vec<String>> = HashMap::new();
    for (label, value) in records {
        buckets.entry(label).or_default().push(value);
    }

    let date_range = period_range(args.start, args.end, period);
    let data = date_range
        .iter()
        .map(|label| {
            buckets
                .remove(label)
                .unwrap_or_else(|| vec![MISSING.to_string()])
        })
        .collect();

    Ok(QueryOutput::PeriodSeries { date_range, data })
}

// ---------------------------------------------------------------------------
// xox
// ---------------------------------------------------------------------------

fn to_f64(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(0.0)
}

/// Period granularity an xox query compares at.
pub fn xox_period(query: &XoxQuery, inherited: PeriodKind) -> PeriodKind {
    if query.period.is_none() && query.period_level == 1 {
        next_level(inherited)
    } else {
        inherited
    }
}

pub fn xox(conn: &Connection, query: &XoxQuery, args: &ResolvedArgs) -> FigureResult<QueryOutput> {
    let period = xox_period(query, args.period);
    let name = xox_name(period).to_string();
    let element = query.as_element();

    let window_at = |t| ResolvedArgs {
        start: beginning_of(t, period),
        end: end_of(t, period),
        period,
        filters: args.filters.clone(),
    };
    let unavailable = || QueryOutput::Change {
        inc_or_dec: 1,
        change: "N/A".to_string(),
        name: name.clone(),
    };

    let current_at = beginning_of(args.end, period);
    let Some(current) = element_value(conn, &element, &window_at(current_at))? else {
        tracing::debug!(table = %query.table, %period, "xox: no current value");
        return Ok(unavailable());
    };
    let previous_at = backward(current_at, period);
    let Some(previous) = element_value(conn, &element, &window_at(previous_at))? else {
        tracing::debug!(table = %query.table, %period, "xox: no previous value");
        return Ok(unavailable());
    };

    let current = to_f64(&current);
    let previous = to_f64(&previous);
    let change = if previous == 0.0 || previous.is_nan() {
        0.0
    } else {
        (current - previous) / previous * 100.0
    };

    Ok(QueryOutput::Change {
        inc_or_dec: cmp_float(current, previous),
        change: format!("{change:.2}%"),
        name,
    })
}

// ---------------------------------------------------------------------------
// distinct
// ---------------------------------------------------------------------------

/// Distinct values of a column over the whole table. No window applies.
pub fn distinct(conn: &Connection, query: &DistinctQuery) -> FigureResult<QueryOutput> {
    let builder = SelectBuilder::new(
        [format!("{} AS \"value\"", column_expr(&query.column))],
        &query.table,
    )
    .distinct();
    let data = query_rows(conn, builder.to_sql(), |row| {
        row.get_ref(0).ok().and_then(row_text)
    })?;
    Ok(QueryOutput::Distinct { data })
}
