//! Tabular figures: paginated row queries and their rendering.
//!
//! A table figure names a `table` and optional `columns`. Rows are filtered
//! to the requested period (and date window, when the caller chose one),
//! ordered by the request's sort key and paged. The unpaginated row count is
//! read first under the same predicate.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Value, json};

use crate::config::TableConfig;
use crate::error::{FigureError, FigureResult};
use crate::format::NumberFormatter;
use crate::query::sql::{DATE_COLUMN, PERIOD_COLUMN, SelectBuilder, column_expr, date_param, quote_ident, row_date};
use crate::types::{FilterSpec, ParseArgs, PeriodKind, QueryResult, Scalar};

/// Turn a sort key into an `ORDER BY` term: `col`, `col asc`, `col desc`
/// or `-col` (descending).
pub fn order_clause(sort_by: &str) -> Option<String> {
    let sort_by = sort_by.trim();
    if sort_by.is_empty() {
        return None;
    }
    if let Some(column) = sort_by.strip_prefix('-') {
        let column = column.trim();
        return (!column.is_empty()).then(|| format!("{} DESC", quote_ident(column)));
    }
    let mut parts = sort_by.split_whitespace();
    let column = parts.next()?;
    let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => "ASC",
        Some("desc") => "DESC",
        Some(other) => {
            tracing::warn!(sort_by, direction = other, "unknown sort direction; ignoring sort");
            return None;
        }
    };
    if parts.next().is_some() {
        tracing::warn!(sort_by, "sort key has trailing tokens; ignoring sort");
        return None;
    }
    Some(format!("{} {direction}", quote_ident(column)))
}

fn is_time_decl(decl: &str) -> bool {
    let decl = decl.to_ascii_uppercase();
    decl.contains("DATE") || decl.contains("TIME")
}

fn scalar_from(value: ValueRef<'_>, time_column: bool) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Integer(i),
        ValueRef::Real(f) => Scalar::Float(f),
        ValueRef::Text(bytes) => {
            if time_column && let Some(t) = row_date(value) {
                return Scalar::Time(t);
            }
            Scalar::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Blob(bytes) => Scalar::Blob(bytes.to_vec()),
    }
}

/// A row query built from a table figure.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub period: PeriodKind,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub filters: Vec<FilterSpec>,
    /// 1-based.
    pub page: u64,
    /// `0` disables pagination.
    pub limit: u64,
    pub order_by: Option<String>,
}

impl TableQuery {
    pub fn from_figure(
        figure: &Value,
        args: &ParseArgs,
        page: u64,
        limit: u64,
        sort_by: &str,
    ) -> FigureResult<Self> {
        let table = figure
            .get("table")
            .and_then(Value::as_str)
            .ok_or_else(|| FigureError::MalformedFigure("table figure has no 'table'".into()))?;

        let mut columns: Vec<String> = figure
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(Value::as_str)
                    .map(column_expr)
                    .collect()
            })
            .unwrap_or_default();
        if columns.is_empty() {
            columns.push("*".into());
        }

        Ok(Self {
            table: table.to_string(),
            columns,
            period: args.period,
            start: args.start,
            end: args.end,
            filters: args.filters.clone(),
            page,
            limit,
            order_by: order_clause(sort_by),
        })
    }

    pub fn needs_pagination(&self) -> bool {
        self.limit > 0
    }

    /// Rows skipped before the page. Saturates at the largest offset SQLite
    /// accepts.
    pub fn offset(&self) -> u64 {
        if self.page > 1 {
            self.limit
                .saturating_mul(self.page - 1)
                .min(i64::MAX as u64)
        } else {
            0
        }
    }

    fn builder(&self) -> SelectBuilder {
        let mut builder = SelectBuilder::new(self.columns.iter().cloned(), &self.table)
            .where_eq(PERIOD_COLUMN, SqlValue::Text(self.period.as_str().into()));
        if let Some(start) = self.start {
            builder = builder.where_cmp(DATE_COLUMN, ">=", date_param(start));
        }
        if let Some(end) = self.end {
            builder = builder.where_cmp(DATE_COLUMN, "<=", date_param(end));
        }
        builder = builder.filters(&self.filters);
        if let Some(order) = &self.order_by {
            builder = builder.order_by(order.clone());
        }
        if self.needs_pagination() {
            builder = builder.limit(self.limit.min(i64::MAX as u64));
            if self.offset() > 0 {
                builder = builder.offset(self.offset());
            }
        }
        builder
    }

    /// Count, then fetch the requested page.
    pub fn run(&self, conn: &Connection) -> FigureResult<QueryResult> {
        let builder = self.builder();

        let (count_sql, count_params) = builder.to_count_sql();
        let total: i64 = conn.query_row(
            &count_sql,
            rusqlite::params_from_iter(count_params.iter()),
            |row| row.get(0),
        )?;

        let (sql, params) = builder.to_sql();
        tracing::debug!(sql = %sql, total, page = self.page, "table query");
        let mut stmt = conn.prepare(&sql)?;
        let layout: Vec<(String, bool)> = stmt
            .columns()
            .iter()
            .map(|col| {
                (
                    col.name().to_string(),
                    col.decl_type().is_some_and(is_time_decl),
                )
            })
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(layout.len());
            for (i, (_, time_column)) in layout.iter().enumerate() {
                cells.push(scalar_from(row.get_ref(i)?, *time_column));
            }
            data.push(cells);
        }

        Ok(QueryResult {
            total,
            columns: layout.into_iter().map(|(name, _)| name).collect(),
            data,
        })
    }
}

/// Write a query result into a table figure's `data` block.
///
/// Existing `data` keys are kept; `total`, `currentPage` and `columns` are
/// overwritten. Each column carries its cells formatted for display.
pub fn render_table(
    figure: &mut Value,
    result: &QueryResult,
    page: u64,
    formatter: &NumberFormatter,
    settings: &TableConfig,
) -> FigureResult<()> {
    let Some(fig) = figure.as_object_mut() else {
        return Err(FigureError::MalformedFigure(
            "table figure must be a JSON object".into(),
        ));
    };

    let mut column_data: Vec<Vec<String>> = vec![Vec::new(); result.columns.len()];
    for row in &result.data {
        for (i, cell) in row.iter().enumerate() {
            if let Some(column) = column_data.get_mut(i) {
                column.push(formatter.format_scalar(cell));
            }
        }
    }

    let columns: Vec<Value> = result
        .columns
        .iter()
        .zip(column_data)
        .map(|(name, data)| {
            json!({
                "title": name,
                "sortSymbol": name,
                "size": settings.column_size,
                "data": data,
            })
        })
        .collect();

    let slot = fig
        .entry("data")
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Some(data) = slot.as_object_mut() {
        data.insert("total".into(), json!(result.total));
        data.insert("currentPage".into(), json!(page));
        data.insert("columns".into(), Value::Array(columns));
    }
    Ok(())
}
