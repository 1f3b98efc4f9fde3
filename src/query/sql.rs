//! SQL builder for figure queries.
//!
//! Statements are assembled as text with `?N` placeholders and a parallel
//! list of bound values, the same shape the parsers hand to
//! `rusqlite::Statement::query`. Identifiers are double-quote escaped;
//! aggregate functions and column expressions from figure definitions are
//! trusted and interpolated as written.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Row};

use crate::error::FigureResult;
use crate::types::{FilterSpec, ResolvedArgs};

pub const DATE_COLUMN: &str = "date";
pub const PERIOD_COLUMN: &str = "period";

static PLAIN_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

const ROW_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `expr` when it is a bare column name; leave `*`, function calls
/// and other expressions untouched.
pub fn column_expr(expr: &str) -> String {
    let trimmed = expr.trim();
    if PLAIN_IDENT_RE.is_match(trimmed) {
        quote_ident(trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Bind format for date bounds. Period-aligned starts are bare dates so
/// they compare equal to `YYYY-MM-DD` text stored in the `date` column.
pub fn date_param(t: NaiveDateTime) -> SqlValue {
    let text = if t.time() == NaiveTime::MIN {
        t.format("%Y-%m-%d").to_string()
    } else if t.nanosecond() == 0 {
        t.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        t.format("%Y-%m-%d %H:%M:%S%.f").to_string()
    };
    SqlValue::Text(text)
}

/// Convert a JSON filter literal to a bind value.
pub fn json_param(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Decode a `date` cell. Only text in ISO date/datetime form is accepted.
/// Window bounds are bound as text, and SQLite orders every INTEGER below
/// every TEXT, so numeric cells could never fall inside a window.
pub fn row_date(value: ValueRef<'_>) -> Option<NaiveDateTime> {
    match value {
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).ok()?.trim();
            if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return Some(d.and_time(NaiveTime::MIN));
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt.naive_utc());
            }
            ROW_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        }
        _ => None,
    }
}

/// Render a non-null cell as text the way the series parsers report it.
pub fn row_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Incrementally built `SELECT` statement.
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    columns: Vec<String>,
    distinct: bool,
    table: String,
    where_parts: Vec<String>,
    params: Vec<SqlValue>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    /// `columns` are SQL expressions, emitted as given.
    pub fn new<I, S>(columns: I, table: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            table: quote_ident(table),
            ..Default::default()
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    /// `"column" <op> ?N`
    pub fn where_cmp(mut self, column: &str, op: &str, value: SqlValue) -> Self {
        let placeholder = self.bind(value);
        self.where_parts
            .push(format!("{} {op} {placeholder}", quote_ident(column)));
        self
    }

    pub fn where_eq(self, column: &str, value: SqlValue) -> Self {
        self.where_cmp(column, "=", value)
    }

    /// Apply filters: one value is an equality, several an OR of equalities.
    pub fn filters(mut self, filters: &[FilterSpec]) -> Self {
        for filter in filters {
            let column = quote_ident(&filter.key);
            match filter.values.as_slice() {
                [] => continue,
                [only] => {
                    let placeholder = self.bind(json_param(only));
                    self.where_parts.push(format!("{column} = {placeholder}"));
                }
                many => {
                    let alternatives: Vec<String> = many
                        .iter()
                        .map(|v| {
                            let placeholder = self.bind(json_param(v));
                            format!("{column} = {placeholder}")
                        })
                        .collect();
                    self.where_parts
                        .push(format!("({})", alternatives.join(" OR ")));
                }
            }
        }
        self
    }

    /// Period equality, inclusive date window and filters of `args`.
    pub fn window(self, args: &ResolvedArgs) -> Self {
        self.where_eq(PERIOD_COLUMN, SqlValue::Text(args.period.as_str().into()))
            .where_cmp(DATE_COLUMN, ">=", date_param(args.start))
            .where_cmp(DATE_COLUMN, "<=", date_param(args.end))
            .filters(&args.filters)
    }

    pub fn group_by<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(exprs.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        let expr = expr.into();
        if !expr.is_empty() {
            self.order_by.push(expr);
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn where_clause(&self) -> String {
        if self.where_parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_parts.join(" AND "))
        }
    }

    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql = format!(
            "SELECT {}{} FROM {}{}",
            if self.distinct { "DISTINCT " } else { "" },
            self.columns.join(", "),
            self.table,
            self.where_clause()
        );
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        (sql, self.params.clone())
    }

    /// `count(*)` under the same predicate, without grouping, order or paging.
    pub fn to_count_sql(&self) -> (String, Vec<SqlValue>) {
        (
            format!(
                "SELECT count(*) AS cnt FROM {}{}",
                self.table,
                self.where_clause()
            ),
            self.params.clone(),
        )
    }
}

/// Run `(sql, params)` and decode each row with `decode`.
///
/// Rows for which `decode` returns `None` are skipped; store errors abort.
pub fn query_rows<T, F>(
    conn: &Connection,
    (sql, params): (String, Vec<SqlValue>),
    mut decode: F,
) -> FigureResult<Vec<T>>
where
    F: FnMut(&Row<'_>) -> Option<T>,
{
    tracing::debug!(sql = %sql, params = params.len(), "figure query");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    while let Some(row) = rows.next()? {
        match decode(row) {
            Some(item) => out.push(item),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "skipped rows that could not be decoded");
    }
    Ok(out)
}
