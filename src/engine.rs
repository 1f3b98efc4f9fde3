//! Entry point tying the store, the formatter and configuration together.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::FigureResult;
use crate::figure::FigureAssembler;
use crate::format::NumberFormatter;
use crate::period::align_range;
use crate::table::{TableQuery, render_table};
use crate::types::{ParseArgs, QueryResult};

pub const TABLE_FIGURE_TYPE: &str = "table";

/// Paging and sort request for table figures.
#[derive(Debug, Clone, Default)]
pub struct TableRequest {
    /// 1-based; `0` is treated as the first page.
    pub page: u64,
    pub sort_by: Option<String>,
}

pub struct FigureEngine {
    conn: Connection,
    formatter: NumberFormatter,
    config: EngineConfig,
}

impl FigureEngine {
    pub fn new(conn: Connection, config: EngineConfig) -> Self {
        let formatter = NumberFormatter::new(config.locale.clone());
        Self {
            conn,
            formatter,
            config,
        }
    }

    /// Open a SQLite database read-only.
    pub fn open(path: &Path, config: EngineConfig) -> FigureResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!(path = %path.display(), "opened figure store");
        Ok(Self::new(conn, config))
    }

    fn sort_key<'a>(&'a self, sort_by: Option<&'a str>) -> &'a str {
        match sort_by.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => &self.config.table.default_sort,
        }
    }

    /// Resolve one figure. Table figures are paged; everything else goes
    /// through the assembler.
    pub fn resolve(&self, raw: &str, args: &ParseArgs, request: &TableRequest) -> FigureResult<Value> {
        let mut figure: Value = serde_json::from_str(raw)?;
        if figure.get("type").and_then(Value::as_str) != Some(TABLE_FIGURE_TYPE) {
            return FigureAssembler::new(&self.conn, &self.formatter).resolve(raw, args);
        }

        let args = table_args(args);
        let page = request.page.max(1);
        let query = TableQuery::from_figure(
            &figure,
            &args,
            page,
            self.config.table.page_size,
            self.sort_key(request.sort_by.as_deref()),
        )?;
        let result = query.run(&self.conn)?;
        render_table(&mut figure, &result, page, &self.formatter, &self.config.table)?;
        Ok(figure)
    }

    /// [`resolve`](Self::resolve) as JSON text. Static non-table figures
    /// come back exactly as given.
    pub fn resolve_text(
        &self,
        raw: &str,
        args: &ParseArgs,
        request: &TableRequest,
    ) -> FigureResult<String> {
        let figure: Value = serde_json::from_str(raw)?;
        if figure.get("type").and_then(Value::as_str) != Some(TABLE_FIGURE_TYPE) {
            return FigureAssembler::new(&self.conn, &self.formatter).resolve_text(raw, args);
        }
        Ok(serde_json::to_string(&self.resolve(raw, args, request)?)?)
    }

    /// Every row of a table figure, unpaginated.
    pub fn export_table(
        &self,
        figure: &Value,
        args: &ParseArgs,
        sort_by: Option<&str>,
    ) -> FigureResult<QueryResult> {
        TableQuery::from_figure(figure, &table_args(args), 0, 0, self.sort_key(sort_by))?
            .run(&self.conn)
    }
}

/// Table figures filter by date only when the caller gave both ends; those
/// ends are widened to whole periods.
fn table_args(args: &ParseArgs) -> ParseArgs {
    let mut args = args.clone();
    if let (Some(start), Some(end)) = (args.start, args.end) {
        let (start, end) = align_range(Some(start), Some(end), args.period);
        args.start = Some(start);
        args.end = Some(end);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeriodKind;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;

    fn engine() -> FigureEngine {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE visits (date DATE, period TEXT, page TEXT, hits INTEGER);
            INSERT INTO visits VALUES
                ('2021-01-01', 'date', 'home', 1500),
                ('2021-01-02', 'date', 'home', 900),
                ('2021-01-03', 'date', 'docs', 40),
                ('2021-03-01', 'month', 'home', 300),
                ('2021-04-01', 'month', 'home', 200);
            "#,
        )
        .unwrap();
        FigureEngine::new(conn, EngineConfig::default())
    }

    #[test]
    fn table_figures_take_the_table_path() {
        let engine = engine();
        let raw = r#"{"id": "t", "type": "table", "table": "visits", "columns": ["page", "hits"]}"#;
        let out = engine
            .resolve(raw, &ParseArgs::new(PeriodKind::Date), &TableRequest::default())
            .unwrap();
        assert_eq!(out["data"]["total"], json!(3));
        assert_eq!(out["data"]["currentPage"], json!(1));
        assert_eq!(out["data"]["columns"][1]["data"], json!(["1,500", "900", "40"]));
    }

    #[test]
    fn table_sort_override() {
        let engine = engine();
        let raw = r#"{"type": "table", "table": "visits", "columns": ["hits"]}"#;
        let request = TableRequest {
            page: 1,
            sort_by: Some("hits".into()),
        };
        let out = engine.resolve(raw, &ParseArgs::new(PeriodKind::Date), &request).unwrap();
        assert_eq!(out["data"]["columns"][0]["data"], json!(["40", "900", "1,500"]));
    }

    #[test]
    fn other_figures_take_the_assembler_path() {
        let engine = engine();
        let raw = r##"{"type": "KPI", "#query": {"type": "element", "table": "visits", "function": "sum(hits)"}, "v": "#k.data"}"##;
        let out = engine
            .resolve(raw, &ParseArgs::new(PeriodKind::Date), &TableRequest::default())
            .unwrap();
        assert_eq!(out, json!({"type": "KPI", "v": "2,440"}));
    }

    #[test]
    fn export_and_page_share_the_aligned_window() {
        let engine = engine();
        let raw = r#"{"type": "table", "table": "visits", "columns": ["hits"]}"#;
        let args = ParseArgs::new(PeriodKind::Month).with_range(
            NaiveDate::from_ymd_opt(2021, 3, 15).unwrap().and_time(NaiveTime::MIN),
            NaiveDate::from_ymd_opt(2021, 4, 15).unwrap().and_time(NaiveTime::MIN),
        );
        let paged = engine.resolve(raw, &args, &TableRequest::default()).unwrap();
        let figure: Value = serde_json::from_str(raw).unwrap();
        let exported = engine.export_table(&figure, &args, None).unwrap();
        assert_eq!(paged["data"]["total"], json!(2));
        assert_eq!(exported.total, 2);
        assert_eq!(exported.data.len(), 2);
    }

    #[test]
    fn export_is_unpaginated() {
        let engine = engine();
        let figure = json!({"type": "table", "table": "visits"});
        let result = engine
            .export_table(&figure, &ParseArgs::new(PeriodKind::Date), None)
            .unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.data.len(), 3);
        assert_eq!(result.columns, vec!["date", "period", "page", "hits"]);
    }
}
