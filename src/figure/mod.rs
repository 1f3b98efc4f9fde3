//! Figure assembly: run a figure's `#query` and write the results back into
//! the document.
//!
//! Two substitution modes exist. Tag mode replaces `#name.path` string leaves
//! in place. Template mode (`"template": true`) renders the whole figure
//! text with the results as the template context.

pub mod page;
pub mod tags;
pub mod template;
pub mod transform;

use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::error::FigureResult;
use crate::format::NumberFormatter;
use crate::query::{QueryOutput, resolve_query};
use crate::types::ParseArgs;

pub const QUERY_KEY: &str = "#query";
pub const TEMPLATE_KEY: &str = "template";

const DEFAULT_TEMPLATE_NAME: &str = "figure";

/// Results of a figure's `#query`.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResults {
    /// `#query` was itself a descriptor.
    Single(QueryOutput),
    /// Named sub-queries, in document order.
    Named(Vec<(String, QueryOutput)>),
}

impl QueryResults {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Single(output) => output.to_json(),
            Self::Named(named) => Value::Object(
                named
                    .iter()
                    .map(|(name, output)| (name.clone(), output.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Run every query of a `#query` object.
pub fn execute_queries(
    conn: &Connection,
    queries: Map<String, Value>,
    args: &ParseArgs,
) -> FigureResult<QueryResults> {
    if queries.values().any(Value::is_object) {
        let mut named = Vec::with_capacity(queries.len());
        for (name, descriptor) in &queries {
            if !descriptor.is_object() {
                continue;
            }
            let output = resolve_query(conn, descriptor, args)?;
            tracing::debug!(query = %name, "resolved named query");
            named.push((name.clone(), output));
        }
        Ok(QueryResults::Named(named))
    } else {
        resolve_query(conn, &Value::Object(queries), args).map(QueryResults::Single)
    }
}

/// Resolves figure documents against one store.
pub struct FigureAssembler<'a> {
    conn: &'a Connection,
    formatter: &'a NumberFormatter,
}

impl<'a> FigureAssembler<'a> {
    pub fn new(conn: &'a Connection, formatter: &'a NumberFormatter) -> Self {
        Self { conn, formatter }
    }

    /// Resolve a figure into its final document.
    ///
    /// Documents without a `#query` object come back as parsed. Any query,
    /// transform or substitution failure aborts the whole figure.
    pub fn resolve(&self, raw: &str, args: &ParseArgs) -> FigureResult<Value> {
        let mut root: Value = serde_json::from_str(raw)?;
        let Some(doc) = root.as_object_mut() else {
            return Ok(root);
        };
        let use_template = doc
            .get(TEMPLATE_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !doc.get(QUERY_KEY).is_some_and(Value::is_object) {
            return Ok(root);
        }
        let Some(Value::Object(queries)) = doc.shift_remove(QUERY_KEY) else {
            return Ok(root);
        };

        let query_tags = tags::find_query_tags(&root);
        if query_tags.is_empty() && !use_template {
            tracing::trace!("figure has no query tags");
            return Ok(root);
        }

        let results = execute_queries(self.conn, queries, args)?;
        let figure_type = root.get("type").and_then(Value::as_str);
        let results = transform::apply(figure_type, results)?;
        let context = results.to_json();

        if use_template {
            let name = root
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_TEMPLATE_NAME);
            return template::render_figure(raw, name, &context, self.formatter);
        }

        tags::replace_query_tags(&mut root, &query_tags, &context, self.formatter)?;
        Ok(root)
    }

    /// [`resolve`](Self::resolve) as JSON text. Static figures are returned
    /// exactly as given.
    pub fn resolve_text(&self, raw: &str, args: &ParseArgs) -> FigureResult<String> {
        let parsed: Value = serde_json::from_str(raw)?;
        if is_static(&parsed) {
            return Ok(raw.to_string());
        }
        let resolved = self.resolve(raw, args)?;
        Ok(serde_json::to_string(&resolved)?)
    }
}

/// A figure that resolution would return unchanged.
fn is_static(doc: &Value) -> bool {
    let Some(map) = doc.as_object() else {
        return true;
    };
    if !map.get(QUERY_KEY).is_some_and(Value::is_object) {
        return true;
    }
    let use_template = map.get(TEMPLATE_KEY).and_then(Value::as_bool).unwrap_or(false);
    !use_template && tags::find_query_tags(doc).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FigureError;
    use crate::types::PeriodKind;
    use serde_json::json;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE share (date TEXT, period TEXT, region TEXT, amount INTEGER);
            INSERT INTO share VALUES
                ('2021-01-01', 'date', 'north', 30),
                ('2021-01-02', 'date', 'north', 20),
                ('2021-01-01', 'date', 'south', 100),
                ('2021-01-02', 'date', 'south', 50);
            "#,
        )
        .unwrap();
        conn
    }

    fn args() -> ParseArgs {
        ParseArgs::new(PeriodKind::Date)
    }

    #[test]
    fn document_without_query_is_returned_as_parsed() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{"title": "#bare.tag", "x": [1, 2]}"##;
        let out = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap();
        assert_eq!(out, json!({"title": "#bare.tag", "x": [1, 2]}));
    }

    #[test]
    fn query_without_tags_is_dropped_and_not_run() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{"#query": {"type": "median"}, "title": "static"}"##;
        let out = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap();
        assert_eq!(out, json!({"title": "static"}));
    }

    #[test]
    fn single_descriptor_tags_read_its_result() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{
            "#query": {"type": "element", "table": "share", "function": "sum(amount)"},
            "value": "#kpi.data"
        }"##;
        let out = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap();
        assert_eq!(out, json!({"value": "200"}));
    }

    #[test]
    fn named_queries_keyed_by_name() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{
            "#query": {
                "north": {"type": "element", "table": "share", "function": "sum(amount)",
                          "one": true},
                "regions": {"type": "distinct", "table": "share", "column": "region"},
                "note": "ignored"
            },
            "latest": "#q.north.data",
            "count": "#q.regions.data.1"
        }"##;
        let out = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap();
        assert_eq!(out["latest"], json!("70"));
        assert!(out["count"].is_string());
    }

    #[test]
    fn pie_chart_shares() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{
            "type": "PieChart",
            "#query": {"type": "aggregate", "table": "share", "group_key": "region",
                       "function": "sum(amount)"},
            "series": "#pie.data",
            "north": "#pie.data.north"
        }"##;
        let out = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap();
        assert_eq!(out["north"], json!("25.00"));
        assert_eq!(out["series"], json!({"north": "25.00", "south": "75.00"}));
    }

    #[test]
    fn template_mode_renders_results() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{
            "id": "dash.total",
            "template": true,
            "#query": {"total": {"type": "element", "table": "share", "function": "sum(amount) * 10"}},
            "value": "{{ total.data | print_number }}"
        }"##;
        let out = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap();
        assert_eq!(out, json!({"id": "dash.total", "value": "2,000"}));
    }

    #[test]
    fn unresolved_tag_aborts_figure() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = r##"{
            "#query": {"type": "element", "table": "share", "function": "sum(amount)"},
            "value": "#kpi.nope"
        }"##;
        let err = FigureAssembler::new(&conn, &fmt).resolve(raw, &args()).unwrap_err();
        assert!(matches!(err, FigureError::UnresolvedTag(_)));
    }

    #[test]
    fn resolve_text_round_trips_static_figures() {
        let conn = seeded();
        let fmt = NumberFormatter::default();
        let raw = "{ \"b\":1,   \"a\" : [ 1.50, \"x\" ] }";
        let out = FigureAssembler::new(&conn, &fmt).resolve_text(raw, &args()).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn query_results_named_render_keyed_by_name() {
        let results = QueryResults::Named(vec![(
            "kpi".into(),
            QueryOutput::Element { data: Some("1".into()) },
        )]);
        assert_eq!(results.to_json(), json!({"kpi": {"data": "1"}}));
    }
}
