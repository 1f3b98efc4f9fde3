//! Lookups over a page document (`dataView[*].figures[*]`).

use serde_json::Value;

/// Figures of every data view on `page`, in order.
pub fn page_figures(page: &Value) -> impl Iterator<Item = &Value> {
    page.get("dataView")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|view| view.get("figures").and_then(Value::as_array))
        .flatten()
}

/// Id of the first `table` figure on `page`.
pub fn table_figure_id(page: &Value) -> Option<String> {
    page_figures(page)
        .find(|fig| fig.get("type").and_then(Value::as_str) == Some("table"))
        .and_then(|fig| fig.get("id").and_then(Value::as_str))
        .map(str::to_string)
}
