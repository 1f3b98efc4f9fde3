//! Template mode: the whole figure text rendered with `minijinja`.

use minijinja::value::ViaDeserialize;
use minijinja::{AutoEscape, Environment};
use serde_json::Value;

use crate::error::FigureResult;
use crate::format::NumberFormatter;

use super::{QUERY_KEY, TEMPLATE_KEY};

fn environment<'source>(formatter: &NumberFormatter) -> Environment<'source> {
    let mut env = Environment::new();
    // Output is raw JSON text whatever extension the figure id ends in.
    env.set_auto_escape_callback(|_| AutoEscape::None);
    let for_function = formatter.clone();
    env.add_function("print_number", move |value: ViaDeserialize<Value>| {
        for_function.print_number(&value.0)
    });
    let for_filter = formatter.clone();
    env.add_filter("print_number", move |value: ViaDeserialize<Value>| {
        for_filter.print_number(&value.0)
    });
    env
}

/// Render `raw` with `context` and parse the output as the final figure.
///
/// JSON-escaped quotes are unescaped first so expressions may use string
/// literals. The `#query` and `template` keys are dropped from the result.
pub fn render_figure(
    raw: &str,
    name: &str,
    context: &Value,
    formatter: &NumberFormatter,
) -> FigureResult<Value> {
    let source = raw.replace("\\\"", "\"");
    let env = environment(formatter);
    let rendered = env.template_from_named_str(name, &source)?.render(context)?;
    tracing::trace!(figure = name, bytes = rendered.len(), "rendered figure template");

    let mut figure: Value = serde_json::from_str(&rendered)?;
    if let Some(map) = figure.as_object_mut() {
        map.shift_remove(QUERY_KEY);
        map.shift_remove(TEMPLATE_KEY);
    }
    Ok(figure)
}
