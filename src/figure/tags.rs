//! Query tags: `#name.path` placeholders inside a figure document.
//!
//! A tag is a string leaf that starts with `#` and contains at least one
//! `.`. The first segment only marks the string as a tag; the remaining
//! segments walk the query results, object keys by name and array elements
//! by index.

use std::fmt;

use serde_json::Value;

use crate::error::{FigureError, FigureResult};
use crate::format::NumberFormatter;

pub const TAG_SENTINEL: char = '#';

/// One step from a container to a child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, ".{k}"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A tag found in a document, with the path to the leaf that holds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTag {
    pub path: Vec<PathStep>,
    pub tag: String,
}

impl QueryTag {
    /// `$.a[0].b` style location, for logs.
    pub fn location(&self) -> String {
        let mut out = String::from("$");
        for step in &self.path {
            out.push_str(&step.to_string());
        }
        out
    }
}

pub fn is_query_tag(s: &str) -> bool {
    s.starts_with(TAG_SENTINEL) && s.contains('.')
}

/// Every tag in `doc`, in document order.
pub fn find_query_tags(doc: &Value) -> Vec<QueryTag> {
    let mut tags = Vec::new();
    let mut path = Vec::new();
    collect(doc, &mut path, &mut tags);
    tags
}

fn collect(node: &Value, path: &mut Vec<PathStep>, tags: &mut Vec<QueryTag>) {
    match node {
        Value::String(s) if is_query_tag(s) => tags.push(QueryTag {
            path: path.clone(),
            tag: s.clone(),
        }),
        Value::Object(map) => {
            for (key, child) in map {
                path.push(PathStep::Key(key.clone()));
                collect(child, path, tags);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(PathStep::Index(i));
                collect(child, path, tags);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Resolve a tag's dotted path against the query results.
pub fn lookup<'a>(results: &'a Value, tag: &str) -> Option<&'a Value> {
    tag.split('.').skip(1).try_fold(results, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn slot_mut<'a>(doc: &'a mut Value, path: &[PathStep]) -> Option<&'a mut Value> {
    path.iter().try_fold(doc, |node, step| match (node, step) {
        (Value::Object(map), PathStep::Key(k)) => map.get_mut(k),
        (Value::Array(items), PathStep::Index(i)) => items.get_mut(*i),
        _ => None,
    })
}

/// Replace each tag in `doc` with the formatted value it points at.
pub fn replace_query_tags(
    doc: &mut Value,
    tags: &[QueryTag],
    results: &Value,
    formatter: &NumberFormatter,
) -> FigureResult<()> {
    for tag in tags {
        let value = lookup(results, &tag.tag)
            .ok_or_else(|| FigureError::UnresolvedTag(tag.tag.clone()))?;
        let formatted = formatter.format_number(value);
        match slot_mut(doc, &tag.path) {
            Some(slot) => *slot = formatted,
            None => tracing::warn!(
                tag = %tag.tag,
                location = %tag.location(),
                "query tag location vanished before substitution"
            ),
        }
    }
    Ok(())
}
