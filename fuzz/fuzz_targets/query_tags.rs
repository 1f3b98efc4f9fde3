//! Fuzz target for query tag discovery and lookup.
//!
//! Arbitrary JSON documents and result trees must never panic while tags
//! are collected, looked up and substituted.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use figure_query::figure::tags::{find_query_tags, lookup, replace_query_tags};
use figure_query::format::NumberFormatter;

#[derive(Arbitrary, Debug)]
struct TagInput {
    document: String,
    results: String,
    extra_tag: String,
}

fuzz_target!(|input: TagInput| {
    let Ok(mut doc) = serde_json::from_str::<Value>(&input.document) else {
        return;
    };
    let results = serde_json::from_str::<Value>(&input.results).unwrap_or(Value::Null);

    let tags = find_query_tags(&doc);
    for tag in &tags {
        let _ = lookup(&results, &tag.tag);
        let _ = tag.location();
    }
    let _ = lookup(&results, &input.extra_tag);
    let _ = replace_query_tags(&mut doc, &tags, &results, &NumberFormatter::default());
});
