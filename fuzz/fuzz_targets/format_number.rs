//! Fuzz target for number formatting.
//!
//! Any string or float, under any pair of separators, must format without
//! panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

use figure_query::format::{NumberFormatter, NumberLocale};

#[derive(Arbitrary, Debug)]
struct FormatInput {
    text: String,
    float: f64,
    integer: i64,
    grouping_separator: String,
    decimal_separator: String,
}

fuzz_target!(|input: FormatInput| {
    let formatter = NumberFormatter::new(NumberLocale {
        grouping_separator: input.grouping_separator,
        decimal_separator: input.decimal_separator,
    });

    let _ = formatter.format_number(&Value::String(input.text));
    let _ = formatter.format_number(&Value::from(input.integer));
    if let Some(n) = serde_json::Number::from_f64(input.float) {
        let _ = formatter.format_number(&Value::Number(n));
    }
    let _ = formatter.format_float(input.float);
});
