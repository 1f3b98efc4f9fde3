//! Locale-aware number formatting for figure values.
//!
//! Query results reach the figure as strings or JSON numbers. Anything that
//! looks numeric is rendered with thousands grouping (integers) or grouping
//! plus exactly two decimals (floats); everything else passes through
//! untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Scalar;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("number regex"));

const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Separators used when rendering numbers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberLocale {
    pub grouping_separator: String,
    pub decimal_separator: String,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::english()
    }
}

impl NumberLocale {
    pub fn english() -> Self {
        Self {
            grouping_separator: ",".into(),
            decimal_separator: ".".into(),
        }
    }
}

/// Formatter bound to one immutable [`NumberLocale`].
#[derive(Clone, Debug, Default)]
pub struct NumberFormatter {
    locale: NumberLocale,
}

impl NumberFormatter {
    pub fn new(locale: NumberLocale) -> Self {
        Self { locale }
    }

    /// Format a JSON value for display.
    ///
    /// Strings are trimmed and parsed when they look numeric; numbers are
    /// grouped; null, booleans, arrays and objects are returned as-is.
    pub fn format_number(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => match self.format_numeric_str(s) {
                Some(formatted) => Value::String(formatted),
                None => value.clone(),
            },
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::String(self.format_integer(i128::from(i)))
                } else if let Some(u) = n.as_u64() {
                    Value::String(self.format_integer(i128::from(u)))
                } else if let Some(f) = n.as_f64() {
                    Value::String(self.format_float(f))
                } else {
                    value.clone()
                }
            }
            _ => value.clone(),
        }
    }

    /// Display string of [`format_number`](Self::format_number).
    pub fn print_number(&self, value: &Value) -> String {
        match self.format_number(value) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Display string for one table cell. Times render as `YYYY-MM-DD`.
    pub fn format_scalar(&self, scalar: &Scalar) -> String {
        match scalar {
            Scalar::Null => String::new(),
            Scalar::Time(t) => t.format(OUTPUT_DATE_FORMAT).to_string(),
            Scalar::Integer(i) => self.format_integer(i128::from(*i)),
            Scalar::Float(f) => self.format_float(*f),
            Scalar::Text(s) => self.format_numeric_str(s).unwrap_or_else(|| s.clone()),
            Scalar::Blob(bytes) => {
                let s = String::from_utf8_lossy(bytes);
                self.format_numeric_str(&s).unwrap_or_else(|| s.into_owned())
            }
        }
    }

    fn format_numeric_str(&self, s: &str) -> Option<String> {
        let trimmed = s.trim();
        if !NUMBER_RE.is_match(trimmed) {
            return None;
        }
        if trimmed.contains('.') {
            trimmed.parse::<f64>().ok().map(|f| self.format_float(f))
        } else {
            trimmed
                .parse::<i64>()
                .ok()
                .map(|i| self.format_integer(i128::from(i)))
        }
    }

    pub fn format_integer(&self, n: i128) -> String {
        let digits = n.unsigned_abs().to_string();
        let grouped = self.group_digits(&digits);
        if n < 0 { format!("-{grouped}") } else { grouped }
    }

    pub fn format_float(&self, f: f64) -> String {
        if f.is_nan() {
            return "NaN".into();
        }
        if f.is_infinite() {
            return if f > 0.0 { "+Inf".into() } else { "-Inf".into() };
        }
        let fixed = format!("{:.2}", f.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        let sign = if f.is_sign_negative() { "-" } else { "" };
        format!(
            "{sign}{}{}{frac_part}",
            self.group_digits(int_part),
            self.locale.decimal_separator
        )
    }

    fn group_digits(&self, digits: &str) -> String {
        let len = digits.len();
        let mut out = String::with_capacity(len + len / 3 * self.locale.grouping_separator.len());
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                out.push_str(&self.locale.grouping_separator);
            }
            out.push(ch);
        }
        out
    }
}
