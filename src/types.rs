//! Request-scoped types shared by the dispatcher, the assembler and the
//! tabular runner.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PeriodKind
// ---------------------------------------------------------------------------

/// Calendar granularity used both to bucket rows and to step ranges.
///
/// Variants are declared in granularity order so the derived `Ord` matches
/// `date < month < quarter < year`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    #[default]
    #[serde(alias = "day")]
    Date,
    Month,
    Quarter,
    Year,
}

impl PeriodKind {
    /// Canonical name as stored in the `period` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Look up a period by name. `day` is accepted as an alias of `date`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "date" | "day" => Some(Self::Date),
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    /// Resolve a period name coming from a figure definition.
    ///
    /// Unknown names are logged and `fallback` is returned, so a bad figure
    /// renders with degraded output instead of failing.
    pub fn resolve_or(name: &str, fallback: PeriodKind) -> PeriodKind {
        match Self::from_name(name) {
            Some(period) => period,
            None => {
                tracing::error!(period = name, fallback = %fallback, "unknown period kind");
                fallback
            }
        }
    }
}

impl std::fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PeriodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!("unknown period '{s}' (expected date, month, quarter or year)")
        })
    }
}

// ---------------------------------------------------------------------------
// Filters and args
// ---------------------------------------------------------------------------

/// Equality filter on one column.
///
/// An empty `values` list is ignored, one value becomes `key = ?`, several
/// values become an OR of equalities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub key: String,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

impl FilterSpec {
    pub fn new(key: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

/// Arguments supplied by the caller for one figure resolution.
///
/// `None` bounds mean "not chosen by the user"; the dispatcher fills them
/// from the table's data extent.
#[derive(Clone, Debug, Default)]
pub struct ParseArgs {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub period: PeriodKind,
    pub filters: Vec<FilterSpec>,
}

impl ParseArgs {
    pub fn new(period: PeriodKind) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }
}

/// Arguments after the dispatcher has settled the effective window.
///
/// Invariant: `start <= end`, both aligned to `period`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedArgs {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub period: PeriodKind,
    pub filters: Vec<FilterSpec>,
}

// ---------------------------------------------------------------------------
// Tabular results
// ---------------------------------------------------------------------------

/// One opaque cell as read from the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    /// Text read from a column declared as a date/time type.
    Time(NaiveDateTime),
    Blob(Vec<u8>),
}

/// Rows returned by the tabular runner, plus the unpaginated row count.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub total: i64,
    pub columns: Vec<String>,
    pub data: Vec<Vec<Scalar>>,
}
