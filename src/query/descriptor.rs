//! Typed query descriptors.
//!
//! A descriptor is the JSON object a figure embeds under `#query`. Its
//! `type` field selects one of six parser kinds; the remaining fields are
//! decoded into the struct for that kind.

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{FigureError, FigureResult};

/// Parser kinds understood by the dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Element,
    SelectColumn,
    Aggregate,
    PeriodSeries,
    Xox,
    Distinct,
}

impl QueryKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "element" => Some(Self::Element),
            "select_column" => Some(Self::SelectColumn),
            "aggregate" => Some(Self::Aggregate),
            "period_series" => Some(Self::PeriodSeries),
            "xox" => Some(Self::Xox),
            "distinct" => Some(Self::Distinct),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element => write!(f, "element"),
            Self::SelectColumn => write!(f, "select_column"),
            Self::Aggregate => write!(f, "aggregate"),
            Self::PeriodSeries => write!(f, "period_series"),
            Self::Xox => write!(f, "xox"),
            Self::Distinct => write!(f, "distinct"),
        }
    }
}

/// Single aggregate value, e.g. `sum(amount)`.
#[derive(Clone, Debug, Deserialize)]
pub struct ElementQuery {
    pub table: String,
    pub function: String,
    /// Restrict the window to the single period ending at `end`.
    #[serde(default)]
    pub one: bool,
    #[serde(default)]
    pub period: Option<String>,
}

/// One column per date, densely joined to the period range.
#[derive(Clone, Debug, Deserialize)]
pub struct SelectColumnQuery {
    pub table: String,
    pub column: String,
    /// Wrap the series as a one-element series of series.
    #[serde(default, deserialize_with = "flag")]
    pub raise_dimension: bool,
    #[serde(default)]
    pub period: Option<String>,
}

/// One aggregate per (date, group value).
#[derive(Clone, Debug, Deserialize)]
pub struct AggregateQuery {
    pub table: String,
    pub group_key: String,
    pub function: String,
    #[serde(default)]
    pub period: Option<String>,
}

/// Raw column values bucketed per period label.
#[derive(Clone, Debug, Deserialize)]
pub struct PeriodSeriesQuery {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub period: Option<String>,
}

/// Period-over-period change of an aggregate.
#[derive(Clone, Debug, Deserialize)]
pub struct XoxQuery {
    pub table: String,
    pub function: String,
    #[serde(default)]
    pub one: bool,
    #[serde(default)]
    pub period: Option<String>,
    /// `1` compares at the next coarser period level.
    #[serde(default, rename = "periodLevel", deserialize_with = "level")]
    pub period_level: i64,
}

/// Any present value other than `false`, `null`, `0` or `""` switches a flag on.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Integral levels may arrive as floats (`1.0`).
fn level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
                .ok_or_else(|| de::Error::custom(format!("periodLevel {n} is not a whole number"))),
        },
        other => Err(de::Error::custom(format!("periodLevel must be a number, got {other}"))),
    }
}

impl XoxQuery {
    pub(crate) fn as_element(&self) -> ElementQuery {
        ElementQuery {
            table: self.table.clone(),
            function: self.function.clone(),
            one: self.one,
            period: self.period.clone(),
        }
    }
}

/// Distinct values of one column.
#[derive(Clone, Debug, Deserialize)]
pub struct DistinctQuery {
    pub table: String,
    pub column: String,
}

/// A parsed query descriptor.
#[derive(Clone, Debug)]
pub enum QueryDescriptor {
    Element(ElementQuery),
    SelectColumn(SelectColumnQuery),
    Aggregate(AggregateQuery),
    PeriodSeries(PeriodSeriesQuery),
    Xox(XoxQuery),
    Distinct(DistinctQuery),
}

fn decode<T: DeserializeOwned>(kind: QueryKind, value: &Value) -> FigureResult<T> {
    T::deserialize(value).map_err(|e| FigureError::MalformedQuery(format!("{kind} query: {e}")))
}

impl QueryDescriptor {
    /// Parse a descriptor object.
    ///
    /// An unknown `type` is [`FigureError::UnknownQueryType`]; a missing
    /// `type` or a missing/ill-typed field is [`FigureError::MalformedQuery`].
    pub fn from_json(value: &Value) -> FigureResult<Self> {
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| FigureError::MalformedQuery("query has no string 'type'".into()))?;
        let kind = QueryKind::from_name(type_name)
            .ok_or_else(|| FigureError::UnknownQueryType(type_name.to_string()))?;

        Ok(match kind {
            QueryKind::Element => Self::Element(decode(kind, value)?),
            QueryKind::SelectColumn => Self::SelectColumn(decode(kind, value)?),
            QueryKind::Aggregate => Self::Aggregate(decode(kind, value)?),
            QueryKind::PeriodSeries => Self::PeriodSeries(decode(kind, value)?),
            QueryKind::Xox => Self::Xox(decode(kind, value)?),
            QueryKind::Distinct => Self::Distinct(decode(kind, value)?),
        })
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Element(_) => QueryKind::Element,
            Self::SelectColumn(_) => QueryKind::SelectColumn,
            Self::Aggregate(_) => QueryKind::Aggregate,
            Self::PeriodSeries(_) => QueryKind::PeriodSeries,
            Self::Xox(_) => QueryKind::Xox,
            Self::Distinct(_) => QueryKind::Distinct,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::Element(q) => &q.table,
            Self::SelectColumn(q) => &q.table,
            Self::Aggregate(q) => &q.table,
            Self::PeriodSeries(q) => &q.table,
            Self::Xox(q) => &q.table,
            Self::Distinct(q) => &q.table,
        }
    }

    /// Period name the descriptor declares for itself, if any.
    pub fn period(&self) -> Option<&str> {
        match self {
            Self::Element(q) => q.period.as_deref(),
            Self::SelectColumn(q) => q.period.as_deref(),
            Self::Aggregate(q) => q.period.as_deref(),
            Self::PeriodSeries(q) => q.period.as_deref(),
            Self::Xox(q) => q.period.as_deref(),
            Self::Distinct(_) => None,
        }
    }
}
