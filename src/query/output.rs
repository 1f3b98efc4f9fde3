//! Result shapes produced by the query parsers.

use serde_json::{Map, Value, json};

/// Placeholder for a period with no row in a dense series.
pub const MISSING: &str = "-";

/// Series payload of a `select_column` query.
#[derive(Clone, Debug, PartialEq)]
pub enum SeriesData {
    Flat(Vec<String>),
    /// `raise_dimension`: the flat series wrapped as a series of series.
    Raised(Vec<Vec<String>>),
}

/// Result of one parser, before it is written into a figure.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutput {
    Element {
        data: Option<String>,
    },
    Series {
        date_range: Vec<String>,
        data: SeriesData,
    },
    Grouped {
        date_range: Vec<String>,
        group_values: Vec<String>,
        /// `data[i]` is the dense series of `group_values[i]`.
        data: Vec<Vec<String>>,
    },
    PeriodSeries {
        date_range: Vec<String>,
        data: Vec<Vec<String>>,
    },
    Change {
        inc_or_dec: i32,
        change: String,
        name: String,
    },
    Distinct {
        data: Vec<String>,
    },
    /// A grouped result after pie-chart normalization: percentage share
    /// per group value, in `group_values` order.
    Shares {
        date_range: Vec<String>,
        group_values: Vec<String>,
        shares: Vec<(String, String)>,
    },
}

impl QueryOutput {
    /// The result map written into figures and template contexts.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Element { data } => json!({ "data": data }),
            Self::Series { date_range, data } => {
                let data = match data {
                    SeriesData::Flat(series) => json!(series),
                    SeriesData::Raised(series) => json!(series),
                };
                json!({ "date_range": date_range, "data": data })
            }
            Self::Grouped {
                date_range,
                group_values,
                data,
            } => json!({
                "date_range": date_range,
                "group_values": group_values,
                "data": data,
            }),
            Self::PeriodSeries { date_range, data } => {
                json!({ "date_range": date_range, "data": data })
            }
            Self::Change {
                inc_or_dec,
                change,
                name,
            } => json!({
                "inc_or_dec": inc_or_dec,
                "change": change,
                "name": name,
            }),
            Self::Distinct { data } => json!({ "data": data }),
            Self::Shares {
                date_range,
                group_values,
                shares,
            } => {
                let data: Map<String, Value> = shares
                    .iter()
                    .map(|(group, pct)| (group.clone(), Value::String(pct.clone())))
                    .collect();
                json!({
                    "date_range": date_range,
                    "group_values": group_values,
                    "data": data,
                })
            }
        }
    }
}
