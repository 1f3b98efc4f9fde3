//! Figure-type post-processing of query results.

use crate::error::{FigureError, FigureResult};
use crate::query::{MISSING, QueryOutput, SeriesData};

use super::QueryResults;

pub const PIE_CHART: &str = "PieChart";
pub const LADDER_CHART_ABS: &str = "LadderChart.Abs";

const LADDER_INCREASE: &str = "increase";
const LADDER_DECREASE: &str = "decrease";

/// Apply the transform registered for `figure_type`, if any.
pub fn apply(figure_type: Option<&str>, results: QueryResults) -> FigureResult<QueryResults> {
    match figure_type {
        Some(PIE_CHART) => pie_chart(results),
        Some(LADDER_CHART_ABS) => Ok(ladder_chart(results)),
        _ => Ok(results),
    }
}

// ---------------------------------------------------------------------------
// PieChart
// ---------------------------------------------------------------------------

fn share_value(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Turn a grouped result into each group's percentage of the grand total.
pub fn pie_shares(output: QueryOutput) -> FigureResult<QueryOutput> {
    let QueryOutput::Grouped {
        date_range,
        group_values,
        data,
    } = output
    else {
        return Err(FigureError::MalformedFigure(
            "PieChart needs an aggregate query result".into(),
        ));
    };

    let sums: Vec<f64> = group_values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            data.get(i)
                .map(|series| series.iter().map(|v| share_value(v)).sum())
                .unwrap_or(0.0)
        })
        .collect();
    let total: f64 = sums.iter().sum();

    let shares = group_values
        .iter()
        .zip(&sums)
        .map(|(group, sum)| {
            let pct = if total > 0.0 { sum / total * 100.0 } else { 0.0 };
            (group.clone(), format!("{pct:.2}"))
        })
        .collect();

    Ok(QueryOutput::Shares {
        date_range,
        group_values,
        shares,
    })
}

fn pie_chart(results: QueryResults) -> FigureResult<QueryResults> {
    match results {
        QueryResults::Single(output) => Ok(QueryResults::Single(pie_shares(output)?)),
        QueryResults::Named(named) => {
            let converted = named
                .into_iter()
                .map(|(name, output)| match output {
                    grouped @ QueryOutput::Grouped { .. } => Ok((name, pie_shares(grouped)?)),
                    other => Ok((name, other)),
                })
                .collect::<FigureResult<Vec<_>>>()?;
            Ok(QueryResults::Named(converted))
        }
    }
}

// ---------------------------------------------------------------------------
// LadderChart.Abs
// ---------------------------------------------------------------------------

fn ladder_value(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(0.0)
}

/// Net each `(increase, decrease)` pair so only the winning side shows a
/// value.
pub fn ladder_pairs(increase: &mut [String], decrease: &mut [String]) {
    for (inc, dec) in increase.iter_mut().zip(decrease.iter_mut()) {
        let diff = ladder_value(inc) - ladder_value(dec);
        if diff > 0.0 {
            *inc = format!("{diff:.2}");
            *dec = MISSING.to_string();
        } else if diff < 0.0 {
            *inc = MISSING.to_string();
            *dec = format!("{:.2}", -diff);
        } else {
            *inc = MISSING.to_string();
            *dec = MISSING.to_string();
        }
    }
}

fn flat_series<'a>(named: &'a [(String, QueryOutput)], name: &str) -> Option<&'a Vec<String>> {
    named.iter().find_map(|(n, output)| match output {
        QueryOutput::Series {
            data: SeriesData::Flat(series),
            ..
        } if n == name => Some(series),
        _ => None,
    })
}

fn replace_series(named: &mut [(String, QueryOutput)], name: &str, series: Vec<String>) {
    for (n, output) in named.iter_mut() {
        if n == name {
            if let QueryOutput::Series { data, .. } = output {
                *data = SeriesData::Flat(series);
                return;
            }
        }
    }
}

fn ladder_chart(results: QueryResults) -> QueryResults {
    let mut named = match results {
        QueryResults::Named(named) => named,
        single => {
            tracing::error!("LadderChart.Abs needs named 'increase' and 'decrease' queries");
            return single;
        }
    };
    let (Some(mut increase), Some(mut decrease)) = (
        flat_series(&named, LADDER_INCREASE).cloned(),
        flat_series(&named, LADDER_DECREASE).cloned(),
    ) else {
        tracing::error!("LadderChart.Abs queries must both be flat select_column series");
        return QueryResults::Named(named);
    };

    ladder_pairs(&mut increase, &mut decrease);
    replace_series(&mut named, LADDER_INCREASE, increase);
    replace_series(&mut named, LADDER_DECREASE, decrease);
    QueryResults::Named(named)
}
