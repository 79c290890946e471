use super::{config_error, numeric_column, stats, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{BinningConfig, Bins};
use crate::core::table::{Table, Value};

/// Equal-width edges over [min, max]. The lowest edge is pushed down by 0.1% of the
/// range so that the minimum lands inside the first right-closed interval.
fn equal_width_edges(present: &[f64], count: usize) -> Option<Vec<f64>> {
    let min = present.iter().copied().reduce(f64::min)?;
    let max = present.iter().copied().reduce(f64::max)?;
    let (low, high) = if min == max {
        let pad = |v: f64| if v == 0.0 { 0.001 } else { 0.001 * v.abs() };
        (min - pad(min), max + pad(max))
    } else {
        (min, max)
    };
    let step = (high - low) / count as f64;
    let mut edges: Vec<f64> = (0..=count).map(|i| low + step * i as f64).collect();
    edges[count] = high;
    if min != max {
        edges[0] -= (max - min) * 0.001;
    }
    Some(edges)
}

fn format_edge(edge: f64) -> String {
    let rounded = (edge * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        rounded.to_string()
    }
}

fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    edges
        .windows(2)
        .position(|pair| value > pair[0] && value <= pair[1])
}

/// Bucket a numeric column into labelled right-closed intervals.
pub fn binning(input: &Table, config: &BinningConfig) -> Result<TransformOutput, AppError> {
    let numbers = numeric_column(input, &config.column)?;
    let present = stats::present(&numbers);

    let edges = match &config.bins {
        Bins::Count(0) => return Err(config_error("BINNING bin count must be at least 1")),
        Bins::Count(count) => equal_width_edges(&present, *count),
        Bins::Edges(edges) => {
            if edges.len() < 2 {
                return Err(config_error("BINNING needs at least two bin edges"));
            }
            if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(config_error("BINNING edges must increase monotonically"));
            }
            Some(edges.clone())
        }
    };
    let bin_count = match (&config.bins, &edges) {
        (_, Some(edges)) => edges.len() - 1,
        (Bins::Count(count), None) => *count,
        (Bins::Edges(edges), None) => edges.len() - 1,
    };

    let labels = match &config.labels {
        Some(labels) if labels.len() != bin_count => {
            return Err(config_error(format!(
                "BINNING has {} labels for {} bins",
                labels.len(),
                bin_count
            )));
        }
        Some(labels) => labels.clone(),
        None => edges
            .as_deref()
            .map(|edges| {
                edges
                    .windows(2)
                    .map(|pair| format!("({}, {}]", format_edge(pair[0]), format_edge(pair[1])))
                    .collect()
            })
            .unwrap_or_default(),
    };

    let values = numbers
        .iter()
        .map(|number| {
            number
                .zip(edges.as_deref())
                .and_then(|(n, edges)| bin_index(edges, n))
                .map(|idx| Value::from(labels[idx].as_str()))
                .unwrap_or(Value::Null)
        })
        .collect();

    let new_column = config
        .new_column
        .clone()
        .unwrap_or_else(|| format!("{}_binned", config.column));
    let table = input.with_column(&new_column, values);
    let message = format!(
        "Binned '{}' into {} categories as '{}'",
        config.column, bin_count, new_column
    );
    Ok(TransformOutput::new(table, message))
}
