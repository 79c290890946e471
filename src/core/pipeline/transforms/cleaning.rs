use super::{config_error, numeric_column, stats, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{
    FillMissingConfig, FillStrategy, OutlierConfig, OutlierMethod,
};
use crate::core::table::{Table, Value};

/// Replace nulls in one column. Statistics are computed over the non-null values;
/// an all-null column is left untouched by `mean` and `median`.
pub fn fill_missing(input: &Table, config: &FillMissingConfig) -> Result<TransformOutput, AppError> {
    let idx = input.require_column(&config.column)?;
    let original: Vec<Value> = input.column_values(idx).cloned().collect();
    let missing = original.iter().filter(|value| value.is_null()).count();

    let filled = match config.strategy {
        FillStrategy::Constant => {
            let constant = config
                .value
                .as_ref()
                .map(Value::from_json)
                .unwrap_or(Value::Int(0));
            replace_nulls(&original, |_| constant.clone())
        }
        FillStrategy::Mean | FillStrategy::Median => {
            let present = stats::present(&numeric_column(input, &config.column)?);
            let statistic = if config.strategy == FillStrategy::Mean {
                stats::mean(&present)
            } else {
                stats::median(&present)
            };
            match statistic {
                Some(statistic) => replace_nulls(&original, |_| Value::Float(statistic)),
                None => original.clone(),
            }
        }
        FillStrategy::Forward => carry(original.iter()),
        FillStrategy::Backward => {
            let mut values = carry(original.iter().rev());
            values.reverse();
            values
        }
    };

    let table = input.with_column(&config.column, filled);
    let message = format!(
        "Filled {} missing values in '{}' using {:?}",
        missing, config.column, config.strategy
    );
    Ok(TransformOutput::new(table, message))
}

fn replace_nulls(values: &[Value], fill: impl Fn(usize) -> Value) -> Vec<Value> {
    values
        .iter()
        .enumerate()
        .map(|(row, value)| if value.is_null() { fill(row) } else { value.clone() })
        .collect()
}

/// Propagate the last non-null value along the iterator; leading nulls stay null.
fn carry<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut last: Option<Value> = None;
    values
        .map(|value| {
            if value.is_null() {
                last.clone().unwrap_or(Value::Null)
            } else {
                last = Some(value.clone());
                value.clone()
            }
        })
        .collect()
}

/// Inclusive bounds outside of which a value counts as an outlier.
fn outlier_bounds(present: &[f64], config: &OutlierConfig) -> Result<Option<(f64, f64)>, AppError> {
    let bounds = match config.method {
        OutlierMethod::Iqr => {
            let k = config.threshold.unwrap_or(1.5);
            match (stats::quantile(present, 0.25), stats::quantile(present, 0.75)) {
                (Some(q1), Some(q3)) => {
                    let iqr = q3 - q1;
                    Some((q1 - k * iqr, q3 + k * iqr))
                }
                _ => None,
            }
        }
        OutlierMethod::ZScore => {
            let k = config.threshold.unwrap_or(3.0);
            match (stats::mean(present), stats::sample_std(present)) {
                (Some(mean), Some(std)) if std > 0.0 => Some((mean - k * std, mean + k * std)),
                _ => None,
            }
        }
        OutlierMethod::Percentile => {
            let pct = config.threshold.unwrap_or(1.0);
            if !(0.0..50.0).contains(&pct) {
                return Err(config_error(format!(
                    "FILTER_OUTLIERS percentile threshold must be in [0, 50), got {}",
                    pct
                )));
            }
            match (
                stats::quantile(present, pct / 100.0),
                stats::quantile(present, 1.0 - pct / 100.0),
            ) {
                (Some(low), Some(high)) => Some((low, high)),
                _ => None,
            }
        }
    };
    Ok(bounds)
}

/// Drop rows whose value falls outside the method's bounds. Null cells are kept.
pub fn filter_outliers(input: &Table, config: &OutlierConfig) -> Result<TransformOutput, AppError> {
    if config.threshold.is_some_and(|t| !t.is_finite() || t < 0.0) {
        return Err(config_error("FILTER_OUTLIERS threshold must be a non-negative number"));
    }
    let numbers = numeric_column(input, &config.column)?;
    let present = stats::present(&numbers);
    let Some((low, high)) = outlier_bounds(&present, config)? else {
        return Ok(TransformOutput::new(
            input.clone(),
            format!("No outliers removed from '{}'", config.column),
        ));
    };

    let rows: Vec<Vec<Value>> = input
        .rows()
        .iter()
        .zip(&numbers)
        .filter(|(_, number)| number.map_or(true, |n| n >= low && n <= high))
        .map(|(row, _)| row.clone())
        .collect();
    let removed = input.row_count() - rows.len();
    let table = Table::new(input.columns().to_vec(), rows)?;
    let message = format!(
        "Removed {} outliers from '{}' ({:?}, bounds {:.4} to {:.4})",
        removed, config.column, config.method, low, high
    );
    Ok(TransformOutput::new(table, message))
}
