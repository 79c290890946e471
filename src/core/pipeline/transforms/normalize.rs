use super::{numeric_column, stats, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{NormalizeConfig, NormalizeMethod};
use crate::core::table::{Table, Value};

/// (center, scale) for the method, or `None` when the column has no spread.
fn parameters(present: &[f64], method: NormalizeMethod) -> Option<(f64, f64)> {
    let (center, scale) = match method {
        NormalizeMethod::MinMax => {
            let min = present.iter().copied().reduce(f64::min)?;
            let max = present.iter().copied().reduce(f64::max)?;
            (min, max - min)
        }
        NormalizeMethod::ZScore => (stats::mean(present)?, stats::sample_std(present)?),
        NormalizeMethod::Robust => {
            let q1 = stats::quantile(present, 0.25)?;
            let q3 = stats::quantile(present, 0.75)?;
            (stats::median(present)?, q3 - q1)
        }
    };
    (scale.is_finite() && scale > 0.0).then_some((center, scale))
}

/// Rescale a numeric column in place. Output cells are floats; nulls stay null.
pub fn normalize(input: &Table, config: &NormalizeConfig) -> Result<TransformOutput, AppError> {
    let numbers = numeric_column(input, &config.column)?;
    let present = stats::present(&numbers);

    let Some((center, scale)) = parameters(&present, config.method) else {
        return Ok(TransformOutput::new(
            input.clone(),
            format!(
                "Column '{}' has no spread; left unchanged",
                config.column
            ),
        ));
    };

    let values = numbers
        .iter()
        .map(|number| match number {
            Some(n) => Value::Float((n - center) / scale),
            None => Value::Null,
        })
        .collect();
    let table = input.with_column(&config.column, values);
    let message = format!(
        "Normalized '{}' using {:?} ({} values)",
        config.column,
        config.method,
        present.len()
    );
    Ok(TransformOutput::new(table, message))
}
