use super::{config_error, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{DatePart, ExtractDatePartsConfig};
use crate::core::table::{Table, Value};
use chrono::{Datelike, NaiveDateTime, Timelike};

fn part_of(dt: &NaiveDateTime, part: DatePart) -> i64 {
    match part {
        DatePart::Year => i64::from(dt.year()),
        DatePart::Month => i64::from(dt.month()),
        DatePart::Day => i64::from(dt.day()),
        DatePart::DayOfWeek => i64::from(dt.weekday().num_days_from_monday()),
        DatePart::Quarter => i64::from((dt.month() - 1) / 3 + 1),
        DatePart::Hour => i64::from(dt.hour()),
    }
}

/// Add `{column}_{part}` integer columns. The source column is coerced to datetimes;
/// cells that do not parse become null.
pub fn extract_date_parts(
    input: &Table,
    config: &ExtractDatePartsConfig,
) -> Result<TransformOutput, AppError> {
    if config.parts.is_empty() {
        return Err(config_error("EXTRACT_DATE_PARTS requires at least one part"));
    }
    let idx = input.require_column(&config.column)?;
    let parsed: Vec<Option<NaiveDateTime>> =
        input.column_values(idx).map(Value::as_datetime).collect();
    let unparsed = input
        .column_values(idx)
        .zip(&parsed)
        .filter(|(value, dt)| !value.is_null() && dt.is_none())
        .count();

    let coerced = parsed
        .iter()
        .map(|dt| dt.map(Value::DateTime).unwrap_or(Value::Null))
        .collect();
    let mut table = input.with_column(&config.column, coerced);
    for part in &config.parts {
        let values = parsed
            .iter()
            .map(|dt| {
                dt.as_ref()
                    .map(|dt| Value::Int(part_of(dt, *part)))
                    .unwrap_or(Value::Null)
            })
            .collect();
        table = table.with_column(&format!("{}_{}", config.column, part.as_str()), values);
    }

    let mut message = format!(
        "Extracted {} date parts from '{}'",
        config.parts.len(),
        config.column
    );
    if unparsed > 0 {
        message.push_str(&format!("; {} values could not be parsed", unparsed));
    }
    Ok(TransformOutput::new(table, message))
}
