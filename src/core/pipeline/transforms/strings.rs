use super::{config_error, data_error, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{
    MergeColumnsConfig, SplitColumnConfig, StringOperation, StringTransformConfig,
};
use crate::core::table::{Table, Value};
use regex::Regex;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Uppercase the first letter of every alphabetic run and lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for ch in text.chars() {
        if previous_alpha {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_alpha = ch.is_alphabetic();
    }
    out
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern).map_err(|err| {
        config_error(format!("invalid regular expression '{}': {}", pattern, err))
    })
}

enum Operation {
    Simple(fn(&str) -> Value),
    Replace { find: String, replace: String },
    Extract(Regex),
    ParseCurrency,
    ValidateEmail(Regex),
}

/// Stripped before a currency value is parsed; anything else must be numeric.
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹', ','];

impl Operation {
    fn from_config(config: &StringTransformConfig) -> Result<Self, AppError> {
        let operation = match config.operation {
            StringOperation::Uppercase => Operation::Simple(|s| Value::from(s.to_uppercase())),
            StringOperation::Lowercase => Operation::Simple(|s| Value::from(s.to_lowercase())),
            StringOperation::Title => Operation::Simple(|s| Value::from(title_case(s))),
            StringOperation::Strip => Operation::Simple(|s| Value::from(s.trim())),
            StringOperation::RemoveSpaces => Operation::Simple(|s| Value::from(s.replace(' ', ""))),
            StringOperation::CleanPhone => Operation::Simple(|s| {
                Value::from(s.chars().filter(char::is_ascii_digit).collect::<String>())
            }),
            StringOperation::Replace => {
                let find = config
                    .find
                    .clone()
                    .filter(|find| !find.is_empty())
                    .ok_or_else(|| config_error("STRING_TRANSFORM replace requires 'find'"))?;
                Operation::Replace {
                    find,
                    replace: config.replace.clone().unwrap_or_default(),
                }
            }
            StringOperation::Extract => {
                let pattern = config
                    .pattern
                    .as_deref()
                    .ok_or_else(|| config_error("STRING_TRANSFORM extract requires 'pattern'"))?;
                Operation::Extract(compile(pattern)?)
            }
            StringOperation::ParseCurrency => Operation::ParseCurrency,
            StringOperation::ValidateEmail => Operation::ValidateEmail(compile(EMAIL_PATTERN)?),
        };
        Ok(operation)
    }

    fn apply(&self, text: &str, column: &str, row: usize) -> Result<Value, AppError> {
        let value = match self {
            Operation::Simple(f) => f(text),
            Operation::Replace { find, replace } => Value::from(text.replace(find, replace)),
            Operation::Extract(regex) => regex
                .captures(text)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| Value::from(m.as_str()))
                .unwrap_or(Value::Null),
            Operation::ParseCurrency => {
                let cleaned: String = text
                    .chars()
                    .filter(|ch| !CURRENCY_SYMBOLS.contains(ch))
                    .collect();
                let parsed = cleaned.trim().parse::<f64>().map_err(|_| {
                    data_error(
                        "ETL-DATA-006",
                        format!(
                            "cannot parse currency value '{}' in column '{}' (row {})",
                            text, column, row
                        ),
                    )
                })?;
                Value::Float(parsed)
            }
            Operation::ValidateEmail(regex) => {
                if regex.is_match(text.trim()) {
                    Value::from(text)
                } else {
                    Value::Null
                }
            }
        };
        Ok(value)
    }
}

/// Per-cell string operation on one column. Nulls stay null.
pub fn string_transform(
    input: &Table,
    config: &StringTransformConfig,
) -> Result<TransformOutput, AppError> {
    let idx = input.require_column(&config.column)?;
    let operation = Operation::from_config(config)?;
    let values = input
        .column_values(idx)
        .enumerate()
        .map(|(row, value)| {
            if value.is_null() {
                Ok(Value::Null)
            } else {
                operation.apply(&value.render(), &config.column, row)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let table = input.with_column(&config.column, values);
    let message = format!("Applied {:?} to '{}'", config.operation, config.column);
    Ok(TransformOutput::new(table, message))
}

pub fn split_column(input: &Table, config: &SplitColumnConfig) -> Result<TransformOutput, AppError> {
    if config.delimiter.is_empty() {
        return Err(config_error("SPLIT_COLUMN delimiter must not be empty"));
    }
    if config.new_columns.is_empty() {
        return Err(config_error("SPLIT_COLUMN requires at least one new column"));
    }
    let idx = input.require_column(&config.column)?;

    let mut parts: Vec<Vec<Value>> =
        vec![Vec::with_capacity(input.row_count()); config.new_columns.len()];
    for value in input.column_values(idx) {
        let rendered = value.render();
        let mut pieces = (!value.is_null()).then(|| rendered.split(config.delimiter.as_str()));
        for column in parts.iter_mut() {
            let piece = pieces.as_mut().and_then(|split| split.next());
            column.push(piece.map(Value::from).unwrap_or(Value::Null));
        }
    }

    let table = config
        .new_columns
        .iter()
        .zip(parts)
        .fold(input.clone(), |table, (name, values)| table.with_column(name, values));
    let message = format!(
        "Split '{}' into {} columns",
        config.column,
        config.new_columns.len()
    );
    Ok(TransformOutput::new(table, message))
}

pub fn merge_columns(input: &Table, config: &MergeColumnsConfig) -> Result<TransformOutput, AppError> {
    if config.columns.is_empty() {
        return Err(config_error("MERGE_COLUMNS requires at least one column"));
    }
    let indices = input.require_columns(&config.columns)?;
    let values = input
        .rows()
        .iter()
        .map(|row| {
            let pieces: Vec<String> = indices.iter().map(|&idx| row[idx].render()).collect();
            Value::from(pieces.join(&config.separator))
        })
        .collect();
    let table = input.with_column(&config.new_column, values);
    let message = format!(
        "Merged {} columns into '{}'",
        config.columns.len(),
        config.new_column
    );
    Ok(TransformOutput::new(table, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ErrorCategory;
    use serde_json::json;

    fn names() -> Table {
        Table::from_json_rows(
            &["name"],
            vec![
                vec![json!("  ada LOVELACE ")],
                vec![json!(null)],
                vec![json!("o'neil-smith 3rd")],
            ],
        )
        .unwrap()
    }

    fn transform(table: &Table, config: serde_json::Value) -> Result<Vec<Value>, AppError> {
        let config: StringTransformConfig = serde_json::from_value(config).unwrap();
        Ok(string_transform(table, &config)?
            .table
            .column_values(0)
            .cloned()
            .collect())
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("ada LOVELACE"), "Ada Lovelace");
        assert_eq!(title_case("o'neil-smith 3rd"), "O'Neil-Smith 3Rd");
    }

    #[test]
    fn test_strip_and_nulls() {
        let out = transform(&names(), json!({"column": "name", "operation": "trim"})).unwrap();
        assert_eq!(out[0], Value::from("ada LOVELACE"));
        assert_eq!(out[1], Value::Null);
    }

    #[test]
    fn test_extract_first_group_or_null() {
        let out = transform(
            &names(),
            json!({"column": "name", "operation": "extract", "pattern": r"(\d+)rd"}),
        )
        .unwrap();
        assert_eq!(out, vec![Value::Null, Value::Null, Value::from("3")]);
    }

    #[test]
    fn test_invalid_regex_and_missing_find_are_config_errors() {
        let err = transform(
            &names(),
            json!({"column": "name", "operation": "extract", "pattern": "("}),
        )
        .unwrap_err();
        assert_eq!(err.category, ErrorCategory::ConfigError);
        let err = transform(&names(), json!({"column": "name", "operation": "replace"})).unwrap_err();
        assert_eq!(err.category, ErrorCategory::ConfigError);
    }

    #[test]
    fn test_currency_and_email() {
        let table = Table::from_json_rows(
            &["v"],
            vec![vec![json!("$1,234.50")], vec![json!("a@b.io")], vec![json!("nope")]],
        )
        .unwrap();
        let currency = Table::from_json_rows(&["v"], vec![vec![json!("$1,234.50")]]).unwrap();
        assert_eq!(
            transform(&currency, json!({"column": "v", "operation": "parse_currency"})).unwrap(),
            vec![Value::Float(1234.5)]
        );
        assert_eq!(
            transform(&table, json!({"column": "v", "operation": "validate_email"})).unwrap(),
            vec![Value::Null, Value::from("a@b.io"), Value::Null]
        );
        let err = transform(&table, json!({"column": "v", "operation": "parse_currency"})).unwrap_err();
        assert_eq!(err.category, ErrorCategory::DataError);
    }

    #[test]
    fn test_currency_keeps_only_symbols_out() {
        let prices = Table::from_json_rows(
            &["v"],
            vec![vec![json!(" €-12.5 ")], vec![json!("₹1,00,000")]],
        )
        .unwrap();
        assert_eq!(
            transform(&prices, json!({"column": "v", "operation": "parse_currency"})).unwrap(),
            vec![Value::Float(-12.5), Value::Float(100000.0)]
        );

        let embedded = Table::from_json_rows(&["v"], vec![vec![json!("abc12def")]]).unwrap();
        let err = transform(&embedded, json!({"column": "v", "operation": "parse_currency"}))
            .unwrap_err();
        assert_eq!(err.code, "ETL-DATA-006");
    }

    #[test]
    fn test_split_pads_with_nulls_and_merge_renders_nulls_empty() {
        let table = Table::from_json_rows(
            &["full", "x"],
            vec![vec![json!("a-b-c"), json!(1)], vec![json!("d"), json!(null)]],
        )
        .unwrap();
        let config: SplitColumnConfig = serde_json::from_value(
            json!({"column": "full", "delimiter": "-", "new_columns": ["p1", "p2"]}),
        )
        .unwrap();
        let split = split_column(&table, &config).unwrap().table;
        assert_eq!(split.columns(), &["full", "x", "p1", "p2"]);
        assert_eq!(split.cell(0, "p2"), Some(&Value::from("b")));
        assert_eq!(split.cell(1, "p2"), Some(&Value::Null));

        let config: MergeColumnsConfig = serde_json::from_value(
            json!({"columns": ["full", "x"], "new_column": "m", "separator": "|"}),
        )
        .unwrap();
        let merged = merge_columns(&table, &config).unwrap().table;
        assert_eq!(merged.cell(0, "m"), Some(&Value::from("a-b-c|1")));
        assert_eq!(merged.cell(1, "m"), Some(&Value::from("d|")));
    }
}
