use super::{ColumnProfile, ColumnType, TableProfile};
use crate::core::pipeline::NodeSubtype;
use crate::core::table::Value;
use serde::{Serialize, Serializer};
use serde_json::{json, Value as JsonValue};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 15;

const DATE_KEYWORDS: &[&str] = &[
    "date", "time", "dt", "timestamp", "created", "updated", "modified", "at", "on",
];
const SORT_KEYWORDS: &[&str] = &["date", "time", "created", "updated"];
const MEASURE_KEYWORDS: &[&str] = &[
    "price", "amount", "total", "sum", "cost", "revenue", "sales", "qty", "quantity", "count",
    "value", "balance", "profit", "loss",
];
const KEY_KEYWORDS: &[&str] = &["id", "key", "code"];
const EMAIL_KEYWORDS: &[&str] = &["email", "mail"];
const PHONE_KEYWORDS: &[&str] = &["phone", "mobile", "tel", "contact"];
const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionKind {
    FillMissing,
    DropColumn,
    ParseDate,
    CastType,
    Aggregate,
    Join,
    Filter,
    FilterOutliers,
    DropDuplicates,
    StringTransform,
    Normalize,
    Sort,
}

/// A transform worth adding, with a node configuration that applies it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub column: Option<String>,
    pub suggestion: String,
    /// Node subtype that `config` is written for.
    #[serde(serialize_with = "subtype_name")]
    pub subtype: NodeSubtype,
    pub config: JsonValue,
    /// 1 is most urgent.
    pub priority: u8,
}

fn subtype_name<S: Serializer>(subtype: &NodeSubtype, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(subtype.name())
}

impl Suggestion {
    fn new(
        kind: SuggestionKind,
        column: Option<&str>,
        suggestion: String,
        subtype: NodeSubtype,
        config: JsonValue,
        priority: u8,
    ) -> Self {
        Suggestion {
            kind,
            column: column.map(str::to_string),
            suggestion,
            subtype,
            config,
            priority,
        }
    }
}

/// Lowercase words of a column name, split on punctuation and camelCase humps.
pub(crate) fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;
    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if ch.is_uppercase() && previous_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn has_keyword(name: &str, keywords: &[&str]) -> bool {
    name_tokens(name)
        .iter()
        .any(|token| keywords.contains(&token.as_str()))
}

fn looks_numeric(value: &Value) -> bool {
    match value {
        Value::Int(_) | Value::Float(_) => true,
        Value::Str(s) => s
            .replace([',', '$'], "")
            .trim()
            .parse::<f64>()
            .is_ok_and(|n| !n.is_nan()),
        _ => false,
    }
}

/// Low-cardinality text column usable as a grouping key.
fn is_categorical(profile: &ColumnProfile) -> bool {
    profile.dtype.is_textual() && profile.unique_count > 1 && profile.uniqueness() <= 0.5
}

fn column_suggestions(
    name: &str,
    column: &ColumnProfile,
    table: &TableProfile,
    out: &mut Vec<Suggestion>,
) {
    use SuggestionKind as K;
    let numeric = column.dtype.is_numeric();
    let textual = column.dtype.is_textual();
    let samples = column.sample_values.len();

    if column.null_percent > 40.0 {
        let strategy = if numeric { "median" } else { "forward" };
        out.push(Suggestion::new(
            K::FillMissing,
            Some(name),
            format!(
                "Fill missing values in '{}' ({:.1}% null) - use {}",
                name, column.null_percent, strategy
            ),
            NodeSubtype::FillMissing,
            json!({"column": name, "strategy": strategy}),
            1,
        ));
        let others: Vec<&String> = table.columns.keys().filter(|other| *other != name).collect();
        if !others.is_empty() {
            out.push(Suggestion::new(
                K::DropColumn,
                Some(name),
                format!(
                    "Drop '{}' - very high null percentage ({:.1}%)",
                    name, column.null_percent
                ),
                NodeSubtype::Select,
                json!({"columns": others}),
                2,
            ));
        }
    } else if column.null_percent > 10.0 {
        let strategy = if numeric { "mean" } else { "forward" };
        out.push(Suggestion::new(
            K::FillMissing,
            Some(name),
            format!(
                "Fill {:.1}% missing values in '{}'",
                column.null_percent, name
            ),
            NodeSubtype::FillMissing,
            json!({"column": name, "strategy": strategy}),
            2,
        ));
    }

    if column.dtype == ColumnType::Text && has_keyword(name, DATE_KEYWORDS) {
        out.push(Suggestion::new(
            K::ParseDate,
            Some(name),
            format!("Convert '{}' to datetime - detected date pattern", name),
            NodeSubtype::Cast,
            json!({"casts": [{"column": name, "to": "datetime"}]}),
            1,
        ));
    }

    if numeric && has_keyword(name, MEASURE_KEYWORDS) {
        let group = table
            .columns
            .iter()
            .find(|(other, profile)| *other != name && is_categorical(profile));
        if let Some((group, _)) = group {
            out.push(Suggestion::new(
                K::Aggregate,
                Some(name),
                format!("Aggregate '{}' by '{}' (sum for analysis)", name, group),
                NodeSubtype::Aggregate,
                json!({
                    "group_by": [group],
                    "aggregations": [{"column": name, "agg": "sum"}]
                }),
                3,
            ));
        }
    }

    if textual && samples > 0 {
        let numeric_count = column
            .sample_values
            .iter()
            .filter(|value| looks_numeric(value))
            .count();
        if numeric_count > 0 && numeric_count as f64 >= samples as f64 * 0.8 {
            out.push(Suggestion::new(
                K::CastType,
                Some(name),
                format!("Convert '{}' to numeric - detected numeric strings", name),
                NodeSubtype::Cast,
                json!({"casts": [{"column": name, "to": "float"}]}),
                1,
            ));
        }
    }

    if column.total_rows > 0 && column.uniqueness() > 0.95 && has_keyword(name, KEY_KEYWORDS) {
        out.push(Suggestion::new(
            K::Join,
            Some(name),
            format!(
                "'{}' is a potential join key ({:.1}% unique)",
                name,
                column.uniqueness() * 100.0
            ),
            NodeSubtype::Join,
            json!({"join_type": "inner", "left_on": name, "right_on": name}),
            3,
        ));
    }

    if textual && column.samples_share(0.5, |s| s.contains(' ')) {
        out.push(Suggestion::new(
            K::StringTransform,
            Some(name),
            format!("Clean '{}' - remove extra spaces/trim whitespace", name),
            NodeSubtype::StringTransform,
            json!({"column": name, "operation": "strip"}),
            3,
        ));
    }

    if let Some(stats) = &column.numeric {
        let std = stats.std.unwrap_or(0.0);
        if stats.mean > 0.0 && std > 0.0 {
            if stats.max > stats.mean + 3.0 * std || stats.min < stats.mean - 3.0 * std {
                out.push(Suggestion::new(
                    K::FilterOutliers,
                    Some(name),
                    format!(
                        "Filter outliers in '{}' - values beyond 3 standard deviations",
                        name
                    ),
                    NodeSubtype::FilterOutliers,
                    json!({"column": name, "method": "z_score", "threshold": 3}),
                    2,
                ));
            }
        } else if stats.mean > 0.0 && stats.max > stats.mean * 5.0 {
            out.push(Suggestion::new(
                K::Filter,
                Some(name),
                format!(
                    "Filter outliers in '{}' - max value is {:.1} (5x higher than mean)",
                    name, stats.max
                ),
                NodeSubtype::Filter,
                json!({"column": name, "operator": "<=", "value": stats.mean * 3.0}),
                2,
            ));
        }
    }

    if column.total_rows > 0 && 1.0 - column.uniqueness() > 0.1 {
        out.push(Suggestion::new(
            K::DropDuplicates,
            Some(name),
            format!(
                "'{}' has {:.1}% duplicate values - consider deduplication",
                name,
                (1.0 - column.uniqueness()) * 100.0
            ),
            NodeSubtype::DropDuplicates,
            json!({"columns": [name]}),
            2,
        ));
    }

    if let Some(stats) = &column.numeric {
        if stats.max - stats.min > 1000.0 {
            out.push(Suggestion::new(
                K::Normalize,
                Some(name),
                format!(
                    "Normalize '{}' - wide range [{:.1} to {:.1}]",
                    name, stats.min, stats.max
                ),
                NodeSubtype::Normalize,
                json!({"column": name, "method": "min_max"}),
                3,
            ));
        }
    }

    if !textual {
        return;
    }
    let mut string_op = |kind, message: String, operation: &str, priority| {
        out.push(Suggestion::new(
            kind,
            Some(name),
            message,
            NodeSubtype::StringTransform,
            json!({"column": name, "operation": operation}),
            priority,
        ));
    };

    if has_keyword(name, EMAIL_KEYWORDS) && column.samples_share(0.5, |s| s.contains('@')) {
        string_op(
            K::StringTransform,
            format!("Validate and clean email addresses in '{}'", name),
            "validate_email",
            2,
        );
    }
    if has_keyword(name, PHONE_KEYWORDS)
        && column.samples_share(0.5, |s| s.chars().filter(char::is_ascii_digit).count() > 7)
    {
        string_op(
            K::StringTransform,
            format!("Standardize phone numbers in '{}' - extract digits only", name),
            "clean_phone",
            2,
        );
    }
    if column.samples_share(0.5, |s| s.contains(CURRENCY_SYMBOLS)) {
        string_op(
            K::CastType,
            format!("Parse currency values in '{}' - convert to numeric", name),
            "parse_currency",
            1,
        );
    }
    if column.samples_share(0.7, |s| s != s.to_lowercase() && s != s.to_uppercase()) {
        string_op(
            K::StringTransform,
            format!("Standardize text case in '{}' - convert to lowercase", name),
            "lowercase",
            3,
        );
    }
}

/// Rule-based transform suggestions for a profiled table, most urgent first.
/// Equal priorities keep column order; at most `limit` are returned.
pub fn suggest(profile: &TableProfile, limit: usize) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    for (name, column) in &profile.columns {
        column_suggestions(name, column, profile, &mut suggestions);
    }

    if !profile.columns.is_empty() {
        suggestions.push(Suggestion::new(
            SuggestionKind::DropDuplicates,
            None,
            "Remove duplicate rows across all columns".to_string(),
            NodeSubtype::DropDuplicates,
            json!({}),
            3,
        ));
    }

    if let Some(date_column) = profile
        .columns
        .keys()
        .find(|name| has_keyword(name, SORT_KEYWORDS))
    {
        suggestions.push(Suggestion::new(
            SuggestionKind::Sort,
            Some(date_column.as_str()),
            format!("Sort data by '{}' for chronological analysis", date_column),
            NodeSubtype::Sort,
            json!({"columns": [date_column], "ascending": true}),
            3,
        ));
    }

    suggestions.sort_by_key(|suggestion| suggestion.priority);
    suggestions.truncate(limit);
    tracing::debug!(
        columns = profile.total_columns,
        suggestions = suggestions.len(),
        "generated transform suggestions"
    );
    suggestions
}
