#![allow(clippy::result_large_err)]

//! Strongly typed node configurations parsed from the raw JSON `config` object.

use crate::core::error::AppError;
use crate::core::pipeline::catalog::NodeSubtype;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accept `"col"`, `["a", "b"]` or null for list-of-column fields.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(column)) => vec![column],
        Some(OneOrMany::Many(columns)) => columns,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSourceConfig {
    pub file_path: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbSourceConfig {
    pub connection_string: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

fn default_get() -> String {
    "GET".to_string()
}

fn default_post() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSourceConfig {
    pub endpoint: String,
    #[serde(default = "default_get")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Typed configuration of a SOURCE node.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    Csv(FileSourceConfig),
    Excel(FileSourceConfig),
    Json(FileSourceConfig),
    Database(DbSourceConfig),
    Api(ApiSourceConfig),
}

/// Shared by every file LOAD subtype; `output_path` has no default.
#[derive(Debug, Clone, Deserialize)]
pub struct FileSinkConfig {
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    #[default]
    Replace,
    Append,
    Fail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbSinkConfig {
    pub connection_string: String,
    pub table_name: String,
    #[serde(default)]
    pub if_exists: IfExists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSinkConfig {
    pub endpoint: String,
    #[serde(default = "default_post")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Typed configuration of a LOAD node.
#[derive(Debug, Clone)]
pub enum SinkConfig {
    Csv(FileSinkConfig),
    Excel(FileSinkConfig),
    Json(FileSinkConfig),
    Database(DbSinkConfig),
    Api(ApiSinkConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==", alias = "=", alias = "eq", alias = "equals")]
    Eq,
    #[serde(rename = "!=", alias = "ne", alias = "not_equals")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = ">=", alias = "gte", alias = "ge")]
    Ge,
    #[serde(rename = "<=", alias = "lte", alias = "le")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startswith", alias = "starts_with")]
    StartsWith,
    #[serde(rename = "endswith", alias = "ends_with")]
    EndsWith,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameConfig {
    pub mapping: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastTarget {
    #[serde(alias = "integer", alias = "int64")]
    Int,
    #[serde(alias = "double", alias = "float64", alias = "number")]
    Float,
    #[serde(alias = "str", alias = "text")]
    String,
    #[serde(alias = "date", alias = "timestamp")]
    Datetime,
    #[serde(alias = "boolean")]
    Bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastSpec {
    pub column: String,
    pub to: CastTarget,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastConfig {
    pub casts: Vec<CastSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Sum,
    #[serde(alias = "avg", alias = "average")]
    Mean,
    Count,
    Min,
    Max,
}

impl AggFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Count => "count",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationSpec {
    pub column: String,
    #[serde(alias = "function")]
    pub agg: AggFunc,
    #[serde(default, rename = "as")]
    pub alias: Option<String>,
    #[serde(default)]
    pub output_column: Option<String>,
}

impl AggregationSpec {
    /// Output column name: `as`, then `output_column`, then `{column}_{agg}`.
    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .or_else(|| self.output_column.clone())
            .unwrap_or_else(|| format!("{}_{}", self.column, self.agg.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub group_by: Vec<String>,
    pub aggregations: Vec<AggregationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    #[serde(alias = "full")]
    Outer,
}

fn default_suffixes() -> (String, String) {
    ("_left".to_string(), "_right".to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinConfig {
    pub join_type: JoinType,
    pub left_on: String,
    pub right_on: String,
    #[serde(default = "default_suffixes")]
    pub suffixes: (String, String),
    /// Explicit right-hand input; otherwise the second incoming edge.
    #[serde(default)]
    pub right_node_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Ascending {
    All(bool),
    PerColumn(Vec<bool>),
}

impl Default for Ascending {
    fn default() -> Self {
        Ascending::All(true)
    }
}

impl Ascending {
    pub fn for_column(&self, idx: usize) -> bool {
        match self {
            Ascending::All(flag) => *flag,
            Ascending::PerColumn(flags) => flags.get(idx).copied().unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub columns: Vec<String>,
    #[serde(default)]
    pub ascending: Ascending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStrategy {
    Constant,
    Mean,
    Median,
    #[serde(alias = "ffill", alias = "forward_fill")]
    Forward,
    #[serde(alias = "bfill", alias = "backward_fill")]
    Backward,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillMissingConfig {
    pub column: String,
    pub strategy: FillStrategy,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropDuplicatesConfig {
    #[serde(default, deserialize_with = "one_or_many")]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMethod {
    #[serde(alias = "min_max")]
    MinMax,
    #[serde(alias = "z_score")]
    ZScore,
    Robust,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeConfig {
    pub column: String,
    pub method: NormalizeMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringOperation {
    #[serde(alias = "upper")]
    Uppercase,
    #[serde(alias = "lower")]
    Lowercase,
    Title,
    #[serde(alias = "trim")]
    Strip,
    Replace,
    Extract,
    RemoveSpaces,
    CleanPhone,
    ParseCurrency,
    ValidateEmail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringTransformConfig {
    pub column: String,
    pub operation: StringOperation,
    #[serde(default)]
    pub find: Option<String>,
    #[serde(default)]
    pub replace: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Iqr,
    #[serde(alias = "std", alias = "z_score")]
    ZScore,
    Percentile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutlierConfig {
    pub column: String,
    pub method: OutlierMethod,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitColumnConfig {
    pub column: String,
    pub delimiter: String,
    pub new_columns: Vec<String>,
}

fn default_separator() -> String {
    " ".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeColumnsConfig {
    pub columns: Vec<String>,
    pub new_column: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePart {
    Year,
    Month,
    Day,
    #[serde(alias = "weekday", alias = "day_of_week")]
    DayOfWeek,
    Quarter,
    Hour,
}

impl DatePart {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::DayOfWeek => "dayofweek",
            DatePart::Quarter => "quarter",
            DatePart::Hour => "hour",
        }
    }
}

fn default_date_parts() -> Vec<DatePart> {
    vec![DatePart::Year, DatePart::Month, DatePart::Day]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractDatePartsConfig {
    pub column: String,
    #[serde(default = "default_date_parts")]
    pub parts: Vec<DatePart>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Bins {
    Count(usize),
    Edges(Vec<f64>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinningConfig {
    pub column: String,
    pub bins: Bins,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub new_column: Option<String>,
}

/// Typed configuration of a TRANSFORM node.
#[derive(Debug, Clone)]
pub enum TransformConfig {
    Select(SelectConfig),
    Filter(FilterConfig),
    Rename(RenameConfig),
    Cast(CastConfig),
    Aggregate(AggregateConfig),
    Join(JoinConfig),
    Sort(SortConfig),
    FillMissing(FillMissingConfig),
    DropDuplicates(DropDuplicatesConfig),
    Normalize(NormalizeConfig),
    StringTransform(StringTransformConfig),
    FilterOutliers(OutlierConfig),
    SplitColumn(SplitColumnConfig),
    MergeColumns(MergeColumnsConfig),
    ExtractDateParts(ExtractDatePartsConfig),
    Binning(BinningConfig),
}

/// Typed configuration of any node.
#[derive(Debug, Clone)]
pub enum NodeConfig {
    Source(SourceConfig),
    Transform(TransformConfig),
    Load(SinkConfig),
}

fn typed<T: DeserializeOwned>(subtype: NodeSubtype, raw: &Value) -> Result<T, AppError> {
    serde_json::from_value(raw.clone()).map_err(|err| {
        AppError::new(
            ErrorCategory::ConfigError,
            format!("invalid {} configuration: {}", subtype, err),
        )
        .with_code("ETL-CFG-003")
        .with_source(err)
    })
}

impl NodeConfig {
    /// Check required fields through the catalog, then parse the typed variant.
    pub fn parse(subtype: NodeSubtype, raw: &Value) -> Result<NodeConfig, AppError> {
        if !raw.is_object() {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                format!("{} configuration must be an object", subtype),
            )
            .with_code("ETL-CFG-001"));
        }
        if let Some(requirement) = subtype.missing_requirements(raw).first() {
            return Err(AppError::new(
                ErrorCategory::ConfigError,
                format!("{} requires {}", subtype, requirement.describe()),
            )
            .with_code("ETL-CFG-002"));
        }

        use NodeSubtype as S;
        let config = match subtype {
            S::CsvSource => NodeConfig::Source(SourceConfig::Csv(typed(subtype, raw)?)),
            S::ExcelSource => NodeConfig::Source(SourceConfig::Excel(typed(subtype, raw)?)),
            S::JsonSource => NodeConfig::Source(SourceConfig::Json(typed(subtype, raw)?)),
            S::DbSource => NodeConfig::Source(SourceConfig::Database(typed(subtype, raw)?)),
            S::ApiSource => NodeConfig::Source(SourceConfig::Api(typed(subtype, raw)?)),
            S::Select => NodeConfig::Transform(TransformConfig::Select(typed(subtype, raw)?)),
            S::Filter => NodeConfig::Transform(TransformConfig::Filter(typed(subtype, raw)?)),
            S::Rename => NodeConfig::Transform(TransformConfig::Rename(typed(subtype, raw)?)),
            S::Cast => NodeConfig::Transform(TransformConfig::Cast(typed(subtype, raw)?)),
            S::Aggregate => {
                NodeConfig::Transform(TransformConfig::Aggregate(typed(subtype, raw)?))
            }
            S::Join => NodeConfig::Transform(TransformConfig::Join(typed(subtype, raw)?)),
            S::Sort => NodeConfig::Transform(TransformConfig::Sort(typed(subtype, raw)?)),
            S::FillMissing => {
                NodeConfig::Transform(TransformConfig::FillMissing(typed(subtype, raw)?))
            }
            S::DropDuplicates => {
                NodeConfig::Transform(TransformConfig::DropDuplicates(typed(subtype, raw)?))
            }
            S::Normalize => {
                NodeConfig::Transform(TransformConfig::Normalize(typed(subtype, raw)?))
            }
            S::StringTransform => {
                NodeConfig::Transform(TransformConfig::StringTransform(typed(subtype, raw)?))
            }
            S::FilterOutliers => {
                NodeConfig::Transform(TransformConfig::FilterOutliers(typed(subtype, raw)?))
            }
            S::SplitColumn => {
                NodeConfig::Transform(TransformConfig::SplitColumn(typed(subtype, raw)?))
            }
            S::MergeColumns => {
                NodeConfig::Transform(TransformConfig::MergeColumns(typed(subtype, raw)?))
            }
            S::ExtractDateParts => {
                NodeConfig::Transform(TransformConfig::ExtractDateParts(typed(subtype, raw)?))
            }
            S::Binning => NodeConfig::Transform(TransformConfig::Binning(typed(subtype, raw)?)),
            S::CsvLoad => NodeConfig::Load(SinkConfig::Csv(typed(subtype, raw)?)),
            S::ExcelLoad => NodeConfig::Load(SinkConfig::Excel(typed(subtype, raw)?)),
            S::JsonLoad => NodeConfig::Load(SinkConfig::Json(typed(subtype, raw)?)),
            S::DbLoad => NodeConfig::Load(SinkConfig::Database(typed(subtype, raw)?)),
            S::ApiLoad => NodeConfig::Load(SinkConfig::Api(typed(subtype, raw)?)),
        };
        Ok(config)
    }
}
