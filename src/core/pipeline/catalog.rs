//! Node catalog: the single dispatch table mapping each subtype to its kind,
//! input arity and required configuration fields.

use aed_types::NodeKind;
use serde_json::Value;
use std::fmt;

/// Every node subtype the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeSubtype {
    CsvSource,
    ExcelSource,
    JsonSource,
    DbSource,
    ApiSource,
    Select,
    Filter,
    Rename,
    Cast,
    Aggregate,
    Join,
    Sort,
    FillMissing,
    DropDuplicates,
    Normalize,
    StringTransform,
    FilterOutliers,
    SplitColumn,
    MergeColumns,
    ExtractDateParts,
    Binning,
    CsvLoad,
    ExcelLoad,
    JsonLoad,
    DbLoad,
    ApiLoad,
}

/// Number of upstream tables a node consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Two,
}

impl Arity {
    pub fn count(&self) -> usize {
        match self {
            Arity::None => 0,
            Arity::One => 1,
            Arity::Two => 2,
        }
    }
}

/// A configuration requirement checked by validation and typed parsing.
#[derive(Debug, Clone, Copy)]
pub enum Requirement {
    /// Field must be present and non-empty.
    Field(&'static str),
    /// Field must be present; any non-null value is accepted.
    Present(&'static str),
    /// At least one of the fields must be present and non-empty.
    AnyOf(&'static [&'static str]),
}

impl Requirement {
    pub fn is_satisfied(&self, config: &Value) -> bool {
        match self {
            Requirement::Field(field) => has_value(config, field),
            Requirement::Present(field) => config.get(field).is_some_and(|v| !v.is_null()),
            Requirement::AnyOf(fields) => fields.iter().any(|field| has_value(config, field)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Requirement::Field(field) | Requirement::Present(field) => format!("'{}'", field),
            Requirement::AnyOf(fields) => fields
                .iter()
                .map(|field| format!("'{}'", field))
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// Absent, null, empty strings, empty lists and empty objects count as missing.
fn has_value(config: &Value, field: &str) -> bool {
    match config.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// Static description of one subtype.
#[derive(Debug)]
pub struct SubtypeSpec {
    pub subtype: NodeSubtype,
    pub name: &'static str,
    pub kind: NodeKind,
    pub arity: Arity,
    pub required: &'static [Requirement],
}

use Requirement::{AnyOf, Field, Present};

const FILE_SOURCE: &[Requirement] = &[Field("file_path")];
const FILE_LOAD: &[Requirement] = &[Field("output_path")];

macro_rules! spec {
    ($subtype:ident, $name:literal, $kind:ident, $arity:ident, $required:expr) => {
        SubtypeSpec {
            subtype: NodeSubtype::$subtype,
            name: $name,
            kind: NodeKind::$kind,
            arity: Arity::$arity,
            required: $required,
        }
    };
}

pub static CATALOG: &[SubtypeSpec] = &[
    spec!(CsvSource, "CSV_SOURCE", Source, None, FILE_SOURCE),
    spec!(ExcelSource, "EXCEL_SOURCE", Source, None, FILE_SOURCE),
    spec!(JsonSource, "JSON_SOURCE", Source, None, FILE_SOURCE),
    spec!(
        DbSource,
        "DB_SOURCE",
        Source,
        None,
        &[Field("connection_string"), AnyOf(&["table_name", "query"])]
    ),
    spec!(ApiSource, "API_SOURCE", Source, None, &[Field("endpoint")]),
    spec!(Select, "SELECT", Transform, One, &[Field("columns")]),
    spec!(
        Filter,
        "FILTER",
        Transform,
        One,
        &[Field("column"), Field("operator"), Present("value")]
    ),
    spec!(Rename, "RENAME", Transform, One, &[Field("mapping")]),
    spec!(Cast, "CAST", Transform, One, &[Field("casts")]),
    spec!(
        Aggregate,
        "AGGREGATE",
        Transform,
        One,
        &[Field("group_by"), Field("aggregations")]
    ),
    spec!(
        Join,
        "JOIN",
        Transform,
        Two,
        &[Field("join_type"), Field("left_on"), Field("right_on")]
    ),
    spec!(Sort, "SORT", Transform, One, &[Field("columns")]),
    spec!(
        FillMissing,
        "FILL_MISSING",
        Transform,
        One,
        &[Field("column"), Field("strategy")]
    ),
    spec!(DropDuplicates, "DROP_DUPLICATES", Transform, One, &[]),
    spec!(
        Normalize,
        "NORMALIZE",
        Transform,
        One,
        &[Field("column"), Field("method")]
    ),
    spec!(
        StringTransform,
        "STRING_TRANSFORM",
        Transform,
        One,
        &[Field("column"), Field("operation")]
    ),
    spec!(
        FilterOutliers,
        "FILTER_OUTLIERS",
        Transform,
        One,
        &[Field("column"), Field("method")]
    ),
    spec!(
        SplitColumn,
        "SPLIT_COLUMN",
        Transform,
        One,
        &[Field("column"), Field("delimiter"), Field("new_columns")]
    ),
    spec!(
        MergeColumns,
        "MERGE_COLUMNS",
        Transform,
        One,
        &[Field("columns"), Field("new_column")]
    ),
    spec!(
        ExtractDateParts,
        "EXTRACT_DATE_PARTS",
        Transform,
        One,
        &[Field("column")]
    ),
    spec!(
        Binning,
        "BINNING",
        Transform,
        One,
        &[Field("column"), Field("bins")]
    ),
    spec!(CsvLoad, "CSV_LOAD", Load, One, FILE_LOAD),
    spec!(ExcelLoad, "EXCEL_LOAD", Load, One, FILE_LOAD),
    spec!(JsonLoad, "JSON_LOAD", Load, One, FILE_LOAD),
    spec!(
        DbLoad,
        "DB_LOAD",
        Load,
        One,
        &[Field("connection_string"), Field("table_name")]
    ),
    spec!(ApiLoad, "API_LOAD", Load, One, &[Field("endpoint")]),
];

const ALIASES: &[(&str, NodeSubtype)] = &[("REMOVE_OUTLIERS", NodeSubtype::FilterOutliers)];

impl NodeSubtype {
    /// Resolve a subtype name (case-insensitive, aliases included).
    pub fn parse(name: &str) -> Option<NodeSubtype> {
        let upper = name.trim().to_ascii_uppercase();
        CATALOG
            .iter()
            .find(|spec| spec.name == upper)
            .map(|spec| spec.subtype)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == upper)
                    .map(|(_, subtype)| *subtype)
            })
    }

    pub fn spec(&self) -> &'static SubtypeSpec {
        CATALOG
            .iter()
            .find(|spec| spec.subtype == *self)
            .unwrap_or(&CATALOG[0])
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    pub fn kind(&self) -> NodeKind {
        self.spec().kind
    }

    pub fn arity(&self) -> Arity {
        self.spec().arity
    }

    /// Requirements of this subtype that `config` does not satisfy.
    pub fn missing_requirements(&self, config: &Value) -> Vec<Requirement> {
        self.spec()
            .required
            .iter()
            .filter(|requirement| !requirement.is_satisfied(config))
            .copied()
            .collect()
    }
}

impl fmt::Display for NodeSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
