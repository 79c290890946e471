use aed::core::pipeline::node_config::{NodeConfig, TransformConfig};
use aed::core::pipeline::transforms;
use aed::core::pipeline::NodeSubtype;
use aed::core::table::{Table, Value};
use aed::core::types::ErrorCategory;
use serde_json::json;
use std::sync::Arc;

fn transform(subtype: &str, raw: serde_json::Value) -> TransformConfig {
    let subtype = NodeSubtype::parse(subtype).unwrap();
    match NodeConfig::parse(subtype, &raw).unwrap() {
        NodeConfig::Transform(config) => config,
        other => panic!("{} parsed as {:?}", subtype, other),
    }
}

fn sales() -> Arc<Table> {
    Arc::new(
        Table::from_json_rows(
            &["country", "amount"],
            vec![
                vec![json!("US"), json!(10)],
                vec![json!("UK"), json!(7)],
                vec![json!("US"), json!(5)],
            ],
        )
        .unwrap(),
    )
}

#[test]
fn test_filter_keeps_matching_rows_in_order() {
    let input = sales();
    let config = transform(
        "FILTER",
        json!({"column": "country", "operator": "==", "value": "US"}),
    );
    let out = transforms::apply(&config, &[input.clone()]).unwrap();

    assert_eq!(
        out.table.rows(),
        &[
            vec![Value::from("US"), Value::Int(10)],
            vec![Value::from("US"), Value::Int(5)],
        ]
    );
    assert_eq!(input.row_count(), 3, "input must not be mutated");
}

#[test]
fn test_filter_on_missing_column_is_data_error() {
    let config = transform(
        "FILTER",
        json!({"column": "region", "operator": "==", "value": "EU"}),
    );
    let err = transforms::apply(&config, &[sales()]).unwrap_err();
    assert_eq!(err.category, ErrorCategory::DataError);
}

#[test]
fn test_aggregate_sums_per_group_in_first_seen_order() {
    let config = transform(
        "AGGREGATE",
        json!({
            "group_by": ["country"],
            "aggregations": [{"column": "amount", "agg": "sum", "as": "total"}]
        }),
    );
    let out = transforms::apply(&config, &[sales()]).unwrap();

    assert_eq!(out.table.columns(), &["country", "total"]);
    assert_eq!(
        out.table.rows(),
        &[
            vec![Value::from("US"), Value::Int(15)],
            vec![Value::from("UK"), Value::Int(7)],
        ]
    );
    assert_eq!(out.message, "Aggregated 3 rows into 2 groups");
}

#[test]
fn test_inner_join_on_shared_key() {
    let left = Arc::new(
        Table::from_json_rows(
            &["id", "a"],
            vec![vec![json!(1), json!("x")], vec![json!(2), json!("z")]],
        )
        .unwrap(),
    );
    let right = Arc::new(
        Table::from_json_rows(
            &["id", "b"],
            vec![vec![json!(1), json!("y")], vec![json!(3), json!("w")]],
        )
        .unwrap(),
    );
    let config = transform(
        "JOIN",
        json!({"join_type": "inner", "left_on": "id", "right_on": "id"}),
    );
    let out = transforms::apply(&config, &[left, right]).unwrap();

    assert_eq!(out.table.columns(), &["id", "a", "b"]);
    assert_eq!(
        out.table.rows(),
        &[vec![Value::Int(1), Value::from("x"), Value::from("y")]]
    );
}

#[test]
fn test_join_needs_two_inputs() {
    let config = transform(
        "JOIN",
        json!({"join_type": "left", "left_on": "id", "right_on": "id"}),
    );
    assert!(transforms::apply(&config, &[sales()]).is_err());
}

#[test]
fn test_select_rename_cast_chain_is_reversible() {
    let people = Arc::new(
        Table::from_json_rows(
            &["name", "age", "city"],
            vec![
                vec![json!("ann"), json!(36), json!("Oslo")],
                vec![json!("bob"), json!(41), json!("Rome")],
            ],
        )
        .unwrap(),
    );

    let select = transform("SELECT", json!({"columns": ["name", "age"]}));
    let rename = transform("RENAME", json!({"mapping": {"age": "years"}}));
    let to_text = transform("CAST", json!({"casts": [{"column": "years", "to": "string"}]}));

    let selected = Arc::new(transforms::apply(&select, &[people.clone()]).unwrap().table);
    let renamed = Arc::new(transforms::apply(&rename, &[selected.clone()]).unwrap().table);
    let texted = Arc::new(transforms::apply(&to_text, &[renamed]).unwrap().table);
    assert_eq!(texted.cell(1, "years"), Some(&Value::from("41")));

    let to_int = transform("CAST", json!({"casts": [{"column": "years", "to": "int"}]}));
    let back = transform("RENAME", json!({"mapping": {"years": "age"}}));
    let restored = transforms::apply(&to_int, &[texted]).unwrap().table;
    let restored = transforms::apply(&back, &[Arc::new(restored)]).unwrap().table;

    assert_eq!(&restored, selected.as_ref());
    assert_eq!(people.column_count(), 3);
}

#[test]
fn test_sort_then_drop_duplicates() {
    let sort = transform(
        "SORT",
        json!({"columns": ["amount"], "ascending": false}),
    );
    let sorted = transforms::apply(&sort, &[sales()]).unwrap().table;
    let amounts: Vec<&Value> = sorted.rows().iter().map(|row| &row[1]).collect();
    assert_eq!(amounts, vec![&Value::Int(10), &Value::Int(7), &Value::Int(5)]);

    let dedupe = transform("DROP_DUPLICATES", json!({"columns": ["country"]}));
    let unique = transforms::apply(&dedupe, &[Arc::new(sorted)]).unwrap().table;
    assert_eq!(unique.row_count(), 2);
}
