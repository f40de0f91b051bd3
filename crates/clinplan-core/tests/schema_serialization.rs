use clinplan_core::{CellValue, DatasetSchema, Table, Variable, VariableKind, infer_schema};

#[test]
fn serializes_schema_deterministically() {
    let schema = DatasetSchema::new(
        "TCGA_COAD",
        [
            Variable::new("OS_STATUS", VariableKind::Event).with_observed_values(["1", "0"]),
            Variable::new("OS_MONTHS", VariableKind::Time),
        ],
    );

    let json = serde_json::to_string_pretty(&schema).expect("serialize schema");
    let expected = r#"{
  "name": "TCGA_COAD",
  "variables": {
    "OS_MONTHS": {
      "name": "OS_MONTHS",
      "kind": "time",
      "high_cardinality": false
    },
    "OS_STATUS": {
      "name": "OS_STATUS",
      "kind": "event",
      "observed_values": [
        "0",
        "1"
      ],
      "high_cardinality": false
    }
  }
}"#;
    assert_eq!(json, expected);
}

#[test]
fn inferred_schema_round_trips_through_json() {
    let table = Table::new(
        vec!["TP53_Mutation".to_string(), "OS_MONTHS".to_string()],
        vec![
            vec![CellValue::Number(1.0), CellValue::Number(14.0)],
            vec![CellValue::Number(0.0), CellValue::Missing],
        ],
    )
    .expect("valid table");
    let schema = infer_schema("demo", &table).expect("infer schema");

    let json = serde_json::to_value(&schema).expect("serialize schema");
    let parsed: DatasetSchema = serde_json::from_value(json).expect("parse schema");
    assert_eq!(parsed, schema);
    assert_eq!(parsed.kind("TP53_Mutation"), Some(VariableKind::Continuous));
}
