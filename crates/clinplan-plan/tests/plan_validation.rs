use clinplan_core::{DatasetSchema, Variable, VariableKind};
use clinplan_plan::{
    AnalysisMode, ConditionValue, MatchConfidence, Operator, Scalar, ValidationError,
    check_plan, parse_condition, plan_json_schema_value, resolve, validate, validate_plan_json,
    verify,
};
use serde_json::json;
use std::fs;
use std::path::Path;

fn load_json(path: &Path) -> serde_json::Value {
    let contents =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("missing json at {}", path.display()));
    serde_json::from_str(&contents).expect("parse json")
}

fn tcga_schema() -> DatasetSchema {
    DatasetSchema::new(
        "TCGA_COAD",
        [
            Variable::new("TP53_Mutation", VariableKind::Categorical),
            Variable::new("OS_MONTHS", VariableKind::Continuous),
            Variable::new("OS_STATUS", VariableKind::Event),
        ],
    )
}

fn staged_schema() -> DatasetSchema {
    DatasetSchema::new(
        "TCGA_COAD",
        [
            Variable::new("TP53_Mutation", VariableKind::Categorical)
                .with_observed_values(["Mutated", "Wild Type"]),
            Variable::new("TUMOR_STAGE", VariableKind::Categorical).with_observed_values([
                "Stage I", "Stage II", "Stage III", "Stage IV",
            ]),
            Variable::new("AGE", VariableKind::Continuous),
            Variable::new("OS_MONTHS", VariableKind::Continuous),
            Variable::new("OS_STATUS", VariableKind::Event),
        ],
    )
}

#[test]
fn survival_typo_in_grouping_is_repaired_and_accepted() {
    let schema = tcga_schema();
    let plan = verify(
        &json!({"mode": "survival", "grouping_variable": "TP53_Mutaton"}),
        &schema,
    )
    .expect("verify plan");

    assert_eq!(plan.grouping_variable.as_deref(), Some("TP53_Mutation"));
    validate(&plan, &schema).expect("validator accepts repaired plan");
}

#[test]
fn case_control_hallucinated_target_is_rejected() {
    let schema = tcga_schema();
    let plan = verify(
        &json!({"mode": "case_control", "target_variable": "BRAF_status"}),
        &schema,
    )
    .expect("verify plan");

    let err = validate(&plan, &schema).expect_err("validator rejects unknown target");
    match &err {
        ValidationError::UnknownColumn {
            field,
            value,
            available,
        } => {
            assert_eq!(field, "target_variable");
            assert_eq!(value, "BRAF_status");
            let mut expected = vec!["TP53_Mutation", "OS_MONTHS", "OS_STATUS"];
            expected.sort();
            assert_eq!(available, &expected);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("BRAF_status"));
}

#[test]
fn exact_matches_keep_canonical_casing() {
    let schema = tcga_schema();
    for claimed in ["os_months", "OS_Months", "OS_MONTHS"] {
        for strict in [true, false] {
            let result = resolve(claimed, &schema, strict);
            assert_eq!(result.confidence, MatchConfidence::Exact);
            assert_eq!(result.resolved, "OS_MONTHS");
        }
    }
}

#[test]
fn every_unsupported_mode_is_rejected() {
    let schema = tcga_schema();
    for mode in ["regression", "cox", "kaplan", "anova"] {
        let plan = verify(
            &json!({"mode": mode, "target_variable": "TP53_Mutation"}),
            &schema,
        )
        .expect("verify plan");
        assert!(matches!(plan.mode, AnalysisMode::Unsupported(_)));
        assert!(matches!(
            validate(&plan, &schema),
            Err(ValidationError::UnsupportedMode { .. })
        ));
    }
}

#[test]
fn disjunction_and_set_form_agree_with_schema_mapping() {
    let schema = staged_schema();
    let disjunction = parse_condition(
        "TUMOR_STAGE is 'stage iii' or TUMOR_STAGE is 'Stage IV'",
        Some(&schema),
    )
    .expect("no ambiguity")
    .expect("parsed");
    let set = parse_condition("TUMOR_STAGE is in {Stage III, stage iv}", Some(&schema))
        .expect("no ambiguity")
        .expect("parsed");
    assert_eq!(disjunction, set);
    assert_eq!(
        set.value,
        ConditionValue::Set(vec![
            Scalar::Text("Stage III".to_string()),
            Scalar::Text("Stage IV".to_string()),
        ])
    );
}

#[test]
fn fixture_plan_checks_end_to_end() {
    let plan_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/late_stage.plan.json");
    let candidate = load_json(&plan_path);

    let checked = check_plan(&candidate, &staged_schema()).expect("plan accepted");
    assert!(checked.warnings.is_empty());
    let plan = checked.plan.plan();
    assert_eq!(plan.mode, AnalysisMode::CaseControl);
    assert_eq!(plan.target_variable.as_deref(), Some("TP53_Mutation"));

    let case = plan.case_condition.as_ref().expect("case condition");
    assert_eq!(case.operator, Operator::In);
    assert_eq!(case.to_string(), "TUMOR_STAGE in {Stage III, Stage IV}");

    let filter = &plan.filters[0];
    assert_eq!(filter.operator, Operator::Gt);
    assert_eq!(filter.value, ConditionValue::Scalar(Scalar::Number(40.0)));
}

#[test]
fn canonical_plans_satisfy_the_plan_json_schema() {
    let plan_schema = plan_json_schema_value().expect("plan schema");
    let plan = verify(
        &json!({
            "mode": "survival",
            "group_by": "TP53_Mutation",
            "filters": ["AGE greater than 60", "TUMOR_STAGE is in {Stage III, Stage IV}"],
        }),
        &staged_schema(),
    )
    .expect("verify plan");
    let plan_json = serde_json::to_value(&plan).expect("serialize plan");

    let report = validate_plan_json(&plan_json, &plan_schema).expect("compile plan schema");
    assert!(report.is_ok(), "structural errors: {:?}", report.errors);

    let broken = json!({"mode": 3, "filters": "AGE > 1"});
    let report = validate_plan_json(&broken, &plan_schema).expect("compile plan schema");
    assert!(!report.is_ok());
}
