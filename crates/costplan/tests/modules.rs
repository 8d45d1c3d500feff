//! Evaluation of module directories on disk
//!
//! Fixtures live in /tests/fixtures/, one directory per root module.

use costplan::evaluator::{EvalError, Evaluator, EvaluatorOptions};
use costplan::record::ResourceRecord;
use costplan::value::Value;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn addresses(records: &[ResourceRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.address.as_str())
        .collect()
}

#[test]
fn local_modules_are_addressed_per_instance() {
    let records = Evaluator::default()
        .evaluate_directory(&fixture("modules"))
        .expect("must evaluate");

    assert_eq!(
        addresses(&records),
        vec![
            "module.web[0].aws_instance.this",
            "module.web[0].module.disk.aws_ebs_volume.this",
            "module.web[1].aws_instance.this",
            "module.web[1].module.disk.aws_ebs_volume.this",
            "aws_eip.ip",
        ]
    );

    let web = &records[2];
    assert_eq!(web.name, "this");
    assert_eq!(
        web.attributes.get("instance_type"),
        Some(&Value::from("t3.small"))
    );
    assert_eq!(
        web.attributes.get("tags"),
        Some(&Value::Object(
            [("Name".to_string(), Value::from("web-prod-1"))]
                .into_iter()
                .collect()
        ))
    );

    let disk = &records[1];
    assert_eq!(disk.attributes.get("size"), Some(&Value::Integer(50)));
}

#[test]
fn module_outputs_are_referenceable() {
    let records = Evaluator::default()
        .evaluate_directory(&fixture("modules"))
        .expect("must evaluate");

    let eip = records.last().expect("eip record");
    assert_eq!(
        eip.attributes.get("instance_type"),
        Some(&Value::from("t3.small"))
    );
}

#[test]
fn root_inputs_reach_modules() {
    let options = EvaluatorOptions::new().with_input("env", "staging");
    let records = Evaluator::new(options)
        .evaluate_directory(&fixture("modules"))
        .expect("must evaluate");

    assert_eq!(
        records[0].attributes.get("tags"),
        Some(&Value::Object(
            [("Name".to_string(), Value::from("web-staging-0"))]
                .into_iter()
                .collect()
        ))
    );
}

#[test]
fn recursive_modules_are_bounded() {
    let mut options = EvaluatorOptions::new();
    options.max_module_depth = 3;

    let result = Evaluator::new(options).evaluate_directory(&fixture("recursive"));
    match result {
        Err(EvalError::ModuleDepthExceeded { address, max }) => {
            assert_eq!(max, 3);
            assert_eq!(address, "module.again.module.again.module.again.module.again");
        }
        other => panic!("expected depth error, got {other:?}"),
    }
}

#[test]
fn json_configuration() {
    let records = Evaluator::default()
        .evaluate_directory(&fixture("json"))
        .expect("empty files are skipped");

    assert_eq!(
        addresses(&records),
        vec!["aws_instance.web[0]", "aws_instance.web[1]"]
    );
    assert_eq!(
        serde_json::to_string(&records[0].attributes).unwrap(),
        r#"{"instance_type":"t3.micro","ebs_block_device":[{"volume_size":10},{"volume_size":20}]}"#
    );
}

#[test]
fn missing_directory() {
    let result = Evaluator::default().evaluate_directory(&fixture("does-not-exist"));
    assert!(matches!(result, Err(EvalError::Load(_))));
}

#[test]
fn locals_see_module_outputs() {
    let records = Evaluator::default()
        .evaluate_directory(&fixture("module_locals"))
        .expect("must evaluate");

    assert_eq!(addresses(&records), vec!["aws_instance.web"]);
    let attributes = &records[0].attributes;
    assert_eq!(attributes.get("instance_type"), Some(&Value::from("t3.large")));
    assert_eq!(attributes.get("name"), Some(&Value::from("web-t3.large")));
    assert_eq!(attributes.get("direct"), Some(&Value::from("t3.large")));
}
