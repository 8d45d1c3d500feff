//! Snapshot tests
//!
//! Loads each *.hcl file in /tests/ individually and compares if the
//! evaluated resource records change.

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("COSTPLAN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("*.hcl", |path| {
        let mut documents = costplan::config_documents::ConfigDocuments::default();
        let reader = std::fs::read_to_string(path).unwrap();
        documents
            .insert(
                hcl_edit::parser::parse_body(&reader).unwrap().into(),
                Some(path.to_owned()),
            )
            .expect("must not be empty");

        let records = costplan::evaluator::Evaluator::default()
            .evaluate(&documents)
            .expect("must evaluate");

        insta::assert_json_snapshot!(records);
    });
}
