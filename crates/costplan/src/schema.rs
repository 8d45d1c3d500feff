//! recognized top-level block types
//!
//! JSON configuration does not tell blocks and attributes apart. A key only becomes a block when it is listed in
//! [TERRAFORM_SCHEMA], and the number of label names tells how many object levels have to be unwrapped before the
//! block body is reached:
//!
//! ```json
//! { "resource": { "aws_instance": { "web": { "ami": "ami-123" } } } }
//! ```
//!
//! is the same as `resource "aws_instance" "web" { ami = "ami-123" }`.
use crate::syntax::{self, NodeBody, SyntaxNode};

#[derive(Debug)]
pub struct BlockHeaderSchema {
    pub block_type: &'static str,
    pub label_names: &'static [&'static str],
}

pub static TERRAFORM_SCHEMA: &[BlockHeaderSchema] = &[
    BlockHeaderSchema {
        block_type: "terraform",
        label_names: &[],
    },
    BlockHeaderSchema {
        block_type: "provider",
        label_names: &["name"],
    },
    BlockHeaderSchema {
        block_type: "variable",
        label_names: &["name"],
    },
    BlockHeaderSchema {
        block_type: "locals",
        label_names: &[],
    },
    BlockHeaderSchema {
        block_type: "output",
        label_names: &["name"],
    },
    BlockHeaderSchema {
        block_type: "module",
        label_names: &["name"],
    },
    BlockHeaderSchema {
        block_type: "resource",
        label_names: &["type", "name"],
    },
    BlockHeaderSchema {
        block_type: "data",
        label_names: &["type", "name"],
    },
];

pub fn lookup(block_type: &str) -> Option<&'static BlockHeaderSchema> {
    TERRAFORM_SCHEMA
        .iter()
        .find(|schema| schema.block_type == block_type)
}

/// Checks a block header against [TERRAFORM_SCHEMA]
pub fn validate_header(block_type: &str, label_count: usize) -> Result<(), Diagnostic> {
    let schema = lookup(block_type).ok_or_else(|| Diagnostic::UnknownBlockType {
        block_type: block_type.to_string(),
    })?;

    if schema.label_names.len() != label_count {
        return Err(Diagnostic::LabelCount {
            block_type: block_type.to_string(),
            expected: schema.label_names.len(),
            found: label_count,
        });
    }

    Ok(())
}

/// Content of a JSON body split by [TERRAFORM_SCHEMA]
#[derive(Debug, Default)]
pub struct PartialContent {
    pub blocks: Vec<SyntaxNode>,
    /// everything that is not a schema block
    pub attributes: Vec<(String, hcl::Expression)>,
}

pub fn partial_content(
    body: &serde_json::Map<String, serde_json::Value>,
) -> Result<PartialContent, Diagnostic> {
    let mut content = PartialContent::default();

    for (key, value) in body {
        // comments
        if key == "//" {
            continue;
        }

        match lookup(key) {
            // `provider = "aws.west"` inside a resource is an attribute
            Some(schema) if value.is_object() || value.is_array() => {
                collect_blocks(schema, schema.label_names, value, vec![], &mut content.blocks)?
            }
            _ => content
                .attributes
                .push((key.clone(), syntax::json_to_expression(value))),
        }
    }

    Ok(content)
}

fn collect_blocks(
    schema: &BlockHeaderSchema,
    remaining_labels: &[&str],
    value: &serde_json::Value,
    labels: Vec<String>,
    blocks: &mut Vec<SyntaxNode>,
) -> Result<(), Diagnostic> {
    let Some((label_name, remaining_labels)) = remaining_labels.split_first() else {
        return collect_bodies(schema, value, labels, blocks);
    };

    let serde_json::Value::Object(object) = value else {
        return Err(Diagnostic::ExpectedLabelObject {
            block_type: schema.block_type.to_string(),
            label: label_name.to_string(),
        });
    };

    for (label, nested) in object {
        let mut labels = labels.clone();
        labels.push(label.clone());
        collect_blocks(schema, remaining_labels, nested, labels, blocks)?;
    }

    Ok(())
}

fn collect_bodies(
    schema: &BlockHeaderSchema,
    value: &serde_json::Value,
    labels: Vec<String>,
    blocks: &mut Vec<SyntaxNode>,
) -> Result<(), Diagnostic> {
    let invalid_body = || Diagnostic::ExpectedBody {
        block_type: schema.block_type.to_string(),
    };

    match value {
        serde_json::Value::Object(body) => {
            blocks.push(SyntaxNode::new(
                schema.block_type,
                labels,
                NodeBody::Json(body.clone()),
            ));
        }
        serde_json::Value::Array(bodies) => {
            for body in bodies {
                let serde_json::Value::Object(body) = body else {
                    return Err(invalid_body());
                };
                blocks.push(SyntaxNode::new(
                    schema.block_type,
                    labels.clone(),
                    NodeBody::Json(body.clone()),
                ));
            }
        }
        _ => return Err(invalid_body()),
    }

    Ok(())
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Diagnostic {
    #[error("unsupported block type `{block_type}`")]
    UnknownBlockType { block_type: String },
    #[error("block `{block_type}` expects {expected} label(s), found {found}")]
    LabelCount {
        block_type: String,
        expected: usize,
        found: usize,
    },
    #[error("block `{block_type}` expects an object for its `{label}` label")]
    ExpectedLabelObject { block_type: String, label: String },
    #[error("body of block `{block_type}` must be an object or an array of objects")]
    ExpectedBody { block_type: String },
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn json_object(text: &str) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_str(text).expect("valid json object")
    }

    #[test]
    fn splits_blocks_and_attributes() {
        let content = partial_content(&json_object(
            r#"{
                "//": "ignored",
                "resource": {
                    "aws_instance": {
                        "web": { "ami": "ami-123" },
                        "db": [{ "ami": "ami-456" }]
                    }
                },
                "locals": { "region": "eu-west-1" },
                "instance_type": "t3.micro"
            }"#,
        ))
        .unwrap();

        let headers: Vec<_> = content
            .blocks
            .iter()
            .map(|node| (node.block_type.as_str(), node.labels.clone()))
            .collect();
        assert_eq!(
            headers,
            vec![
                ("resource", vec!["aws_instance".to_string(), "web".to_string()]),
                ("resource", vec!["aws_instance".to_string(), "db".to_string()]),
                ("locals", vec![]),
            ]
        );

        assert_eq!(content.attributes.len(), 1);
        assert_eq!(content.attributes[0].0, "instance_type");
    }

    #[test]
    fn label_level_must_be_object() {
        let diagnostic = partial_content(&json_object(r#"{ "resource": { "aws_instance": 1 } }"#))
            .expect_err("must fail");
        assert_eq!(
            diagnostic,
            Diagnostic::ExpectedLabelObject {
                block_type: "resource".to_string(),
                label: "name".to_string(),
            }
        );
    }

    #[test]
    fn body_must_be_object() {
        let diagnostic = partial_content(&json_object(r#"{ "locals": [1] }"#)).expect_err("must fail");
        assert_eq!(
            diagnostic,
            Diagnostic::ExpectedBody {
                block_type: "locals".to_string()
            }
        );
    }

    #[test]
    fn scalar_values_are_attributes() {
        let content = partial_content(&json_object(
            r#"{ "provider": "aws.west", "instance_type": "t3.micro" }"#,
        ))
        .unwrap();

        assert!(content.blocks.is_empty());
        assert_eq!(content.attributes.len(), 2);
        assert_eq!(content.attributes[0].0, "provider");
    }

    #[test]
    fn header_validation() {
        assert!(validate_header("resource", 2).is_ok());
        assert!(validate_header("locals", 0).is_ok());
        assert_eq!(
            validate_header("module", 2),
            Err(Diagnostic::LabelCount {
                block_type: "module".to_string(),
                expected: 1,
                found: 2
            })
        );
        assert!(matches!(
            validate_header("moved", 0),
            Err(Diagnostic::UnknownBlockType { .. })
        ));
    }
}
