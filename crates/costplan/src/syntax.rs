//! syntax nodes handed to the block tree
//!
//! A [SyntaxNode] is a block header (type and labels) plus a body. Native HCL bodies expose nested blocks and
//! attributes directly. JSON bodies can only be decomposed with the help of [crate::schema].
use crate::schema::{self, Diagnostic};

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub block_type: String,
    pub labels: Vec<String>,
    pub body: NodeBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    /// structure is exposed directly
    Native(hcl::Body),
    /// structure requires schema extraction
    Json(serde_json::Map<String, serde_json::Value>),
}

impl NodeBody {
    pub fn is_json(&self) -> bool {
        matches!(self, NodeBody::Json(_))
    }
}

impl SyntaxNode {
    pub fn new(block_type: impl Into<String>, labels: Vec<String>, body: NodeBody) -> Self {
        Self {
            block_type: block_type.into(),
            labels,
            body,
        }
    }

    /// Nested block nodes
    pub fn nested(&self) -> Result<Vec<SyntaxNode>, Diagnostic> {
        match &self.body {
            NodeBody::Native(body) => Ok(body.blocks().cloned().map(SyntaxNode::from).collect()),
            NodeBody::Json(body) => schema::partial_content(body).map(|content| content.blocks),
        }
    }

    /// Attribute expressions in declaration order
    pub fn attributes(&self) -> Result<Vec<(String, hcl::Expression)>, Diagnostic> {
        match &self.body {
            NodeBody::Native(body) => Ok(body
                .attributes()
                .map(|attribute| (attribute.key.to_string(), attribute.expr.clone()))
                .collect()),
            NodeBody::Json(body) => {
                schema::partial_content(body).map(|content| content.attributes)
            }
        }
    }
}

impl From<hcl::Block> for SyntaxNode {
    fn from(block: hcl::Block) -> Self {
        let labels = block
            .labels
            .iter()
            .map(|label| label.as_str().to_string())
            .collect();

        Self::new(block.identifier.to_string(), labels, NodeBody::Native(block.body))
    }
}

/// Converts a JSON value to an expression
///
/// Strings containing an interpolation sequence are kept as templates so they can be evaluated later.
pub fn json_to_expression(value: &serde_json::Value) -> hcl::Expression {
    use hcl::Expression;

    match value {
        serde_json::Value::Null => Expression::Null,
        serde_json::Value::Bool(bool) => Expression::Bool(*bool),
        serde_json::Value::Number(number) => json_number(number)
            .map(Expression::Number)
            .unwrap_or(Expression::Null),
        serde_json::Value::String(string) if string.contains("${") => Expression::TemplateExpr(
            Box::new(hcl::TemplateExpr::QuotedString(string.clone())),
        ),
        serde_json::Value::String(string) => Expression::String(string.clone()),
        serde_json::Value::Array(array) => {
            Expression::Array(array.iter().map(json_to_expression).collect())
        }
        serde_json::Value::Object(object) => Expression::Object(
            object
                .iter()
                .map(|(key, value)| {
                    (
                        hcl::ObjectKey::Expression(Expression::String(key.clone())),
                        json_to_expression(value),
                    )
                })
                .collect(),
        ),
    }
}

fn json_number(number: &serde_json::Number) -> Option<hcl::Number> {
    if let Some(int) = number.as_i64() {
        return Some(int.into());
    }
    if let Some(uint) = number.as_u64() {
        return Some(uint.into());
    }
    number.as_f64().and_then(hcl::Number::from_f64)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn native_block_header() {
        let block = hcl::parse(r#"resource "aws_instance" "web" { ami = "ami-123" }"#)
            .unwrap()
            .into_blocks()
            .next()
            .unwrap();

        let node = SyntaxNode::from(block);
        assert_eq!(node.block_type, "resource");
        assert_eq!(node.labels, vec!["aws_instance", "web"]);
        assert_eq!(node.attributes().unwrap()[0].0, "ami");
    }

    #[test]
    fn json_strings_with_interpolation_become_templates() {
        let expr = json_to_expression(&serde_json::json!("${var.region}-web"));
        assert!(matches!(expr, hcl::Expression::TemplateExpr(_)));

        let expr = json_to_expression(&serde_json::json!("plain"));
        assert_eq!(expr, hcl::Expression::String("plain".to_string()));

        let expr = json_to_expression(&serde_json::json!(2));
        assert_eq!(expr, hcl::Expression::Number(2.into()));
    }
}
