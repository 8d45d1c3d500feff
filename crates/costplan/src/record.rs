//! resource records handed to pricing
use crate::block::Block;
use crate::value::Value;

/// Block attributes that steer evaluation and are not part of the resource itself
pub const META_ARGUMENTS: &[&str] = &["count", "for_each", "provider", "depends_on", "lifecycle"];

/// One resource instance keyed by its module-qualified address
///
/// The address is final once a record is created.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResourceRecord {
    pub address: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub attributes: indexmap::IndexMap<String, Value>,
}

impl ResourceRecord {
    pub fn from_block(block: &Block) -> Self {
        let mut attributes = block_values(block);
        for meta_argument in META_ARGUMENTS {
            attributes.shift_remove(*meta_argument);
        }

        Self {
            address: block.full_name(),
            resource_type: block.type_label().to_string(),
            name: block.name_label().to_string(),
            attributes,
        }
    }
}

/// Attribute values plus nested blocks, grouped by block type into arrays
fn block_values(block: &Block) -> indexmap::IndexMap<String, Value> {
    let mut values: indexmap::IndexMap<String, Value> = block
        .attributes_by_name()
        .into_iter()
        .map(|(name, attribute)| (name, attribute.value().into()))
        .collect();

    for child in block.children() {
        let nested = Value::Object(block_values(child));
        match values
            .entry(child.block_type().to_string())
            .or_insert_with(|| Value::Array(vec![]))
        {
            Value::Array(group) => group.push(nested),
            other => *other = Value::Array(vec![nested]),
        }
    }

    values
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_from_block() {
        let node = hcl::parse(
            r#"
            resource "aws_instance" "web" {
              count         = 2
              instance_type = "t3.micro"
              ebs_block_device {
                volume_size = 10
              }
              ebs_block_device {
                volume_size = 20
              }
            }
            "#,
        )
        .unwrap()
        .into_blocks()
        .next()
        .unwrap();
        let mut block = Block::new(node.into(), None, None);
        let instance = block.expand(1u64.into());

        let record = ResourceRecord::from_block(&instance);
        assert_eq!(record.address, "aws_instance.web[1]");
        assert_eq!(record.resource_type, "aws_instance");
        assert_eq!(record.name, "web[1]");

        let json = serde_json::to_string(&record.attributes).unwrap();
        assert_eq!(
            json,
            r#"{"instance_type":"t3.micro","ebs_block_device":[{"volume_size":10},{"volume_size":20}]}"#
        );
    }
}
