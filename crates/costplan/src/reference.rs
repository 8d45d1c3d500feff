//! canonical block addresses
//!
//! Terraform addresses resources by `<resource type>.<name>` while every other block keeps its block type as the
//! first segment (`module.vpc`, `data.aws_ami.ubuntu`, `var.region`...).
//!
//! | **block**                          | **address**             |
//! |------------------------------------|-------------------------|
//! | `resource "aws_instance" "web" {}` | `aws_instance.web`      |
//! | `data "aws_ami" "ubuntu" {}`       | `data.aws_ami.ubuntu`   |
//! | `module "vpc" {}`                  | `module.vpc`            |
//! | `locals {}`                        | `locals`                |
use std::fmt::{Display, Formatter};

pub const SEPARATOR: &str = ".";

const RESOURCE: &str = "resource";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    parts: Vec<String>,
}

impl Reference {
    pub fn new<S: AsRef<str>>(block_type: &str, labels: &[S]) -> Self {
        // a resource without labels would have an empty address, keep the type instead
        let keep_type = !block_type.is_empty() && (block_type != RESOURCE || labels.is_empty());

        let parts = keep_type
            .then(|| block_type.to_string())
            .into_iter()
            .chain(labels.iter().map(|label| label.as_ref().to_string()))
            .collect();

        Self { parts }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.parts.join(SEPARATOR))
    }
}
