//! configuration files of one module ([SyntaxNode]s and path to source file)
//!
//! [ConfigDocuments] tracks
//! - the module directory (if loaded from disk)
//! - the source paths
//! - the top-level block nodes
//! and defines a numeric index for each. Once added those indices are stable (removal is not possible)
//!
//! Top-level blocks are checked against [crate::schema::TERRAFORM_SCHEMA]. Unsupported blocks and root
//! attributes are logged and skipped, they never fail a load.
use crate::block::{Block, ModuleHandle};
use crate::context::Context;
use crate::schema;
use crate::syntax::SyntaxNode;
use hcl::Structure;
use std::path::{Path, PathBuf};

#[derive(Default, Debug)]
pub struct ConfigDocuments {
    directory: Option<PathBuf>,
    sources: Vec<Source>,
    nodes: Vec<(usize, SyntaxNode)>,
}

impl ConfigDocuments {
    /// Inserts and indexes a native hcl document
    pub fn insert(
        &mut self,
        document: hcl::Body,
        path: impl Into<Option<PathBuf>>,
    ) -> Result<(), LoadError> {
        let path = path.into();
        if document.iter().next().is_none() {
            return Err(LoadError::EmptyBody { path });
        }

        let mut nodes = vec![];
        for structure in document.into_iter() {
            match structure {
                Structure::Attribute(attribute) => {
                    tracing::warn!(path = ?path, attribute = %attribute.key, "ignoring root attribute");
                }
                Structure::Block(block) => {
                    match schema::validate_header(block.identifier.as_str(), block.labels.len()) {
                        Ok(()) => nodes.push(SyntaxNode::from(block)),
                        Err(diagnostic) => {
                            tracing::warn!(path = ?path, %diagnostic, "skipping block")
                        }
                    }
                }
            }
        }

        self.push(nodes, path);
        Ok(())
    }

    /// Inserts and indexes a JSON document (`*.tf.json`)
    pub fn insert_json(
        &mut self,
        document: serde_json::Map<String, serde_json::Value>,
        path: impl Into<Option<PathBuf>>,
    ) -> Result<(), LoadError> {
        let path = path.into();
        if document.is_empty() {
            return Err(LoadError::EmptyBody { path });
        }

        let nodes = match schema::partial_content(&document) {
            Ok(content) => {
                for (name, _) in content.attributes {
                    tracing::warn!(path = ?path, attribute = %name, "ignoring root attribute");
                }
                content.blocks
            }
            Err(diagnostic) => {
                tracing::warn!(path = ?path, %diagnostic, "skipping document");
                vec![]
            }
        };

        self.push(nodes, path);
        Ok(())
    }

    fn push(&mut self, nodes: Vec<SyntaxNode>, path: Source) {
        let source_index = self.sources.len();
        self.sources.push(path);
        self.nodes
            .extend(nodes.into_iter().map(|node| (source_index, node)));
    }

    pub fn get_node(&self, index: usize) -> SourceNode {
        let (source_index, node) = &self.nodes[index];
        (index, &self.sources[*source_index], node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = SourceNode> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, (source_index, node))| (index, &self.sources[*source_index], node))
    }

    /// Builds one [Block] tree per top-level node, all sharing `context`
    pub fn blocks(&self, context: &Context, module: Option<&ModuleHandle>) -> Vec<Block> {
        self.nodes
            .iter()
            .map(|(_, node)| Block::new(node.clone(), context.clone(), module.cloned()))
            .collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Directory the documents were loaded from, used to resolve local module sources
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }
}

impl ConfigDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;

        if is_json_file(&file_path) {
            let serde_json::Value::Object(document) = serde_json::from_str(&file_contents)? else {
                return Err(LoadError::JsonNotAnObject(file_path));
            };
            return self.insert_json(document, Some(file_path));
        }

        let body = hcl_edit::parser::parse_body(&file_contents)?;
        self.insert(body.into(), Some(file_path))
    }

    /// Loads all `*.tf` and `*.tf.json` files of a directory in file name order
    ///
    /// Empty files are skipped.
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let dir_path = dir_path.canonicalize()?;
        let mut file_paths = vec![];

        let read_dir = std::fs::read_dir(&dir_path)?;
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let file_path = dir_entry.path();
            if is_json_file(&file_path) || is_hcl_file(&file_path) {
                file_paths.push(file_path);
            }
        }

        if file_paths.is_empty() {
            return Err(LoadError::NoFilesFound(dir_path));
        }

        file_paths.sort();
        for file_path in file_paths {
            match self.load_file(&file_path) {
                Err(LoadError::EmptyBody { path }) => {
                    tracing::warn!(?path, "skipping empty file")
                }
                result => result?,
            }
        }

        self.directory = Some(dir_path);
        Ok(())
    }
}

fn is_hcl_file(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "tf")
}

fn is_json_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".tf.json")
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No configuration files found in {0}")]
    NoFilesFound(PathBuf),
    #[error("Empty configuration body")]
    EmptyBody { path: Source },
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
    #[error("Unable to parse json file")]
    JsonParseFailed(#[from] serde_json::Error),
    #[error("JSON configuration must be an object: {0}")]
    JsonNotAnObject(PathBuf),
}

/// Utility macro to create [ConfigDocuments]
///
/// Create from a single document
/// ```
/// # use costplan::config_documents;
/// config_documents!(r#"variable "region" {}"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use costplan::config_documents;
/// config_documents! {
///   "main.tf" => r#"resource "aws_instance" "web" {}"#,
///   "variables.tf" => r#"variable "region" {}"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid or empty input
///
/// ```should_panic
/// # use costplan::config_documents;
/// config_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! config_documents {
    // single document without source
    { $expr:expr } => {{
        let mut docs = $crate::config_documents::ConfigDocuments::default();
        docs.insert(
            hcl_edit::parser::parse_body($expr).expect("body must parse").into(),
            None,
        ).expect("body must not be empty");
        docs
    }};
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::config_documents::ConfigDocuments::default();
        $(
            docs.insert(
                hcl_edit::parser::parse_body($expr).expect("body must parse").into(),
                Some($source.into()),
            ).expect("body must not be empty");
        )+

        docs
    }};
}

pub type Source = Option<PathBuf>;
pub type SourceNode<'a> = (usize, &'a Source, &'a SyntaxNode);

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn iterators() {
        let documents = config_documents! {
            "main.tf" => r#"
            resource "aws_instance" "web" {}
            root_attribute = 1
            data "aws_ami" "ubuntu" {}
            "#,
            "variables.tf" => r#"
            variable "region" {}
            locals {}
            "#
        };

        assert_eq!(documents.source_count(), 2);
        assert_eq!(documents.nodes().count(), 4);

        let (index, source, node) = documents.get_node(2);
        assert_eq!(index, 2);
        assert_eq!(source, &Some(PathBuf::from("variables.tf")));
        assert_eq!(node.block_type, "variable");
    }

    #[test]
    fn unsupported_blocks_are_skipped() {
        let documents = config_documents!(
            r#"
            moved {}
            resource "aws_instance" {}
            module "vpc" {}
            "#
        );

        let types: Vec<_> = documents
            .nodes()
            .map(|(_, _, node)| node.block_type.as_str())
            .collect();
        assert_eq!(types, vec!["module"]);
    }

    #[test]
    fn empty_body_is_fatal() {
        let mut documents = ConfigDocuments::default();
        let result = documents.insert(hcl::Body::default(), PathBuf::from("empty.tf"));
        assert!(matches!(result, Err(LoadError::EmptyBody { path: Some(_) })));

        let result = documents.insert_json(Default::default(), None);
        assert!(matches!(result, Err(LoadError::EmptyBody { path: None })));
        assert_eq!(documents.source_count(), 0);
    }

    #[test]
    fn json_documents() {
        let mut documents = ConfigDocuments::default();
        let serde_json::Value::Object(document) = serde_json::json!({
            "resource": { "aws_instance": { "web": { "ami": "ami-123" } } },
            "variable": { "region": { "default": "eu-west-1" } }
        }) else {
            unreachable!()
        };
        documents.insert_json(document, None).unwrap();

        let blocks = documents.blocks(&Context::new(), None);
        let names: Vec<_> = blocks.iter().map(Block::local_name).collect();
        assert_eq!(names, vec!["aws_instance.web", "variable.region"]);
        assert!(blocks[0].syntax().body.is_json());
        assert!(blocks[0].context().ptr_eq(blocks[1].context()));
    }
}
