//! # costplan - structural evaluation of terraform configuration
//!
//! Prices can only be looked up for resources that are known by address. This crate reconstructs which resource
//! instances a terraform configuration declares, before anything is provisioned.
//!
//! ## Introduction for developers
//!
//! ### Terms
//!
//! - a configuration file is parsed as a `body`
//! - a body contains `attributes` (`key = value`) and `blocks`
//! - a block has a type (`resource`), 0 or more `labels` (`"aws_instance" "web"`) and a body
//! - a `module` is a directory of configuration files, a `module` block calls another module
//!
//! ### Loading files
//!
//! [config_documents::ConfigDocuments] loads the `*.tf` and `*.tf.json` files of one directory and keeps the
//! top-level blocks as [syntax::SyntaxNode]s. Native HCL is parsed with [hcl_edit] and converted into [hcl]
//! structures. JSON documents are kept as JSON, they can only be split into blocks with the static
//! [schema::TERRAFORM_SCHEMA].
//!
//! ### Block tree
//!
//! [block::Block::new] turns a node into a tree of blocks. All blocks built from one node share a
//! [context::Context], the scope used to evaluate their attributes. Scopes form a chain towards a root, a name bound
//! in a scope shadows the same name further up.
//!
//! ```hcl
//! resource "aws_instance" "web" {
//!   count         = 2
//!   instance_type = "t3.micro"
//! }
//! ```
//!
//! After [block::Block::expand] has been called with index `0` and `1` there are two instances:
//!
//! | **local name**        | **scope**                      |
//! |-----------------------|--------------------------------|
//! | `aws_instance.web[0]` | `count.index = 0`, then parent |
//! | `aws_instance.web[1]` | `count.index = 1`, then parent |
//!
//! ### Addresses
//!
//! [reference::Reference] computes the address of a block relative to its module. Blocks loaded for a module call
//! carry a [block::ModuleHandle], so [block::Block::full_name] returns `module.vpc.aws_subnet.private[0]`.
//!
//! ### Evaluation
//!
//! [evaluator::Evaluator] binds variables and locals, resolves `count` / `for_each`, follows local module calls
//! and emits one [record::ResourceRecord] per resource instance.
pub mod attribute;
pub mod block;
pub mod config_documents;
pub mod context;
pub mod evaluator;
pub mod record;
pub mod reference;
pub mod schema;
pub mod syntax;
pub mod value;
