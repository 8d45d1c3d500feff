//! structural block tree
//!
//! A [Block] wraps one [SyntaxNode] and owns the blocks nested inside of it. Blocks built from the same node share
//! one [Context] handle, so everything declared at one nesting level resolves names in the same scope.
//!
//! ### Repetition
//!
//! `count` and `for_each` turn one declaration into many instances. The evaluator resolves the meta-argument and
//! calls [Block::expand] once per instance key. Every call rebuilds the subtree from the syntax node under a new
//! child scope and rewrites the last label:
//!
//! | **key**                    | **address**               | **`count.index`** |
//! |----------------------------|---------------------------|-------------------|
//! | `InstanceKey::Index(1)`    | `aws_instance.web[1]`     | `1`               |
//! | `InstanceKey::Key("blue")` | `aws_instance.web["blue"]`| `null`            |
//! | `InstanceKey::Unknown`     | `aws_instance.web[C]`     | `C`               |
//!
//! where `C` is the number of previous [Block::expand] calls on the same block. Mixing the fallback with resolved
//! keys on the same block can produce colliding addresses (`Unknown` followed by `Index(0)` yields `[0]` twice),
//! so callers should only fall back when no instance key is known at all.
//!
//! Keys escape `"` and `\` with a backslash, use the short escapes (`\n`, `\t`, ...) where one exists and
//! `\xNN` / `\uNNNN` for any other control character.
use crate::attribute::Attribute;
use crate::context::Context;
use crate::reference::{Reference, SEPARATOR};
use crate::syntax::SyntaxNode;
use std::rc::Rc;

#[derive(Debug)]
pub struct Block {
    node: SyntaxNode,
    context: Context,
    module: Option<ModuleHandle>,
    expanded: bool,
    clone_index: usize,
    children: Vec<Block>,
}

impl Block {
    /// Builds the block and all nested blocks
    ///
    /// A fresh root [Context] is used if none is given. Nested content that cannot be decomposed is logged and
    /// skipped, the block is still built.
    pub fn new(
        node: SyntaxNode,
        context: impl Into<Option<Context>>,
        module: Option<ModuleHandle>,
    ) -> Self {
        let context = context.into().unwrap_or_default();

        let children = match node.nested() {
            Ok(nested) => nested
                .into_iter()
                .map(|child| Block::new(child, context.clone(), module.clone()))
                .collect(),
            Err(diagnostic) => {
                tracing::debug!(
                    block_type = %node.block_type,
                    labels = ?node.labels,
                    %diagnostic,
                    "unable to load nested content"
                );
                vec![]
            }
        };

        Self {
            node,
            context,
            module,
            expanded: false,
            clone_index: 0,
            children,
        }
    }

    /// Creates one instance of a repeated block
    pub fn expand(&mut self, key: InstanceKey) -> Block {
        let context = self.context.new_child();

        let mut node = self.node.clone();
        if let Some(last) = node.labels.last_mut() {
            *last = match &key {
                InstanceKey::Index(index) => format!("{last}[{}]", truncate(index)),
                InstanceKey::Key(key) => format!("{last}[{}]", quote(key)),
                InstanceKey::Unknown => format!("{last}[{}]", self.clone_index),
            };
        }

        let mut instance = Block::new(node, context, self.module.clone());
        instance
            .context
            .set_by_path(key.numeric(self.clone_index), "count.index");
        instance.expanded = true;
        self.clone_index += 1;

        tracing::trace!(address = %instance.full_name(), "expanded block");
        instance
    }

    /// Adds a synthetic child block named `name`
    ///
    /// The values of its attributes are published at `<reference>.<name>.<attribute>` in the root scope so they
    /// can be referenced like declared content.
    pub fn inject(&mut self, mut block: Block, name: &str) {
        block.node.labels.clear();
        block.node.block_type = name.to_string();

        let root = self.context.root();
        let owner = self.reference();
        for attribute in block.attributes() {
            let path = format!("{owner}{SEPARATOR}{name}{SEPARATOR}{}", attribute.name());
            root.set_by_path(attribute.value(), &path);
        }

        self.children.push(block);
    }

    /// Replaces the scope of this block and gives every descendant a fresh child scope of it
    pub fn override_context(&mut self, context: Context) {
        for child in &mut self.children {
            child.override_context(context.new_child());
        }
        self.context = context;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn syntax(&self) -> &SyntaxNode {
        &self.node
    }

    pub fn block_type(&self) -> &str {
        &self.node.block_type
    }

    pub fn labels(&self) -> &[String] {
        &self.node.labels
    }

    /// Labels joined by the address separator
    pub fn label(&self) -> String {
        self.node.labels.join(SEPARATOR)
    }

    /// First label (e.g. the resource type), empty if absent
    pub fn type_label(&self) -> &str {
        self.node.labels.first().map(String::as_str).unwrap_or("")
    }

    /// Second label (e.g. the resource name), empty if absent
    pub fn name_label(&self) -> &str {
        self.node.labels.get(1).map(String::as_str).unwrap_or("")
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn module(&self) -> Option<&ModuleHandle> {
        self.module.as_ref()
    }

    pub fn has_module(&self) -> bool {
        self.module.is_some()
    }

    pub fn children(&self) -> &[Block] {
        &self.children
    }

    pub fn children_of_type<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a Block> {
        self.children
            .iter()
            .filter(move |child| child.block_type() == block_type)
    }

    /// First nested block of the given type
    pub fn child_of_type(&self, block_type: &str) -> Option<&Block> {
        self.children
            .iter()
            .find(|child| child.block_type() == block_type)
    }

    /// Attributes in declaration order
    ///
    /// Always derived from the syntax node, nothing is cached.
    pub fn attributes(&self) -> Vec<Attribute> {
        match self.node.attributes() {
            Ok(attributes) => attributes
                .into_iter()
                .map(|(name, expr)| Attribute::new(name, expr, self.context.clone()))
                .collect(),
            Err(diagnostic) => {
                tracing::debug!(address = %self.local_name(), %diagnostic, "unable to load attributes");
                vec![]
            }
        }
    }

    /// First attribute named `name`
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes()
            .into_iter()
            .find(|attribute| attribute.name() == name)
    }

    /// Attributes by name, the last declaration wins
    pub fn attributes_by_name(&self) -> indexmap::IndexMap<String, Attribute> {
        self.attributes()
            .into_iter()
            .map(|attribute| (attribute.name().to_string(), attribute))
            .collect()
    }

    /// All attribute values as one object
    pub fn as_value(&self) -> hcl::Value {
        hcl::Value::Object(
            self.attributes()
                .into_iter()
                .map(|attribute| (attribute.name().to_string(), attribute.value()))
                .collect(),
        )
    }

    /// `true` if there is an attribute or a nested block called `name`
    pub fn has_child(&self, name: &str) -> bool {
        self.attribute(name).is_some() || self.child_of_type(name).is_some()
    }

    pub fn reference(&self) -> Reference {
        Reference::new(&self.node.block_type, &self.node.labels)
    }

    /// Address relative to the enclosing module
    pub fn local_name(&self) -> String {
        self.reference().to_string()
    }

    /// Address prefixed by every enclosing module call
    pub fn full_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{}{SEPARATOR}{}", module.full_name(), self.local_name()),
            None => self.local_name(),
        }
    }

    /// Handle for blocks that are loaded from the module this block calls
    pub fn module_handle(&self) -> ModuleHandle {
        ModuleHandle(Rc::new(ModuleCall {
            reference: self.reference(),
            owner: self.module.clone(),
        }))
    }
}

/// Address of a module call, shared by all blocks loaded for it
///
/// This is a snapshot taken by [Block::module_handle]: it does not keep the module block alive and does not follow
/// later label changes of it.
#[derive(Debug, Clone)]
pub struct ModuleHandle(Rc<ModuleCall>);

#[derive(Debug)]
struct ModuleCall {
    reference: Reference,
    owner: Option<ModuleHandle>,
}

impl ModuleHandle {
    pub fn reference(&self) -> &Reference {
        &self.0.reference
    }

    pub fn owner(&self) -> Option<&ModuleHandle> {
        self.0.owner.as_ref()
    }

    pub fn full_name(&self) -> String {
        match &self.0.owner {
            Some(owner) => format!("{}{SEPARATOR}{}", owner.full_name(), self.0.reference),
            None => self.0.reference.to_string(),
        }
    }
}

/// Key of one repetition instance
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceKey {
    /// `count` index
    Index(hcl::Number),
    /// `for_each` key
    Key(String),
    /// not resolved (yet)
    Unknown,
}

impl InstanceKey {
    /// Value bound to `count.index`
    fn numeric(&self, fallback: usize) -> hcl::Value {
        match self {
            InstanceKey::Index(index) => hcl::Value::Number(index.clone()),
            InstanceKey::Key(key) => key
                .parse::<f64>()
                .ok()
                .and_then(hcl::Number::from_f64)
                .map(hcl::Value::Number)
                .unwrap_or(hcl::Value::Null),
            InstanceKey::Unknown => hcl::Value::Number((fallback as u64).into()),
        }
    }
}

impl From<u64> for InstanceKey {
    fn from(index: u64) -> Self {
        InstanceKey::Index(index.into())
    }
}

impl From<&str> for InstanceKey {
    fn from(key: &str) -> Self {
        InstanceKey::Key(key.to_string())
    }
}

impl From<hcl::Value> for InstanceKey {
    fn from(value: hcl::Value) -> Self {
        match value {
            hcl::Value::Number(number) => InstanceKey::Index(number),
            hcl::Value::String(key) => InstanceKey::Key(key),
            hcl::Value::Null => InstanceKey::Unknown,
            other => {
                tracing::debug!(key = ?other, "invalid instance key type");
                InstanceKey::Unknown
            }
        }
    }
}

/// Double-quoted instance key
fn quote(key: &str) -> String {
    let mut quoted = String::with_capacity(key.len() + 2);
    quoted.push('"');
    for c in key.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{07}' => quoted.push_str("\\a"),
            '\u{08}' => quoted.push_str("\\b"),
            '\u{0c}' => quoted.push_str("\\f"),
            '\u{0b}' => quoted.push_str("\\v"),
            c if c.is_ascii_control() => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn truncate(index: &hcl::Number) -> i64 {
    index
        .as_i64()
        .unwrap_or_else(|| index.as_f64().unwrap_or_default() as i64)
}
