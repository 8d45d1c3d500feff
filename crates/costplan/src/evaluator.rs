//! module evaluation
//!
//! Turns the top-level blocks of one module into resource records:
//!
//! 1. `variable` blocks bind `var.<name>` (input, then `default`, then `null`)
//! 2. `locals` blocks bind `local.<name>`, repeated until no more locals resolve
//! 3. `resource`, `data` and `module` blocks are expanded according to `count` / `for_each`
//! 4. instance values are published at their unexpanded address (`aws_instance.web`), as a list for `count`, as
//!    an object for `for_each`
//! 5. local module calls (`./`, `../`) are loaded and evaluated with a fresh scope, their outputs are published
//!    at `module.<name>`
//!
//! Every module gets its own root [Context]. Nothing but the module call attributes crosses that boundary.
use crate::block::{Block, InstanceKey, ModuleHandle};
use crate::config_documents::{ConfigDocuments, LoadError};
use crate::context::Context;
use crate::record::ResourceRecord;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_MODULE_DEPTH: usize = 16;
pub const DEFAULT_MAX_COUNT: usize = 10_000;

/// Module call attributes that are not passed on as variables
const MODULE_META_ARGUMENTS: &[&str] = &[
    "source",
    "version",
    "count",
    "for_each",
    "providers",
    "depends_on",
];

#[derive(Debug, Clone, derive_new::new)]
pub struct EvaluatorOptions {
    /// Values for variables of the root module
    #[new(default)]
    pub inputs: hcl::value::Map<String, hcl::Value>,
    #[new(value = "DEFAULT_MAX_MODULE_DEPTH")]
    pub max_module_depth: usize,
    /// Largest accepted `count`, larger values yield no instances
    #[new(value = "DEFAULT_MAX_COUNT")]
    pub max_count: usize,
}

impl EvaluatorOptions {
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<hcl::Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, derive_new::new)]
pub struct Evaluator {
    options: EvaluatorOptions,
}

/// Result of evaluating one module instance
#[derive(Debug, Default)]
pub struct ModuleOutcome {
    pub resources: Vec<ResourceRecord>,
    pub outputs: hcl::value::Map<String, hcl::Value>,
}

impl Evaluator {
    pub fn evaluate(&self, documents: &ConfigDocuments) -> Result<Vec<ResourceRecord>, EvalError> {
        self.evaluate_module(documents, &self.options.inputs, None, 0)
            .map(|outcome| outcome.resources)
    }

    pub fn evaluate_directory(&self, dir_path: &Path) -> Result<Vec<ResourceRecord>, EvalError> {
        let mut documents = ConfigDocuments::default();
        documents.load_directory(dir_path)?;
        self.evaluate(&documents)
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(module = %module.map(ModuleHandle::full_name).unwrap_or_default())
    )]
    pub fn evaluate_module(
        &self,
        documents: &ConfigDocuments,
        inputs: &hcl::value::Map<String, hcl::Value>,
        module: Option<&ModuleHandle>,
        depth: usize,
    ) -> Result<ModuleOutcome, EvalError> {
        let context = Context::new();
        let blocks = documents.blocks(&context, module);

        bind_variables(&blocks, inputs, &context);
        resolve_locals(&blocks, &context);

        let groups: Vec<InstanceGroup> = blocks
            .into_iter()
            .map(|block| InstanceGroup::expand(block, self.options.max_count))
            .collect();

        publish(&groups, &context);
        resolve_locals(groups.iter().flat_map(|group| &group.instances), &context);

        let mut module_resources: Vec<Vec<ResourceRecord>> = vec![];
        for group in groups.iter().filter(|group| group.block_type == "module") {
            let mut resources = vec![];
            let mut values = vec![];
            for instance in &group.instances {
                let outcome = self.call_module(documents, instance, depth)?;
                resources.extend(outcome.resources);
                values.push(hcl::Value::Object(outcome.outputs));
            }
            context.set_by_path(group.collect(values), &group.path);
            module_resources.push(resources);
        }

        // locals and instance values may refer to module outputs
        resolve_locals(groups.iter().flat_map(|group| &group.instances), &context);
        publish(&groups, &context);

        let mut outcome = ModuleOutcome::default();
        let mut module_resources = module_resources.into_iter();
        for group in &groups {
            match group.block_type.as_str() {
                "resource" => outcome
                    .resources
                    .extend(group.instances.iter().map(ResourceRecord::from_block)),
                "module" => outcome
                    .resources
                    .extend(module_resources.next().unwrap_or_default()),
                "output" => {
                    for instance in &group.instances {
                        let value = instance
                            .attribute("value")
                            .map(|attribute| attribute.value())
                            .unwrap_or(hcl::Value::Null);
                        outcome
                            .outputs
                            .insert(instance.type_label().to_string(), value);
                    }
                }
                _ => {}
            }
        }

        tracing::debug!(resources = outcome.resources.len(), "module evaluated");
        Ok(outcome)
    }

    fn call_module(
        &self,
        documents: &ConfigDocuments,
        call: &Block,
        depth: usize,
    ) -> Result<ModuleOutcome, EvalError> {
        let source = match call.attribute("source").map(|attribute| attribute.value()) {
            Some(hcl::Value::String(source))
                if source.starts_with("./") || source.starts_with("../") =>
            {
                source
            }
            source => {
                tracing::warn!(module = %call.full_name(), ?source, "skipping module with unsupported source");
                return Ok(ModuleOutcome::default());
            }
        };

        if depth + 1 > self.options.max_module_depth {
            return Err(EvalError::ModuleDepthExceeded {
                address: call.full_name(),
                max: self.options.max_module_depth,
            });
        }

        let module_path = match documents.directory() {
            Some(directory) => directory.join(&source),
            None => PathBuf::from(&source),
        };

        let mut module_documents = ConfigDocuments::default();
        if let Err(error) = module_documents.load_directory(&module_path) {
            tracing::warn!(module = %call.full_name(), path = %module_path.display(), %error, "skipping module");
            return Ok(ModuleOutcome::default());
        }

        let inputs: hcl::value::Map<String, hcl::Value> = call
            .attributes_by_name()
            .into_iter()
            .filter(|(name, _)| !MODULE_META_ARGUMENTS.contains(&name.as_str()))
            .map(|(name, attribute)| (name, attribute.value()))
            .collect();

        let handle = call.module_handle();
        self.evaluate_module(&module_documents, &inputs, Some(&handle), depth + 1)
    }
}

fn bind_variables(
    blocks: &[Block],
    inputs: &hcl::value::Map<String, hcl::Value>,
    context: &Context,
) {
    for variable in blocks.iter().filter(|block| block.block_type() == "variable") {
        let name = variable.type_label();
        let value = match inputs.get(name) {
            Some(value) => value.clone(),
            None => variable
                .attribute("default")
                .map(|attribute| attribute.value())
                .unwrap_or(hcl::Value::Null),
        };

        tracing::trace!(name, ?value, "bind variable");
        context.set_by_path(value, &format!("var.{name}"));
    }
}

/// Binds `local.<name>` until the values stop changing
///
/// Locals that never evaluate are bound to `null`. Calling this again after new values were published updates
/// locals that depend on them, including locals that read other locals.
fn resolve_locals<'a>(blocks: impl IntoIterator<Item = &'a Block>, context: &Context) {
    let locals: Vec<_> = blocks
        .into_iter()
        .filter(|block| block.block_type() == "locals")
        .flat_map(|block| block.attributes())
        .collect();

    // each pass settles at least one more link of an acyclic chain
    for _ in 0..=locals.len() {
        let mut changed = false;
        for attribute in &locals {
            let Ok(value) = attribute.try_value() else {
                continue;
            };

            let path = format!("local.{}", attribute.name());
            if context.get_by_path(&path).as_ref() != Some(&value) {
                context.set_by_path(value, &path);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    for attribute in &locals {
        let path = format!("local.{}", attribute.name());
        if context.get_by_path(&path).is_none() {
            tracing::debug!(local = attribute.name(), "unable to resolve local");
            context.set_by_path(hcl::Value::Null, &path);
        }
    }
}

/// Binds instance values of resources and data sources at their unexpanded address
fn publish(groups: &[InstanceGroup], context: &Context) {
    for group in groups
        .iter()
        .filter(|group| matches!(group.block_type.as_str(), "resource" | "data"))
    {
        let values = group.instances.iter().map(Block::as_value).collect();
        context.set_by_path(group.collect(values), &group.path);
    }
}

/// All instances of one declaration
struct InstanceGroup {
    block_type: String,
    /// address before expansion
    path: String,
    repetition: Repetition,
    instances: Vec<Block>,
}

enum Repetition {
    Single,
    Count,
    ForEach(Vec<String>),
}

impl InstanceGroup {
    fn expand(mut block: Block, max_count: usize) -> Self {
        let block_type = block.block_type().to_string();
        let path = block.local_name();

        let repeatable = matches!(block_type.as_str(), "resource" | "data" | "module");
        let (repetition, instances) = if !repeatable {
            (Repetition::Single, vec![block])
        } else if let Some(count) = block.attribute("count") {
            expand_count(&mut block, count.try_value(), max_count)
        } else if let Some(for_each) = block.attribute("for_each") {
            expand_for_each(&mut block, for_each.try_value())
        } else {
            (Repetition::Single, vec![block])
        };

        Self {
            block_type,
            path,
            repetition,
            instances,
        }
    }

    fn collect(&self, values: Vec<hcl::Value>) -> hcl::Value {
        match &self.repetition {
            Repetition::Single => values.into_iter().next().unwrap_or(hcl::Value::Null),
            Repetition::Count => hcl::Value::Array(values),
            Repetition::ForEach(keys) => {
                hcl::Value::Object(keys.iter().cloned().zip(values).collect())
            }
        }
    }
}

fn expand_count(
    block: &mut Block,
    count: Result<hcl::Value, hcl::eval::Error>,
    max_count: usize,
) -> (Repetition, Vec<Block>) {
    let count = match count {
        Ok(hcl::Value::Number(count)) => count,
        Ok(hcl::Value::Null) | Err(_) => {
            tracing::debug!(address = %block.full_name(), "count not resolved, assuming a single instance");
            return (Repetition::Count, vec![block.expand(InstanceKey::Unknown)]);
        }
        Ok(other) => {
            tracing::warn!(address = %block.full_name(), count = ?other, "invalid count");
            return (Repetition::Count, vec![]);
        }
    };

    let Some(count) = bounded_count(&count) else {
        tracing::warn!(address = %block.full_name(), %count, "count must be a non-negative number");
        return (Repetition::Count, vec![]);
    };

    if count > max_count {
        tracing::warn!(address = %block.full_name(), count, max_count, "count exceeds the limit");
        return (Repetition::Count, vec![]);
    }

    let instances = (0..count as u64)
        .map(|index| block.expand(index.into()))
        .collect();
    (Repetition::Count, instances)
}

fn expand_for_each(
    block: &mut Block,
    for_each: Result<hcl::Value, hcl::eval::Error>,
) -> (Repetition, Vec<Block>) {
    let entries: Vec<(String, hcl::Value)> = match for_each {
        Ok(hcl::Value::Object(object)) => object.into_iter().collect(),
        Ok(hcl::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                hcl::Value::String(key) => Some(key),
                other => {
                    tracing::warn!(address = %block.full_name(), item = ?other, "for_each sets must contain strings");
                    None
                }
            })
            // sets hold every element once
            .collect::<indexmap::IndexSet<String>>()
            .into_iter()
            .map(|key| (key.clone(), hcl::Value::String(key)))
            .collect(),
        Ok(hcl::Value::Null) | Err(_) => {
            tracing::debug!(address = %block.full_name(), "for_each not resolved, assuming a single instance");
            return (Repetition::Count, vec![block.expand(InstanceKey::Unknown)]);
        }
        Ok(other) => {
            tracing::warn!(address = %block.full_name(), for_each = ?other, "invalid for_each");
            return (Repetition::Count, vec![]);
        }
    };

    let mut keys = vec![];
    let mut instances = vec![];
    for (key, value) in entries {
        let instance = block.expand(InstanceKey::Key(key.clone()));
        instance
            .context()
            .set_by_path(hcl::Value::String(key.clone()), "each.key");
        instance.context().set_by_path(value, "each.value");
        keys.push(key);
        instances.push(instance);
    }

    (Repetition::ForEach(keys), instances)
}

fn bounded_count(count: &hcl::Number) -> Option<usize> {
    let count = count.as_f64()?;
    (count.is_finite() && count >= 0.0).then(|| count.trunc() as usize)
}

#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    #[error("Unable to load configuration")]
    Load(#[from] LoadError),
    #[error("Module nesting exceeds {max} levels at {address}")]
    ModuleDepthExceeded { address: String, max: usize },
}
