//! hierarchical variable scope
//!
//! A [Context] is a cheap handle to one scope level. Cloning the handle does not copy the scope, both handles
//! point to the same variables. Scopes only ever point upwards to their parent, so a chain can be dropped from
//! the leaves without cycles.
//!
//! Lookup checks the local scope first and then walks the parent chain, which means a name bound in a scope
//! shadows the same name in every ancestor.
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct Context {
    scope: Rc<RefCell<Scope>>,
}

#[derive(Debug, Default)]
struct Scope {
    variables: hcl::value::Map<String, hcl::Value>,
    parent: Option<Context>,
}

impl Context {
    /// Creates an empty root scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty scope whose parent is `self`
    pub fn new_child(&self) -> Context {
        Context {
            scope: Rc::new(RefCell::new(Scope {
                variables: Default::default(),
                parent: Some(self.clone()),
            })),
        }
    }

    pub fn parent(&self) -> Option<Context> {
        self.scope.borrow().parent.clone()
    }

    /// Top-most ancestor (or `self` for a root scope)
    pub fn root(&self) -> Context {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// `true` when both handles point to the same scope
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }

    /// Binds `name` in this scope, replacing a previous local binding
    pub fn set(&self, name: impl Into<String>, value: hcl::Value) {
        self.scope.borrow_mut().variables.insert(name.into(), value);
    }

    /// Binds a value at a dotted path, e.g. `count.index`
    ///
    /// The first segment is bound in this scope. Missing intermediate objects are created and non-object values
    /// on the way are replaced.
    pub fn set_by_path(&self, value: hcl::Value, path: &str) {
        let mut segments = path.split('.');
        let Some(name) = segments.next() else {
            return;
        };
        let rest: Vec<&str> = segments.collect();

        if rest.is_empty() {
            self.set(name, value);
            return;
        }

        let mut scope = self.scope.borrow_mut();
        let slot = scope
            .variables
            .entry(name.to_string())
            .or_insert(hcl::Value::Null);
        let existing = std::mem::replace(slot, hcl::Value::Null);
        *slot = merge_at(existing, &rest, value);
    }

    /// Looks up `name` locally and then through the parent chain
    pub fn get(&self, name: &str) -> Option<hcl::Value> {
        let scope = self.scope.borrow();
        if let Some(value) = scope.variables.get(name) {
            return Some(value.clone());
        }
        scope.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Resolves a dotted path, the first segment by [Context::get] and the remaining ones as object keys
    pub fn get_by_path(&self, path: &str) -> Option<hcl::Value> {
        let mut segments = path.split('.');
        let mut value = self.get(segments.next()?)?;
        for segment in segments {
            value = match value {
                hcl::Value::Object(mut object) => object.shift_remove(segment)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Flattens the chain into an [hcl::eval::Context]
    ///
    /// Bindings closer to `self` win over the ones declared by ancestors.
    pub fn to_eval_context(&self) -> hcl::eval::Context<'static> {
        let mut flattened: hcl::value::Map<String, hcl::Value> = Default::default();
        self.collect_into(&mut flattened);

        let mut eval_context = hcl::eval::Context::new();
        for (name, value) in flattened {
            eval_context.declare_var(hcl::Identifier::sanitized(name), value);
        }
        eval_context
    }

    fn collect_into(&self, flattened: &mut hcl::value::Map<String, hcl::Value>) {
        let scope = self.scope.borrow();
        if let Some(parent) = &scope.parent {
            parent.collect_into(flattened);
        }
        for (name, value) in &scope.variables {
            flattened.insert(name.clone(), value.clone());
        }
    }
}

fn merge_at(existing: hcl::Value, path: &[&str], value: hcl::Value) -> hcl::Value {
    let Some((key, rest)) = path.split_first() else {
        return value;
    };

    let mut object = match existing {
        hcl::Value::Object(object) => object,
        _ => hcl::value::Map::new(),
    };

    let slot = object.entry(key.to_string()).or_insert(hcl::Value::Null);
    let child = std::mem::replace(slot, hcl::Value::Null);
    *slot = merge_at(child, rest, value);
    hcl::Value::Object(object)
}

#[cfg(test)]
mod test {
    use super::*;
    use hcl::eval::Evaluate;
    use pretty_assertions::assert_eq;

    fn number(n: u64) -> hcl::Value {
        hcl::Value::Number(n.into())
    }

    #[test]
    fn local_binding_shadows_ancestor() {
        let root = Context::new();
        root.set("region", "eu-west-1".into());
        let child = root.new_child();
        assert_eq!(child.get("region"), Some("eu-west-1".into()));

        child.set("region", "us-east-1".into());
        assert_eq!(child.get("region"), Some("us-east-1".into()));
        assert_eq!(root.get("region"), Some("eu-west-1".into()));
    }

    #[test]
    fn set_by_path_creates_intermediate_objects() {
        let context = Context::new();
        context.set_by_path(number(2), "count.index");
        context.set_by_path("a".into(), "count.other.deep");

        assert_eq!(context.get_by_path("count.index"), Some(number(2)));
        assert_eq!(context.get_by_path("count.other.deep"), Some("a".into()));
        assert_eq!(context.get_by_path("count.missing"), None);
    }

    #[test]
    fn set_by_path_replaces_scalars_on_the_way() {
        let context = Context::new();
        context.set("count", number(1));
        context.set_by_path(number(0), "count.index");
        assert_eq!(context.get_by_path("count.index"), Some(number(0)));
    }

    #[test]
    fn branches_are_isolated() {
        let root = Context::new();
        let one = root.new_child();
        let two = root.new_child();

        one.set_by_path(number(1), "count.index");
        two.set_by_path(number(2), "count.index");

        assert_eq!(one.get_by_path("count.index"), Some(number(1)));
        assert_eq!(two.get_by_path("count.index"), Some(number(2)));
        assert_eq!(root.get("count"), None);
    }

    #[test]
    fn root_is_reachable_from_descendants() {
        let root = Context::new();
        let grandchild = root.new_child().new_child();
        assert!(grandchild.root().ptr_eq(&root));
        assert!(root.root().ptr_eq(&root));
        assert!(!grandchild.ptr_eq(&root));
    }

    #[test]
    fn eval_context_prefers_closest_binding() {
        let root = Context::new();
        root.set_by_path("root".into(), "var.name");
        root.set_by_path("kept".into(), "local.other");
        let child = root.new_child();
        child.set_by_path("child".into(), "var.name");

        let expr: hcl::Expression = hcl::Traversal::builder(hcl::Variable::unchecked("var"))
            .attr("name")
            .build()
            .into();
        let value = expr.evaluate(&child.to_eval_context()).unwrap();
        assert_eq!(value, hcl::Value::from("child"));

        let expr: hcl::Expression = hcl::Traversal::builder(hcl::Variable::unchecked("local"))
            .attr("other")
            .build()
            .into();
        let value = expr.evaluate(&child.to_eval_context()).unwrap();
        assert_eq!(value, hcl::Value::from("kept"));
    }
}
