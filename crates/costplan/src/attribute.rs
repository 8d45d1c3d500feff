//! attributes bound to the scope of their block
use crate::context::Context;
use hcl::eval::Evaluate;

/// A named expression together with the [Context] it is evaluated in
///
/// Attributes are derived from the syntax node whenever they are requested. Two lookups of the same attribute
/// return two independent values that compare equal.
#[derive(Debug, Clone, derive_new::new)]
pub struct Attribute {
    name: String,
    expr: hcl::Expression,
    context: Context,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &hcl::Expression {
        &self.expr
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn try_value(&self) -> Result<hcl::Value, hcl::eval::Error> {
        self.expr.evaluate(&self.context.to_eval_context())
    }

    /// Evaluated value, `null` when the expression cannot be resolved (yet)
    pub fn value(&self) -> hcl::Value {
        match self.try_value() {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(attribute = %self.name, %error, "unable to evaluate attribute");
                hcl::Value::Null
            }
        }
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.expr == other.expr
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attribute(expression: &str, context: &Context) -> Attribute {
        let expr: hcl_edit::expr::Expression = expression.parse().unwrap();
        Attribute::new("test".to_string(), expr.into(), context.clone())
    }

    #[test]
    fn evaluates_against_scope_chain() {
        let root = Context::new();
        root.set_by_path("web".into(), "var.name");
        let child = root.new_child();
        child.set_by_path(hcl::Value::Number(3.into()), "count.index");

        let value = attribute(r#""${var.name}-${count.index}""#, &child).value();
        assert_eq!(value, hcl::Value::from("web-3"));
    }

    #[test]
    fn evaluation_error_names_the_variable() {
        let error = attribute("var.missing", &Context::new())
            .try_value()
            .expect_err("undefined variable");
        assert!(error.to_string().contains("var"));
    }

    #[test]
    fn unresolved_expression_is_null() {
        let attribute = attribute("var.missing", &Context::new());
        assert!(attribute.try_value().is_err());
        assert_eq!(attribute.value(), hcl::Value::Null);
    }
}
