//! JEXL expression evaluation for edge conditions, `condition` nodes and
//! loop continuation.
//!
//! Variables are always passed as the evaluation context, never spliced
//! into the expression text.

use serde_json::{json, Value};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("expression '{expression}' failed to evaluate: {message}")]
    EvalFailed { expression: String, message: String },

    #[error("expression context must be a JSON object")]
    InvalidContext,

    #[error("expression is empty")]
    Empty,
}

/// Stateless JEXL evaluator with a small set of transforms.
///
/// The underlying `jexl_eval::Evaluator` is built per call, so this type is
/// trivially `Send + Sync` and can be shared freely between branches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn evaluator() -> jexl_eval::Evaluator<'static> {
        jexl_eval::Evaluator::new()
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("contains", |args: &[Value]| {
                let found = match (args.first(), args.get(1)) {
                    (Some(Value::String(s)), Some(Value::String(needle))) => s.contains(needle.as_str()),
                    (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
                    _ => false,
                };
                Ok(json!(found))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
    }

    /// Evaluate `expression` and return the raw JSON result.
    pub fn evaluate_value(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        if expression.trim().is_empty() {
            return Err(ExpressionError::Empty);
        }
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext);
        }

        Self::evaluator()
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed {
                expression: expression.to_owned(),
                message: e.to_string(),
            })
    }

    /// Evaluate `expression` and coerce the result with JavaScript-like
    /// truthiness.
    pub fn evaluate_bool(&self, expression: &str, context: &Value) -> Result<bool, ExpressionError> {
        self.evaluate_value(expression, context)
            .map(|value| truthy(&value))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
