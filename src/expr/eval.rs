//! Expression evaluation against the environment
//!
//! Lookup never mutates; only `exec_assign` writes. Traversal errors are
//! split the same way the error taxonomy is: a missing field or index on a
//! container is a path-not-found, traversing into a scalar is an invalid
//! traversal.

use serde_json::Value;

use crate::env::{value_type, Env};
use crate::error::{Result, WeftError};

use super::ast::{Assign, Expr, Segment, Template, TemplatePart};

/// Evaluate one expression to a value
pub fn eval_expr(expr: &Expr, env: &Env) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => {
            let mut current = env
                .get(&path.root)
                .ok_or_else(|| WeftError::UndefinedVar {
                    name: path.root.clone(),
                })?;
            let mut traversed = path.root.clone();

            for segment in &path.segments {
                current = match (segment, current) {
                    (Segment::Key(key), Value::Object(map)) => {
                        map.get(key).ok_or_else(|| WeftError::PathNotFound {
                            path: format!("{traversed}.{key}"),
                        })?
                    }
                    (Segment::Index(index), Value::Array(items)) => {
                        items.get(*index).ok_or_else(|| WeftError::PathNotFound {
                            path: format!("{traversed}[{index}]"),
                        })?
                    }
                    (segment, other) => {
                        return Err(WeftError::InvalidTraversal {
                            segment: segment_text(segment),
                            value_type: value_type(other),
                            path: path.to_string(),
                        });
                    }
                };
                match segment {
                    Segment::Key(key) => {
                        traversed.push('.');
                        traversed.push_str(key);
                    }
                    Segment::Index(index) => {
                        traversed.push_str(&format!("[{index}]"));
                    }
                }
            }

            Ok(current.clone())
        }
    }
}

/// Evaluate a parsed template: single expressions keep their typed value,
/// interpolations always yield a string.
pub fn eval_template(template: &Template, env: &Env) -> Result<Value> {
    match template {
        Template::Value(expr) => eval_expr(expr, env),
        Template::Interpolate(parts) => {
            let mut result = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text(text) => result.push_str(text),
                    TemplatePart::Expr(expr) => {
                        result.push_str(&render(&eval_expr(expr, env)?));
                    }
                }
            }
            Ok(Value::String(result))
        }
    }
}

/// Apply an assignment: evaluate the right-hand side, write the target key
pub fn exec_assign(assign: &Assign, env: &mut Env) -> Result<()> {
    let value = eval_expr(&assign.value, env)?;
    env.insert(assign.target.clone(), value);
    Ok(())
}

/// Render a value into interpolated text: strings verbatim, everything else
/// (including null) in its compact JSON spelling.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn segment_text(segment: &Segment) -> String {
    match segment {
        Segment::Key(key) => key.clone(),
        Segment::Index(index) => index.to_string(),
    }
}
