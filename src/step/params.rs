//! Parameter Loader / Store - step `in:` and `out:` resolution
//!
//! Input resolution is read-only against the environment; only output
//! resolution mutates it, through the evaluator's assignment form. During
//! output storage the node result is visible as the `value` variable,
//! bound through a guard so it never leaks past the call - error paths
//! included.

use serde_json::{Map, Value};

use crate::env::{value_type, Env};
use crate::error::{Result, WeftError};
use crate::expr::EVALUATOR;

/// Resolve a step's `in:` spec into the node's request parameters.
///
/// - absent/null/empty spec -> empty mapping
/// - single string -> evaluated as one template (expected to produce the
///   whole parameter mapping; not enforced here)
/// - mapping -> each value evaluated, keys preserved verbatim
pub fn load_in_params(spec: Option<&Value>, env: &Env) -> Result<Value> {
    let Some(spec) = spec else {
        return Ok(Value::Object(Map::new()));
    };
    match spec {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::String(text) if text.is_empty() => Ok(Value::Object(Map::new())),
        Value::String(text) => EVALUATOR.evaluate_str(text, env),
        Value::Object(map) => {
            let mut loaded = Map::new();
            for (key, value) in map {
                loaded.insert(key.clone(), EVALUATOR.evaluate(value, env)?);
            }
            Ok(Value::Object(loaded))
        }
        other => Err(WeftError::InvalidParamSpec {
            section: "in",
            found: value_type(other),
        }),
    }
}

/// Bind a node result into the environment through a step's `out:` spec.
///
/// - absent/null/empty spec -> no-op
/// - single string -> `value` holds the whole result while the assignment
///   runs
/// - mapping -> per key, `value` holds `result[key]` (null when the key is
///   missing or the result is not a mapping) while that key's assignment
///   runs; bindings are independently scoped so a later key never sees an
///   earlier key's `value`
pub fn store_out_params(spec: Option<&Value>, result: Value, env: &mut Env) -> Result<()> {
    let Some(spec) = spec else {
        return Ok(());
    };
    match spec {
        Value::Null => Ok(()),
        Value::String(text) if text.is_empty() => Ok(()),
        Value::String(text) => {
            let mut slot = env.bind_result(result);
            EVALUATOR.execute(text, slot.env_mut())
        }
        Value::Object(map) => {
            for (key, assign_text) in map {
                let Value::String(text) = assign_text else {
                    return Err(WeftError::InvalidAssignText {
                        key: key.clone(),
                        found: value_type(assign_text),
                    });
                };
                let keyed = result.get(key).cloned().unwrap_or(Value::Null);
                let mut slot = env.bind_result(keyed);
                EVALUATOR.execute(text, slot.env_mut())?;
            }
            Ok(())
        }
        other => Err(WeftError::InvalidParamSpec {
            section: "out",
            found: value_type(other),
        }),
    }
}
