//! Environment - the shared mapping threaded through a run
//!
//! One `Env` lives for the duration of a program run. The executor owns it;
//! step execution borrows it mutably. Values are `serde_json::Value`, so the
//! evaluator's lookup and assignment operations match exhaustively over
//! scalar/string/mapping/sequence.
//!
//! Uses FxHashMap for faster hashing on small string keys.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Key of the temporary slot holding a node result during output storage.
pub const RESULT_SLOT: &str = "value";

/// Describe a JSON value's type for error messages
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Mutable variable mapping shared across the steps of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Env {
    vars: FxHashMap<String, Value>,
}

impl Env {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Add or overwrite a variable, returning the previous value if any
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    /// Remove a variable
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over (name, value) pairs (order is not significant)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bind a node result into the temporary `value` slot.
    ///
    /// The returned guard removes the slot when dropped, so the binding
    /// cannot leak past the scope that created it - including error paths.
    pub fn bind_result(&mut self, result: Value) -> ResultSlot<'_> {
        self.vars.insert(RESULT_SLOT.to_string(), result);
        ResultSlot { env: self }
    }
}

impl FromIterator<(String, Value)> for Env {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Scoped temporary binding of the `value` slot.
///
/// Output storage reads the slot through `execute`; dropping the guard
/// removes it on every exit path.
pub struct ResultSlot<'e> {
    env: &'e mut Env,
}

impl ResultSlot<'_> {
    /// Access the environment with the slot bound
    pub fn env_mut(&mut self) -> &mut Env {
        self.env
    }
}

impl Drop for ResultSlot<'_> {
    fn drop(&mut self) {
        self.env.vars.remove(RESULT_SLOT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_get_remove() {
        let mut env = Env::new();
        assert!(env.is_empty());

        env.insert("a", json!(1));
        assert_eq!(env.get("a"), Some(&json!(1)));
        assert_eq!(env.len(), 1);

        let old = env.insert("a", json!({"x": true}));
        assert_eq!(old, Some(json!(1)));
        assert_eq!(env.get("a"), Some(&json!({"x": true})));

        assert_eq!(env.remove("a"), Some(json!({"x": true})));
        assert!(env.get("a").is_none());
    }

    #[test]
    fn result_slot_visible_while_bound() {
        let mut env = Env::new();
        let mut slot = env.bind_result(json!({"data": 1}));
        assert_eq!(
            slot.env_mut().get(RESULT_SLOT),
            Some(&json!({"data": 1}))
        );
    }

    #[test]
    fn result_slot_removed_on_drop() {
        let mut env = Env::new();
        {
            let _slot = env.bind_result(json!(42));
        }
        assert!(!env.contains(RESULT_SLOT));
    }

    #[test]
    fn result_slot_removed_on_early_return() {
        fn failing(env: &mut Env) -> Result<(), ()> {
            let _slot = env.bind_result(json!("temp"));
            Err(())
        }

        let mut env = Env::new();
        let _ = failing(&mut env);
        assert!(!env.contains(RESULT_SLOT));
    }

    #[test]
    fn value_type_names() {
        assert_eq!(value_type(&json!(null)), "null");
        assert_eq!(value_type(&json!(true)), "bool");
        assert_eq!(value_type(&json!(1.5)), "number");
        assert_eq!(value_type(&json!("s")), "string");
        assert_eq!(value_type(&json!([])), "sequence");
        assert_eq!(value_type(&json!({})), "mapping");
    }

    #[test]
    fn from_iterator() {
        let env: Env = [("a".to_string(), json!(1)), ("b".to_string(), json!(2))]
            .into_iter()
            .collect();
        assert_eq!(env.len(), 2);
        assert_eq!(env.get("b"), Some(&json!(2)));
    }
}
