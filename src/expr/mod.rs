//! Expression Evaluator - the `${{ }}` template sublanguage
//!
//! Two operations, one narrow interface:
//! - `evaluate(value, env)`: resolve a templated input value. Non-strings
//!   pass through unchanged; strings are parsed (bare expression, single
//!   `${{ }}` block, or interpolated text) and evaluated read-only.
//! - `execute(text, env)`: apply an assignment template. The only observable
//!   effect is the mutation of `env`.
//!
//! Templates are tokenized once and cached: the `Evaluator` keeps parsed
//! trees in a `DashMap` behind `Arc`, so re-running a step re-uses the parse.
//! Evaluation itself holds no state, which keeps repeated calls with an
//! unchanged environment identical.

pub mod ast;
mod eval;
mod parse;

pub use ast::{Assign, Expr, PathExpr, Segment, Template, TemplatePart};

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use serde_json::Value;

use crate::env::Env;
use crate::error::Result;

/// Template evaluator with a parse cache
pub struct Evaluator {
    /// Cache of parsed value templates
    templates: DashMap<String, Arc<Template>>,
    /// Cache of parsed assignment templates
    assignments: DashMap<String, Arc<Assign>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            assignments: DashMap::new(),
        }
    }

    /// Parse a value template (with caching)
    fn template(&self, src: &str) -> Result<Arc<Template>> {
        if let Some(cached) = self.templates.get(src) {
            return Ok(Arc::clone(&cached));
        }
        let parsed = Arc::new(parse::parse_template(src)?);
        self.templates.insert(src.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Parse an assignment template (with caching)
    fn assignment(&self, src: &str) -> Result<Arc<Assign>> {
        if let Some(cached) = self.assignments.get(src) {
            return Ok(Arc::clone(&cached));
        }
        let parsed = Arc::new(parse::parse_assign(src)?);
        self.assignments
            .insert(src.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Resolve a templated input value against the environment.
    ///
    /// Strings are always routed through the template parser; any other
    /// value passes through unchanged.
    pub fn evaluate(&self, value: &Value, env: &Env) -> Result<Value> {
        match value {
            Value::String(text) => self.evaluate_str(text, env),
            other => Ok(other.clone()),
        }
    }

    /// Resolve a templated string against the environment
    pub fn evaluate_str(&self, text: &str, env: &Env) -> Result<Value> {
        let template = self.template(text)?;
        eval::eval_template(&template, env)
    }

    /// Apply an assignment template; the post-condition on `env` is the
    /// whole contract.
    pub fn execute(&self, text: &str, env: &mut Env) -> Result<()> {
        let assign = self.assignment(text)?;
        eval::exec_assign(&assign, env)
    }

    /// Parse-only check of a value template (static validation)
    pub fn check_template(&self, text: &str) -> Result<()> {
        self.template(text).map(|_| ())
    }

    /// Parse-only check of an assignment template (static validation)
    pub fn check_assignment(&self, text: &str) -> Result<()> {
        self.assignment(text).map(|_| ())
    }
}

/// Global evaluator instance
pub static EVALUATOR: LazyLock<Evaluator> = LazyLock::new(Evaluator::new);

/// Convenience function: resolve a templated value with the global evaluator
pub fn evaluate(value: &Value, env: &Env) -> Result<Value> {
    EVALUATOR.evaluate(value, env)
}

/// Convenience function: apply an assignment with the global evaluator
pub fn execute(text: &str, env: &mut Env) -> Result<()> {
    EVALUATOR.execute(text, env)
}
