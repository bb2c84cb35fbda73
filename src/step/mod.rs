//! Step - one unit of work: validate, load inputs, invoke node, store outputs
//!
//! The runner is a linear state machine with no retries:
//! `Validate -> LoadIn -> Invoke -> StoreOut -> Done`, any failure aborting
//! the step before `out:` is applied. Validation happens before any side
//! effect - a step without a node never resolves parameters or launches
//! anything.

mod params;

pub use params::{load_in_params, store_out_params};

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::env::Env;
use crate::error::{Result, WeftError};
use crate::event::{EventKind, EventLog};
use crate::node::{NodeInvoker, NodeSpec};

/// One step of a program, as parsed from YAML.
///
/// `in`/`out` stay generic values: their shape (string, mapping, or absent)
/// is the Parameter Loader/Store's contract, not the deserializer's.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Optional human label used in events and diagnostics
    #[serde(default)]
    pub name: Option<String>,
    /// Program to invoke; required, but validated at run time so the error
    /// carries the step label
    #[serde(default)]
    pub node: Option<NodeSpec>,
    #[serde(default, rename = "in")]
    pub input: Option<Value>,
    #[serde(default, rename = "out")]
    pub output: Option<Value>,
}

impl Step {
    /// Display label: the step's name, or `step-N` from its position
    pub fn label(&self, index: usize) -> Arc<str> {
        match &self.name {
            Some(name) => Arc::from(name.as_str()),
            None => Arc::from(format!("step-{}", index + 1).as_str()),
        }
    }
}

/// Drives one step to completion through a [`NodeInvoker`]
pub struct StepRunner {
    invoker: Arc<dyn NodeInvoker>,
    event_log: EventLog,
}

impl StepRunner {
    pub fn new(invoker: Arc<dyn NodeInvoker>, event_log: EventLog) -> Self {
        Self { invoker, event_log }
    }

    /// Run one step against the shared environment.
    ///
    /// The only observable outputs are mutations of `env` (via the step's
    /// `out:` spec), a failure, or the node's own side effects.
    #[instrument(skip(self, step, env), fields(step = %label))]
    pub async fn run(&self, label: &Arc<str>, step: &Step, env: &mut Env) -> Result<()> {
        // Validate: before any side effect
        let node = step.node.as_ref().ok_or_else(|| WeftError::MissingNode {
            step: label.to_string(),
        })?;

        // LoadIn: read-only against env
        let args = params::load_in_params(step.input.as_ref(), env)?;

        debug!(node = %node, "invoking node");
        self.event_log.emit(EventKind::NodeInvoked {
            step: Arc::clone(label),
            node: node.to_string(),
        });

        // Invoke: the step's single suspension point
        let result = self.invoker.invoke(node, &args).await?;
        self.event_log.emit(EventKind::NodeExited {
            step: Arc::clone(label),
        });

        // StoreOut
        params::store_out_params(step.output.as_ref(), result, env)
    }
}
