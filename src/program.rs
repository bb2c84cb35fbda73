//! Program - an ordered sequence of steps sharing one environment
//!
//! The executor owns the run-level policy: steps run strictly sequentially,
//! one node invocation in flight at a time, aborting on the first failure.
//! The environment mapping is created by the caller and mutated in place;
//! its identity never changes across the run.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::env::Env;
use crate::error::{Result, WeftError};
use crate::event::{EventKind, EventLog};
use crate::expr::EVALUATOR;
use crate::node::{NodeInvoker, ProcessInvoker};
use crate::step::{Step, StepRunner};

/// A program parsed from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

impl Program {
    /// Parse a program document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Static validation: node presence, `in`/`out` shapes, template syntax.
    ///
    /// Nothing is launched and no environment is consulted; this is the
    /// parse-only subset of the run-time checks.
    pub fn validate(&self) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            let label = step.label(index);
            let node = step.node.as_ref().ok_or_else(|| WeftError::MissingNode {
                step: label.to_string(),
            })?;
            if node.command_line().is_none() {
                return Err(WeftError::MissingNode {
                    step: label.to_string(),
                });
            }
            check_in_spec(step.input.as_ref())?;
            check_out_spec(step.output.as_ref())?;
        }
        Ok(())
    }
}

fn check_in_spec(spec: Option<&Value>) -> Result<()> {
    match spec {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(text)) => {
            if text.is_empty() {
                Ok(())
            } else {
                EVALUATOR.check_template(text)
            }
        }
        Some(Value::Object(map)) => {
            for value in map.values() {
                if let Value::String(text) = value {
                    EVALUATOR.check_template(text)?;
                }
            }
            Ok(())
        }
        Some(other) => Err(WeftError::InvalidParamSpec {
            section: "in",
            found: crate::env::value_type(other),
        }),
    }
}

fn check_out_spec(spec: Option<&Value>) -> Result<()> {
    match spec {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(text)) => {
            if text.is_empty() {
                Ok(())
            } else {
                EVALUATOR.check_assignment(text)
            }
        }
        Some(Value::Object(map)) => {
            for (key, value) in map {
                match value {
                    Value::String(text) => EVALUATOR.check_assignment(text)?,
                    other => {
                        return Err(WeftError::InvalidAssignText {
                            key: key.clone(),
                            found: crate::env::value_type(other),
                        })
                    }
                }
            }
            Ok(())
        }
        Some(other) => Err(WeftError::InvalidParamSpec {
            section: "out",
            found: crate::env::value_type(other),
        }),
    }
}

/// Program executor: repeats the Step Runner once per configured step
pub struct Runner {
    invoker: Arc<dyn NodeInvoker>,
    event_log: EventLog,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Executor invoking real subprocesses
    pub fn new() -> Self {
        Self::with_invoker(Arc::new(ProcessInvoker))
    }

    /// Executor with a custom invocation seam (tests, embedding)
    pub fn with_invoker(invoker: Arc<dyn NodeInvoker>) -> Self {
        Self {
            invoker,
            event_log: EventLog::new(),
        }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Run every step in order against `env`, aborting on the first failure.
    #[instrument(skip_all, fields(steps = program.steps.len()))]
    pub async fn run(&self, program: &Program, env: &mut Env) -> Result<()> {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, steps = program.steps.len(), "program started");
        self.event_log.emit(EventKind::ProgramStarted {
            step_count: program.steps.len(),
            run_id,
        });
        let started = Instant::now();

        let step_runner = StepRunner::new(Arc::clone(&self.invoker), self.event_log.clone());

        for (index, step) in program.steps.iter().enumerate() {
            let label = step.label(index);
            let node = step
                .node
                .as_ref()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "(missing)".to_string());
            self.event_log.emit(EventKind::StepStarted {
                step: Arc::clone(&label),
                node,
            });

            let step_started = Instant::now();
            match step_runner.run(&label, step, env).await {
                Ok(()) => {
                    debug!(step = %label, "step completed");
                    self.event_log.emit(EventKind::StepCompleted {
                        step: label,
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });
                }
                Err(error) => {
                    self.event_log.emit(EventKind::StepFailed {
                        step: Arc::clone(&label),
                        error: error.to_string(),
                        duration_ms: step_started.elapsed().as_millis() as u64,
                    });
                    self.event_log.emit(EventKind::ProgramFailed {
                        error: error.to_string(),
                        failed_step: Some(label),
                    });
                    return Err(error);
                }
            }
        }

        self.event_log.emit(EventKind::ProgramCompleted {
            total_duration_ms: started.elapsed().as_millis() as u64,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeSpec;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Test double: echoes the request parameters back as the node result
    struct EchoInvoker {
        calls: Mutex<usize>,
    }

    impl EchoInvoker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl NodeInvoker for EchoInvoker {
        async fn invoke(&self, _node: &NodeSpec, params: &Value) -> Result<Value> {
            *self.calls.lock() += 1;
            Ok(params.clone())
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Parsing and validation
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn parse_minimal_program() {
        let program = Program::from_yaml(
            r#"
name: demo
steps:
  - node: cat
"#,
        )
        .unwrap();
        assert_eq!(program.name.as_deref(), Some("demo"));
        assert_eq!(program.steps.len(), 1);
        program.validate().unwrap();
    }

    #[test]
    fn parse_error_is_configuration() {
        let err = Program::from_yaml("steps: {not: [a, list").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn validate_rejects_missing_node() {
        let program = Program::from_yaml(
            r#"
steps:
  - in: {a: 1}
"#,
        )
        .unwrap();
        let err = program.validate().unwrap_err();
        assert!(matches!(err, WeftError::MissingNode { .. }));
        assert!(err.to_string().contains("step-1"));
    }

    #[test]
    fn validate_rejects_bad_template_syntax() {
        let program = Program::from_yaml(
            r#"
steps:
  - node: cat
    in:
      a: "${{ a + b }}"
"#,
        )
        .unwrap();
        let err = program.validate().unwrap_err();
        assert!(err.is_expression());
    }

    #[test]
    fn validate_rejects_non_assignment_out() {
        let program = Program::from_yaml(
            r#"
steps:
  - node: cat
    out: "${{ value }}"
"#,
        )
        .unwrap();
        let err = program.validate().unwrap_err();
        assert!(matches!(err, WeftError::ExpectedAssignment { .. }));
    }

    #[test]
    fn validate_rejects_sequence_in_spec() {
        let program = Program::from_yaml(
            r#"
steps:
  - node: cat
    in: [1, 2]
"#,
        )
        .unwrap();
        let err = program.validate().unwrap_err();
        assert!(matches!(
            err,
            WeftError::InvalidParamSpec { section: "in", .. }
        ));
    }

    // ═══════════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn run_threads_env_across_steps() {
        let invoker = EchoInvoker::new();
        let runner = Runner::with_invoker(Arc::clone(&invoker) as Arc<dyn NodeInvoker>);
        let program = Program::from_yaml(
            r#"
steps:
  - name: first
    node: echo
    in:
      a: 1
    out:
      a: "${{ seed = value }}"
  - name: second
    node: echo
    in:
      b: "${{ seed }}"
    out:
      b: "${{ result = value }}"
"#,
        )
        .unwrap();

        let mut env = Env::new();
        runner.run(&program, &mut env).await.unwrap();

        assert_eq!(*invoker.calls.lock(), 2);
        assert_eq!(env.get("seed"), Some(&json!(1)));
        assert_eq!(env.get("result"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn run_aborts_on_first_failure() {
        let invoker = EchoInvoker::new();
        let runner = Runner::with_invoker(Arc::clone(&invoker) as Arc<dyn NodeInvoker>);
        let program = Program::from_yaml(
            r#"
steps:
  - name: bad
    node: echo
    in:
      a: "${{ undefined_var }}"
  - name: never
    node: echo
"#,
        )
        .unwrap();

        let mut env = Env::new();
        let err = runner.run(&program, &mut env).await.unwrap_err();
        assert!(err.is_expression());
        // The failing step never reached the invoker, and the second step
        // never started.
        assert_eq!(*invoker.calls.lock(), 0);

        let events = runner.event_log().snapshot();
        assert!(events
            .iter()
            .any(|e| matches!(&e.kind, EventKind::ProgramFailed { failed_step: Some(s), .. } if &**s == "bad")));
        assert!(runner.event_log().filter_step("never").is_empty());
    }

    #[tokio::test]
    async fn run_emits_lifecycle_events_in_order() {
        let invoker = EchoInvoker::new();
        let runner = Runner::with_invoker(invoker as Arc<dyn NodeInvoker>);
        let program = Program::from_yaml(
            r#"
steps:
  - name: only
    node: echo
"#,
        )
        .unwrap();

        let mut env = Env::new();
        runner.run(&program, &mut env).await.unwrap();

        let kinds: Vec<&'static str> = runner
            .event_log()
            .snapshot()
            .iter()
            .map(|e| match &e.kind {
                EventKind::ProgramStarted { .. } => "program_started",
                EventKind::StepStarted { .. } => "step_started",
                EventKind::NodeInvoked { .. } => "node_invoked",
                EventKind::NodeExited { .. } => "node_exited",
                EventKind::StepCompleted { .. } => "step_completed",
                EventKind::ProgramCompleted { .. } => "program_completed",
                other => panic!("unexpected event {other:?}"),
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                "program_started",
                "step_started",
                "node_invoked",
                "node_exited",
                "step_completed",
                "program_completed",
            ]
        );
    }

    #[tokio::test]
    async fn env_identity_is_preserved() {
        let runner = Runner::with_invoker(EchoInvoker::new() as Arc<dyn NodeInvoker>);
        let program = Program::from_yaml(
            r#"
steps:
  - node: echo
    out: "${{ whole = value }}"
"#,
        )
        .unwrap();

        let mut env: Env = [("keep".to_string(), json!("me"))].into_iter().collect();
        runner.run(&program, &mut env).await.unwrap();

        // Prior contents survive: the runner mutates the mapping in place
        assert_eq!(env.get("keep"), Some(&json!("me")));
        assert!(env.contains("whole"));
    }
}
