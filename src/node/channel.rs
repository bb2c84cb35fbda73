//! Node Invocation Channel - one JSON request/response over child stdio
//!
//! The exchange is an explicit state machine rather than incidental control
//! flow, so the half-close/await/read ordering is a testable contract:
//!
//! ```text
//! Idle -> InputWritten -> AwaitingExit -> OutputReady
//!                                      \-> Failed
//! ```
//!
//! Ordering: the request is fully written and stdin half-closed before the
//! child is awaited, so a node that reads to EOF cannot deadlock against us.
//! Stdout and stderr are drained concurrently with the wait into in-memory
//! buffers (no streaming backpressure); the buffers are complete once the
//! child has exited.

use std::process::Stdio;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{Result, WeftError};

use super::NodeSpec;

/// Protocol phase of one node exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Nothing has happened yet
    Idle,
    /// Request written and stdin half-closed
    InputWritten,
    /// Waiting for the child to exit while draining its output streams
    AwaitingExit,
    /// Child exited 0 and its stdout decoded as JSON
    OutputReady,
    /// Spawn failure, stream failure, non-zero exit, or undecodable output
    Failed,
}

/// One request/response exchange with a node subprocess.
///
/// A channel performs a single exchange; create a fresh one per invocation.
#[derive(Debug)]
pub struct NodeChannel {
    /// Program to execute
    command: String,
    /// Program arguments
    args: Vec<String>,
    /// Environment variables for the child process
    env: FxHashMap<String, String>,
    /// Working directory for the child process
    cwd: Option<String>,
    state: ChannelState,
}

impl NodeChannel {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: FxHashMap::default(),
            cwd: None,
            state: ChannelState::Idle,
        }
    }

    /// Build a channel from a step's node spec.
    ///
    /// Fails when the spec names no program (empty command).
    pub fn from_spec(spec: &NodeSpec) -> Result<Self> {
        let (command, args) = spec.command_line().ok_or_else(|| WeftError::NodeSpawn {
            node: spec.to_string(),
            reason: "empty node command".to_string(),
        })?;

        let mut channel = Self {
            command,
            args,
            env: FxHashMap::default(),
            cwd: None,
            state: ChannelState::Idle,
        };
        if let NodeSpec::Detailed { env, cwd, .. } = spec {
            channel.env = env.clone();
            channel.cwd = cwd.clone();
        }
        Ok(channel)
    }

    /// Add an environment variable to the child process.
    ///
    /// Can be chained for multiple variables.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Set the child's working directory
    pub fn with_cwd(mut self, cwd: &str) -> Self {
        self.cwd = Some(cwd.to_string());
        self
    }

    /// Current protocol phase
    pub fn state(&self) -> ChannelState {
        self.state
    }

    fn display_name(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    fn stream_failure(&mut self, node: &str, err: std::io::Error) -> WeftError {
        self.state = ChannelState::Failed;
        WeftError::NodeIo {
            node: node.to_string(),
            reason: err.to_string(),
        }
    }

    /// Run the full exchange: spawn, write request, half-close, await exit,
    /// decode response.
    #[instrument(skip(self, params), fields(node = %self.command))]
    pub async fn exchange(&mut self, params: &Value) -> Result<Value> {
        let node = self.display_name();

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            self.state = ChannelState::Failed;
            WeftError::NodeSpawn {
                node: node.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.stream_failure(&node, unavailable("stdin")))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.stream_failure(&node, unavailable("stdout")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.stream_failure(&node, unavailable("stderr")))?;

        let payload = serde_json::to_vec(params).map_err(|e| {
            self.state = ChannelState::Failed;
            WeftError::Protocol {
                node: node.clone(),
                details: format!("request not serializable: {e}"),
            }
        })?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| self.stream_failure(&node, e))?;
        stdin
            .shutdown()
            .await
            .map_err(|e| self.stream_failure(&node, e))?;
        drop(stdin);
        self.state = ChannelState::InputWritten;
        debug!(bytes = payload.len(), "request written, stdin half-closed");

        self.state = ChannelState::AwaitingExit;
        let (status, out, err) = tokio::join!(
            child.wait(),
            async {
                let mut buf = Vec::new();
                stdout.read_to_end(&mut buf).await.map(|_| buf)
            },
            async {
                let mut buf = Vec::new();
                stderr.read_to_end(&mut buf).await.map(|_| buf)
            },
        );

        let status = status.map_err(|e| self.stream_failure(&node, e))?;
        let err = err.map_err(|e| self.stream_failure(&node, e))?;
        debug!(?status, "node exited");

        if !status.success() {
            self.state = ChannelState::Failed;
            return Err(WeftError::NodeFailure {
                node,
                status: status.code(),
                stderr: String::from_utf8_lossy(&err).trim_end().to_string(),
            });
        }

        let out = out.map_err(|e| self.stream_failure(&node, e))?;
        match serde_json::from_slice(&out) {
            Ok(value) => {
                self.state = ChannelState::OutputReady;
                Ok(value)
            }
            Err(e) => {
                self.state = ChannelState::Failed;
                Err(WeftError::Protocol {
                    node,
                    details: e.to_string(),
                })
            }
        }
    }
}

fn unavailable(stream: &str) -> std::io::Error {
    std::io::Error::other(format!("child {stream} unavailable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_starts_idle() {
        let channel = NodeChannel::new("echo", &["hello"]);
        assert_eq!(channel.state(), ChannelState::Idle);
    }

    #[test]
    fn channel_with_env() {
        let channel = NodeChannel::new("node", &[]).with_env("KEY", "value");
        assert_eq!(channel.env.get("KEY"), Some(&"value".to_string()));
    }

    #[test]
    fn from_spec_rejects_empty_command() {
        let spec = NodeSpec::Command("   ".to_string());
        let err = NodeChannel::from_spec(&spec).unwrap_err();
        assert!(matches!(err, WeftError::NodeSpawn { .. }));
    }

    #[tokio::test]
    async fn exchange_success_decodes_stdout() {
        let mut channel = NodeChannel::new(
            "sh",
            &["-c", r#"cat >/dev/null; printf '{"ok": true, "n": 3}'"#],
        );
        let result = channel.exchange(&json!({})).await.unwrap();
        assert_eq!(result, json!({"ok": true, "n": 3}));
        assert_eq!(channel.state(), ChannelState::OutputReady);
    }

    #[tokio::test]
    async fn exchange_feeds_params_on_stdin() {
        // `cat` echoes the request document back as the response
        let mut channel = NodeChannel::new("cat", &[]);
        let params = json!({"a": 1, "b": [true, null]});
        let result = channel.exchange(&params).await.unwrap();
        assert_eq!(result, params);
    }

    #[tokio::test]
    async fn exchange_nonzero_exit_is_node_failure() {
        let mut channel = NodeChannel::new(
            "sh",
            &["-c", "cat >/dev/null; echo boom >&2; exit 7"],
        );
        let err = channel.exchange(&json!({})).await.unwrap_err();
        match &err {
            WeftError::NodeFailure {
                status, stderr, ..
            } => {
                assert_eq!(*status, Some(7));
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected NodeFailure, got {other:?}"),
        }
        assert!(err.is_node_failure());
        assert_eq!(channel.state(), ChannelState::Failed);
    }

    #[tokio::test]
    async fn exchange_stdout_ignored_on_failure() {
        // stdout holds valid JSON, but the exit code wins
        let mut channel = NodeChannel::new(
            "sh",
            &["-c", r#"cat >/dev/null; printf '{"x":1}'; exit 1"#],
        );
        let err = channel.exchange(&json!({})).await.unwrap_err();
        assert!(err.is_node_failure());
        assert!(!err.is_protocol());
    }

    #[tokio::test]
    async fn exchange_invalid_json_is_protocol_error() {
        let mut channel = NodeChannel::new(
            "sh",
            &["-c", "cat >/dev/null; printf 'not json at all'"],
        );
        let err = channel.exchange(&json!({})).await.unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(channel.state(), ChannelState::Failed);
    }

    #[tokio::test]
    async fn exchange_empty_stdout_is_protocol_error() {
        let mut channel = NodeChannel::new("sh", &["-c", "cat >/dev/null"]);
        let err = channel.exchange(&json!({})).await.unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn exchange_spawn_failure() {
        let mut channel = NodeChannel::new("weft-no-such-binary", &[]);
        let err = channel.exchange(&json!({})).await.unwrap_err();
        assert!(matches!(err, WeftError::NodeSpawn { .. }));
        assert_eq!(channel.state(), ChannelState::Failed);
    }

    #[tokio::test]
    async fn exchange_with_env_var() {
        let mut channel = NodeChannel::new(
            "sh",
            &["-c", r#"cat >/dev/null; printf '{"who": "%s"}' "$WHO""#],
        )
        .with_env("WHO", "weft");
        let result = channel.exchange(&json!({})).await.unwrap();
        assert_eq!(result, json!({"who": "weft"}));
    }
}
