//! Node subprocess integration
//!
//! A "node" is the external program a step invokes. `NodeSpec` is its
//! configuration (string shorthand or full command/args/env/cwd form),
//! `NodeChannel` drives the wire protocol, and `NodeInvoker` is the seam the
//! Step Runner calls through so tests can substitute a double.

mod channel;

pub use channel::{ChannelState, NodeChannel};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Node configuration on a step.
///
/// Two YAML shapes:
///
/// ```yaml
/// node: python3 tools/fetch.py        # shorthand, split on whitespace
/// ```
///
/// ```yaml
/// node:
///   command: python3
///   args: [tools/fetch.py]
///   env:
///     API_URL: http://localhost:8080
///   cwd: /srv/fetcher
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    /// Whitespace-split command line
    Command(String),
    /// Full form
    Detailed {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: FxHashMap<String, String>,
        #[serde(default)]
        cwd: Option<String>,
    },
}

impl NodeSpec {
    /// Split into (program, args); None when no program is named
    pub fn command_line(&self) -> Option<(String, Vec<String>)> {
        match self {
            NodeSpec::Command(line) => {
                let mut words = line.split_whitespace().map(str::to_string);
                let program = words.next()?;
                Some((program, words.collect()))
            }
            NodeSpec::Detailed { command, args, .. } => {
                if command.trim().is_empty() {
                    None
                } else {
                    Some((command.clone(), args.clone()))
                }
            }
        }
    }
}

impl std::fmt::Display for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSpec::Command(line) => write!(f, "{}", line.trim()),
            NodeSpec::Detailed { command, args, .. } => {
                write!(f, "{command}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// Invocation seam between the Step Runner and the subprocess protocol.
///
/// Production uses [`ProcessInvoker`]; tests record calls or return canned
/// results without launching anything.
#[async_trait]
pub trait NodeInvoker: Send + Sync {
    /// Exchange one request/response pair with the node
    async fn invoke(&self, node: &NodeSpec, params: &Value) -> Result<Value>;
}

/// Invoker that spawns the node as a real subprocess
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

#[async_trait]
impl NodeInvoker for ProcessInvoker {
    async fn invoke(&self, node: &NodeSpec, params: &Value) -> Result<Value> {
        let mut channel = NodeChannel::from_spec(node)?;
        channel.exchange(params).await
    }
}
