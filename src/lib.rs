//! Weft - declarative step runner for external nodes
//!
//! A weft program is an ordered list of steps. Each step invokes an external
//! program (a "node") as a subprocess, feeds it resolved input parameters as
//! one JSON document on stdin, and captures one JSON document from its
//! stdout, binding pieces of it back into a shared environment for later
//! steps.
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`env`] | Shared environment mapping + scoped `value` slot |
//! | [`expr`] | `${{ }}` template sublanguage: evaluate (read) / execute (assign) |
//! | [`step`] | Step type, parameter loader/store, step runner |
//! | [`node`] | Node spec, stdio JSON channel, invoker seam |
//! | [`program`] | Program parsing, static validation, sequential executor |
//! | [`event`] | Append-only run audit trail |
//! | [`error`] | Error types with codes and fix suggestions |

pub mod env;
pub mod error;
pub mod event;
pub mod expr;
pub mod node;
pub mod program;
pub mod step;

// Error types
pub use error::{FixSuggestion, Result, WeftError};

// Environment
pub use env::{Env, ResultSlot, RESULT_SLOT};

// Evaluator
pub use expr::{evaluate, execute, Evaluator};

// Step types
pub use step::{load_in_params, store_out_params, Step, StepRunner};

// Node types
pub use node::{ChannelState, NodeChannel, NodeInvoker, NodeSpec, ProcessInvoker};

// Program types
pub use program::{Program, Runner};

// Event types
pub use event::{Event, EventKind, EventLog};
