//! Weft Error Types with Error Codes
//!
//! Error code ranges:
//! - WEFT-001-009: Program errors (parsing, file lookup)
//! - WEFT-010-019: Step configuration errors
//! - WEFT-020-029: Expression errors (parse, lookup)
//! - WEFT-030-039: Node invocation errors (spawn, exit, protocol)
//! - WEFT-090-099: IO adapter errors
//!
//! Every error carries a stable bracketed code so failures stay greppable
//! across message rewording. The four classes the step engine distinguishes
//! (configuration, expression, node execution failure, protocol violation)
//! are exposed as predicates for callers and tests.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeftError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum WeftError {
    // ═══════════════════════════════════════════
    // PROGRAM ERRORS (001-009)
    // ═══════════════════════════════════════════
    #[error("[WEFT-001] Failed to parse program: {details}")]
    #[diagnostic(
        code(weft::parse_error),
        help("Check YAML syntax: indentation and quoting")
    )]
    ParseError { details: String },

    #[error("[WEFT-002] Program file not found: {path}")]
    #[diagnostic(code(weft::program_not_found), help("Check the file path exists"))]
    ProgramNotFound { path: String },

    // ═══════════════════════════════════════════
    // STEP CONFIGURATION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[WEFT-010] missing node attribute on step '{step}'")]
    #[diagnostic(
        code(weft::missing_node),
        help("Every step needs a 'node:' naming the program to invoke")
    )]
    MissingNode { step: String },

    #[error("[WEFT-011] Invalid '{section}' spec: expected a mapping or string, got {found}")]
    #[diagnostic(
        code(weft::invalid_param_spec),
        help("'in:' and 'out:' accept a single templated string or a mapping of them")
    )]
    InvalidParamSpec {
        section: &'static str,
        found: &'static str,
    },

    #[error("[WEFT-012] Invalid 'out' entry for key '{key}': expected an assignment string, got {found}")]
    #[diagnostic(
        code(weft::invalid_assign_text),
        help("Each 'out:' value must be a string assigning into the environment")
    )]
    InvalidAssignText { key: String, found: &'static str },

    // ═══════════════════════════════════════════
    // EXPRESSION ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[WEFT-020] Expression parse error at position {position}: {details}")]
    #[diagnostic(
        code(weft::expr_parse),
        help("Expressions are identifiers, literals, or dotted/indexed paths; quote literal text")
    )]
    ExprParse { position: usize, details: String },

    #[error("[WEFT-021] Undefined variable '{name}'")]
    #[diagnostic(
        code(weft::undefined_var),
        help("The variable must be set by an earlier step's 'out:' before it is read")
    )]
    UndefinedVar { name: String },

    #[error("[WEFT-022] Cannot traverse '{segment}' on {value_type} (expected mapping/sequence) in '{path}'")]
    InvalidTraversal {
        segment: String,
        value_type: &'static str,
        path: String,
    },

    #[error("[WEFT-023] Path '{path}' not found")]
    PathNotFound { path: String },

    #[error("[WEFT-024] Expected an assignment ('name = expression'), got '{expr}'")]
    #[diagnostic(
        code(weft::expected_assignment),
        help("'out:' templates must assign into the environment")
    )]
    ExpectedAssignment { expr: String },

    // ═══════════════════════════════════════════
    // NODE INVOCATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[WEFT-030] Node '{node}' failed to start: {reason}")]
    #[diagnostic(
        code(weft::node_spawn),
        help("Check the node command exists and is executable")
    )]
    NodeSpawn { node: String, reason: String },

    #[error("[WEFT-031] Node '{node}' failed{}: {stderr}", status.map(|s| format!(" with exit code {s}")).unwrap_or_default())]
    #[diagnostic(
        code(weft::node_failure),
        help("The captured text is the node's stderr; check the node's own logs")
    )]
    NodeFailure {
        node: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("[WEFT-032] Node '{node}' stream error: {reason}")]
    NodeIo { node: String, reason: String },

    #[error("[WEFT-033] Node '{node}' protocol violation: {details}")]
    #[diagnostic(
        code(weft::protocol),
        help("A node exiting 0 must write exactly one JSON document to stdout")
    )]
    Protocol { node: String, details: String },

    // ═══════════════════════════════════════════
    // IO ADAPTER ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[WEFT-090] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[WEFT-091] YAML parse error: {0}")]
    #[diagnostic(
        code(weft::yaml_parse),
        help("Check YAML syntax: indentation must be consistent, strings with special chars need quoting")
    )]
    YamlParse(#[from] serde_yaml::Error),
}

impl WeftError {
    /// Get the error code (e.g., "WEFT-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "WEFT-001",
            Self::ProgramNotFound { .. } => "WEFT-002",
            Self::MissingNode { .. } => "WEFT-010",
            Self::InvalidParamSpec { .. } => "WEFT-011",
            Self::InvalidAssignText { .. } => "WEFT-012",
            Self::ExprParse { .. } => "WEFT-020",
            Self::UndefinedVar { .. } => "WEFT-021",
            Self::InvalidTraversal { .. } => "WEFT-022",
            Self::PathNotFound { .. } => "WEFT-023",
            Self::ExpectedAssignment { .. } => "WEFT-024",
            Self::NodeSpawn { .. } => "WEFT-030",
            Self::NodeFailure { .. } => "WEFT-031",
            Self::NodeIo { .. } => "WEFT-032",
            Self::Protocol { .. } => "WEFT-033",
            Self::Io(_) => "WEFT-090",
            Self::YamlParse(_) => "WEFT-091",
        }
    }

    /// Malformed step or program: raised before any external side effect
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ParseError { .. }
                | Self::ProgramNotFound { .. }
                | Self::MissingNode { .. }
                | Self::InvalidParamSpec { .. }
                | Self::InvalidAssignText { .. }
                | Self::YamlParse(_)
        )
    }

    /// The evaluator could not parse or resolve a templated value
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::ExprParse { .. }
                | Self::UndefinedVar { .. }
                | Self::InvalidTraversal { .. }
                | Self::PathNotFound { .. }
                | Self::ExpectedAssignment { .. }
        )
    }

    /// The node process could not run or exited non-zero
    pub fn is_node_failure(&self) -> bool {
        matches!(
            self,
            Self::NodeSpawn { .. } | Self::NodeFailure { .. } | Self::NodeIo { .. }
        )
    }

    /// The node exited 0 but violated the wire contract
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

impl FixSuggestion for WeftError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WeftError::ParseError { .. } => Some("Check YAML syntax: indentation and quoting"),
            WeftError::ProgramNotFound { .. } => Some("Check the file path exists"),
            WeftError::MissingNode { .. } => {
                Some("Add a 'node:' entry naming the program to invoke")
            }
            WeftError::InvalidParamSpec { .. } => {
                Some("Use a single templated string or a mapping for 'in:'/'out:'")
            }
            WeftError::InvalidAssignText { .. } => {
                Some("Each 'out:' value must be an assignment string")
            }
            WeftError::ExprParse { .. } => {
                Some("Quote literal text ('hello world') or wrap expressions in ${{ }}")
            }
            WeftError::UndefinedVar { .. } => {
                Some("Set the variable with an earlier step's 'out:' before reading it")
            }
            WeftError::InvalidTraversal { .. } => {
                Some("Check the path - accessing a field on a non-container value")
            }
            WeftError::PathNotFound { .. } => {
                Some("Check the field or index exists in the referenced value")
            }
            WeftError::ExpectedAssignment { .. } => {
                Some("'out:' templates must look like 'name = expression'")
            }
            WeftError::NodeSpawn { .. } => Some("Check the node command exists and is executable"),
            WeftError::NodeFailure { .. } => {
                Some("The node exited non-zero; its stderr is the captured context")
            }
            WeftError::NodeIo { .. } => Some("Check the node keeps its standard streams open"),
            WeftError::Protocol { .. } => {
                Some("A node exiting 0 must write exactly one JSON document to stdout")
            }
            WeftError::Io(_) => Some("Check file path and permissions"),
            WeftError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}
