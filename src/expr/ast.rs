//! Expression tree for the template sublanguage
//!
//! The grammar is deliberately narrow: literals, identifier lookup, and
//! dotted/indexed access into mapping/sequence values. No arithmetic.

use serde_json::Value;

/// One traversal step into a container value
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Mapping field access: `.field`
    Key(String),
    /// Sequence index access: `[0]` or `.0`
    Index(usize),
}

/// Identifier lookup with optional traversal: `ident(.field | [N])*`
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub root: String,
    pub segments: Vec<Segment>,
}

impl std::fmt::Display for PathExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A single evaluatable expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(PathExpr),
}

/// Assignment statement: `<env-key> = <expression>`
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: String,
    pub value: Expr,
}

/// Fragment of an interpolated template string
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

/// Parsed form of a templated string
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// The whole input is one expression (bare, or a single `${{ }}` block):
    /// evaluation yields the expression's typed value.
    Value(Expr),
    /// Literal text with embedded `${{ }}` blocks: evaluation yields a string.
    Interpolate(Vec<TemplatePart>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_display() {
        let path = PathExpr {
            root: "user".to_string(),
            segments: vec![
                Segment::Key("tags".to_string()),
                Segment::Index(0),
                Segment::Key("name".to_string()),
            ],
        };
        assert_eq!(path.to_string(), "user.tags[0].name");
    }

    #[test]
    fn bare_root_display() {
        let path = PathExpr {
            root: "value".to_string(),
            segments: vec![],
        };
        assert_eq!(path.to_string(), "value");
    }
}
