//! Template and expression parsing
//!
//! A templated string is scanned for `${{ ... }}` blocks with a pre-compiled
//! regex; block contents (and bare strings with no delimiter at all) go
//! through a hand-rolled lexer and a small recursive-descent parser.
//!
//! Bare strings that do not lex as one expression are parse errors, not
//! literals - quoted literals (`'hello world'`) carry literal text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, WeftError};

use super::ast::{Assign, Expr, PathExpr, Segment, Template, TemplatePart};

/// Pre-compiled regex for `${{ expr }}` blocks
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{\{(.*?)\}\}").unwrap());

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,
    Dot,
    LBracket,
    RBracket,
    Eq,
}

fn parse_error(position: usize, details: impl Into<String>) -> WeftError {
    WeftError::ExprParse {
        position,
        details: details.into(),
    }
}

/// Tokenize an expression source into (token, byte position) pairs
fn lex(src: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push((Token::Dot, i));
            }
            '[' => {
                chars.next();
                tokens.push((Token::LBracket, i));
            }
            ']' => {
                chars.next();
                tokens.push((Token::RBracket, i));
            }
            '=' => {
                chars.next();
                tokens.push((Token::Eq, i));
            }
            '\'' | '"' => {
                chars.next();
                tokens.push((lex_string(&mut chars, i, ch)?, i));
            }
            c if c.is_ascii_digit() || c == '-' => {
                tokens.push((lex_number(src, &mut chars, i)?, i));
            }
            c if c.is_alphabetic() || c == '_' => {
                tokens.push((lex_ident(src, &mut chars, i), i));
            }
            other => {
                return Err(parse_error(i, format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    start: usize,
    quote: char,
) -> Result<Token> {
    let mut text = String::new();
    loop {
        match chars.next() {
            Some((_, c)) if c == quote => return Ok(Token::Str(text)),
            Some((pos, '\\')) => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, '\\')) => text.push('\\'),
                Some((_, c)) if c == quote => text.push(c),
                Some((esc_pos, c)) => {
                    return Err(parse_error(esc_pos, format!("unknown escape '\\{c}'")));
                }
                None => return Err(parse_error(pos, "unterminated string literal")),
            },
            Some((_, c)) => text.push(c),
            None => return Err(parse_error(start, "unterminated string literal")),
        }
    }
}

fn lex_number(
    src: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    start: usize,
) -> Result<Token> {
    let mut end = start;
    let mut is_float = false;

    if let Some(&(_, '-')) = chars.peek() {
        chars.next();
        end += 1;
    }
    let mut saw_digit = false;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() {
            saw_digit = true;
            chars.next();
            end = i + c.len_utf8();
        } else if c == '.' && !is_float {
            // Lookahead: only consume the dot when a digit follows, so a
            // trailing `.field` path segment after a number stays an error at
            // the parser level, not a silent float.
            let mut ahead = chars.clone();
            ahead.next();
            match ahead.peek() {
                Some(&(_, d)) if d.is_ascii_digit() => {
                    is_float = true;
                    chars.next();
                    end = i + 1;
                }
                _ => break,
            }
        } else {
            break;
        }
    }

    if !saw_digit {
        return Err(parse_error(start, "expected digits after '-'"));
    }

    let text = &src[start..end];
    if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|e| parse_error(start, format!("invalid number '{text}': {e}")))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|e| parse_error(start, format!("invalid number '{text}': {e}")))
    }
}

fn lex_ident(
    src: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    start: usize,
) -> Token {
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            chars.next();
            end = i + c.len_utf8();
        } else {
            break;
        }
    }

    match &src[start..end] {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        ident => Token::Ident(ident.to_string()),
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self> {
        Ok(Self {
            tokens: lex(src)?,
            pos: 0,
            end: src.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|&(_, p)| p)
            .unwrap_or(self.end)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let position = self.position();
        match self.next() {
            Some((Token::Int(n), _)) => Ok(Expr::Literal(Value::from(n))),
            Some((Token::Float(n), _)) => Ok(Expr::Literal(Value::from(n))),
            Some((Token::Str(s), _)) => Ok(Expr::Literal(Value::String(s))),
            Some((Token::True, _)) => Ok(Expr::Literal(Value::Bool(true))),
            Some((Token::False, _)) => Ok(Expr::Literal(Value::Bool(false))),
            Some((Token::Null, _)) => Ok(Expr::Literal(Value::Null)),
            Some((Token::Ident(root), _)) => self.parse_segments(root),
            Some((token, pos)) => Err(parse_error(pos, format!("unexpected {token:?}"))),
            None => Err(parse_error(position, "expected an expression")),
        }
    }

    fn parse_segments(&mut self, root: String) -> Result<Expr> {
        let mut segments = Vec::new();

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    let position = self.position();
                    match self.next() {
                        Some((Token::Ident(key), _)) => segments.push(Segment::Key(key)),
                        Some((Token::Int(n), pos)) => {
                            let index = usize::try_from(n)
                                .map_err(|_| parse_error(pos, "negative index"))?;
                            segments.push(Segment::Index(index));
                        }
                        _ => return Err(parse_error(position, "expected field name after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.next();
                    let position = self.position();
                    match self.next() {
                        Some((Token::Int(n), pos)) => {
                            let index = usize::try_from(n)
                                .map_err(|_| parse_error(pos, "negative index"))?;
                            segments.push(Segment::Index(index));
                        }
                        _ => return Err(parse_error(position, "expected index after '['")),
                    }
                    let position = self.position();
                    match self.next() {
                        Some((Token::RBracket, _)) => {}
                        _ => return Err(parse_error(position, "expected closing ']'")),
                    }
                }
                _ => break,
            }
        }

        Ok(Expr::Path(PathExpr { root, segments }))
    }

    fn expect_eof(&mut self) -> Result<()> {
        match self.next() {
            None => Ok(()),
            Some((token, pos)) => Err(parse_error(pos, format!("unexpected trailing {token:?}"))),
        }
    }
}

/// Parse a full string as one expression
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(src)?;
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse an assignment statement, accepting an optional `${{ }}` wrapper
pub fn parse_assign(src: &str) -> Result<Assign> {
    let inner = single_block(src).unwrap_or(src);
    let mut parser = Parser::new(inner)?;

    let target = match parser.next() {
        Some((Token::Ident(name), _)) => name,
        _ => {
            return Err(WeftError::ExpectedAssignment {
                expr: src.trim().to_string(),
            })
        }
    };
    match parser.next() {
        Some((Token::Eq, _)) => {}
        _ => {
            return Err(WeftError::ExpectedAssignment {
                expr: src.trim().to_string(),
            })
        }
    }

    let value = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(Assign { target, value })
}

/// Parse a templated string: a single expression, or text with `${{ }}` blocks
pub fn parse_template(src: &str) -> Result<Template> {
    if let Some(inner) = single_block(src) {
        return Ok(Template::Value(parse_expr(inner)?));
    }
    if !BLOCK_RE.is_match(src) {
        return Ok(Template::Value(parse_expr(src)?));
    }

    let mut parts = Vec::new();
    let mut last_end = 0;
    for cap in BLOCK_RE.captures_iter(src) {
        let m = cap.get(0).expect("capture 0 always present");
        if m.start() > last_end {
            parts.push(TemplatePart::Text(src[last_end..m.start()].to_string()));
        }
        parts.push(TemplatePart::Expr(parse_expr(&cap[1])?));
        last_end = m.end();
    }
    if last_end < src.len() {
        parts.push(TemplatePart::Text(src[last_end..].to_string()));
    }

    Ok(Template::Interpolate(parts))
}

/// When the whole (trimmed) input is exactly one `${{ }}` block, return its
/// inner expression text.
fn single_block(src: &str) -> Option<&str> {
    let trimmed = src.trim();
    let cap = BLOCK_RE.captures(trimmed)?;
    let m = cap.get(0)?;
    if m.start() == 0 && m.end() == trimmed.len() {
        Some(cap.get(1)?.as_str())
    } else {
        None
    }
}
