//! Sandboxed template/expression evaluator (§4.1 "Template language", §9
//! "Sandbox-free expression evaluation" re-architecture note).
//!
//! The source evaluates arbitrary user strings as host-language code. This
//! replaces that with a closed grammar: a dotted/indexed path into
//! `input`/`steps`/`env`/`now`, optionally compared against a literal.
//! Nothing here can reach host state beyond the `StepContext` it's given.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use serde_json::Value;

/// The read-only context passed to every node (§4.1 "Step context").
#[derive(Debug, Clone)]
pub struct StepContext {
    pub input: Value,
    pub steps: HashMap<String, StepOutcome>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub output: Value,
    pub status: String,
}

impl StepContext {
    pub fn as_value(&self) -> Value {
        let steps: serde_json::Map<String, Value> = self
            .steps
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    serde_json::json!({ "output": v.output, "status": v.status }),
                )
            })
            .collect();
        let env: serde_json::Map<String, Value> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "input": self.input,
            "steps": Value::Object(steps),
            "env": Value::Object(env),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Dot,
    LBracket,
    RBracket,
    Str(String),
    Num(f64),
    Op(String),
    True,
    False,
}

#[derive(Debug)]
pub struct ExprError(String);

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.trim().chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ExprError("unterminated string literal".into()));
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            '>' | '<' | '=' | '!' => {
                let mut op = String::from(c);
                i += 1;
                if i < chars.len() && chars[i] == '=' {
                    op.push('=');
                    i += 1;
                }
                tokens.push(Token::Op(op));
            }
            c if c.is_ascii_digit() || (c == '-' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n: f64 = s.parse().map_err(|_| ExprError(format!("bad number {s}")))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                match s.as_str() {
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    _ => tokens.push(Token::Ident(s)),
                }
            }
            other => return Err(ExprError(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone)]
enum PathSegment {
    Field(String),
    Index(String),
}

#[derive(Debug, Clone)]
struct Path {
    root: String,
    segments: Vec<PathSegment>,
}

fn parse_path(tokens: &[Token], pos: &mut usize) -> Result<Path, ExprError> {
    let root = match tokens.get(*pos) {
        Some(Token::Ident(s)) => s.clone(),
        _ => return Err(ExprError("expected identifier".into())),
    };
    *pos += 1;
    let mut segments = Vec::new();
    loop {
        match tokens.get(*pos) {
            Some(Token::Dot) => {
                *pos += 1;
                match tokens.get(*pos) {
                    Some(Token::Ident(s)) => {
                        segments.push(PathSegment::Field(s.clone()));
                        *pos += 1;
                    }
                    _ => return Err(ExprError("expected identifier after '.'".into())),
                }
            }
            Some(Token::LBracket) => {
                *pos += 1;
                match tokens.get(*pos) {
                    Some(Token::Str(s)) => {
                        segments.push(PathSegment::Index(s.clone()));
                        *pos += 1;
                    }
                    _ => return Err(ExprError("expected string literal in '[...]'".into())),
                }
                match tokens.get(*pos) {
                    Some(Token::RBracket) => *pos += 1,
                    _ => return Err(ExprError("expected ']'".into())),
                }
            }
            _ => break,
        }
    }
    Ok(Path { root, segments })
}

#[derive(Debug, Clone)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Path(Path),
    Now,
    Comparison {
        left: Path,
        op: String,
        right: Literal,
    },
}

/// Parse a single navigation path, e.g. `input.a.b`, `steps["k"].output.x`.
/// Used for `{{expr}}` template interpolation, which only ever allows a bare
/// path — no comparisons.
pub fn parse_template_expr(src: &str) -> Result<Expr, ExprError> {
    if src.trim() == "now" {
        return Ok(Expr::Now);
    }
    let tokens = tokenize(src)?;
    let mut pos = 0;
    let path = parse_path(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(ExprError("trailing tokens after path".into()));
    }
    Ok(Expr::Path(path))
}

/// Parse a condition expression: a bare path (truthiness) or a single
/// comparison against a literal.
pub fn parse_condition_expr(src: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(src)?;
    let mut pos = 0;
    let path = parse_path(&tokens, &mut pos)?;
    if pos == tokens.len() {
        return Ok(Expr::Path(path));
    }
    let op = match tokens.get(pos) {
        Some(Token::Op(op)) => op.clone(),
        _ => return Err(ExprError("expected comparison operator".into())),
    };
    pos += 1;
    let literal = match tokens.get(pos) {
        Some(Token::Str(s)) => Literal::Str(s.clone()),
        Some(Token::Num(n)) => Literal::Num(*n),
        Some(Token::True) => Literal::Bool(true),
        Some(Token::False) => Literal::Bool(false),
        _ => return Err(ExprError("expected literal".into())),
    };
    pos += 1;
    if pos != tokens.len() {
        return Err(ExprError("trailing tokens after comparison".into()));
    }
    Ok(Expr::Comparison {
        left: path,
        op,
        right: literal,
    })
}

fn resolve_path(ctx_value: &Value, path: &Path) -> Option<Value> {
    let mut current = ctx_value.get(&path.root)?.clone();
    for segment in &path.segments {
        let key = match segment {
            PathSegment::Field(f) => f.as_str(),
            PathSegment::Index(i) => i.as_str(),
        };
        current = current.get(key)?.clone();
    }
    Some(current)
}

fn value_to_template_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluate a `{{expr}}` template path. Per §4.1, a failed lookup resolves
/// to the empty string rather than an error or panic.
pub fn eval_template(expr: &Expr, ctx: &StepContext) -> String {
    match expr {
        Expr::Now => Utc::now().to_rfc3339(),
        Expr::Path(path) => {
            let ctx_value = ctx.as_value();
            resolve_path(&ctx_value, path)
                .map(|v| value_to_template_string(&v))
                .unwrap_or_default()
        }
        Expr::Comparison { .. } => String::new(),
    }
}

fn compare(left: &Value, op: &str, right: &Literal) -> bool {
    match (left, right) {
        (Value::Number(n), Literal::Num(r)) => {
            let l = n.as_f64().unwrap_or(f64::NAN);
            match op {
                ">" => l > *r,
                "<" => l < *r,
                ">=" => l >= *r,
                "<=" => l <= *r,
                "==" => l == *r,
                "!=" => l != *r,
                _ => false,
            }
        }
        (Value::String(l), Literal::Str(r)) => match op {
            "==" => l == r,
            "!=" => l != r,
            _ => false,
        },
        (Value::Bool(l), Literal::Bool(r)) => match op {
            "==" => l == r,
            "!=" => l != r,
            _ => false,
        },
        _ => false,
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Evaluate a `CONDITION` expression. Per §4.1, an evaluation failure
/// (missing path) yields `false`, logged by the caller, never an error.
pub fn eval_condition(expr: &Expr, ctx: &StepContext) -> bool {
    let ctx_value = ctx.as_value();
    match expr {
        Expr::Now => true,
        Expr::Path(path) => resolve_path(&ctx_value, path)
            .map(|v| is_truthy(&v))
            .unwrap_or(false),
        Expr::Comparison { left, op, right } => resolve_path(&ctx_value, left)
            .map(|v| compare(&v, op, right))
            .unwrap_or(false),
    }
}

/// Interpolate every `{{expr}}` substring in `template` (§4.1). Each `expr`
/// is parsed fresh per occurrence; a parse failure is treated the same as
/// an evaluation failure — empty string, never propagated.
pub fn interpolate(template: &str, ctx: &StepContext) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if template[i..].starts_with("{{") {
            if let Some(end) = template[i..].find("}}") {
                let inner = &template[i + 2..i + end];
                let replacement = parse_template_expr(inner)
                    .map(|expr| eval_template(&expr, ctx))
                    .unwrap_or_default();
                out.push_str(&replacement);
                i += end + 2;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Recursively interpolate every string leaf of a JSON value (used by
/// `TRANSFORM` and templated `HTTP_REQUEST`/`WEBHOOK` configs).
pub fn interpolate_value(value: &Value, ctx: &StepContext) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, ctx)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate_value(v, ctx)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(input: Value) -> StepContext {
        StepContext {
            input,
            steps: HashMap::new(),
            env: HashMap::new(),
        }
    }

    #[test]
    fn interpolates_simple_path() {
        let c = ctx(serde_json::json!({"x": 1}));
        assert_eq!(interpolate("value={{input.x}}", &c), "value=1");
    }

    #[test]
    fn missing_path_yields_empty_string() {
        let c = ctx(serde_json::json!({}));
        assert_eq!(interpolate("{{input.missing}}", &c), "");
    }

    #[test]
    fn now_resolves_to_rfc3339() {
        let c = ctx(Value::Null);
        let out = interpolate("{{now}}", &c);
        assert!(chrono::DateTime::parse_from_rfc3339(&out).is_ok());
    }

    #[test]
    fn condition_comparison_true() {
        let c = ctx(serde_json::json!({"value": 20}));
        let expr = parse_condition_expr("input.value > 10").unwrap();
        assert!(eval_condition(&expr, &c));
    }

    #[test]
    fn condition_comparison_false() {
        let c = ctx(serde_json::json!({"value": 5}));
        let expr = parse_condition_expr("input.value > 10").unwrap();
        assert!(!eval_condition(&expr, &c));
    }

    #[test]
    fn condition_missing_path_is_false_not_error() {
        let c = ctx(serde_json::json!({}));
        let expr = parse_condition_expr("input.missing > 10").unwrap();
        assert!(!eval_condition(&expr, &c));
    }

    #[test]
    fn steps_output_is_reachable() {
        let mut steps = HashMap::new();
        steps.insert(
            "a".to_string(),
            StepOutcome {
                output: serde_json::json!({"x": 42}),
                status: "COMPLETED".to_string(),
            },
        );
        let c = StepContext {
            input: Value::Null,
            steps,
            env: HashMap::new(),
        };
        assert_eq!(interpolate(r#"{{steps["a"].output.x}}"#, &c), "42");
    }

    #[test]
    fn cannot_escape_to_host_state() {
        // An expression naming anything other than input/steps/env/now
        // simply fails to resolve; there's no reflection path to the host.
        let c = ctx(Value::Null);
        assert_eq!(interpolate("{{std::process::exit}}", &c), "");
    }
}
