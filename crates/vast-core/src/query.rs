//! Filter expression compiler.
//!
//! Turns a human-typed expression such as
//! `reliability > 0.98 num_gpus=1 gpu_name=RTX_3090 rented=False`
//! into the nested `{field: {op: value}}` object the search endpoint expects.

use crate::errors::QueryError;
use crate::fields::FieldTable;
use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

const WILDCARDS: [&str; 3] = ["any", "*", "?"];

/// Comparison operators understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl Operator {
    /// Map a symbolic or word-form operator onto its canonical name.
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            ">=" | "gte" => Operator::Gte,
            ">" | "gt" => Operator::Gt,
            "<=" | "lte" => Operator::Lte,
            "<" | "lt" => Operator::Lt,
            "!=" | "neq" | "noteq" | "not eq" => Operator::Neq,
            "==" | "=" | "eq" => Operator::Eq,
            "in" => Operator::In,
            "notin" | "not in" | "nin" => Operator::NotIn,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "notin",
        }
    }

    /// `in` and `notin` always carry a list value.
    pub fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraints on a single field, keyed by operator.
pub type Constraints = BTreeMap<Operator, Value>;

/// Structured filter: canonical field name -> operator -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterQuery(BTreeMap<String, Constraints>);

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed used by `search offers` unless the caller opts out.
    pub fn offer_defaults() -> Self {
        let mut query = Self::new();
        query.insert("verified", Operator::Eq, Value::Bool(true));
        query.insert("external", Operator::Eq, Value::Bool(false));
        query.insert("rentable", Operator::Eq, Value::Bool(true));
        query
    }

    /// Set `field op value`, replacing any earlier value for the same pair.
    pub fn insert(&mut self, field: impl Into<String>, op: Operator, value: Value) {
        self.0.entry(field.into()).or_default().insert(op, value);
    }

    pub fn get(&self, field: &str) -> Option<&Constraints> {
        self.0.get(field)
    }

    pub fn remove_field(&mut self, field: &str) -> Option<Constraints> {
        self.0.remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Constraints)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Value {
        let fields = self
            .0
            .iter()
            .map(|(field, constraints)| {
                let ops = constraints
                    .iter()
                    .map(|(op, value)| (op.as_str().to_string(), value.clone()))
                    .collect();
                (field.clone(), Value::Object(ops))
            })
            .collect();
        Value::Object(fields)
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub query: FilterQuery,
    /// One message per field missing from the recognized set.
    pub warnings: Vec<String>,
}

/// Compiles filter expressions against one [`FieldTable`].
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    fields: FieldTable,
}

impl QueryCompiler {
    pub fn new(fields: FieldTable) -> Self {
        Self { fields }
    }

    pub fn offers() -> Self {
        Self::new(FieldTable::offers())
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    /// Compile command-line words, joined with single spaces first.
    pub fn compile_args<S: AsRef<str>>(
        &self,
        parts: &[S],
        base: FilterQuery,
    ) -> Result<Compiled, QueryError> {
        let joined = parts
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.compile(&joined, base)
    }

    /// Compile `expr` on top of `base`.
    pub fn compile(&self, expr: &str, base: FilterQuery) -> Result<Compiled, QueryError> {
        let input = expr.trim();
        debug!("Compiling filter expression: {:?}", input);

        let mut compiled = Compiled {
            query: base,
            warnings: Vec::new(),
        };
        for token in tokenize(input)? {
            self.apply(token, &mut compiled)?;
        }

        debug!("Compiled {} field constraint(s)", compiled.query.len());
        Ok(compiled)
    }

    fn apply(&self, token: Token<'_>, compiled: &mut Compiled) -> Result<(), QueryError> {
        trace!("Token: {:?}", token);
        let raw = unquote(token.value.trim_matches(|c| matches!(c, ',' | '[' | ']')));
        let field = self.fields.resolve(token.field);

        if !self.fields.is_recognized(field) {
            debug!("Unrecognized field {}", field);
            compiled.warnings.push(format!(
                "Unrecognized field: {}, see list of recognized fields.",
                field
            ));
        }

        let op = Operator::from_token(token.op)
            .ok_or_else(|| QueryError::UnknownOperator(token.op.to_string()))?;

        if WILDCARDS.contains(&raw) {
            if op != Operator::Eq {
                return Err(QueryError::WildcardOperatorMismatch {
                    field: field.to_string(),
                    op,
                });
            }
            compiled.query.remove_field(field);
            return Ok(());
        }

        let value = if op.is_list() {
            let items: Vec<Value> = raw
                .split(',')
                .map(|item| unquote(item.trim()))
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(decode_spaces(item)))
                .collect();
            if items.is_empty() {
                return Err(blank_value(field, token.op));
            }
            Value::Array(items)
        } else {
            if raw.is_empty() {
                return Err(blank_value(field, token.op));
            }
            if field.is_empty() {
                return Err(QueryError::BlankField {
                    op: token.op.to_string(),
                    value: raw.to_string(),
                });
            }
            match self.fields.multiplier(field) {
                Some(factor) => scale(field, raw, factor)?,
                None => coerce_scalar(raw),
            }
        };

        compiled.query.insert(field, op, value);
        Ok(())
    }
}

#[derive(Debug)]
struct Token<'a> {
    field: &'a str,
    op: &'a str,
    value: &'a str,
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"([a-zA-Z0-9_]+)",
            r"( *[=><!]+| +(?:[lg]te?|nin|neq|eq|not ?eq|not ?in|in) )?",
            r"( *)",
            r#"(\[[^\]]+\]|"[^"]*"|'[^']*'|[^ =<>!]+)?"#,
            r"( *)",
        ))
        .expect("filter token pattern is a valid regex")
    })
}

/// Split `input` into `field op value` triples. Every character of the input
/// must belong to some match, otherwise the whole expression is rejected.
fn tokenize(input: &str) -> Result<Vec<Token<'_>>, QueryError> {
    let mut consumed = String::with_capacity(input.len());
    let mut tokens = Vec::new();

    for caps in token_pattern().captures_iter(input) {
        for group in caps.iter().skip(1).flatten() {
            consumed.push_str(group.as_str());
        }
        tokens.push(Token {
            field: caps.get(1).map_or("", |m| m.as_str()),
            op: caps.get(2).map_or("", |m| m.as_str().trim()),
            value: caps.get(4).map_or("", |m| m.as_str()),
        });
    }

    if consumed != input {
        return Err(QueryError::UnconsumedText {
            consumed,
            input: input.to_string(),
        });
    }
    Ok(tokens)
}

fn blank_value(field: &str, op: &str) -> QueryError {
    QueryError::BlankValue {
        field: field.to_string(),
        op: op.to_string(),
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn decode_spaces(value: &str) -> String {
    value.replace('_', " ")
}

fn scale(field: &str, raw: &str, factor: f64) -> Result<Value, QueryError> {
    let invalid = || QueryError::InvalidNumber {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let number = raw.parse::<f64>().map_err(|_| invalid())?;
    Number::from_f64(number * factor)
        .map(Value::Number)
        .ok_or_else(invalid)
}

fn coerce_scalar(raw: &str) -> Value {
    match raw {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        "None" | "null" => Value::Null,
        other => Value::String(decode_spaces(other)),
    }
}
