//! Parsed selector AST.
//!
//! A selector object parses into a [`Selector`]: a conjunction of
//! [`FieldCondition`]s. Every operator the engine understands is a variant of
//! [`Operator`]; anything else is rejected at parse time with
//! [`QueryError::UnsupportedOperator`].

use crate::normalize::is_operator_object;
use crate::{QueryError, QueryResult};
use regex_lite::{Regex, RegexBuilder};
use serde_json::{Map, Value};

/// Conjunction of conditions. An empty selector matches everything.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub conditions: Vec<FieldCondition>,
}

/// One top-level entry of a selector object.
#[derive(Debug, Clone)]
pub enum FieldCondition {
    /// All operators must hold for the value at `path`.
    Field { path: String, operators: Vec<Operator> },
    And(Vec<Selector>),
    Or(Vec<Selector>),
    Nor(Vec<Selector>),
}

/// Operators applicable to a single field value.
#[derive(Debug, Clone)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Type(JsonType),
    Mod { divisor: i64, remainder: i64 },
    ElemMatch(ElemMatch),
    Size(usize),
    Regex(Regex),
    All(Vec<Value>),
    /// Holds when the wrapped operators do not all hold.
    Not(Vec<Operator>),
}

/// Argument of `$elemMatch`.
#[derive(Debug, Clone)]
pub enum ElemMatch {
    /// Operators applied to each element itself, e.g. `{"$gte": 80}`.
    Value(Vec<Operator>),
    /// A sub-selector applied to each element as a document.
    Document(Selector),
}

/// JSON type names accepted by `$type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" | "bool" => Self::Boolean,
            "number" => Self::Number,
            "integer" | "int" => Self::Integer,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        })
    }

    /// Whether `value` is of this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null)
            | (Self::Boolean, Value::Bool(_))
            | (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_))
            | (Self::Array, Value::Array(_))
            | (Self::Object, Value::Object(_)) => true,
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }
}

impl Selector {
    /// Parses a selector object.
    pub fn parse(selector: &Map<String, Value>) -> QueryResult<Self> {
        let mut conditions = Vec::with_capacity(selector.len());
        for (key, value) in selector {
            let condition = match key.as_str() {
                "$and" => FieldCondition::And(parse_selector_list(key, value)?),
                "$or" => FieldCondition::Or(parse_selector_list(key, value)?),
                "$nor" => FieldCondition::Nor(parse_selector_list(key, value)?),
                op if op.starts_with('$') => {
                    return Err(QueryError::UnsupportedOperator {
                        operator: op.to_string(),
                    });
                }
                path => FieldCondition::Field {
                    path: path.to_string(),
                    operators: parse_field_value(value)?,
                },
            };
            conditions.push(condition);
        }
        Ok(Self { conditions })
    }

    /// Parses a JSON value that must be a selector object.
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Object(map) => Self::parse(map),
            other => Err(QueryError::InvalidQuery(format!(
                "selector must be an object, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

fn parse_selector_list(operator: &str, value: &Value) -> QueryResult<Vec<Selector>> {
    let Value::Array(parts) = value else {
        return Err(QueryError::invalid(operator, "expected an array of selectors"));
    };
    if parts.is_empty() {
        return Err(QueryError::invalid(operator, "expected at least one selector"));
    }
    parts
        .iter()
        .map(|part| match part {
            Value::Object(map) => Selector::parse(map),
            _ => Err(QueryError::invalid(operator, "every entry must be an object")),
        })
        .collect()
}

/// A field's value is either an operator object or a literal to compare
/// with `$eq`.
fn parse_field_value(value: &Value) -> QueryResult<Vec<Operator>> {
    match value {
        Value::Object(map) if is_operator_object(value) => parse_operator_object(map),
        literal => Ok(vec![Operator::Eq(literal.clone())]),
    }
}

fn parse_operator_object(map: &Map<String, Value>) -> QueryResult<Vec<Operator>> {
    let mut operators = Vec::with_capacity(map.len());
    for (op, arg) in map {
        let operator = match op.as_str() {
            "$eq" => Operator::Eq(arg.clone()),
            "$ne" => Operator::Ne(arg.clone()),
            "$gt" => Operator::Gt(arg.clone()),
            "$gte" => Operator::Gte(arg.clone()),
            "$lt" => Operator::Lt(arg.clone()),
            "$lte" => Operator::Lte(arg.clone()),
            "$in" => Operator::In(expect_array(op, arg)?),
            "$nin" => Operator::Nin(expect_array(op, arg)?),
            "$all" => Operator::All(expect_array(op, arg)?),
            "$exists" => match arg {
                Value::Bool(b) => Operator::Exists(*b),
                _ => return Err(QueryError::invalid(op, "expected a boolean")),
            },
            "$type" => {
                let name = arg
                    .as_str()
                    .ok_or_else(|| QueryError::invalid(op, "expected a type name"))?;
                let ty = JsonType::parse(name)
                    .ok_or_else(|| QueryError::invalid(op, format!("unknown type {name:?}")))?;
                Operator::Type(ty)
            }
            "$mod" => parse_mod(arg)?,
            "$size" => {
                let size = arg
                    .as_u64()
                    .ok_or_else(|| QueryError::invalid(op, "expected a non-negative integer"))?;
                let size =
                    usize::try_from(size).map_err(|e| QueryError::invalid(op, e.to_string()))?;
                Operator::Size(size)
            }
            "$regex" => {
                let options = match map.get("$options") {
                    None => "",
                    Some(Value::String(s)) => s.as_str(),
                    Some(_) => return Err(QueryError::invalid("$options", "expected a string")),
                };
                Operator::Regex(parse_regex(arg, options)?)
            }
            // Consumed together with `$regex`.
            "$options" => {
                if !map.contains_key("$regex") {
                    return Err(QueryError::invalid(op, "requires $regex"));
                }
                continue;
            }
            "$elemMatch" => parse_elem_match(arg)?,
            "$not" => match arg {
                Value::Object(inner) if is_operator_object(arg) => {
                    Operator::Not(parse_operator_object(inner)?)
                }
                _ => return Err(QueryError::invalid(op, "expected an operator object")),
            },
            other => {
                return Err(QueryError::UnsupportedOperator {
                    operator: other.to_string(),
                });
            }
        };
        operators.push(operator);
    }
    Ok(operators)
}

fn expect_array(operator: &str, value: &Value) -> QueryResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(QueryError::invalid(operator, "expected an array")),
    }
}

fn parse_mod(arg: &Value) -> QueryResult<Operator> {
    let pair = match arg {
        Value::Array(pair) if pair.len() == 2 => pair,
        _ => return Err(QueryError::invalid("$mod", "expected [divisor, remainder]")),
    };
    let divisor = pair[0]
        .as_i64()
        .ok_or_else(|| QueryError::invalid("$mod", "divisor must be an integer"))?;
    let remainder = pair[1]
        .as_i64()
        .ok_or_else(|| QueryError::invalid("$mod", "remainder must be an integer"))?;
    if divisor == 0 {
        return Err(QueryError::invalid("$mod", "divisor must not be zero"));
    }
    Ok(Operator::Mod { divisor, remainder })
}

fn parse_regex(pattern: &Value, options: &str) -> QueryResult<Regex> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| QueryError::invalid("$regex", "expected a pattern string"))?;
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(QueryError::invalid(
                    "$options",
                    format!("unknown flag {other:?}"),
                ));
            }
        };
    }
    builder
        .build()
        .map_err(|e| QueryError::invalid("$regex", e.to_string()))
}

fn parse_elem_match(arg: &Value) -> QueryResult<Operator> {
    let Value::Object(map) = arg else {
        return Err(QueryError::invalid("$elemMatch", "expected an object"));
    };
    let is_value_match = !map.is_empty()
        && map
            .keys()
            .all(|k| k.starts_with('$') && !matches!(k.as_str(), "$and" | "$or" | "$nor"));
    let elem = if is_value_match {
        ElemMatch::Value(parse_operator_object(map)?)
    } else {
        ElemMatch::Document(Selector::parse(map)?)
    };
    Ok(Operator::ElemMatch(elem))
}
