//! Row filters over scalar columns
//!
//! A [`Predicate`] names columns; binding it against a schema resolves each
//! column to its storage slot and type-checks the literals, producing a
//! [`BoundPredicate`] that evaluates directly against stored values.
//!
//! Comparisons involving a null cell are false, so `NOT (x = 1)` matches
//! rows where `x` is null.

use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{VectorDbError, VectorDbResult};
use crate::schema::{ScalarType, Schema, Value};

#[derive(Parser)]
#[grammar = "query/filter.pest"]
struct FilterParser;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn is_ordering(&self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Unbound filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Compare { column: String, op: CompareOp, value: Value },
    In { column: String, values: Vec<Value> },
    IsNull { column: String },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Parses the textual filter form, e.g. `page >= 3 AND lang IN ('en', 'de')`
    pub fn parse(input: &str) -> VectorDbResult<Self> {
        let mut pairs = FilterParser::parse(Rule::filter, input)
            .map_err(|e| VectorDbError::invalid(format!("malformed filter: {}", e)))?;
        let expr = pairs
            .next()
            .and_then(|filter| filter.into_inner().find(|p| p.as_rule() == Rule::expr))
            .ok_or_else(|| VectorDbError::invalid("empty filter"))?;
        parse_expr(expr)
    }

    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull { column: column.into() }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Resolves columns against `schema` and type-checks literals
    pub fn bind(&self, schema: &Schema) -> VectorDbResult<BoundPredicate> {
        let slot = |column: &str| {
            schema.scalar_slot(column).ok_or_else(|| {
                VectorDbError::invalid(if column == schema.vector_column_name() {
                    format!("cannot filter on vector column '{}'", column)
                } else {
                    format!("unknown column '{}' in filter", column)
                })
            })
        };

        Ok(match self {
            Predicate::Compare { column, op, value } => {
                let (slot, ty) = slot(column)?;
                if op.is_ordering() && !ty.is_ordered() {
                    return Err(VectorDbError::invalid(format!(
                        "operator {} is not defined on {} column '{}'",
                        op.symbol(),
                        ty,
                        column
                    )));
                }
                BoundPredicate::Compare {
                    slot,
                    op: *op,
                    value: bind_literal(column, ty, value)?,
                }
            }
            Predicate::In { column, values } => {
                let (slot, ty) = slot(column)?;
                if values.is_empty() {
                    return Err(VectorDbError::invalid(format!("empty IN list for column '{}'", column)));
                }
                let values = values
                    .iter()
                    .map(|v| bind_literal(column, ty, v))
                    .collect::<VectorDbResult<Vec<_>>>()?;
                BoundPredicate::In { slot, values }
            }
            Predicate::IsNull { column } => BoundPredicate::IsNull { slot: slot(column)?.0 },
            Predicate::And(l, r) => BoundPredicate::And(Box::new(l.bind(schema)?), Box::new(r.bind(schema)?)),
            Predicate::Or(l, r) => BoundPredicate::Or(Box::new(l.bind(schema)?), Box::new(r.bind(schema)?)),
            Predicate::Not(inner) => BoundPredicate::Not(Box::new(inner.bind(schema)?)),
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => write!(f, "{} {} {}", column, op.symbol(), Literal(value)),
            Predicate::In { column, values } => {
                write!(f, "{} IN (", column)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Literal(value))?;
                }
                f.write_str(")")
            }
            Predicate::IsNull { column } => write!(f, "{} IS NULL", column),
            Predicate::And(l, r) => write!(f, "({} AND {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} OR {})", l, r),
            Predicate::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

/// Value rendered in filter syntax
struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            Value::Null => f.write_str("NULL"),
            other => write!(f, "{}", other),
        }
    }
}

fn bind_literal(column: &str, ty: ScalarType, value: &Value) -> VectorDbResult<Value> {
    if value.is_null() {
        return Err(VectorDbError::invalid(format!(
            "comparison with NULL on column '{}'; use IS NULL",
            column
        )));
    }
    if !value.fits(ty) {
        return Err(VectorDbError::invalid(format!(
            "column '{}' is {}, literal is {}",
            column,
            ty,
            value.type_name()
        )));
    }
    Ok(value.clone().coerce(ty))
}

/// Filter resolved against a schema, evaluated over a row's scalar values
#[derive(Debug, Clone, PartialEq)]
pub enum BoundPredicate {
    Compare { slot: usize, op: CompareOp, value: Value },
    In { slot: usize, values: Vec<Value> },
    IsNull { slot: usize },
    And(Box<BoundPredicate>, Box<BoundPredicate>),
    Or(Box<BoundPredicate>, Box<BoundPredicate>),
    Not(Box<BoundPredicate>),
}

impl BoundPredicate {
    /// `values` holds one value per scalar column, in schema order
    pub fn matches(&self, values: &[Value]) -> bool {
        match self {
            BoundPredicate::Compare { slot, op, value } => values[*slot]
                .compare(value)
                .map(|ordering| op.holds(ordering))
                .unwrap_or(false),
            BoundPredicate::In { slot, values: candidates } => {
                let cell = &values[*slot];
                candidates.iter().any(|c| cell.compare(c) == Some(Ordering::Equal))
            }
            BoundPredicate::IsNull { slot } => values[*slot].is_null(),
            BoundPredicate::And(l, r) => l.matches(values) && r.matches(values),
            BoundPredicate::Or(l, r) => l.matches(values) || r.matches(values),
            BoundPredicate::Not(inner) => !inner.matches(values),
        }
    }
}

fn parse_expr(pair: Pair<Rule>) -> VectorDbResult<Predicate> {
    PRATT_PARSER
        .map_primary(parse_primary)
        .map_prefix(|op, inner| match op.as_rule() {
            Rule::not_op => Ok(inner?.not()),
            rule => Err(VectorDbError::invalid(format!("unexpected prefix {:?}", rule))),
        })
        .map_infix(|left, op, right| match op.as_rule() {
            Rule::and_op => Ok(left?.and(right?)),
            Rule::or_op => Ok(left?.or(right?)),
            rule => Err(VectorDbError::invalid(format!("unexpected operator {:?}", rule))),
        })
        .parse(pair.into_inner())
}

fn parse_primary(pair: Pair<Rule>) -> VectorDbResult<Predicate> {
    let rule = pair.as_rule();
    if rule == Rule::expr {
        return parse_expr(pair);
    }
    let mut inner = pair.into_inner();
    match rule {
        Rule::comparison => {
            let column = next_str(&mut inner)?;
            let op = match next_str(&mut inner)?.as_str() {
                "=" | "==" => CompareOp::Eq,
                "!=" | "<>" => CompareOp::Ne,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Le,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Ge,
                other => return Err(VectorDbError::invalid(format!("unknown operator '{}'", other))),
            };
            let value = parse_literal(inner.next())?;
            Ok(Predicate::Compare { column, op, value })
        }
        Rule::in_list => {
            let column = next_str(&mut inner)?;
            let mut negated = false;
            let mut values = Vec::new();
            for part in inner {
                match part.as_rule() {
                    Rule::not_kw => negated = true,
                    Rule::literal => values.push(parse_literal(Some(part))?),
                    _ => {}
                }
            }
            let predicate = Predicate::In { column, values };
            Ok(if negated { predicate.not() } else { predicate })
        }
        Rule::null_check => {
            let column = next_str(&mut inner)?;
            let negated = inner.any(|p| p.as_rule() == Rule::not_kw);
            let predicate = Predicate::is_null(column);
            Ok(if negated { predicate.not() } else { predicate })
        }
        other => Err(VectorDbError::invalid(format!("unexpected {:?} in filter", other))),
    }
}

fn next_str(pairs: &mut pest::iterators::Pairs<Rule>) -> VectorDbResult<String> {
    pairs
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| VectorDbError::invalid("truncated filter"))
}

fn parse_literal(pair: Option<Pair<Rule>>) -> VectorDbResult<Value> {
    let literal = pair
        .and_then(|p| p.into_inner().next())
        .ok_or_else(|| VectorDbError::invalid("missing literal"))?;
    let text = literal.as_str();
    match literal.as_rule() {
        Rule::string => {
            let body = literal.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Value::String(if text.starts_with('\'') {
                body.replace("''", "'")
            } else {
                body.to_string()
            }))
        }
        Rule::integer => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| VectorDbError::invalid(format!("bad integer '{}': {}", text, e))),
        Rule::float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| VectorDbError::invalid(format!("bad float '{}': {}", text, e))),
        Rule::boolean => Ok(Value::Boolean(text.eq_ignore_ascii_case("true"))),
        Rule::null_kw => Ok(Value::Null),
        other => Err(VectorDbError::invalid(format!("unexpected literal {:?}", other))),
    }
}
