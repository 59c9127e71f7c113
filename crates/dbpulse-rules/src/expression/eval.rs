//! Tree-walking interpreter for rule expressions.
//!
//! Values are `Cow<Value>`: field access on `data`, `settings`, and the
//! findings tree borrows instead of cloning. Every failure is an
//! `ExpressionError`; nothing here panics on malformed data.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use dbpulse_core::errors::ExpressionError;

use super::ast::{BinaryOp, BoolOp, CompareOp, Expr, UnaryOp};
use super::value::{float_str, is_truthy, py_cmp, py_contains, py_eq, py_str, type_name, Num};
use super::{DATA_VAR, FINDINGS_VAR, SETTINGS_VAR};

type Val<'a> = Cow<'a, Value>;

/// Variables visible to an expression.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    data: &'a Value,
    settings: &'a Value,
    findings: Option<&'a Value>,
    field_fallback: bool,
}

impl<'a> Scope<'a> {
    /// Per-row scope: `data` and `settings` only.
    pub fn new(data: &'a Value, settings: &'a Value) -> Self {
        Self {
            data,
            settings,
            findings: None,
            field_fallback: false,
        }
    }

    /// Expose the whole findings tree as `all_structured_findings`.
    pub fn with_findings(mut self, findings: &'a Value) -> Self {
        self.findings = Some(findings);
        self
    }

    /// Resolve unknown bare names against the row, then the settings.
    /// Used by reasoning templates so `{total_connections}` works.
    pub fn with_field_fallback(mut self) -> Self {
        self.field_fallback = true;
        self
    }
}

pub(crate) fn evaluate<'a>(expr: &Expr, scope: &Scope<'a>) -> Result<Val<'a>, ExpressionError> {
    let mut interpreter = Interpreter {
        scope: *scope,
        locals: Vec::new(),
    };
    interpreter.eval(expr)
}

struct Interpreter<'a> {
    scope: Scope<'a>,
    locals: Vec<(String, Val<'a>)>,
}

impl<'a> Interpreter<'a> {
    fn eval(&mut self, expr: &Expr) -> Result<Val<'a>, ExpressionError> {
        match expr {
            Expr::Literal(value) => Ok(Cow::Owned(value.clone())),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?.into_owned());
                }
                Ok(Cow::Owned(Value::Array(out)))
            }
            Expr::Name(name) => self.lookup(name),
            Expr::Subscript { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                subscript(target, &index)
            }
            Expr::Method { target, name, args } => {
                let target = self.eval(target)?;
                let args = self.eval_args(args)?;
                call_method(target, name, args)
            }
            Expr::Call { func, args } => {
                let args = self.eval_args(args)?;
                call_function(func, &args).map(Cow::Owned)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                unary(*op, &operand).map(Cow::Owned)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right).map(Cow::Owned)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, next) in rest {
                    let right = self.eval(next)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Cow::Owned(Value::Bool(false)));
                    }
                    left = right;
                }
                Ok(Cow::Owned(Value::Bool(true)))
            }
            Expr::Bool { op, values } => {
                let mut last = Cow::Owned(Value::Null);
                for value in values {
                    let current = self.eval(value)?;
                    let truthy = is_truthy(&current);
                    match op {
                        BoolOp::And if !truthy => return Ok(current),
                        BoolOp::Or if truthy => return Ok(current),
                        _ => last = current,
                    }
                }
                Ok(last)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(self.eval(condition)?.as_ref()) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Comprehension {
                element,
                targets,
                iter,
                conditions,
            } => {
                let iterable = self.eval(iter)?;
                let mut out = Vec::new();
                for item in iterate(iterable)? {
                    let depth = self.locals.len();
                    let bound = bind_targets(targets, item).map(|bindings| {
                        self.locals.extend(bindings);
                    });
                    let step = match bound {
                        Ok(()) => self.comprehension_step(element, conditions),
                        Err(e) => Err(e),
                    };
                    self.locals.truncate(depth);
                    if let Some(value) = step? {
                        out.push(value);
                    }
                }
                Ok(Cow::Owned(Value::Array(out)))
            }
        }
    }

    fn comprehension_step(
        &mut self,
        element: &Expr,
        conditions: &[Expr],
    ) -> Result<Option<Value>, ExpressionError> {
        for condition in conditions {
            if !is_truthy(self.eval(condition)?.as_ref()) {
                return Ok(None);
            }
        }
        Ok(Some(self.eval(element)?.into_owned()))
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Val<'a>>, ExpressionError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn lookup(&self, name: &str) -> Result<Val<'a>, ExpressionError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        match name {
            DATA_VAR => Ok(Cow::Borrowed(self.scope.data)),
            SETTINGS_VAR => Ok(Cow::Borrowed(self.scope.settings)),
            FINDINGS_VAR => self
                .scope
                .findings
                .map(Cow::Borrowed)
                .ok_or_else(|| ExpressionError::UnknownName(name.to_string())),
            _ if self.scope.field_fallback => self
                .scope
                .data
                .get(name)
                .or_else(|| self.scope.settings.get(name))
                .map(Cow::Borrowed)
                .ok_or_else(|| ExpressionError::UnknownName(name.to_string())),
            _ => Err(ExpressionError::UnknownName(name.to_string())),
        }
    }
}

fn iterate(value: Val<'_>) -> Result<Vec<Val<'_>>, ExpressionError> {
    match value {
        Cow::Borrowed(Value::Array(items)) => Ok(items.iter().map(Cow::Borrowed).collect()),
        Cow::Owned(Value::Array(items)) => Ok(items.into_iter().map(Cow::Owned).collect()),
        other => Ok(elements(&other)?
            .into_iter()
            .map(|e| Cow::Owned(e.into_owned()))
            .collect()),
    }
}

/// Elements of an iterable: list items, dict keys, or string characters.
fn elements(value: &Value) -> Result<Vec<Cow<'_, Value>>, ExpressionError> {
    match value {
        Value::Array(items) => Ok(items.iter().map(Cow::Borrowed).collect()),
        Value::Object(map) => Ok(map
            .keys()
            .map(|k| Cow::Owned(Value::String(k.clone())))
            .collect()),
        Value::String(s) => Ok(s
            .chars()
            .map(|c| Cow::Owned(Value::String(c.to_string())))
            .collect()),
        other => Err(ExpressionError::Type(format!(
            "'{}' object is not iterable",
            type_name(other)
        ))),
    }
}

fn bind_targets<'a>(
    targets: &[String],
    item: Val<'a>,
) -> Result<Vec<(String, Val<'a>)>, ExpressionError> {
    if targets.len() == 1 {
        return Ok(vec![(targets[0].clone(), item)]);
    }

    let parts: Vec<Val<'a>> = match item {
        Cow::Borrowed(Value::Array(items)) if items.len() == targets.len() => {
            items.iter().map(Cow::Borrowed).collect()
        }
        Cow::Owned(Value::Array(items)) if items.len() == targets.len() => {
            items.into_iter().map(Cow::Owned).collect()
        }
        other => {
            return Err(ExpressionError::Type(format!(
                "cannot unpack {} into {} variables",
                type_name(&other),
                targets.len()
            )))
        }
    };

    Ok(targets.iter().cloned().zip(parts).collect())
}

fn subscript<'a>(target: Val<'a>, index: &Value) -> Result<Val<'a>, ExpressionError> {
    if let Value::String(s) = target.as_ref() {
        let chars: Vec<char> = s.chars().collect();
        let idx = normalize_index(index, chars.len())?;
        return Ok(Cow::Owned(Value::String(chars[idx].to_string())));
    }
    match target {
        Cow::Borrowed(value) => child(value, index).map(Cow::Borrowed),
        Cow::Owned(value) => child(&value, index).map(|c| Cow::Owned(c.clone())),
    }
}

fn child<'v>(target: &'v Value, index: &Value) -> Result<&'v Value, ExpressionError> {
    match target {
        Value::Object(map) => match index {
            Value::String(key) => map
                .get(key)
                .ok_or_else(|| ExpressionError::KeyNotFound(format!("'{key}'"))),
            other => Err(ExpressionError::KeyNotFound(py_str(other))),
        },
        Value::Array(items) => {
            let idx = normalize_index(index, items.len())?;
            Ok(&items[idx])
        }
        other => Err(ExpressionError::Type(format!(
            "'{}' object is not subscriptable",
            type_name(other)
        ))),
    }
}

fn normalize_index(index: &Value, len: usize) -> Result<usize, ExpressionError> {
    let raw = match Num::from_value(index) {
        Some(Num::Int(i)) => i,
        _ => {
            return Err(ExpressionError::Type(format!(
                "indices must be integers, not {}",
                type_name(index)
            )))
        }
    };
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved < 0 || resolved >= len as i64 {
        return Err(ExpressionError::IndexOutOfRange { index: raw, len });
    }
    Ok(resolved as usize)
}

fn arity(name: &str, args: &[Val<'_>], min: usize, max: usize) -> Result<(), ExpressionError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(ExpressionError::Type(format!(
            "{name}() takes {expected} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn call_method<'a>(
    target: Val<'a>,
    name: &str,
    mut args: Vec<Val<'a>>,
) -> Result<Val<'a>, ExpressionError> {
    match (name, target.as_ref()) {
        ("get", Value::Object(_)) => {
            arity("get", &args, 1, 2)?;
            let default = if args.len() == 2 {
                args.pop().unwrap_or(Cow::Owned(Value::Null))
            } else {
                Cow::Owned(Value::Null)
            };
            let key = match args[0].as_ref() {
                Value::String(key) => key.clone(),
                _ => return Ok(default),
            };
            let found = match target {
                Cow::Borrowed(value) => value.get(&key).map(Cow::Borrowed),
                Cow::Owned(value) => value.get(&key).cloned().map(Cow::Owned),
            };
            Ok(found.unwrap_or(default))
        }
        ("keys", Value::Object(map)) => {
            arity("keys", &args, 0, 0)?;
            Ok(Cow::Owned(Value::Array(
                map.keys().map(|k| Value::String(k.clone())).collect(),
            )))
        }
        ("values", Value::Object(map)) => {
            arity("values", &args, 0, 0)?;
            Ok(Cow::Owned(Value::Array(map.values().cloned().collect())))
        }
        ("items", Value::Object(map)) => {
            arity("items", &args, 0, 0)?;
            Ok(Cow::Owned(Value::Array(
                map.iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                    .collect(),
            )))
        }
        ("lower", Value::String(s)) => {
            arity("lower", &args, 0, 0)?;
            Ok(Cow::Owned(Value::String(s.to_lowercase())))
        }
        ("upper", Value::String(s)) => {
            arity("upper", &args, 0, 0)?;
            Ok(Cow::Owned(Value::String(s.to_uppercase())))
        }
        ("strip", Value::String(s)) => {
            arity("strip", &args, 0, 0)?;
            Ok(Cow::Owned(Value::String(s.trim().to_string())))
        }
        ("startswith", Value::String(s)) | ("endswith", Value::String(s)) => {
            arity(name, &args, 1, 1)?;
            let affix = match args[0].as_ref() {
                Value::String(a) => a.as_str(),
                other => {
                    return Err(ExpressionError::Type(format!(
                        "{name}() argument must be str, not {}",
                        type_name(other)
                    )))
                }
            };
            let hit = if name == "startswith" {
                s.starts_with(affix)
            } else {
                s.ends_with(affix)
            };
            Ok(Cow::Owned(Value::Bool(hit)))
        }
        (_, value) => Err(ExpressionError::UnknownFunction(format!(
            "{}.{name}",
            type_name(value)
        ))),
    }
}

fn call_function(name: &str, args: &[Val<'_>]) -> Result<Value, ExpressionError> {
    match name {
        "int" => {
            arity(name, args, 1, 1)?;
            to_int(&args[0]).map(Value::from)
        }
        "float" => {
            arity(name, args, 1, 1)?;
            Num::Float(to_float(&args[0])?).into_value()
        }
        "str" => {
            arity(name, args, 1, 1)?;
            Ok(Value::String(py_str(&args[0])))
        }
        "bool" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(is_truthy(&args[0])))
        }
        "len" => {
            arity(name, args, 1, 1)?;
            let len = match args[0].as_ref() {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(ExpressionError::Type(format!(
                        "object of type '{}' has no len()",
                        type_name(other)
                    )))
                }
            };
            Ok(Value::from(len as u64))
        }
        "sum" => {
            arity(name, args, 1, 2)?;
            let mut total = match args.get(1) {
                Some(start) => numeric_operand(start, "sum")?,
                None => Num::Int(0),
            };
            for item in elements(&args[0])? {
                total = arithmetic(BinaryOp::Add, total, numeric_operand(&item, "sum")?)?;
            }
            total.into_value()
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(ExpressionError::Type(format!(
                    "{name} expected at least 1 argument, got 0"
                )));
            }
            let candidates: Vec<Cow<'_, Value>> = if args.len() == 1 {
                elements(&args[0])?
            } else {
                args.iter().map(|a| Cow::Borrowed(a.as_ref())).collect()
            };
            let wanted = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<&Value> = None;
            for candidate in &candidates {
                best = match best {
                    Some(current) if py_cmp(candidate, current)? != wanted => Some(current),
                    _ => Some(candidate.as_ref()),
                };
            }
            best.cloned().ok_or_else(|| {
                ExpressionError::Value(format!("{name}() arg is an empty sequence"))
            })
        }
        "abs" => {
            arity(name, args, 1, 1)?;
            match numeric_operand(&args[0], name)? {
                Num::Int(i) => match i.checked_abs() {
                    Some(v) => Num::Int(v),
                    None => Num::Float((i as f64).abs()),
                },
                Num::Float(f) => Num::Float(f.abs()),
            }
            .into_value()
        }
        "round" => {
            arity(name, args, 1, 2)?;
            let x = numeric_operand(&args[0], name)?;
            match args.get(1) {
                None => match x {
                    Num::Int(i) => Ok(Value::from(i)),
                    Num::Float(f) => to_int(&Num::Float(f.round_ties_even()).into_value()?)
                        .map(Value::from),
                },
                Some(ndigits) => {
                    let digits = to_int(ndigits)?;
                    match x {
                        Num::Int(i) => Ok(Value::from(i)),
                        Num::Float(f) => {
                            let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
                            Num::Float((f * factor).round_ties_even() / factor).into_value()
                        }
                    }
                }
            }
        }
        "any" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(elements(&args[0])?.iter().any(|v| is_truthy(v))))
        }
        "all" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(elements(&args[0])?.iter().all(|v| is_truthy(v))))
        }
        _ => Err(ExpressionError::UnknownFunction(name.to_string())),
    }
}

fn numeric_operand(value: &Value, context: &str) -> Result<Num, ExpressionError> {
    Num::from_value(value).ok_or_else(|| {
        ExpressionError::Type(format!(
            "unsupported operand type for {context}: '{}'",
            type_name(value)
        ))
    })
}

fn to_int(value: &Value) -> Result<i64, ExpressionError> {
    match value {
        Value::String(s) => {
            let cleaned = s.trim().replace('_', "");
            cleaned.parse::<i64>().map_err(|_| {
                ExpressionError::Value(format!("invalid literal for int(): '{s}'"))
            })
        }
        other => match Num::from_value(other) {
            Some(Num::Int(i)) => Ok(i),
            Some(Num::Float(f)) if f.is_finite() && f.abs() < 9.2e18 => Ok(f.trunc() as i64),
            Some(Num::Float(f)) => Err(ExpressionError::Value(format!(
                "cannot convert float {} to integer",
                float_str(f)
            ))),
            None => Err(ExpressionError::Type(format!(
                "int() argument must be a string or a number, not '{}'",
                type_name(other)
            ))),
        },
    }
}

fn to_float(value: &Value) -> Result<f64, ExpressionError> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ExpressionError::Value(format!("could not convert string to float: '{s}'"))
        }),
        other => Num::from_value(other).map(Num::as_f64).ok_or_else(|| {
            ExpressionError::Type(format!(
                "float() argument must be a string or a number, not '{}'",
                type_name(other)
            ))
        }),
    }
}

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, ExpressionError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!is_truthy(operand))),
        UnaryOp::Pos => numeric_operand(operand, "unary +")?.into_value(),
        UnaryOp::Neg => match numeric_operand(operand, "unary -")? {
            Num::Int(i) => match i.checked_neg() {
                Some(v) => Num::Int(v),
                None => Num::Float(-(i as f64)),
            },
            Num::Float(f) => Num::Float(-f),
        }
        .into_value(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    if op == BinaryOp::Add {
        match (left, right) {
            (Value::String(a), Value::String(b)) => return Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                return Ok(Value::Array(a.iter().chain(b).cloned().collect()))
            }
            _ => {}
        }
    }

    match (Num::from_value(left), Num::from_value(right)) {
        (Some(a), Some(b)) => arithmetic(op, a, b)?.into_value(),
        _ => Err(ExpressionError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol(op),
            type_name(left),
            type_name(right)
        ))),
    }
}

fn arithmetic(op: BinaryOp, a: Num, b: Num) -> Result<Num, ExpressionError> {
    if matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod) && b.is_zero() {
        return Err(ExpressionError::DivisionByZero);
    }

    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::FloorDiv => x.checked_div(y).map(|q| {
                if x % y != 0 && ((x < 0) != (y < 0)) {
                    q - 1
                } else {
                    q
                }
            }),
            BinaryOp::Mod => x.checked_rem(y).map(|r| {
                if r != 0 && ((r < 0) != (y < 0)) {
                    r + y
                } else {
                    r
                }
            }),
            BinaryOp::Div => None,
        };
        if let Some(v) = exact {
            return Ok(Num::Int(v));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    Ok(Num::Float(match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => x - y * (x / y).floor(),
    }))
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExpressionError> {
    Ok(match op {
        CompareOp::Eq => py_eq(left, right),
        CompareOp::NotEq => !py_eq(left, right),
        CompareOp::Lt => py_cmp(left, right)? == Ordering::Less,
        CompareOp::Le => py_cmp(left, right)? != Ordering::Greater,
        CompareOp::Gt => py_cmp(left, right)? == Ordering::Greater,
        CompareOp::Ge => py_cmp(left, right)? != Ordering::Less,
        CompareOp::In => py_contains(right, left)?,
        CompareOp::NotIn => !py_contains(right, left)?,
        CompareOp::Is => is_same(left, right),
        CompareOp::IsNot => !is_same(left, right),
    })
}

/// `is` on plain data: `None`/`True`/`False` are singletons, everything
/// else compares structurally.
fn is_same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => false,
        _ => left == right,
    }
}
