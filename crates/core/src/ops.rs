//! Shared operator/coercion semantics (§4.8). Used by both the Readtime
//! Evaluator and the VM so constant folding in the Optimizer computes
//! results identical to running the same op at runtime (SPEC_FULL §4).
//!
//! Functions here return `Result<_, String>` (a bare message); the caller
//! attaches file/line/trace via `VenError::runtime`.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::quote::{BinaryOp, UnaryOp};
use crate::value::{MapKey, Num, TypeName, Value};

/// Values `x` is capped at before repeat allocation (§4.8, §8 boundary case).
pub const REPEAT_CAP: i64 = i32::MAX as i64;

/// Deep, element-wise equality (§3.3). Used by `is`, `in`, generic-dispatch
/// value constraints, and `MapKey`.
pub fn eqv(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Void, Value::Void) => true,
        (Value::Any, Value::Any) => true,
        (Value::Vec(x), Value::Vec(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| eqv(a, b))
        }
        (Value::Map(x), Value::Map(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|v2| eqv(v, v2)).unwrap_or(false))
        }
        (Value::Regex(x), Value::Regex(y)) => x.source == y.source,
        (Value::Range(lx, hx), Value::Range(ly, hy)) => {
            opt_eq(lx, ly) && opt_eq(hx, hy)
        }
        (Value::Type(x), Value::Type(y)) => x.name == y.name,
        (Value::Quote(x), Value::Quote(y)) => x == y,
        _ => false,
    }
}

fn opt_eq(a: &Option<Box<Value>>, b: &Option<Box<Value>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => eqv(a, b),
        _ => false,
    }
}

/// `+` unary / numeric coercion: parse string, vec length, bool 0/1.
pub fn to_num(v: &Value) -> Result<Num, String> {
    match v {
        Value::Num(n) => Ok(*n),
        Value::Str(s) => parse_num(s).ok_or_else(|| format!("cannot convert '{s}' to num")),
        Value::Bool(b) => Ok(Num::from_integer(if *b { 1 } else { 0 })),
        Value::Vec(items) => Ok(Num::from_integer(items.borrow().len() as i64)),
        Value::Void => Ok(Num::from_integer(0)),
        other => Err(format!("cannot convert {} to num", other.type_name().word())),
    }
}

/// Parses a number literal/string as an exact rational. Decimal points are
/// handled exactly (`1.5` -> `3/2`), never through a lossy float round-trip,
/// which is what lets `to_num(to_str(n)) == n` hold for every finite decimal
/// (§8).
pub fn parse_num(s: &str) -> Option<Num> {
    let s = s.trim();
    if let Some((n, d)) = s.split_once('/') {
        let n: i64 = n.trim().parse().ok()?;
        let d: i64 = d.trim().parse().ok()?;
        if d == 0 {
            return None;
        }
        return Some(Num::new(n, d));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Num::from_integer(i));
    }
    if let Some((whole, frac)) = s.split_once('.') {
        let negative = whole.starts_with('-');
        let whole_digits = whole.trim_start_matches('-');
        if !whole_digits.chars().all(|c| c.is_ascii_digit())
            || frac.is_empty()
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let denom: i64 = 10i64.checked_pow(frac.len() as u32)?;
        let whole_part: i64 = whole_digits.parse().ok()?;
        let frac_part: i64 = frac.parse().ok()?;
        let numer = whole_part * denom + frac_part;
        let numer = if negative { -numer } else { numer };
        return Some(Num::new(numer, denom));
    }
    None
}

/// `~` unary / string coercion: detree non-strings via `Display`.
pub fn to_str(v: &Value) -> Rc<str> {
    match v {
        Value::Str(s) => s.clone(),
        other => Rc::from(other.to_string()),
    }
}

/// `&` unary / vector coercion: wrap non-vec in a 1-element vec.
pub fn to_vec(v: &Value) -> Vec<Value> {
    match v {
        Value::Vec(items) => items.borrow().clone(),
        Value::Range(lo, hi) => range_to_vec(lo, hi),
        Value::Void => Vec::new(),
        other => vec![other.clone()],
    }
}

fn range_to_vec(lo: &Option<Box<Value>>, hi: &Option<Box<Value>>) -> Vec<Value> {
    match (lo.as_deref(), hi.as_deref()) {
        (Some(Value::Num(lo)), Some(Value::Num(hi))) => {
            let (mut i, hi) = (lo.to_integer(), hi.to_integer());
            let mut out = Vec::new();
            while i <= hi {
                out.push(Value::Num(Num::from_integer(i)));
                i += 1;
            }
            out
        }
        _ => Vec::new(),
    }
}

/// `#` unary / length: string/vec length, else 1.
pub fn to_len(v: &Value) -> Num {
    match v {
        Value::Str(s) => Num::from_integer(s.chars().count() as i64),
        Value::Vec(items) => Num::from_integer(items.borrow().len() as i64),
        Value::Map(entries) => Num::from_integer(entries.borrow().len() as i64),
        _ => Num::from_integer(1),
    }
}

/// `%` unary / map-from-vector: pairs of `[k1, v1, k2, v2, ...]`.
pub fn map_from_vector(v: &Value) -> Result<Value, String> {
    let items = to_vec(v);
    if items.len() % 2 != 0 {
        return Err("map-from-vector requires an even number of items".to_string());
    }
    let mut out = IndexMap::new();
    let mut it = items.into_iter();
    while let (Some(k), Some(v)) = (it.next(), it.next()) {
        out.insert(MapKey(k), v);
    }
    Ok(Value::map(out))
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value, String> {
    match op {
        UnaryOp::Plus => to_num(operand).map(Value::Num),
        UnaryOp::Minus => to_num(operand).map(|n| Value::Num(-n)),
        UnaryOp::ToStr => Ok(Value::Str(to_str(operand))),
        UnaryOp::ToVec => Ok(Value::vec(to_vec(operand))),
        UnaryOp::Len => Ok(Value::Num(to_len(operand))),
        UnaryOp::Not => Ok(Value::Bool(operand.is_false())),
        UnaryOp::ToMap => map_from_vector(operand),
    }
}

pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::And => Ok(if left.is_false() {
            left.clone()
        } else {
            right.clone()
        }),
        BinaryOp::Or => Ok(if left.truthy() {
            left.clone()
        } else {
            right.clone()
        }),
        BinaryOp::Is => Ok(if eqv(left, right) {
            left.clone()
        } else {
            Value::Bool(false)
        }),
        BinaryOp::In => Ok(Value::Bool(contains(left, right))),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => compare(op, left, right),
        BinaryOp::Add => numeric(left, right, |a, b| Ok(a + b)),
        BinaryOp::Sub => numeric(left, right, |a, b| Ok(a - b)),
        BinaryOp::Mul => numeric(left, right, |a, b| Ok(a * b)),
        BinaryOp::Div => numeric(left, right, |a, b| {
            if b.is_zero() {
                Err("division by zero".to_string())
            } else {
                Ok(a / b)
            }
        }),
        BinaryOp::Concat => Ok(Value::Str(Rc::from(format!("{}{}", to_str(left), to_str(right))))),
        BinaryOp::Merge => {
            let Value::Map(l) = coerce_map(left)? else {
                unreachable!()
            };
            let Value::Map(r) = coerce_map(right)? else {
                unreachable!()
            };
            let mut out = l.borrow().clone();
            for (k, v) in r.borrow().iter() {
                out.insert(k.clone(), v.clone());
            }
            Ok(Value::map(out))
        }
        BinaryOp::Repeat => repeat(left, right),
    }
}

fn coerce_map(v: &Value) -> Result<Value, String> {
    match v {
        Value::Map(_) => Ok(v.clone()),
        _ => Err(format!("expected map, found {}", v.type_name().word())),
    }
}

fn contains(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::Str(s) => {
            if let Value::Str(n) = needle {
                s.contains(n.as_ref())
            } else {
                false
            }
        }
        Value::Vec(items) => items.borrow().iter().any(|i| eqv(i, needle)),
        Value::Map(entries) => entries.borrow().contains_key(&MapKey(needle.clone())),
        _ => false,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.len().cmp(&b.len()),
        (Value::Num(_), _) | (_, Value::Num(_)) => {
            let a = to_num(left)?;
            let b = to_num(right)?;
            a.cmp(&b)
        }
        _ => {
            let a = to_num(left)?;
            let b = to_num(right)?;
            a.cmp(&b)
        }
    };
    let result = match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn numeric(
    left: &Value,
    right: &Value,
    f: impl FnOnce(Num, Num) -> Result<Num, String>,
) -> Result<Value, String> {
    let a = to_num(left)?;
    let b = to_num(right)?;
    f(a, b).map(Value::Num)
}

fn repeat(left: &Value, right: &Value) -> Result<Value, String> {
    let (base, count) = match (left, right) {
        (Value::Str(_) | Value::Vec(_), _) => (left, right),
        (_, Value::Str(_) | Value::Vec(_)) => (right, left),
        _ => (left, right),
    };
    let n = to_num(count)?;
    if n.is_negative() {
        return Err("cannot repeat a negative number of times".to_string());
    }
    let n = n
        .to_integer()
        .to_i64()
        .ok_or_else(|| "repeat count out of range".to_string())?;
    if n > REPEAT_CAP {
        return Err("repeat count overflows Int32::MAX".to_string());
    }
    match base {
        Value::Str(s) => Ok(Value::Str(Rc::from(s.repeat(n as usize)))),
        Value::Vec(items) => {
            let items = items.borrow();
            let mut out = Vec::with_capacity(items.len() * n as usize);
            for _ in 0..n {
                out.extend(items.iter().cloned());
            }
            Ok(Value::vec(out))
        }
        _ => Err("'x' requires a string or vector operand".to_string()),
    }
}

/// §4.7 compound-type matching, used by generic dispatch (§4.6).
pub fn compound_matches(
    compound: &crate::value::CompoundType,
    value: &Value,
    type_matches: &impl Fn(&crate::value::TypeValue, &Value) -> bool,
) -> bool {
    match compound.lead.name {
        TypeName::Any => compound.args.iter().any(|a| value_matches_arg(a, value, type_matches)),
        TypeName::Vec => match value {
            Value::Vec(items) => items
                .borrow()
                .iter()
                .all(|item| compound.args.iter().any(|a| value_matches_arg(a, item, type_matches))),
            _ => false,
        },
        TypeName::Map => match value {
            Value::Map(entries) => entries.borrow().iter().all(|(k, v)| {
                compound.args.chunks(2).any(|pair| {
                    if let [ck, cv] = pair {
                        key_matches(ck, &k.0) && value_matches_arg(cv, v, type_matches)
                    } else {
                        false
                    }
                })
            }),
            _ => false,
        },
        _ => {
            compound.lead.name.matches(value)
                && compound.args.iter().any(|a| eqv(a, value))
        }
    }
}

fn value_matches_arg(
    arg: &Value,
    value: &Value,
    type_matches: &impl Fn(&crate::value::TypeValue, &Value) -> bool,
) -> bool {
    match arg {
        Value::Type(t) => type_matches(t, value),
        Value::CompoundType(c) => compound_matches(c, value, type_matches),
        other => eqv(other, value),
    }
}

fn key_matches(constraint_key: &Value, actual_key: &Value) -> bool {
    match (constraint_key, actual_key) {
        (Value::Regex(r), Value::Str(s)) => r.compiled.is_match(s),
        _ => eqv(constraint_key, actual_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_by_zero_message_mentions_zero() {
        let err = apply_binary(BinaryOp::Div, &Value::num(1), &Value::num(0)).unwrap_err();
        assert!(err.contains("zero"));
    }

    #[test]
    fn round_trip_to_num_to_str() {
        let n = Num::new(7, 1);
        let s = to_str(&Value::Num(n));
        assert_eq!(to_num(&Value::Str(s)).unwrap(), n);
    }

    #[test]
    fn is_returns_left_when_equal() {
        let result = apply_binary(BinaryOp::Is, &Value::num(10), &Value::num(10)).unwrap();
        assert_eq!(result, Value::num(10));
    }

    #[test]
    fn repeat_caps_at_int32_max() {
        let huge = Value::Num(Num::from_integer(REPEAT_CAP + 1));
        let err = apply_binary(BinaryOp::Repeat, &Value::str("a"), &huge).unwrap_err();
        assert!(err.contains("overflow"));
    }

    #[test]
    fn empty_vector_pattern_matches_only_empty() {
        assert!(eqv(&Value::vec(vec![]), &Value::vec(vec![])));
        assert!(!eqv(&Value::vec(vec![]), &Value::vec(vec![Value::num(1)])));
    }
}
