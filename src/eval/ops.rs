//! Operators, comparisons and indexing on [`Value`]s.
//!
//! Arithmetic on arrays broadcasts the way numpy does. Integer scalars keep
//! Python semantics (floor division, sign of `%` follows the divisor).

use super::ast::{BinOp, CmpOp, UnaryOp};
use crate::data::Value;
use ndarray::{ArrayD, Axis, IxDyn, Zip};

/// Evaluation failures carry only a message; the caller adds context.
pub type EvalResult<T> = std::result::Result<T, String>;

/// Largest number of elements or characters an expression may create.
pub const MAX_ELEMENTS: usize = 100_000_000;

/// Too-large results are refused before anything is allocated.
pub fn too_large(what: &str) -> String {
    format!("{} is too large (limit {} elements)", what, MAX_ELEMENTS)
}

/// Repeat count for a sequence of `len` items, refusing results above [`MAX_ELEMENTS`].
fn repeat_count(len: usize, n: i64) -> EvalResult<usize> {
    let count = usize::try_from(n.max(0)).map_err(|_| too_large("repeated sequence"))?;
    match len.checked_mul(count) {
        Some(total) if total <= MAX_ELEMENTS => Ok(count),
        _ => Err(too_large("repeated sequence")),
    }
}

/// One evaluated subscript component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexValue {
    /// One position, negative counting from the end.
    Single(i64),
    /// `start:stop:step`.
    Slice(Option<i64>, Option<i64>, Option<i64>),
}

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "** or pow()",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
    }
}

fn unsupported(op: BinOp, lhs: &Value, rhs: &Value) -> String {
    format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol(op),
        lhs.type_name(),
        rhs.type_name()
    )
}

fn is_scalar_number(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Int(_) | Value::Float(_))
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(*b as i64),
        Value::Int(i) => Some(*i),
        _ => None,
    }
}

/// Apply a binary operator.
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            return Ok(Value::Str(s.repeat(repeat_count(s.len(), *n)?)));
        },
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            return Ok(Value::Tuple(a.iter().chain(b).cloned().collect()));
        },
        (BinOp::Mul, Value::Tuple(t), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Tuple(t)) => {
            let count = repeat_count(t.len(), *n)?;
            return Ok(Value::Tuple(
                t.iter().cycle().take(t.len() * count).cloned().collect(),
            ));
        },
        (BinOp::Mod, Value::Str(_), _) => {
            return Err("printf-style '%' formatting is not supported; use a format template".to_string());
        },
        _ => {},
    }

    if let (Some(a), Some(b)) = (as_int(lhs), as_int(rhs)) {
        if matches!((lhs, rhs), (Value::Bool(_), Value::Bool(_)))
            && matches!(op, BinOp::BitAnd | BinOp::BitOr)
        {
            let (a, b) = (a != 0, b != 0);
            return Ok(Value::Bool(if op == BinOp::BitAnd { a && b } else { a || b }));
        }
        return int_op(op, a, b);
    }

    if is_scalar_number(lhs) && is_scalar_number(rhs) {
        let (a, b) = (lhs.as_f64().unwrap_or(f64::NAN), rhs.as_f64().unwrap_or(f64::NAN));
        if matches!(op, BinOp::BitAnd | BinOp::BitOr) {
            return Err(unsupported(op, lhs, rhs));
        }
        return Ok(Value::Float(float_op(op, a, b)));
    }

    let (Some(a), Some(b)) = (lhs.to_array(), rhs.to_array()) else {
        return Err(unsupported(op, lhs, rhs));
    };
    let result = match op {
        BinOp::BitAnd => broadcast_zip(&a, &b, |x, y| bool_f64(x != 0.0 && y != 0.0))?,
        BinOp::BitOr => broadcast_zip(&a, &b, |x, y| bool_f64(x != 0.0 || y != 0.0))?,
        _ => broadcast_zip(&a, &b, |x, y| float_op(op, x, y))?,
    };
    Ok(Value::from_array(result))
}

fn int_op(op: BinOp, a: i64, b: i64) -> EvalResult<Value> {
    let overflow = |checked: Option<i64>, fallback: f64| {
        checked.map(Value::Int).unwrap_or(Value::Float(fallback))
    };
    Ok(match op {
        BinOp::Add => overflow(a.checked_add(b), a as f64 + b as f64),
        BinOp::Sub => overflow(a.checked_sub(b), a as f64 - b as f64),
        BinOp::Mul => overflow(a.checked_mul(b), a as f64 * b as f64),
        BinOp::Div => Value::Float(a as f64 / b as f64),
        BinOp::FloorDiv | BinOp::Mod if b == 0 => {
            return Err("integer division or modulo by zero".to_string());
        },
        BinOp::FloorDiv => {
            let q = a.wrapping_div(b);
            Value::Int(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
        },
        BinOp::Mod => {
            let r = a.wrapping_rem(b);
            Value::Int(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        },
        BinOp::Pow if b >= 0 => {
            let checked = u32::try_from(b).ok().and_then(|e| a.checked_pow(e));
            overflow(checked, (a as f64).powf(b as f64))
        },
        BinOp::Pow => Value::Float((a as f64).powf(b as f64)),
        BinOp::BitAnd => Value::Int(a & b),
        BinOp::BitOr => Value::Int(a | b),
    })
}

fn float_op(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        },
        BinOp::Pow => a.powf(b),
        BinOp::BitAnd => bool_f64(a != 0.0 && b != 0.0),
        BinOp::BitOr => bool_f64(a != 0.0 || b != 0.0),
    }
}

fn bool_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Shape two arrays broadcast to, following numpy's trailing-axis rule.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> EvalResult<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut shape = vec![0; ndim];
    for i in 0..ndim {
        let da = if i < ndim - a.len() { 1 } else { a[i - (ndim - a.len())] };
        let db = if i < ndim - b.len() { 1 } else { b[i - (ndim - b.len())] };
        shape[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(format!(
                    "operands could not be broadcast together with shapes {} {}",
                    Value::shape_tuple(a),
                    Value::shape_tuple(b)
                ))
            },
        };
    }
    Ok(shape)
}

/// Element-wise combination of two arrays after broadcasting.
pub fn broadcast_zip(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> EvalResult<ArrayD<f64>> {
    let shape = broadcast_shape(a.shape(), b.shape())?;
    let dim = IxDyn(&shape);
    let (Some(av), Some(bv)) = (a.broadcast(dim.clone()), b.broadcast(dim)) else {
        return Err("operands could not be broadcast together".to_string());
    };
    Ok(Zip::from(&av).and(&bv).map_collect(|&x, &y| f(x, y)))
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, value: &Value) -> EvalResult<Value> {
    let bad = || {
        let symbol = match op {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
            UnaryOp::Not => "not",
        };
        format!("bad operand type for unary {}: '{}'", symbol, value.type_name())
    };
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy()?)),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-(*b as i64))),
        (UnaryOp::Neg, Value::Int(i)) => Ok(i
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(*i as f64)))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Array(a)) => Ok(Value::Array(a.mapv(|x| -x))),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(*b as i64)),
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_) | Value::Array(_))) => Ok(v.clone()),
        (UnaryOp::Invert, Value::Bool(b)) => Ok(Value::Int(!(*b as i64))),
        (UnaryOp::Invert, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Invert, Value::Array(a)) => Ok(Value::Array(a.mapv(|x| bool_f64(x == 0.0)))),
        _ => Err(bad()),
    }
}

/// Python equality between two non-array values.
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::None, Value::None) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        },
        (a, b) if is_scalar_number(a) && is_scalar_number(b) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => a == b,
        (Value::StrArray(a), Value::StrArray(b)) => a == b,
        _ => false,
    }
}

/// Apply one comparison. Arrays compare element-wise into 0/1 arrays.
pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match op {
        CmpOp::In => return contains(rhs, lhs).map(Value::Bool),
        CmpOp::NotIn => return contains(rhs, lhs).map(|b| Value::Bool(!b)),
        _ => {},
    }

    if let (Value::StrArray(a), Value::Str(s)) | (Value::Str(s), Value::StrArray(a)) = (lhs, rhs) {
        return match op {
            CmpOp::Eq => Ok(Value::Array(a.map(|x| bool_f64(x == s)))),
            CmpOp::NotEq => Ok(Value::Array(a.map(|x| bool_f64(x != s)))),
            _ => Err(not_supported(op, lhs, rhs)),
        };
    }

    let array_side = matches!(lhs, Value::Array(_)) || matches!(rhs, Value::Array(_));
    if array_side {
        if let (Some(a), Some(b)) = (lhs.to_array(), rhs.to_array()) {
            let result = broadcast_zip(&a, &b, |x, y| bool_f64(compare_f64(op, x, y)))?;
            return Ok(Value::from_array(result));
        }
    }

    match op {
        CmpOp::Eq => return Ok(Value::Bool(values_equal(lhs, rhs))),
        CmpOp::NotEq => return Ok(Value::Bool(!values_equal(lhs, rhs))),
        _ => {},
    }

    if is_scalar_number(lhs) && is_scalar_number(rhs) {
        let (a, b) = (lhs.as_f64().unwrap_or(f64::NAN), rhs.as_f64().unwrap_or(f64::NAN));
        return Ok(Value::Bool(compare_f64(op, a, b)));
    }
    if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
        let ordering = a.cmp(b);
        return Ok(Value::Bool(match op {
            CmpOp::Lt => ordering.is_lt(),
            CmpOp::Le => ordering.is_le(),
            CmpOp::Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        }));
    }
    Err(not_supported(op, lhs, rhs))
}

fn not_supported(op: CmpOp, lhs: &Value, rhs: &Value) -> String {
    let symbol = match op {
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::In => "in",
        CmpOp::NotIn => "not in",
    };
    format!(
        "'{}' not supported between instances of '{}' and '{}'",
        symbol,
        lhs.type_name(),
        rhs.type_name()
    )
}

fn compare_f64(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
        CmpOp::Eq => a == b,
        CmpOp::NotEq => a != b,
        CmpOp::In | CmpOp::NotIn => false,
    }
}

/// Membership test, `item in container`.
fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        )),
        (Value::Tuple(items), item) => Ok(items.iter().any(|v| values_equal(v, item))),
        (Value::StrArray(a), Value::Str(s)) => Ok(a.iter().any(|x| x == s)),
        (Value::StrArray(_), _) => Ok(false),
        (Value::Array(a), item) => match item.as_f64() {
            Some(x) => Ok(a.iter().any(|&v| v == x)),
            None => Ok(false),
        },
        (other, _) => Err(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        )),
    }
}

/// Index a value with evaluated subscript components.
pub fn subscript(value: &Value, index: &[IndexValue]) -> EvalResult<Value> {
    match value {
        Value::Array(a) => Ok(Value::from_array(index_array(a, index)?)),
        Value::StrArray(a) => {
            let out = index_array(a, index)?;
            if out.ndim() == 0 {
                Ok(Value::Str(out.iter().next().cloned().unwrap_or_default()))
            } else {
                Ok(Value::StrArray(out))
            }
        },
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            match single_component(index, "string")? {
                IndexValue::Single(i) => normalize_index(i, chars.len())
                    .map(|n| Value::Str(chars[n].to_string()))
                    .ok_or_else(|| "string index out of range".to_string()),
                IndexValue::Slice(start, stop, step) => {
                    let picks = slice_indices(chars.len(), start, stop, step)?;
                    Ok(Value::Str(picks.into_iter().map(|i| chars[i]).collect()))
                },
            }
        },
        Value::Tuple(items) => match single_component(index, "tuple")? {
            IndexValue::Single(i) => normalize_index(i, items.len())
                .map(|n| items[n].clone())
                .ok_or_else(|| "tuple index out of range".to_string()),
            IndexValue::Slice(start, stop, step) => {
                let picks = slice_indices(items.len(), start, stop, step)?;
                Ok(Value::Tuple(picks.into_iter().map(|i| items[i].clone()).collect()))
            },
        },
        other => Err(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        )),
    }
}

fn single_component(index: &[IndexValue], kind: &str) -> EvalResult<IndexValue> {
    match index {
        [one] => Ok(*one),
        _ => Err(format!("{} indices must be integers or slices, not tuple", kind)),
    }
}

fn index_array<T: Clone>(array: &ArrayD<T>, index: &[IndexValue]) -> EvalResult<ArrayD<T>> {
    if index.len() > array.ndim() {
        return Err(format!(
            "too many indices for array: array is {}-dimensional, but {} were indexed",
            array.ndim(),
            index.len()
        ));
    }
    let mut out = array.clone();
    let mut axis = 0;
    for (original_axis, component) in index.iter().enumerate() {
        let len = out.len_of(Axis(axis));
        match *component {
            IndexValue::Single(i) => {
                let n = normalize_index(i, len).ok_or_else(|| {
                    format!(
                        "index {} is out of bounds for axis {} with size {}",
                        i, original_axis, len
                    )
                })?;
                out = out.index_axis_move(Axis(axis), n);
            },
            IndexValue::Slice(start, stop, step) => {
                let picks = slice_indices(len, start, stop, step)?;
                out = out.select(Axis(axis), &picks);
                axis += 1;
            },
        }
    }
    Ok(out)
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

/// Positions selected by a Python slice over a sequence of `len` items.
pub fn slice_indices(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err("slice step cannot be zero".to_string());
    }
    let len = len as i64;
    let mut picks = Vec::new();
    if step > 0 {
        let clamp = |v: Option<i64>, default: i64| match v {
            None => default,
            Some(v) if v < 0 => (v + len).max(0),
            Some(v) => v.min(len),
        };
        let (mut i, stop) = (clamp(start, 0), clamp(stop, len));
        while i < stop {
            picks.push(i as usize);
            i += step;
        }
    } else {
        let clamp = |v: Option<i64>, default: i64| match v {
            None => default,
            Some(v) if v < 0 => (v + len).max(-1),
            Some(v) => v.min(len - 1),
        };
        let (mut i, stop) = (clamp(start, len - 1), clamp(stop, -1));
        while i > stop {
            picks.push(i as usize);
            i += step;
        }
    }
    Ok(picks)
}
