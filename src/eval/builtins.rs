//! Builtin functions, the `np` numeric alias, and methods on values.

use super::ast::{BinOp, CmpOp};
use super::ops::{binary, compare, too_large, values_equal, EvalResult, MAX_ELEMENTS};
use crate::data::Value;
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::cmp::Ordering;

/// Name under which the numeric library is available to expressions.
pub const NUMPY_ALIAS: &str = "np";

/// Builtin functions callable from expressions.
pub const BUILTINS: &[&str] = &[
    "abs", "all", "any", "bool", "float", "int", "len", "list", "max", "min", "range", "repr",
    "round", "sorted", "str", "sum", "tuple",
];

/// Python builtins that are never treated as dataset names, though they
/// cannot be called from expressions.
const UNAVAILABLE_BUILTINS: &[&str] = &[
    "ascii", "bin", "breakpoint", "bytearray", "bytes", "callable", "chr", "classmethod",
    "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate", "eval", "exec",
    "filter", "format", "frozenset", "getattr", "globals", "hasattr", "hash", "help", "hex", "id",
    "input", "isinstance", "issubclass", "iter", "locals", "map", "memoryview", "next", "object",
    "oct", "open", "ord", "pow", "print", "property", "reversed", "set", "setattr", "slice",
    "staticmethod", "super", "type", "vars", "zip",
];

/// Array methods that forward to the `np` function of the same name.
const ARRAY_REDUCTIONS: &[&str] = &[
    "all", "any", "argmax", "argmin", "cumsum", "max", "mean", "min", "prod", "ptp", "round",
    "std", "sum",
];

/// Whether `name` is a callable builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Whether `name` can never be a dataset identifier.
pub fn is_reserved(name: &str) -> bool {
    is_builtin(name) || UNAVAILABLE_BUILTINS.contains(&name) || name == NUMPY_ALIAS
}

/// Whether `name` is a Python builtin that expressions may not call.
pub fn is_unavailable(name: &str) -> bool {
    UNAVAILABLE_BUILTINS.contains(&name)
}

/// Evaluated call arguments.
#[derive(Debug, Clone)]
pub struct Args {
    func: String,
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    /// Arguments of a call to `func`.
    pub fn new(func: impl Into<String>, positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            func: func.into(),
            positional,
            keywords,
        }
    }

    /// Same arguments with `receiver` prepended, for methods that forward to functions.
    fn with_receiver(mut self, receiver: &Value) -> Self {
        self.positional.insert(0, receiver.clone());
        self
    }

    fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .or_else(|| self.positional.get(index))
    }

    fn required(&self, index: usize, name: &str) -> EvalResult<&Value> {
        self.get(index, name)
            .ok_or_else(|| format!("{}() missing required argument: '{}'", self.func, name))
    }

    fn int(&self, index: usize, name: &str) -> EvalResult<Option<i64>> {
        match self.get(index, name) {
            None | Some(Value::None) => Ok(None),
            Some(v) => to_index(v).map(Some),
        }
    }

    fn float(&self, index: usize, name: &str) -> EvalResult<Option<f64>> {
        match self.get(index, name) {
            None | Some(Value::None) => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                format!("{}() argument '{}' must be a number, not '{}'", self.func, name, v.type_name())
            }),
        }
    }

    fn check(&self, max_positional: usize, keywords: &[&str]) -> EvalResult<()> {
        if self.positional.len() > max_positional {
            return Err(format!(
                "{}() takes at most {} arguments ({} given)",
                self.func,
                max_positional,
                self.positional.len()
            ));
        }
        match self.keywords.iter().find(|(k, _)| !keywords.contains(&k.as_str())) {
            Some((k, _)) => Err(format!(
                "{}() got an unexpected keyword argument '{}'",
                self.func, k
            )),
            None => Ok(()),
        }
    }
}

/// Integer view used for indices, counts and axes.
pub fn to_index(value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(*b as i64),
        // integer datasets are held as floats
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        Value::Array(a) if a.len() == 1 => a
            .iter()
            .next()
            .filter(|f| f.fract() == 0.0)
            .map(|f| *f as i64)
            .ok_or_else(|| "only integers can be used as indices".to_string()),
        other => Err(format!(
            "'{}' object cannot be interpreted as an integer",
            other.type_name()
        )),
    }
}

fn array_arg(value: &Value, func: &str) -> EvalResult<ArrayD<f64>> {
    value
        .to_array()
        .ok_or_else(|| format!("{}() does not support '{}' values", func, value.type_name()))
}

fn no_attribute(value: &Value, name: &str) -> String {
    format!("'{}' object has no attribute '{}'", value.type_name(), name)
}

fn bool_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Round half to even, like Python and numpy.
pub fn round_half_even(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let y = x * scale;
    let rounded = if (y - y.trunc()).abs() == 0.5 {
        2.0 * (y / 2.0).round()
    } else {
        y.round()
    };
    rounded / scale
}

fn normalize_axis(axis: i64, ndim: usize) -> EvalResult<usize> {
    let n = ndim as i64;
    let a = if axis < 0 { axis + n } else { axis };
    if (0..n).contains(&a) {
        Ok(a as usize)
    } else {
        Err(format!(
            "axis {} is out of bounds for array of dimension {}",
            axis, ndim
        ))
    }
}

// ========== Reductions ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Sum,
    NanSum,
    Prod,
    Mean,
    NanMean,
    Std,
    Max,
    NanMax,
    Min,
    NanMin,
    Ptp,
    Median,
    ArgMax,
    ArgMin,
}

impl Reduction {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sum" => Self::Sum,
            "nansum" => Self::NanSum,
            "prod" => Self::Prod,
            "mean" | "average" => Self::Mean,
            "nanmean" => Self::NanMean,
            "std" => Self::Std,
            "max" | "amax" => Self::Max,
            "nanmax" => Self::NanMax,
            "min" | "amin" => Self::Min,
            "nanmin" => Self::NanMin,
            "ptp" => Self::Ptp,
            "median" => Self::Median,
            "argmax" => Self::ArgMax,
            "argmin" => Self::ArgMin,
            _ => return None,
        })
    }

    fn apply(self, values: &[f64]) -> EvalResult<f64> {
        let without_nan = || values.iter().copied().filter(|v| !v.is_nan()).collect::<Vec<_>>();
        let n = values.len();
        match self {
            Self::Sum => Ok(values.iter().sum()),
            Self::NanSum => Ok(without_nan().iter().sum()),
            Self::Prod => Ok(values.iter().product()),
            Self::Mean if n == 0 => Ok(f64::NAN),
            Self::Mean => Ok(values.iter().sum::<f64>() / n as f64),
            Self::NanMean => Self::Mean.apply(&without_nan()),
            Self::Std if n == 0 => Ok(f64::NAN),
            Self::Std => {
                let mean = values.iter().sum::<f64>() / n as f64;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                Ok(var.sqrt())
            },
            Self::Max | Self::Min | Self::Ptp | Self::NanMax | Self::NanMin => {
                let pool = if matches!(self, Self::NanMax | Self::NanMin) {
                    without_nan()
                } else {
                    values.to_vec()
                };
                if pool.is_empty() {
                    return Err(
                        "zero-size array to reduction operation which has no identity".to_string()
                    );
                }
                if pool.iter().any(|v| v.is_nan()) {
                    return Ok(f64::NAN);
                }
                let max = pool.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = pool.iter().copied().fold(f64::INFINITY, f64::min);
                Ok(match self {
                    Self::Max | Self::NanMax => max,
                    Self::Min | Self::NanMin => min,
                    _ => max - min,
                })
            },
            Self::Median => {
                if n == 0 || values.iter().any(|v| v.is_nan()) {
                    return Ok(f64::NAN);
                }
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                Ok(if n % 2 == 1 {
                    sorted[n / 2]
                } else {
                    (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
                })
            },
            Self::ArgMax | Self::ArgMin => {
                if n == 0 {
                    return Err("attempt to get argmax of an empty sequence".to_string());
                }
                if let Some(i) = values.iter().position(|v| v.is_nan()) {
                    return Ok(i as f64);
                }
                let mut best = 0;
                for (i, v) in values.iter().enumerate() {
                    let better = if self == Self::ArgMax {
                        *v > values[best]
                    } else {
                        *v < values[best]
                    };
                    if better {
                        best = i;
                    }
                }
                Ok(best as f64)
            },
        }
    }

    fn is_index(self) -> bool {
        matches!(self, Self::ArgMax | Self::ArgMin)
    }
}

fn reduce(value: &Value, reduction: Reduction, axis: Option<i64>, func: &str) -> EvalResult<Value> {
    let array = array_arg(value, func)?;
    match axis {
        None => {
            let flat: Vec<f64> = array.iter().copied().collect();
            let result = reduction.apply(&flat)?;
            Ok(if reduction.is_index() {
                Value::Int(result as i64)
            } else {
                Value::Float(result)
            })
        },
        Some(axis) => {
            let axis = normalize_axis(axis, array.ndim())?;
            let mut shape = array.shape().to_vec();
            shape.remove(axis);
            let values = array
                .lanes(Axis(axis))
                .into_iter()
                .map(|lane| reduction.apply(&lane.to_vec()))
                .collect::<EvalResult<Vec<f64>>>()?;
            ArrayD::from_shape_vec(IxDyn(&shape), values)
                .map(Value::from_array)
                .map_err(|e| e.to_string())
        },
    }
}

fn cumsum(value: &Value, axis: Option<i64>) -> EvalResult<Value> {
    let array = array_arg(value, "cumsum")?;
    let (mut array, axis) = match axis {
        None => {
            let flat: Vec<f64> = array.iter().copied().collect();
            let len = flat.len();
            let flat = ArrayD::from_shape_vec(IxDyn(&[len]), flat).map_err(|e| e.to_string())?;
            (flat, 0)
        },
        Some(axis) => {
            let axis = normalize_axis(axis, array.ndim())?;
            (array, axis)
        },
    };
    array.accumulate_axis_inplace(Axis(axis), |&prev, curr| *curr += prev);
    Ok(Value::Array(array))
}

fn diff(value: &Value) -> EvalResult<Value> {
    let array = array_arg(value, "diff")?;
    if array.ndim() == 0 {
        return Err("diff requires input that is at least one dimensional".to_string());
    }
    let last = Axis(array.ndim() - 1);
    let n = array.len_of(last);
    if n == 0 {
        return Ok(Value::Array(array));
    }
    let hi = array.slice_axis(last, Slice::from(1usize..));
    let lo = array.slice_axis(last, Slice::from(..n - 1));
    Ok(Value::Array(&hi - &lo))
}

fn sort(value: &Value) -> EvalResult<Value> {
    let mut array = array_arg(value, "sort")?;
    if array.ndim() == 0 {
        return Err("Cannot sort a 0-d array".to_string());
    }
    let last = Axis(array.ndim() - 1);
    for mut lane in array.lanes_mut(last) {
        let mut sorted = lane.to_vec();
        sorted.sort_by(f64::total_cmp);
        for (dst, src) in lane.iter_mut().zip(sorted) {
            *dst = src;
        }
    }
    Ok(Value::Array(array))
}

fn round_value(value: &Value, decimals: i64, func: &str) -> EvalResult<Value> {
    let decimals = decimals as i32;
    match value {
        Value::Int(i) if decimals >= 0 => Ok(Value::Int(*i)),
        Value::Bool(b) if decimals >= 0 => Ok(Value::Int(*b as i64)),
        Value::Array(a) => Ok(Value::Array(a.mapv(|x| round_half_even(x, decimals)))),
        other => match other.as_f64() {
            Some(x) => Ok(Value::Float(round_half_even(x, decimals))),
            None => Err(format!(
                "{}() does not support '{}' values",
                func,
                other.type_name()
            )),
        },
    }
}

fn elementwise(value: &Value, func: &str, f: impl Fn(f64) -> f64) -> EvalResult<Value> {
    Ok(Value::from_array(array_arg(value, func)?.mapv(f)))
}

fn unary_math(name: &str) -> Option<fn(f64) -> f64> {
    let f: fn(f64) -> f64 = match name {
        "abs" | "absolute" => f64::abs,
        "sqrt" => f64::sqrt,
        "exp" => f64::exp,
        "log" => f64::ln,
        "log10" => f64::log10,
        "log2" => f64::log2,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "arcsin" => f64::asin,
        "arccos" => f64::acos,
        "arctan" => f64::atan,
        "floor" => f64::floor,
        "ceil" => f64::ceil,
        "degrees" => f64::to_degrees,
        "radians" => f64::to_radians,
        "sign" => |x: f64| {
            if x.is_nan() {
                f64::NAN
            } else if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        },
        _ => return None,
    };
    Some(f)
}

fn float_range(start: f64, stop: f64, step: f64) -> EvalResult<Value> {
    if step == 0.0 || !step.is_finite() {
        return Err("range step must be a non-zero number".to_string());
    }
    let count = ((stop - start) / step).ceil().max(0.0);
    if count > MAX_ELEMENTS as f64 {
        return Err(too_large(&format!("range of {} elements", count)));
    }
    let values = (0..count as usize).map(|i| start + i as f64 * step).collect();
    Ok(Value::from_vec(values))
}

fn linspace(args: &Args) -> EvalResult<Value> {
    args.check(3, &["start", "stop", "num", "endpoint"])?;
    let start = args.float(0, "start")?.ok_or("linspace() missing required argument: 'start'")?;
    let stop = args.float(1, "stop")?.ok_or("linspace() missing required argument: 'stop'")?;
    let num = args.int(2, "num")?.unwrap_or(50);
    if num < 0 {
        return Err(format!("Number of samples, {}, must be non-negative.", num));
    }
    if num as u64 > MAX_ELEMENTS as u64 {
        return Err(too_large(&format!("linspace of {} samples", num)));
    }
    let endpoint = match args.get(3, "endpoint") {
        Some(v) => v.truthy()?,
        None => true,
    };
    let num = num as usize;
    let divisions = if endpoint { num.saturating_sub(1) } else { num };
    let step = if divisions == 0 {
        0.0
    } else {
        (stop - start) / divisions as f64
    };
    let mut values: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
    if endpoint && num > 1 {
        values[num - 1] = stop;
    }
    Ok(Value::from_vec(values))
}

fn as_array(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Array(_) | Value::StrArray(_) | Value::Str(_) => Ok(value.clone()),
        Value::Tuple(items) if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Str(_))) => {
            let strings: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            let len = strings.len();
            ArrayD::from_shape_vec(IxDyn(&[len]), strings)
                .map(Value::StrArray)
                .map_err(|e| e.to_string())
        },
        other => array_arg(other, "array").map(Value::from_array),
    }
}

fn transpose(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Array(a) => Ok(Value::Array(a.t().to_owned())),
        Value::StrArray(a) => Ok(Value::StrArray(a.t().to_owned())),
        other => Ok(other.clone()),
    }
}

fn flatten(value: &Value) -> EvalResult<Value> {
    match value {
        Value::StrArray(a) => {
            let items: Vec<String> = a.iter().cloned().collect();
            let len = items.len();
            ArrayD::from_shape_vec(IxDyn(&[len]), items)
                .map(Value::StrArray)
                .map_err(|e| e.to_string())
        },
        other => Ok(Value::from_vec(array_arg(other, "flatten")?.iter().copied().collect())),
    }
}

/// Call a function of the `np` alias, `np.<name>(...)`.
pub fn call_numpy(name: &str, args: Args) -> EvalResult<Value> {
    if let Some(reduction) = Reduction::from_name(name) {
        args.check(2, &["a", "axis"])?;
        let value = args.required(0, "a")?;
        return reduce(value, reduction, args.int(1, "axis")?, name);
    }
    if let Some(f) = unary_math(name) {
        args.check(1, &["x"])?;
        return elementwise(args.required(0, "x")?, name, f);
    }
    match name {
        "any" | "all" => {
            args.check(1, &["a"])?;
            let array = array_arg(args.required(0, "a")?, name)?;
            let result = if name == "any" {
                array.iter().any(|v| *v != 0.0)
            } else {
                array.iter().all(|v| *v != 0.0)
            };
            Ok(Value::Bool(result))
        },
        "isnan" => {
            args.check(1, &["x"])?;
            match args.required(0, "x")? {
                Value::Array(a) => Ok(Value::Array(a.mapv(|v| bool_f64(v.is_nan())))),
                other => Ok(Value::Bool(array_arg(other, name)?.iter().any(|v| v.is_nan()))),
            }
        },
        "round" | "around" => {
            args.check(2, &["a", "decimals"])?;
            let decimals = args.int(1, "decimals")?.unwrap_or(0);
            round_value(args.required(0, "a")?, decimals, name)
        },
        "cumsum" => {
            args.check(2, &["a", "axis"])?;
            cumsum(args.required(0, "a")?, args.int(1, "axis")?)
        },
        "diff" => {
            args.check(1, &["a"])?;
            diff(args.required(0, "a")?)
        },
        "sort" => {
            args.check(1, &["a"])?;
            sort(args.required(0, "a")?)
        },
        "array" | "asarray" => {
            args.check(1, &["object", "a"])?;
            let value = args.get(0, "object").or_else(|| args.get(0, "a"));
            as_array(value.ok_or("array() missing required argument: 'object'")?)
        },
        "arange" => {
            args.check(3, &["start", "stop", "step"])?;
            let first = args.float(0, "start")?.ok_or("arange() requires stop to be specified")?;
            match args.float(1, "stop")? {
                Some(stop) => float_range(first, stop, args.float(2, "step")?.unwrap_or(1.0)),
                None => float_range(0.0, first, 1.0),
            }
        },
        "linspace" => linspace(&args),
        "shape" => Ok(Value::shape_tuple(&args.required(0, "a")?.shape())),
        "size" => Ok(Value::Int(args.required(0, "a")?.size() as i64)),
        "ndim" => Ok(Value::Int(args.required(0, "a")?.shape().len() as i64)),
        "transpose" => transpose(args.required(0, "a")?),
        "ravel" => flatten(args.required(0, "a")?),
        _ => Err(format!("module 'numpy' has no attribute '{}'", name)),
    }
}

/// Constant of the `np` alias, `np.<name>`.
pub fn numpy_constant(name: &str) -> Option<Value> {
    Some(Value::Float(match name {
        "pi" => std::f64::consts::PI,
        "e" => std::f64::consts::E,
        "nan" | "NaN" | "NAN" => f64::NAN,
        "inf" | "Inf" | "infty" => f64::INFINITY,
        _ => return None,
    }))
}

// ========== Builtins ==========

/// Elements of an iterable value, as Python would iterate it.
fn iterate(value: &Value) -> EvalResult<Vec<Value>> {
    match value {
        Value::Tuple(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Array(a) if a.ndim() > 0 => Ok(a
            .axis_iter(Axis(0))
            .map(|row| Value::from_array(row.to_owned()))
            .collect()),
        Value::StrArray(a) if a.ndim() > 0 => Ok(a
            .axis_iter(Axis(0))
            .map(|row| {
                if row.ndim() == 0 {
                    Value::Str(row.iter().next().cloned().unwrap_or_default())
                } else {
                    Value::StrArray(row.to_owned())
                }
            })
            .collect()),
        Value::Array(_) | Value::StrArray(_) => Err("iteration over a 0-d array".to_string()),
        other => Err(format!("'{}' object is not iterable", other.type_name())),
    }
}

fn sequence_len(value: &Value) -> EvalResult<usize> {
    match value {
        Value::Str(s) => Ok(s.chars().count()),
        Value::Tuple(items) => Ok(items.len()),
        Value::Array(a) if a.ndim() > 0 => Ok(a.len_of(Axis(0))),
        Value::StrArray(a) if a.ndim() > 0 => Ok(a.len_of(Axis(0))),
        Value::Array(_) | Value::StrArray(_) => Err("len() of unsized object".to_string()),
        other => Err(format!(
            "object of type '{}' has no len()",
            other.type_name()
        )),
    }
}

fn extreme(args: &Args, want_max: bool) -> EvalResult<Value> {
    let name = if want_max { "max" } else { "min" };
    args.check(usize::MAX, &["default"])?;
    let items = match args.positional.as_slice() {
        [] => return Err(format!("{} expected at least 1 argument, got 0", name)),
        [Value::Array(a)] if a.ndim() == 1 && !a.is_empty() => {
            let reduction = if want_max { Reduction::Max } else { Reduction::Min };
            return reduce(&args.positional[0], reduction, None, name);
        },
        [only] => iterate(only)?,
        many => many.to_vec(),
    };
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return args
            .get(usize::MAX, "default")
            .cloned()
            .ok_or_else(|| format!("{}() arg is an empty sequence", name));
    };
    let op = if want_max { CmpOp::Gt } else { CmpOp::Lt };
    for item in iter {
        if compare(op, &item, &best)?.truthy()? {
            best = item;
        }
    }
    Ok(best)
}

fn builtin_sum(args: &Args) -> EvalResult<Value> {
    args.check(2, &["start"])?;
    let start = args.get(1, "start").cloned().unwrap_or(Value::Int(0));
    match args.required(0, "iterable")? {
        Value::Array(a) if a.ndim() == 1 => {
            binary(BinOp::Add, &Value::Float(a.sum()), &start)
        },
        Value::Array(a) if a.ndim() > 1 => {
            binary(BinOp::Add, &Value::Array(a.sum_axis(Axis(0))), &start)
        },
        other => iterate(other)?
            .iter()
            .try_fold(start, |acc, item| binary(BinOp::Add, &acc, item)),
    }
}

fn builtin_round(args: &Args) -> EvalResult<Value> {
    args.check(2, &["number", "ndigits"])?;
    let value = args.required(0, "number")?;
    match args.int(1, "ndigits")? {
        Some(n) => round_value(value, n, "round"),
        None => match value {
            Value::Int(_) | Value::Bool(_) => round_value(value, 0, "round"),
            Value::Array(_) => round_value(value, 0, "round"),
            other => {
                let x = other.as_f64().ok_or_else(|| {
                    format!("type {} doesn't define __round__ method", other.type_name())
                })?;
                if !x.is_finite() {
                    return Err(format!("cannot convert float {} to integer", Value::Float(x)));
                }
                Ok(Value::Int(round_half_even(x, 0) as i64))
            },
        },
    }
}

fn builtin_int(args: &Args) -> EvalResult<Value> {
    args.check(1, &[])?;
    let Some(value) = args.positional.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("invalid literal for int() with base 10: {}", value.repr())),
        other => match other.as_f64() {
            Some(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
            Some(x) => Err(format!("cannot convert float {} to integer", Value::Float(x))),
            None => Err(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            )),
        },
    }
}

fn builtin_float(args: &Args) -> EvalResult<Value> {
    args.check(1, &[])?;
    let Some(value) = args.positional.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("could not convert string to float: {}", value.repr())),
        other => other.as_f64().map(Value::Float).ok_or_else(|| {
            format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            )
        }),
    }
}

fn builtin_sorted(args: &Args) -> EvalResult<Value> {
    args.check(1, &["reverse"])?;
    let reverse = match args.get(usize::MAX, "reverse") {
        Some(v) => v.truthy()?,
        None => false,
    };
    let value = args.required(0, "iterable")?;
    if let Value::Array(a) = value {
        if a.ndim() == 1 {
            let mut values: Vec<f64> = a.iter().copied().collect();
            values.sort_by(f64::total_cmp);
            if reverse {
                values.reverse();
            }
            return Ok(Value::from_vec(values));
        }
    }
    let mut items = iterate(value)?;
    let mut failure = None;
    items.sort_by(|a, b| {
        let less = |x: &Value, y: &Value| compare(CmpOp::Lt, x, y).and_then(|v| v.truthy());
        match (less(a, b), less(b, a)) {
            (Ok(true), _) => Ordering::Less,
            (_, Ok(true)) => Ordering::Greater,
            (Err(e), _) | (_, Err(e)) => {
                failure.get_or_insert(e);
                Ordering::Equal
            },
            _ => Ordering::Equal,
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    if reverse {
        items.reverse();
    }
    Ok(Value::Tuple(items))
}

/// Call a builtin function by name.
pub fn call_builtin(name: &str, args: Args) -> EvalResult<Value> {
    match name {
        "abs" => {
            args.check(1, &[])?;
            match args.required(0, "x")? {
                Value::Int(i) => Ok(i
                    .checked_abs()
                    .map(Value::Int)
                    .unwrap_or(Value::Float((*i as f64).abs()))),
                Value::Bool(b) => Ok(Value::Int(*b as i64)),
                other if other.to_array().is_some() => elementwise(other, "abs", f64::abs),
                other => Err(format!("bad operand type for abs(): '{}'", other.type_name())),
            }
        },
        "all" | "any" => {
            args.check(1, &[])?;
            let items = iterate(args.required(0, "iterable")?)?;
            let mut result = name == "all";
            for item in &items {
                let truth = item.truthy()?;
                if name == "all" && !truth {
                    result = false;
                    break;
                }
                if name == "any" && truth {
                    result = true;
                    break;
                }
            }
            Ok(Value::Bool(result))
        },
        "bool" => {
            args.check(1, &[])?;
            match args.positional.first() {
                Some(v) => Ok(Value::Bool(v.truthy()?)),
                None => Ok(Value::Bool(false)),
            }
        },
        "float" => builtin_float(&args),
        "int" => builtin_int(&args),
        "len" => {
            args.check(1, &[])?;
            Ok(Value::Int(sequence_len(args.required(0, "obj")?)? as i64))
        },
        "list" | "tuple" => {
            args.check(1, &[])?;
            match args.positional.first() {
                Some(v) => Ok(Value::Tuple(iterate(v)?)),
                None => Ok(Value::Tuple(Vec::new())),
            }
        },
        "max" => extreme(&args, true),
        "min" => extreme(&args, false),
        "range" => {
            args.check(3, &[])?;
            let ints = args
                .positional
                .iter()
                .map(to_index)
                .collect::<EvalResult<Vec<i64>>>()?;
            match ints.as_slice() {
                [stop] => float_range(0.0, *stop as f64, 1.0),
                [start, stop] => float_range(*start as f64, *stop as f64, 1.0),
                [start, stop, step] => float_range(*start as f64, *stop as f64, *step as f64),
                _ => Err("range expected at least 1 argument, got 0".to_string()),
            }
        },
        "repr" => {
            args.check(1, &[])?;
            Ok(Value::Str(args.required(0, "obj")?.repr()))
        },
        "round" => builtin_round(&args),
        "sorted" => builtin_sorted(&args),
        "str" => {
            args.check(1, &[])?;
            Ok(Value::Str(
                args.positional.first().map(|v| v.to_string()).unwrap_or_default(),
            ))
        },
        "sum" => builtin_sum(&args),
        _ => Err(format!("name '{}' is not defined", name)),
    }
}

// ========== Attributes and methods ==========

/// Attribute access on a value, `value.<name>`.
pub fn attribute(value: &Value, name: &str) -> EvalResult<Value> {
    let numeric = matches!(
        value,
        Value::Array(_) | Value::StrArray(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_)
    );
    match (value, name) {
        (_, "shape") if numeric => Ok(Value::shape_tuple(&value.shape())),
        (_, "size") if numeric => Ok(Value::Int(value.size() as i64)),
        (_, "ndim") if numeric => Ok(Value::Int(value.shape().len() as i64)),
        (Value::Array(_) | Value::Float(_), "dtype") => Ok(Value::from("float64")),
        (Value::Int(_), "dtype") => Ok(Value::from("int64")),
        (Value::Bool(_), "dtype") => Ok(Value::from("bool")),
        (Value::StrArray(_), "dtype") => Ok(Value::from("object")),
        (_, "T") if numeric => transpose(value),
        (Value::Array(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_), "real") => {
            Ok(value.clone())
        },
        _ => Err(no_attribute(value, name)),
    }
}

/// Call a method on a value, `value.<name>(...)`.
pub fn call_method(receiver: &Value, name: &str, args: Args) -> EvalResult<Value> {
    match receiver {
        Value::Array(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
            array_method(receiver, name, args)
        },
        Value::StrArray(_) => match name {
            "flatten" | "ravel" => flatten(receiver),
            "tolist" => Ok(to_list(receiver)),
            "copy" => Ok(receiver.clone()),
            "item" => item(receiver),
            "transpose" => transpose(receiver),
            _ => Err(no_attribute(receiver, name)),
        },
        Value::Str(s) => string_method(s, name, &args).map_err(|e| {
            if e.is_empty() {
                no_attribute(receiver, name)
            } else {
                e
            }
        }),
        Value::Tuple(items) => match name {
            "index" => {
                let target = args.required(0, "value")?;
                items
                    .iter()
                    .position(|v| values_equal(v, target))
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| "tuple.index(x): x not in tuple".to_string())
            },
            "count" => {
                let target = args.required(0, "value")?;
                Ok(Value::Int(items.iter().filter(|v| values_equal(v, target)).count() as i64))
            },
            _ => Err(no_attribute(receiver, name)),
        },
        Value::None => Err(no_attribute(receiver, name)),
    }
}

fn array_method(receiver: &Value, name: &str, args: Args) -> EvalResult<Value> {
    if ARRAY_REDUCTIONS.contains(&name) {
        return call_numpy(name, args.with_receiver(receiver));
    }
    match name {
        "flatten" | "ravel" => flatten(receiver),
        "tolist" => Ok(to_list(receiver)),
        "copy" => Ok(receiver.clone()),
        "item" => item(receiver),
        "transpose" => transpose(receiver),
        "reshape" => reshape(receiver, &args),
        _ => Err(no_attribute(receiver, name)),
    }
}

fn item(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Array(a) if a.len() == 1 => Ok(Value::Float(a.iter().next().copied().unwrap_or(f64::NAN))),
        Value::StrArray(a) if a.len() == 1 => Ok(Value::Str(a.iter().next().cloned().unwrap_or_default())),
        Value::Array(_) | Value::StrArray(_) => {
            Err("can only convert an array of size 1 to a Python scalar".to_string())
        },
        other => Ok(other.clone()),
    }
}

fn to_list(value: &Value) -> Value {
    match value {
        Value::Array(a) if a.ndim() > 0 => Value::Tuple(
            a.axis_iter(Axis(0))
                .map(|row| to_list(&Value::from_array(row.to_owned())))
                .collect(),
        ),
        Value::StrArray(a) if a.ndim() > 0 => Value::Tuple(
            a.axis_iter(Axis(0))
                .map(|row| match row.ndim() {
                    0 => Value::Str(row.iter().next().cloned().unwrap_or_default()),
                    _ => to_list(&Value::StrArray(row.to_owned())),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn reshape(value: &Value, args: &Args) -> EvalResult<Value> {
    let array = array_arg(value, "reshape")?;
    let requested: Vec<i64> = match args.positional.as_slice() {
        [Value::Tuple(items)] => items.iter().map(to_index).collect::<EvalResult<_>>()?,
        many => many.iter().map(to_index).collect::<EvalResult<_>>()?,
    };
    let total = array.len() as i64;
    let known = requested
        .iter()
        .filter(|&&n| n >= 0)
        .try_fold(1i64, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| format!("cannot reshape array of size {}: shape is too large", total))?;
    let inferred = requested.iter().filter(|&&n| n < 0).count();
    let shape: Vec<usize> = match inferred {
        0 => requested.iter().map(|&n| n as usize).collect(),
        1 if known > 0 && total % known == 0 => requested
            .iter()
            .map(|&n| if n < 0 { (total / known) as usize } else { n as usize })
            .collect(),
        _ => return Err(format!("cannot reshape array of size {}", total)),
    };
    let values: Vec<f64> = array.iter().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map(Value::from_array)
        .map_err(|_| {
            format!(
                "cannot reshape array of size {} into shape {}",
                total,
                Value::shape_tuple(&shape)
            )
        })
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(ch);
            previous_alpha = false;
        }
    }
    out
}

fn string_arg<'a>(args: &'a Args, index: usize, name: &str) -> EvalResult<&'a str> {
    match args.required(index, name)? {
        Value::Str(s) => Ok(s),
        other => Err(format!(
            "{}() argument must be str, not {}",
            args.func,
            other.type_name()
        )),
    }
}

/// String methods. An empty error means the method does not exist.
fn string_method(s: &str, name: &str, args: &Args) -> EvalResult<Value> {
    let strip_chars = || -> EvalResult<Option<Vec<char>>> {
        match args.get(0, "chars") {
            None | Some(Value::None) => Ok(None),
            Some(Value::Str(chars)) => Ok(Some(chars.chars().collect())),
            Some(other) => Err(format!(
                "strip arg must be None or str, not {}",
                other.type_name()
            )),
        }
    };
    let text = match name {
        "upper" => s.to_uppercase(),
        "lower" => s.to_lowercase(),
        "title" => title_case(s),
        "capitalize" => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                None => String::new(),
            }
        },
        "strip" => match strip_chars()? {
            Some(chars) => s.trim_matches(chars.as_slice()).to_string(),
            None => s.trim().to_string(),
        },
        "lstrip" => match strip_chars()? {
            Some(chars) => s.trim_start_matches(chars.as_slice()).to_string(),
            None => s.trim_start().to_string(),
        },
        "rstrip" => match strip_chars()? {
            Some(chars) => s.trim_end_matches(chars.as_slice()).to_string(),
            None => s.trim_end().to_string(),
        },
        "replace" => {
            let old = string_arg(args, 0, "old")?;
            let new = string_arg(args, 1, "new")?;
            match args.int(2, "count")? {
                Some(count) if count >= 0 => s.replacen(old, new, count as usize),
                _ => s.replace(old, new),
            }
        },
        "decode" | "encode" => s.to_string(),
        "startswith" | "endswith" => {
            let candidates = match args.required(0, "prefix")? {
                Value::Tuple(items) => items.iter().map(|v| v.to_string()).collect(),
                Value::Str(p) => vec![p.clone()],
                other => {
                    return Err(format!(
                        "{} first arg must be str or a tuple of str, not {}",
                        name,
                        other.type_name()
                    ))
                },
            };
            let hit = candidates.iter().any(|p| {
                if name == "startswith" {
                    s.starts_with(p.as_str())
                } else {
                    s.ends_with(p.as_str())
                }
            });
            return Ok(Value::Bool(hit));
        },
        "split" => {
            let maxsplit = args.int(1, "maxsplit")?.filter(|n| *n >= 0);
            let parts: Vec<Value> = match args.get(0, "sep") {
                None | Some(Value::None) => {
                    let words = s.split_whitespace().map(Value::from);
                    match maxsplit {
                        Some(n) => {
                            let mut rest = s.trim_start();
                            let mut parts = Vec::new();
                            for _ in 0..n {
                                let Some(end) = rest.find(char::is_whitespace) else {
                                    break;
                                };
                                parts.push(Value::from(&rest[..end]));
                                rest = rest[end..].trim_start();
                            }
                            if !rest.is_empty() {
                                parts.push(Value::from(rest));
                            }
                            parts
                        },
                        None => words.collect(),
                    }
                },
                Some(Value::Str(sep)) if sep.is_empty() => return Err("empty separator".to_string()),
                Some(Value::Str(sep)) => match maxsplit {
                    Some(n) => s.splitn(n as usize + 1, sep.as_str()).map(Value::from).collect(),
                    None => s.split(sep.as_str()).map(Value::from).collect(),
                },
                Some(other) => {
                    return Err(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    ))
                },
            };
            return Ok(Value::Tuple(parts));
        },
        "join" => {
            let items = iterate(args.required(0, "iterable")?)?;
            let mut pieces = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return Err(format!(
                            "sequence item: expected str instance, {} found",
                            other.type_name()
                        ))
                    },
                }
            }
            pieces.join(s)
        },
        "find" => {
            let sub = string_arg(args, 0, "sub")?;
            let index = s
                .find(sub)
                .map(|byte| s[..byte].chars().count() as i64)
                .unwrap_or(-1);
            return Ok(Value::Int(index));
        },
        "count" => {
            let sub = string_arg(args, 0, "sub")?;
            let count = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(sub).count()
            };
            return Ok(Value::Int(count as i64));
        },
        "isdigit" | "isnumeric" => {
            return Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_numeric())));
        },
        "isalpha" => return Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic))),
        _ => return Err(String::new()),
    };
    Ok(Value::Str(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn args(values: Vec<Value>) -> Args {
        Args::new("f", values, Vec::new())
    }

    fn kwargs(values: Vec<Value>, keywords: Vec<(&str, Value)>) -> Args {
        Args::new(
            "f",
            values,
            keywords
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn arr(values: &[f64]) -> Value {
        Value::from_vec(values.to_vec())
    }

    fn matrix() -> Value {
        Value::Array(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn())
    }

    #[test]
    fn test_reductions() {
        let eta = arr(&[1.0, 3.0, 2.0]);
        assert_eq!(call_numpy("max", args(vec![eta.clone()])), Ok(Value::Float(3.0)));
        assert_eq!(call_numpy("argmax", args(vec![eta.clone()])), Ok(Value::Int(1)));
        assert_eq!(call_numpy("mean", args(vec![eta.clone()])), Ok(Value::Float(2.0)));
        assert_eq!(call_numpy("ptp", args(vec![eta.clone()])), Ok(Value::Float(2.0)));
        assert_eq!(call_numpy("median", args(vec![eta])), Ok(Value::Float(2.0)));
        assert!(call_numpy("max", args(vec![arr(&[])])).is_err());
    }

    #[test]
    fn test_reduction_along_axis() {
        assert_eq!(
            call_numpy("sum", kwargs(vec![matrix()], vec![("axis", Value::Int(0))])),
            Ok(arr(&[5.0, 7.0, 9.0]))
        );
        assert_eq!(
            call_numpy("max", kwargs(vec![matrix()], vec![("axis", Value::Int(-1))])),
            Ok(arr(&[3.0, 6.0]))
        );
        assert!(call_numpy("sum", kwargs(vec![matrix()], vec![("axis", Value::Int(2))])).is_err());
    }

    #[test]
    fn test_std_is_population() {
        let std = call_numpy("std", args(vec![arr(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])]));
        assert_eq!(std, Ok(Value::Float(2.0)));
    }

    #[test]
    fn test_elementwise_and_constants() {
        assert_eq!(call_numpy("sqrt", args(vec![arr(&[4.0, 9.0])])), Ok(arr(&[2.0, 3.0])));
        assert_eq!(call_numpy("abs", args(vec![Value::Int(-2)])), Ok(Value::Float(2.0)));
        assert_eq!(numpy_constant("pi"), Some(Value::Float(std::f64::consts::PI)));
        assert_eq!(numpy_constant("tau2"), None);
    }

    #[test]
    fn test_diff_cumsum_sort() {
        assert_eq!(call_numpy("diff", args(vec![arr(&[1.0, 4.0, 9.0])])), Ok(arr(&[3.0, 5.0])));
        assert_eq!(
            call_numpy("cumsum", args(vec![arr(&[1.0, 2.0, 3.0])])),
            Ok(arr(&[1.0, 3.0, 6.0]))
        );
        assert_eq!(call_numpy("sort", args(vec![arr(&[3.0, 1.0, 2.0])])), Ok(arr(&[1.0, 2.0, 3.0])));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(call_numpy("arange", args(vec![Value::Int(3)])), Ok(arr(&[0.0, 1.0, 2.0])));
        assert_eq!(
            call_numpy("linspace", args(vec![Value::Int(0), Value::Int(1), Value::Int(3)])),
            Ok(arr(&[0.0, 0.5, 1.0]))
        );
        assert_eq!(
            call_builtin("range", args(vec![Value::Int(1), Value::Int(7), Value::Int(3)])),
            Ok(arr(&[1.0, 4.0]))
        );
        let huge = Value::Int(1_000_000_000_000);
        assert!(call_numpy("linspace", args(vec![Value::Int(0), Value::Int(1), huge.clone()])).is_err());
        assert!(call_numpy("arange", args(vec![huge.clone()])).is_err());
        assert!(call_builtin("range", args(vec![huge])).is_err());
    }

    #[test]
    fn test_reshape_overflow_is_an_error() {
        let shape = args(vec![Value::Int(1 << 62), Value::Int(4), Value::Int(-1)]);
        let err = call_method(&arr(&[1.0, 2.0, 3.0, 4.0]), "reshape", shape).unwrap_err();
        assert!(err.contains("cannot reshape"));
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(1.234, 2), 1.23);
        assert_eq!(call_builtin("round", args(vec![Value::Float(2.7)])), Ok(Value::Int(3)));
        assert_eq!(
            call_builtin("round", args(vec![Value::Float(2.675), Value::Int(1)])),
            Ok(Value::Float(2.7))
        );
    }

    #[test]
    fn test_builtin_sum_len_max() {
        assert_eq!(call_builtin("sum", args(vec![arr(&[1.0, 2.0])])), Ok(Value::Float(3.0)));
        assert_eq!(call_builtin("sum", args(vec![matrix()])), Ok(arr(&[5.0, 7.0, 9.0])));
        assert_eq!(call_builtin("len", args(vec![matrix()])), Ok(Value::Int(2)));
        assert_eq!(
            call_builtin("max", args(vec![Value::Int(1), Value::Float(2.5), Value::Int(2)])),
            Ok(Value::Float(2.5))
        );
        assert!(call_builtin("len", args(vec![Value::Int(1)])).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call_builtin("int", args(vec![Value::from(" 42 ")])), Ok(Value::Int(42)));
        assert_eq!(call_builtin("int", args(vec![Value::Float(-2.7)])), Ok(Value::Int(-2)));
        assert_eq!(call_builtin("float", args(vec![Value::from("1e3")])), Ok(Value::Float(1000.0)));
        assert_eq!(call_builtin("str", args(vec![Value::Float(5.0)])), Ok(Value::from("5.0")));
        assert_eq!(call_builtin("repr", args(vec![Value::from("a")])), Ok(Value::from("'a'")));
        assert!(call_builtin("int", args(vec![Value::from("x")])).is_err());
    }

    #[test]
    fn test_sorted_tuple() {
        let items = Value::Tuple(vec![Value::from("b"), Value::from("a")]);
        assert_eq!(
            call_builtin("sorted", args(vec![items])),
            Ok(Value::Tuple(vec![Value::from("a"), Value::from("b")]))
        );
        let mixed = Value::Tuple(vec![Value::from("b"), Value::Int(1)]);
        assert!(call_builtin("sorted", args(vec![mixed])).is_err());
    }

    #[test]
    fn test_sorted_array() {
        assert_eq!(
            call_builtin("sorted", args(vec![arr(&[3.0, 1.0, 2.0])])),
            Ok(arr(&[1.0, 2.0, 3.0]))
        );
        assert_eq!(
            call_builtin(
                "sorted",
                kwargs(vec![arr(&[3.0, 1.0, 2.0])], vec![("reverse", Value::Bool(true))])
            ),
            Ok(arr(&[3.0, 2.0, 1.0]))
        );
    }

    #[test]
    fn test_array_attributes_and_methods() {
        assert_eq!(attribute(&matrix(), "shape"), Ok(Value::shape_tuple(&[2, 3])));
        assert_eq!(attribute(&matrix(), "T").map(|t| t.shape()), Ok(vec![3, 2]));
        assert_eq!(attribute(&Value::Float(1.0), "ndim"), Ok(Value::Int(0)));
        assert!(attribute(&Value::from("x"), "shape").is_err());
        assert_eq!(call_method(&matrix(), "max", args(vec![])), Ok(Value::Float(6.0)));
        assert_eq!(
            call_method(&matrix(), "reshape", args(vec![Value::Int(-1)])).map(|v| v.shape()),
            Ok(vec![6])
        );
        assert_eq!(
            call_method(&arr(&[1.0, 2.0]), "tolist", args(vec![])),
            Ok(Value::Tuple(vec![Value::Float(1.0), Value::Float(2.0)]))
        );
    }

    #[test]
    fn test_string_methods() {
        let s = Value::from("  scan one ");
        assert_eq!(call_method(&s, "strip", args(vec![])), Ok(Value::from("scan one")));
        assert_eq!(call_method(&Value::from("scan one"), "title", args(vec![])), Ok(Value::from("Scan One")));
        assert_eq!(
            call_method(&Value::from("a,b"), "split", args(vec![Value::from(",")])),
            Ok(Value::Tuple(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(
            call_method(&Value::from("scan"), "replace", args(vec![Value::from("s"), Value::from("S")])),
            Ok(Value::from("Scan"))
        );
        assert_eq!(
            call_method(&Value::from("scan"), "startswith", args(vec![Value::from("sc")])),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call_method(&Value::from("x"), "nope", args(vec![])),
            Err("'str' object has no attribute 'nope'".to_string())
        );
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("sum"));
        assert!(is_reserved("np"));
        assert!(is_reserved("print"));
        assert!(!is_reserved("eta"));
        assert!(is_unavailable("open"));
    }

    #[test]
    fn test_unexpected_keyword() {
        assert!(call_numpy("max", kwargs(vec![arr(&[1.0])], vec![("bins", Value::Int(1))])).is_err());
    }
}
