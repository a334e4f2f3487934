//! Values read from datasets and produced by expressions.

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use serde::Serialize;
use std::fmt;

/// Arrays longer than this are summarised with `...` when rendered.
const SUMMARY_THRESHOLD: usize = 1000;
/// Items kept at each end of a summarised axis.
const SUMMARY_EDGE: usize = 3;

/// A scalar, array, string or tuple value.
///
/// Numeric arrays are always held as `f64`, whatever the stored dtype.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value.
    None,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// Text.
    Str(String),
    /// N-dimensional numeric array.
    Array(ArrayD<f64>),
    /// N-dimensional array of strings.
    StrArray(ArrayD<String>),
    /// Fixed sequence, e.g. an array shape.
    Tuple(Vec<Value>),
}

impl Value {
    /// Build a value from a numeric array, collapsing 0-d arrays to a float.
    pub fn from_array(array: ArrayD<f64>) -> Self {
        if array.ndim() == 0 {
            return Value::Float(array.iter().next().copied().unwrap_or(f64::NAN));
        }
        Value::Array(array)
    }

    /// Build a 1-D numeric array value.
    pub fn from_vec(values: Vec<f64>) -> Self {
        let len = values.len();
        Value::Array(ArrayD::from_shape_vec(IxDyn(&[len]), values).unwrap_or_else(|_| {
            ArrayD::zeros(IxDyn(&[0]))
        }))
    }

    /// Build a shape tuple.
    pub fn shape_tuple(shape: &[usize]) -> Self {
        Value::Tuple(shape.iter().map(|&n| Value::Int(n as i64)).collect())
    }

    /// Python-style type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Array(_) | Value::StrArray(_) => "ndarray",
            Value::Tuple(_) => "tuple",
        }
    }

    /// Numpy-style shape. Scalars and strings have the empty shape.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::Array(a) => a.shape().to_vec(),
            Value::StrArray(a) => a.shape().to_vec(),
            Value::Tuple(items) => vec![items.len()],
            _ => Vec::new(),
        }
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Scalar numeric view, accepting single-element arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Array(a) if a.len() == 1 => a.iter().next().copied(),
            _ => None,
        }
    }

    /// Text view of string scalars.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::StrArray(a) if a.ndim() == 0 => a.iter().next().map(String::as_str),
            _ => None,
        }
    }

    /// Numeric array view: scalars become 0-d arrays, numeric tuples 1-D arrays.
    pub fn to_array(&self) -> Option<ArrayD<f64>> {
        match self {
            Value::Array(a) => Some(a.clone()),
            Value::Tuple(items) => {
                let values = items
                    .iter()
                    .map(Value::as_f64)
                    .collect::<Option<Vec<f64>>>()?;
                ArrayD::from_shape_vec(IxDyn(&[values.len()]), values).ok()
            },
            other => other.as_f64().map(|v| ArrayD::from_elem(IxDyn(&[]), v)),
        }
    }

    /// Python truthiness. Arrays with more than one element are ambiguous.
    pub fn truthy(&self) -> std::result::Result<bool, String> {
        match self {
            Value::None => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::Tuple(items) => Ok(!items.is_empty()),
            Value::Array(a) if a.len() == 1 => Ok(a.iter().all(|v| *v != 0.0)),
            Value::StrArray(a) if a.len() == 1 => Ok(a.iter().all(|s| !s.is_empty())),
            Value::Array(_) | Value::StrArray(_) => Err(
                "The truth value of an array with more than one element is ambiguous".to_string(),
            ),
        }
    }

    /// Python `repr()`.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// Short rendering for diagnostics: large arrays show only dtype and shape.
    pub fn summary(&self) -> String {
        match self {
            Value::Array(a) if a.len() > 10 => format!("float64 {}", Value::shape_tuple(a.shape())),
            Value::StrArray(a) if a.len() > 10 => format!("str {}", Value::shape_tuple(a.shape())),
            other => other.repr(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(a) => {
                let summarise = a.len() > SUMMARY_THRESHOLD;
                write!(f, "{}", render_array(a.view(), summarise, 1, &format_element))
            },
            Value::StrArray(a) => {
                let summarise = a.len() > SUMMARY_THRESHOLD;
                write!(f, "{}", render_array(a.view(), summarise, 1, &|s: &String| quote(s)))
            },
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                if parts.len() == 1 {
                    write!(f, "({},)", parts[0])
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            },
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Python `repr()` of a float: shortest round-trip digits, `1.0` for whole
/// numbers, two-digit signed exponents.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{:?}", v);
    match s.find('e') {
        Some(pos) => {
            let (mantissa, exp) = s.split_at(pos);
            let exp = &exp[1..];
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        },
        None => s,
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Numpy prints whole floats as `1.` inside arrays.
fn format_element(v: &f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{}.", *v as i64)
    } else {
        format_float(*v)
    }
}

fn render_array<T>(
    view: ArrayViewD<'_, T>,
    summarise: bool,
    indent: usize,
    element: &dyn Fn(&T) -> String,
) -> String {
    if view.ndim() == 0 {
        return view.iter().next().map(element).unwrap_or_default();
    }
    let len = view.len_of(Axis(0));
    let indices: Vec<Option<usize>> = if summarise && len > 2 * SUMMARY_EDGE {
        (0..SUMMARY_EDGE)
            .map(Some)
            .chain(std::iter::once(None))
            .chain((len - SUMMARY_EDGE..len).map(Some))
            .collect()
    } else {
        (0..len).map(Some).collect()
    };

    let parts: Vec<String> = indices
        .into_iter()
        .map(|i| match i {
            Some(i) => render_array(view.index_axis(Axis(0), i), summarise, indent + 1, element),
            None => "...".to_string(),
        })
        .collect();

    let separator = if view.ndim() == 1 {
        " ".to_string()
    } else {
        format!("{}{}", "\n".repeat(view.ndim() - 1), " ".repeat(indent))
    };
    format!("[{}]", parts.join(&separator))
}
