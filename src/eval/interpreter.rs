//! Tree-walking evaluator over a namespace.

use super::ast::{BoolOp, Expr, Index};
use super::builtins::{
    attribute, call_builtin, call_method, call_numpy, is_builtin, is_unavailable, numpy_constant,
    to_index, Args, NUMPY_ALIAS,
};
use super::namespace::Namespace;
use super::ops::{self, EvalResult, IndexValue};
use crate::data::Value;
use ndarray::{ArrayD, Axis, IxDyn};

/// Evaluates expression trees. Nothing outside the namespace, the builtins
/// and the `np` alias is reachable.
#[derive(Debug)]
pub struct Interpreter<'a> {
    namespace: &'a Namespace,
}

impl<'a> Interpreter<'a> {
    /// Interpreter resolving names in `namespace`.
    pub fn new(namespace: &'a Namespace) -> Self {
        Self { namespace }
    }

    /// Evaluate `expr`.
    pub fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            Expr::List(items) => list_value(self.eval_all(items)?),
            Expr::Unary { op, operand } => ops::unary(*op, &self.eval(operand)?),
            Expr::Binary { op, lhs, rhs } => ops::binary(*op, &self.eval(lhs)?, &self.eval(rhs)?),
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                let mut result = Value::Bool(true);
                for (i, (op, right)) in rest.iter().enumerate() {
                    let right = self.eval(right)?;
                    result = ops::compare(*op, &left, &right)?;
                    // a < b < c stops at the first false link
                    if i + 1 < rest.len() && !result.truthy()? {
                        return Ok(result);
                    }
                    left = right;
                }
                Ok(result)
            },
            Expr::Logical { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                let short_circuit = match op {
                    BoolOp::And => !left.truthy()?,
                    BoolOp::Or => left.truthy()?,
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(rhs)
                }
            },
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.truthy()? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            },
            Expr::Attribute { value, attr } => {
                if is_numpy(value) {
                    return numpy_constant(attr).ok_or_else(|| {
                        format!("module 'numpy' has no constant '{}'; call np.{}()", attr, attr)
                    });
                }
                attribute(&self.eval(value)?, attr)
            },
            Expr::Subscript { value, index } => {
                let target = self.eval(value)?;
                let index = index
                    .iter()
                    .map(|component| self.eval_index(component))
                    .collect::<EvalResult<Vec<_>>>()?;
                ops::subscript(&target, &index)
            },
            Expr::Call { func, args, kwargs } => self.call(func, args, kwargs),
        }
    }

    fn eval_all(&self, items: &[Expr]) -> EvalResult<Vec<Value>> {
        items.iter().map(|item| self.eval(item)).collect()
    }

    /// Namespace bindings shadow builtins when used as values.
    fn lookup(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.namespace.get(name) {
            return Ok(value.clone());
        }
        if name == NUMPY_ALIAS {
            Err("module 'numpy' cannot be used as a value".to_string())
        } else if is_builtin(name) {
            Err(format!("builtin function '{}' cannot be used as a value", name))
        } else {
            Err(format!("name '{}' is not defined", name))
        }
    }

    fn eval_index(&self, component: &Index) -> EvalResult<IndexValue> {
        let bound = |expr: &Option<Expr>| -> EvalResult<Option<i64>> {
            match expr {
                None => Ok(None),
                Some(expr) => match self.eval(expr)? {
                    Value::None => Ok(None),
                    value => to_index(&value).map(Some),
                },
            }
        };
        match component {
            Index::Single(expr) => {
                let value = self.eval(expr)?;
                to_index(&value).map(IndexValue::Single).map_err(|_| {
                    format!(
                        "only integers and slices are valid indices, not '{}'",
                        value.type_name()
                    )
                })
            },
            Index::Slice { start, stop, step } => {
                Ok(IndexValue::Slice(bound(start)?, bound(stop)?, bound(step)?))
            },
        }
    }

    /// Builtin names always win in call position.
    fn call(&self, func: &Expr, args: &[Expr], kwargs: &[(String, Expr)]) -> EvalResult<Value> {
        let positional = self.eval_all(args)?;
        let keywords = kwargs
            .iter()
            .map(|(name, expr)| Ok((name.clone(), self.eval(expr)?)))
            .collect::<EvalResult<Vec<_>>>()?;

        match func {
            Expr::Name(name) if is_builtin(name) => {
                call_builtin(name, Args::new(name.as_str(), positional, keywords))
            },
            Expr::Name(name) if is_unavailable(name) => {
                Err(format!("'{}' is not available in expressions", name))
            },
            Expr::Attribute { value, attr } if is_numpy(value) => {
                call_numpy(attr, Args::new(attr.as_str(), positional, keywords))
            },
            Expr::Attribute { value, attr } => {
                let receiver = self.eval(value)?;
                call_method(&receiver, attr, Args::new(attr.as_str(), positional, keywords))
            },
            other => {
                let callee = self.eval(other)?;
                Err(format!("'{}' object is not callable", callee.type_name()))
            },
        }
    }
}

fn is_numpy(expr: &Expr) -> bool {
    matches!(expr, Expr::Name(name) if name == NUMPY_ALIAS)
}

/// List literals of numbers (or equal-shaped arrays) become arrays, lists of
/// strings become string arrays, anything else a tuple.
fn list_value(items: Vec<Value>) -> EvalResult<Value> {
    if items.is_empty() {
        return Ok(Value::from_vec(Vec::new()));
    }
    if items.iter().all(|v| matches!(v, Value::Str(_))) {
        let strings: Vec<String> = items.iter().map(|v| v.to_string()).collect();
        let len = strings.len();
        return ArrayD::from_shape_vec(IxDyn(&[len]), strings)
            .map(Value::StrArray)
            .map_err(|e| e.to_string());
    }
    let numeric = items.iter().all(|v| {
        matches!(
            v,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Array(_)
        )
    });
    if !numeric {
        return Ok(Value::Tuple(items));
    }
    if let Some(scalars) = items
        .iter()
        .map(|v| match v {
            Value::Array(_) => None,
            other => other.as_f64(),
        })
        .collect::<Option<Vec<f64>>>()
    {
        return Ok(Value::from_vec(scalars));
    }
    let arrays: Vec<ArrayD<f64>> = items.iter().filter_map(Value::to_array).collect();
    let first_shape = arrays[0].shape();
    if arrays.iter().any(|a| a.shape() != first_shape) {
        return Ok(Value::Tuple(items));
    }
    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    ndarray::stack(Axis(0), &views)
        .map(Value::Array)
        .map_err(|e| e.to_string())
}
