//! Expression syntax tree.

use crate::data::Value;

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
    /// `not x`
    Not,
    /// `~x`
    Invert,
}

/// Arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// One component of a subscript, `a[1, 2:5]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    /// A single position.
    Single(Expr),
    /// `start:stop:step`, each part optional.
    Slice {
        /// First position.
        start: Option<Expr>,
        /// End position, exclusive.
        stop: Option<Expr>,
        /// Stride.
        step: Option<Expr>,
    },
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number, string, boolean or `None`.
    Literal(Value),
    /// Identifier looked up in the namespace.
    Name(String),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `[a, b]`
    List(Vec<Expr>),
    /// Prefix operator.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Arithmetic or bitwise operator.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Chained comparison, `a < b <= c`.
    Compare {
        /// Leftmost operand.
        first: Box<Expr>,
        /// Each operator with its right operand.
        rest: Vec<(CmpOp, Expr)>,
    },
    /// `and` / `or`.
    Logical {
        /// Operator.
        op: BoolOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand, evaluated only when needed.
        rhs: Box<Expr>,
    },
    /// `then if condition else otherwise`
    Conditional {
        /// Test.
        condition: Box<Expr>,
        /// Value when the test is true.
        then: Box<Expr>,
        /// Value when the test is false.
        otherwise: Box<Expr>,
    },
    /// `value.attr`
    Attribute {
        /// Receiver.
        value: Box<Expr>,
        /// Attribute name.
        attr: String,
    },
    /// `value[index]`
    Subscript {
        /// Receiver.
        value: Box<Expr>,
        /// One component per comma-separated axis.
        index: Vec<Index>,
    },
    /// `func(args, name=value)`
    Call {
        /// Callee.
        func: Box<Expr>,
        /// Positional arguments.
        args: Vec<Expr>,
        /// Keyword arguments in source order.
        kwargs: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// Every identifier referenced as a name, in source order with duplicates.
    ///
    /// Attribute names and keyword-argument names are not identifiers.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {},
            Expr::Name(name) => out.push(name.clone()),
            Expr::Tuple(items) | Expr::List(items) => {
                items.iter().for_each(|e| e.collect_names(out));
            },
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            },
            Expr::Compare { first, rest } => {
                first.collect_names(out);
                rest.iter().for_each(|(_, e)| e.collect_names(out));
            },
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                then.collect_names(out);
                condition.collect_names(out);
                otherwise.collect_names(out);
            },
            Expr::Attribute { value, .. } => value.collect_names(out),
            Expr::Subscript { value, index } => {
                value.collect_names(out);
                for idx in index {
                    match idx {
                        Index::Single(e) => e.collect_names(out),
                        Index::Slice { start, stop, step } => {
                            [start, stop, step]
                                .into_iter()
                                .flatten()
                                .for_each(|e| e.collect_names(out));
                        },
                    }
                }
            },
            Expr::Call { func, args, kwargs } => {
                func.collect_names(out);
                args.iter().for_each(|e| e.collect_names(out));
                kwargs.iter().for_each(|(_, e)| e.collect_names(out));
            },
        }
    }
}
