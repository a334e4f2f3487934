//! Expression evaluation against a mapped file.
//!
//! Expressions use a restricted Python-like grammar ([`parser`]) and are
//! evaluated by a tree-walking [`interpreter::Interpreter`] over a
//! [`Namespace`] holding only the datasets the expression mentions. Nothing
//! else is reachable: there is no import, no attribute walk into runtime
//! internals, and no assignment.
//!
//! ```
//! use hdfscan::data::{MemoryFile, Value};
//! use hdfscan::eval::{evaluate, format_string};
//! use hdfscan::mapping::HdfMap;
//!
//! let file = MemoryFile::new("/tmp/scan.nxs")
//!     .dataset("/entry1/title", "scan 1")
//!     .dataset("/entry1/measurement/eta", Value::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
//! let map = HdfMap::build(&file).unwrap();
//!
//! assert_eq!(evaluate(&file, "eta.max()", &map).unwrap(), Value::Float(5.0));
//! assert_eq!(format_string(&file, "{title}: {eta.shape}", &map).unwrap(), "scan 1: (5,)");
//! ```

pub mod ast;
pub mod builtins;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod namespace;
pub mod ops;
pub mod parser;

pub use namespace::{check_expression, find_identifiers, generate_namespace, Identifiers, Namespace};

use crate::data::{HdfSource, Value};
use crate::error::{HdfScanError, Result};
use crate::mapping::HdfMap;
use ast::Expr;
use format::Piece;
use interpreter::Interpreter;

/// Substrings that make an expression unsafe to evaluate.
pub const DEFAULT_DENY_LIST: [&str; 5] = ["import", "os.", "sys.", "subprocess", "__"];

/// Value bound to names the file does not contain.
pub const DEFAULT_VALUE: &str = "--";

/// Prefix of the `_<name>` address aliases.
pub const DEFAULT_ALIAS_PREFIX: &str = "_";

/// Evaluation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    /// Expressions containing any of these substrings are rejected unparsed.
    pub deny_list: Vec<String>,
    /// Bound to identifiers with no dataset behind them.
    pub default_value: Value,
    /// `<prefix><name>` is bound to the address of dataset `name`.
    pub alias_prefix: String,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            deny_list: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
            default_value: Value::from(DEFAULT_VALUE),
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
        }
    }
}

/// Evaluates expressions and templates against one open file and its map.
pub struct Evaluator<'a> {
    source: &'a dyn HdfSource,
    map: &'a HdfMap,
    options: EvalOptions,
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("file", &self.source.file_path())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> Evaluator<'a> {
    /// Evaluator with default options.
    pub fn new(source: &'a dyn HdfSource, map: &'a HdfMap) -> Self {
        Self::with_options(source, map, EvalOptions::default())
    }

    /// Evaluator with custom options.
    pub fn with_options(source: &'a dyn HdfSource, map: &'a HdfMap, options: EvalOptions) -> Self {
        Self {
            source,
            map,
            options,
        }
    }

    /// Options in use.
    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Evaluate one expression.
    ///
    /// An expression that is exactly a dataset address returns that dataset.
    pub fn evaluate(&self, expression: &str) -> Result<Value> {
        let trimmed = expression.trim();
        if self.source.is_dataset(trimmed) {
            tracing::debug!("{} is a dataset address, reading directly", trimmed);
            return self.source.read_value(trimmed);
        }
        check_expression(expression, &self.options)?;

        let expr = parser::parse(expression)?;
        let namespace = self.namespace(expression, &expr.names())?;
        Interpreter::new(&namespace)
            .eval(&expr)
            .map_err(|message| evaluation_error(expression, message, &namespace))
    }

    /// Render a template, replacing each `{expression}` field.
    pub fn format(&self, template: &str) -> Result<String> {
        check_expression(template, &self.options)?;
        let pieces = format::parse_template(template)?;

        let mut fields = Vec::new();
        let mut names = Vec::new();
        for piece in &pieces {
            if let Piece::Field(field) = piece {
                let expr = parser::parse(&field.expression).map_err(|e| match e {
                    HdfScanError::Syntax {
                        position, message, ..
                    } => HdfScanError::syntax(template, field.offset + position, message),
                    other => other,
                })?;
                names.extend(expr.names());
                fields.push(expr);
            }
        }
        let namespace = self.namespace(template, &names)?;
        let interpreter = Interpreter::new(&namespace);

        let mut out = String::with_capacity(template.len());
        let mut exprs = fields.iter();
        for piece in &pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Field(field) => {
                    let Some(expr) = exprs.next() else {
                        break;
                    };
                    let rendered = interpreter
                        .eval(expr)
                        .map(|value| format::convert(value, field.conversion))
                        .and_then(|value| format::format_value(&value, &field.spec))
                        .map_err(|message| evaluation_error(template, message, &namespace))?;
                    out.push_str(&rendered);
                },
            }
        }
        Ok(out)
    }

    /// Namespace an expression would be evaluated in.
    pub fn namespace_for(&self, expression: &str) -> Result<Namespace> {
        check_expression(expression, &self.options)?;
        let expr: Expr = parser::parse(expression)?;
        self.namespace(expression, &expr.names())
    }

    fn namespace(&self, text: &str, names: &[String]) -> Result<Namespace> {
        let identifiers = find_identifiers(text, names, self.map);
        tracing::debug!(
            "Identifiers in {:?}: parsed {:?}, substring {:?}",
            text,
            identifiers.parsed,
            identifiers.substring
        );
        generate_namespace(self.source, self.map, &identifiers, &self.options)
    }
}

fn evaluation_error(expression: &str, message: String, namespace: &Namespace) -> HdfScanError {
    tracing::debug!("Evaluation of {:?} failed: {}", expression, message);
    HdfScanError::Evaluation {
        expression: expression.to_string(),
        message,
        namespace: namespace.snapshot(),
    }
}

/// Evaluate `expression` against `source` using default options.
pub fn evaluate(source: &dyn HdfSource, expression: &str, map: &HdfMap) -> Result<Value> {
    Evaluator::new(source, map).evaluate(expression)
}

/// Render `template` against `source` using default options.
pub fn format_string(source: &dyn HdfSource, template: &str, map: &HdfMap) -> Result<String> {
    Evaluator::new(source, map).format(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryFile;
    use pretty_assertions::assert_eq;

    fn scan() -> (MemoryFile, HdfMap) {
        let file = MemoryFile::new("/data/12345.nxs")
            .attr("/entry1", "NX_class", "NXentry")
            .dataset("/entry1/title", "scan 1")
            .dataset(
                "/entry1/measurement/eta",
                Value::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            );
        let map = HdfMap::build(&file).unwrap();
        (file, map)
    }

    #[test]
    fn test_evaluate_method_call() {
        let (file, map) = scan();
        assert_eq!(evaluate(&file, "eta.max()", &map).unwrap(), Value::Float(5.0));
        assert_eq!(
            evaluate(&file, "eta.max() - eta.min()", &map).unwrap(),
            Value::Float(4.0)
        );
    }

    #[test]
    fn test_format_string() {
        let (file, map) = scan();
        assert_eq!(
            format_string(&file, "{title}: {eta.shape}", &map).unwrap(),
            "scan 1: (5,)"
        );
        assert_eq!(
            format_string(&file, "{filename} {eta.mean():.2f} {{x}}", &map).unwrap(),
            "12345.nxs 3.00 {x}"
        );
        assert_eq!(
            format_string(&file, "{_eta}", &map).unwrap(),
            "/entry1/measurement/eta"
        );
    }

    #[test]
    fn test_builtin_named_dataset() {
        let file = MemoryFile::new("/data/1.nxs")
            .dataset("/entry/measurement/sum", Value::from_vec(vec![1.0, 2.0]))
            .dataset("/entry/measurement/total", Value::from_vec(vec![3.0, 4.0]));
        let map = HdfMap::build(&file).unwrap();
        assert_eq!(evaluate(&file, "sum(total)", &map).unwrap(), Value::Float(7.0));
        assert_eq!(evaluate(&file, "np.sum(sum)", &map).unwrap(), Value::Float(3.0));
        assert_eq!(
            evaluate(&file, "sum", &map).unwrap(),
            Value::from_vec(vec![1.0, 2.0])
        );
    }

    #[test]
    fn test_direct_address_matches_name() {
        let (file, map) = scan();
        assert_eq!(
            evaluate(&file, "/entry1/measurement/eta", &map).unwrap(),
            evaluate(&file, "eta", &map).unwrap()
        );
    }

    #[test]
    fn test_direct_address_with_denied_text() {
        let file = MemoryFile::new("/data/1.nxs")
            .dataset("/entry1/sample/pos.x", 2.5)
            .dataset("/entry1/important", 1i64);
        let map = HdfMap::build(&file).unwrap();
        assert_eq!(
            evaluate(&file, "/entry1/sample/pos.x", &map).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(evaluate(&file, " /entry1/important ", &map).unwrap(), Value::Int(1));
        assert_eq!(evaluate(&file, "pos_x", &map).unwrap(), Value::Float(2.5));
        let err = evaluate(&file, "/entry1/sample/pos.y", &map).unwrap_err();
        assert!(matches!(err, HdfScanError::UnsafeExpression { .. }));
    }

    #[test]
    fn test_unsafe_expression_rejected() {
        let (file, map) = scan();
        let err = evaluate(&file, "import os", &map).unwrap_err();
        assert!(matches!(err, HdfScanError::UnsafeExpression { .. }));
        let err = format_string(&file, "{eta.__class__}", &map).unwrap_err();
        assert!(matches!(err, HdfScanError::UnsafeExpression { .. }));
    }

    #[test]
    fn test_unknown_name_gets_default() {
        let (file, map) = scan();
        assert_eq!(evaluate(&file, "missing", &map).unwrap(), Value::from("--"));
        let err = evaluate(&file, "missing + 1", &map).unwrap_err();
        match err {
            HdfScanError::Evaluation { namespace, .. } => {
                assert_eq!(namespace["missing"], "'--'");
            },
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_custom_options() {
        let (file, map) = scan();
        let options = EvalOptions {
            default_value: Value::None,
            alias_prefix: "addr_".to_string(),
            ..EvalOptions::default()
        };
        let evaluator = Evaluator::with_options(&file, &map, options);
        assert_eq!(evaluator.evaluate("missing").unwrap(), Value::None);
        assert_eq!(
            evaluator.format("{addr_title}").unwrap(),
            "/entry1/title"
        );
    }

    #[test]
    fn test_template_syntax_position() {
        let (file, map) = scan();
        let err = format_string(&file, "ab {eta +}", &map).unwrap_err();
        match err {
            HdfScanError::Syntax {
                expression,
                position,
                ..
            } => {
                assert_eq!(expression, "ab {eta +}");
                assert!(position >= 4);
            },
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_namespace_for() {
        let (file, map) = scan();
        let evaluator = Evaluator::new(&file, &map);
        let ns = evaluator.namespace_for("eta * 2").unwrap();
        assert!(ns.contains("eta"));
        assert!(ns.contains("_eta"));
        assert!(!ns.contains("title"));
    }
}
