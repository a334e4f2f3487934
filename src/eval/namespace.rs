//! Safety filter, identifier discovery and namespace construction.

use super::builtins::is_reserved;
use super::EvalOptions;
use crate::data::{HdfSource, Value};
use crate::error::{HdfScanError, Result};
use crate::mapping::HdfMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Values visible to one evaluation, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    values: IndexMap<String, Value>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Name to short rendering of every binding, for error reports.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.summary()))
            .collect()
    }
}

/// Identifiers an expression refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    /// Names found by parsing, minus builtins and the `np` alias.
    pub parsed: Vec<String>,
    /// Mapped names that occur anywhere in the text but were not parsed as names.
    pub substring: Vec<String>,
}

/// Reject text containing a deny-listed pattern.
pub fn check_expression(expression: &str, options: &EvalOptions) -> Result<()> {
    match options
        .deny_list
        .iter()
        .find(|pattern| expression.contains(pattern.as_str()))
    {
        Some(pattern) => Err(HdfScanError::UnsafeExpression {
            expression: expression.to_string(),
            pattern: pattern.clone(),
        }),
        None => Ok(()),
    }
}

/// Collect the identifiers of `text`.
///
/// `parsed_names` come from the syntax tree. The second pass picks up every
/// name in `map.combined` occurring as a substring of `text`, which is how a
/// dataset named like a builtin (`sum`) is still bound.
pub fn find_identifiers(text: &str, parsed_names: &[String], map: &HdfMap) -> Identifiers {
    let mut parsed: Vec<String> = Vec::new();
    for name in parsed_names {
        if !is_reserved(name) && !parsed.contains(name) {
            parsed.push(name.clone());
        }
    }
    let substring = map
        .combined
        .keys()
        .filter(|name| text.contains(name.as_str()) && !parsed.contains(name))
        .cloned()
        .collect();
    Identifiers { parsed, substring }
}

/// Build the namespace for one evaluation.
///
/// Mapped names are read from `source`. Unmapped parsed names get the
/// sentinel from `options`. Extras (`filename`, `filepath`, `axes_address`,
/// `signal_address`) are always bound but never shadow a dataset.
pub fn generate_namespace(
    source: &dyn HdfSource,
    map: &HdfMap,
    identifiers: &Identifiers,
    options: &EvalOptions,
) -> Result<Namespace> {
    let mut namespace = Namespace::new();

    let path = source.file_path();
    let filepath = path.map(|p| p.display().to_string()).unwrap_or_default();
    let filename = path
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    namespace.insert("filepath", Value::Str(filepath));
    namespace.insert("filename", Value::Str(filename));
    namespace.insert(
        "axes_address",
        Value::from(map.axes_address().unwrap_or("None")),
    );
    namespace.insert(
        "signal_address",
        Value::from(map.signal_address().unwrap_or("None")),
    );

    for name in &identifiers.parsed {
        let Some(address) = map.get(name) else {
            continue;
        };
        let value = source.read_value(address)?;
        tracing::debug!("Bound {} -> {}", name, address);
        namespace.insert(format!("{}{}", options.alias_prefix, name), Value::from(address));
        namespace.insert(name.clone(), value);
    }

    for name in &identifiers.substring {
        let Some(address) = map.get(name) else {
            continue;
        };
        match source.read_value(address) {
            Ok(value) => {
                tracing::debug!("Bound {} -> {} (substring match)", name, address);
                namespace.insert(format!("{}{}", options.alias_prefix, name), Value::from(address));
                namespace.insert(name.clone(), value);
            },
            Err(e) => tracing::debug!("Skipping {} ({}): {}", name, address, e),
        }
    }

    for name in &identifiers.parsed {
        if !namespace.contains(name) {
            tracing::debug!("{} is not in the file; binding the default", name);
            namespace.insert(name.clone(), options.default_value.clone());
        }
    }

    Ok(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryFile;

    fn sample() -> (MemoryFile, HdfMap) {
        let file = MemoryFile::new("/data/scan.1.nxs")
            .dataset("/entry/title", "scan 1")
            .dataset("/entry/measurement/eta", Value::from_vec(vec![1.0, 2.0, 3.0]))
            .dataset("/entry/measurement/sum", Value::from_vec(vec![4.0, 5.0, 6.0]));
        let map = HdfMap::build(&file).unwrap();
        (file, map)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_deny_list() {
        let options = EvalOptions::default();
        assert!(check_expression("eta.max()", &options).is_ok());
        let err = check_expression("import os", &options).unwrap_err();
        assert!(matches!(
            err,
            HdfScanError::UnsafeExpression { ref pattern, .. } if pattern == "import"
        ));
        assert!(check_expression("eta.__class__", &options).is_err());
    }

    #[test]
    fn test_find_identifiers_excludes_reserved() {
        let (_, map) = sample();
        let ids = find_identifiers("np.max(eta) + sum(foo)", &names(&["np", "eta", "sum", "foo"]), &map);
        assert_eq!(ids.parsed, names(&["eta", "foo"]));
        assert_eq!(ids.substring, names(&["sum"]));
    }

    #[test]
    fn test_namespace_bindings() {
        let (file, map) = sample();
        let ids = find_identifiers("eta + missing", &names(&["eta", "missing"]), &map);
        let ns = generate_namespace(&file, &map, &ids, &EvalOptions::default()).unwrap();
        assert_eq!(ns.get("eta"), Some(&Value::from_vec(vec![1.0, 2.0, 3.0])));
        assert_eq!(ns.get("_eta"), Some(&Value::from("/entry/measurement/eta")));
        assert_eq!(ns.get("missing"), Some(&Value::from("--")));
        assert_eq!(ns.get("filename"), Some(&Value::from("scan.1.nxs")));
        assert_eq!(ns.get("filepath"), Some(&Value::from("/data/scan.1.nxs")));
        assert_eq!(ns.get("signal_address"), Some(&Value::from("None")));
        assert!(ns.get("title").is_none());
    }

    #[test]
    fn test_extras_are_not_replaced_by_default() {
        let (file, map) = sample();
        let ids = find_identifiers("filename", &names(&["filename"]), &map);
        let ns = generate_namespace(&file, &map, &ids, &EvalOptions::default()).unwrap();
        assert_eq!(ns.get("filename"), Some(&Value::from("scan.1.nxs")));
    }

    #[test]
    fn test_snapshot_summarises_values() {
        let mut ns = Namespace::new();
        ns.insert("big", Value::from_vec(vec![0.0; 20]));
        ns.insert("title", Value::from("scan 1"));
        let snapshot = ns.snapshot();
        assert_eq!(snapshot["big"], "float64 (20,)");
        assert_eq!(snapshot["title"], "'scan 1'");
    }
}
