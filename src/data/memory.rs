//! In-memory hierarchical file, for tests and synthetic trees.

use super::address::{basename, join_address, parent_address};
use super::{Attributes, ChildLink, HdfSource, LinkKind, NodeKind, Value};
use crate::error::{HdfScanError, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
enum EntryKind {
    Group,
    Dataset(Value),
}

#[derive(Debug, Clone)]
struct Entry {
    kind: EntryKind,
    attrs: Attributes,
    attrs_unreadable: bool,
}

impl Entry {
    fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            attrs: Attributes::new(),
            attrs_unreadable: false,
        }
    }
}

/// A hierarchical file held entirely in memory.
///
/// Built with chained calls; missing parent groups are created on the way.
///
/// ```
/// use hdfscan::data::{HdfSource, MemoryFile, Value};
///
/// let file = MemoryFile::new("/tmp/scan.nxs")
///     .attr("/entry1", "NX_class", "NXentry")
///     .dataset("/entry1/title", "scan 1")
///     .dataset("/entry1/measurement/eta", Value::from_vec(vec![1.0, 2.0, 3.0]));
/// assert!(file.is_dataset("/entry1/measurement/eta"));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFile {
    path: PathBuf,
    entries: HashMap<String, Entry>,
    links: IndexMap<String, Vec<ChildLink>>,
    soft_targets: HashMap<String, String>,
}

impl MemoryFile {
    /// Create an empty file with only the root group.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut entries = HashMap::new();
        entries.insert("/".to_string(), Entry::new(EntryKind::Group));
        Self {
            path: path.into(),
            entries,
            links: IndexMap::new(),
            soft_targets: HashMap::new(),
        }
    }

    /// Add an (empty) group.
    pub fn group(mut self, address: &str) -> Self {
        self.insert(address, EntryKind::Group, LinkKind::Hard);
        self
    }

    /// Add a dataset holding `value`.
    pub fn dataset(mut self, address: &str, value: impl Into<Value>) -> Self {
        self.insert(address, EntryKind::Dataset(value.into()), LinkKind::Hard);
        self
    }

    /// Add a dataset that is reached through an external link.
    pub fn external_dataset(mut self, address: &str, value: impl Into<Value>) -> Self {
        self.insert(address, EntryKind::Dataset(value.into()), LinkKind::External);
        self
    }

    /// Add a soft link at `address` pointing to `target`.
    pub fn soft_link(mut self, address: &str, target: &str) -> Self {
        let address = normalize(address);
        self.ensure_parents(&address);
        self.push_link(&address, LinkKind::Soft);
        self.soft_targets.insert(address, normalize(target));
        self
    }

    /// Set an attribute, creating the object as a group if it does not exist.
    pub fn attr(mut self, address: &str, name: &str, value: impl Into<Value>) -> Self {
        let address = normalize(address);
        if !self.entries.contains_key(&address) {
            self.insert(&address, EntryKind::Group, LinkKind::Hard);
        }
        if let Some(entry) = self.entries.get_mut(&address) {
            entry.attrs.insert(name.to_string(), value.into());
        }
        self
    }

    /// Make attribute reads on `address` fail.
    pub fn unreadable_attrs(mut self, address: &str) -> Self {
        if let Some(entry) = self.entries.get_mut(&normalize(address)) {
            entry.attrs_unreadable = true;
        }
        self
    }

    fn insert(&mut self, address: &str, kind: EntryKind, link: LinkKind) {
        let address = normalize(address);
        if address == "/" {
            return;
        }
        self.ensure_parents(&address);
        if !self.entries.contains_key(&address) {
            self.push_link(&address, link);
        }
        let attrs = self
            .entries
            .remove(&address)
            .map(|e| e.attrs)
            .unwrap_or_default();
        let mut entry = Entry::new(kind);
        entry.attrs = attrs;
        self.entries.insert(address, entry);
    }

    fn ensure_parents(&mut self, address: &str) {
        let parent = parent_address(address).to_string();
        if parent == "/" || self.entries.contains_key(&parent) {
            return;
        }
        self.ensure_parents(&parent);
        self.push_link(&parent, LinkKind::Hard);
        self.entries.insert(parent, Entry::new(EntryKind::Group));
    }

    fn push_link(&mut self, address: &str, kind: LinkKind) {
        self.links
            .entry(parent_address(address).to_string())
            .or_default()
            .push(ChildLink::new(basename(address), kind));
    }

    fn resolve<'a>(&'a self, address: &str) -> Result<(String, &'a Entry)> {
        let mut address = normalize(address);
        // Soft links may chain; bound the walk so cycles fail instead of spinning.
        for _ in 0..32 {
            if let Some(target) = self.soft_targets.get(&address) {
                address = target.clone();
                continue;
            }
            return self
                .entries
                .get(&address)
                .map(|entry| (address.clone(), entry))
                .ok_or_else(|| HdfScanError::not_found(address.clone()));
        }
        Err(HdfScanError::not_found(address))
    }

    fn dataset_value(&self, address: &str) -> Result<&Value> {
        match self.resolve(address)? {
            (_, Entry { kind: EntryKind::Dataset(value), .. }) => Ok(value),
            _ => Err(HdfScanError::not_a_dataset(address)),
        }
    }
}

fn normalize(address: &str) -> String {
    let trimmed = address.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        join_address("/", trimmed)
    }
}

impl HdfSource for MemoryFile {
    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn children(&self, group: &str) -> Result<Vec<ChildLink>> {
        let (resolved, entry) = self.resolve(group)?;
        if !matches!(entry.kind, EntryKind::Group) {
            return Err(HdfScanError::Hdf5(format!("{} is not a group", group)));
        }
        Ok(self.links.get(&resolved).cloned().unwrap_or_default())
    }

    fn node_kind(&self, address: &str) -> Result<NodeKind> {
        Ok(match self.resolve(address)?.1.kind {
            EntryKind::Group => NodeKind::Group,
            EntryKind::Dataset(_) => NodeKind::Dataset,
        })
    }

    fn attributes(&self, address: &str) -> Result<Attributes> {
        let (_, entry) = self.resolve(address)?;
        if entry.attrs_unreadable {
            return Err(HdfScanError::Hdf5(format!(
                "unable to read attributes of {}",
                address
            )));
        }
        Ok(entry.attrs.clone())
    }

    fn shape(&self, address: &str) -> Result<Vec<usize>> {
        Ok(self.dataset_value(address)?.shape())
    }

    fn dtype(&self, address: &str) -> Result<String> {
        Ok(match self.dataset_value(address)? {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int64",
            Value::Float(_) | Value::Array(_) | Value::Tuple(_) => "float64",
            Value::Str(_) | Value::StrArray(_) => "object",
            Value::None => "void",
        }
        .to_string())
    }

    fn read_value(&self, address: &str) -> Result<Value> {
        self.dataset_value(address).cloned()
    }

    fn contains(&self, address: &str) -> bool {
        address.starts_with('/') && self.resolve(address).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryFile {
        MemoryFile::new("/data/scan.nxs")
            .attr("/entry1", "NX_class", "NXentry")
            .dataset("/entry1/title", "scan 1")
            .dataset("/entry1/measurement/eta", Value::from_vec(vec![1.0, 2.0]))
            .soft_link("/entry1/plot/eta", "/entry1/measurement/eta")
    }

    #[test]
    fn test_parents_created_in_order() {
        let file = sample();
        let names: Vec<String> = file
            .children("/entry1")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["title", "measurement", "plot"]);
    }

    #[test]
    fn test_soft_link_resolves() {
        let file = sample();
        let links = file.children("/entry1/plot").unwrap();
        assert_eq!(links, vec![ChildLink::new("eta", LinkKind::Soft)]);
        assert_eq!(file.node_kind("/entry1/plot/eta").unwrap(), NodeKind::Dataset);
        assert_eq!(file.shape("/entry1/plot/eta").unwrap(), vec![2]);
    }

    #[test]
    fn test_attr_on_existing_dataset_keeps_value() {
        let file = sample().attr("/entry1/title", "units", "none");
        assert_eq!(file.read_value("/entry1/title").unwrap(), Value::from("scan 1"));
        assert_eq!(
            file.attribute("/entry1/title", "units").unwrap(),
            Some(Value::from("none"))
        );
    }

    #[test]
    fn test_unreadable_attrs_fail() {
        let file = sample().unreadable_attrs("/entry1");
        assert!(file.attributes("/entry1").is_err());
    }

    #[test]
    fn test_contains() {
        let file = sample();
        assert!(file.contains("/entry1/title"));
        assert!(!file.contains("/entry1/missing"));
        assert!(!file.contains("title"));
    }
}
