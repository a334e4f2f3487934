//! The file-handle abstraction the mapper and evaluator work against.

use super::Value;
use crate::error::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Attributes of a group or dataset, in the order the file reports them.
pub type Attributes = IndexMap<String, Value>;

/// What an address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// Container node.
    Group,
    /// Leaf node holding data.
    Dataset,
    /// Anything else (named datatypes and similar).
    Other,
}

/// How a child is linked into its parent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkKind {
    /// Ordinary link to an object in this file.
    Hard,
    /// Symbolic link by path within this file.
    Soft,
    /// Link to an object in another file.
    External,
}

/// A named child entry of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLink {
    /// Link name (last address segment).
    pub name: String,
    /// Link type.
    pub kind: LinkKind,
}

impl ChildLink {
    /// Create a child link.
    pub fn new(name: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// An open, read-only hierarchical data file.
///
/// Addresses are absolute slash-delimited paths; the root group is `/`.
/// Implemented for real HDF5 files by [`super::Hdf5File`] and for in-memory
/// trees by [`super::MemoryFile`].
pub trait HdfSource {
    /// Path of the file on disk, if there is one.
    fn file_path(&self) -> Option<&Path>;

    /// Child links of the group at `group`, in iteration order.
    fn children(&self, group: &str) -> Result<Vec<ChildLink>>;

    /// Kind of object at `address`, following links.
    fn node_kind(&self, address: &str) -> Result<NodeKind>;

    /// All attributes of the object at `address`.
    fn attributes(&self, address: &str) -> Result<Attributes>;

    /// One attribute of the object at `address`, `None` when absent.
    fn attribute(&self, address: &str, name: &str) -> Result<Option<Value>> {
        Ok(self.attributes(address)?.shift_remove(name))
    }

    /// Shape of the dataset at `address`; empty for scalars.
    fn shape(&self, address: &str) -> Result<Vec<usize>>;

    /// Number of elements of the dataset at `address`.
    fn size(&self, address: &str) -> Result<usize> {
        Ok(self.shape(address)?.iter().product())
    }

    /// Numpy-style dtype name of the dataset at `address`.
    fn dtype(&self, address: &str) -> Result<String>;

    /// Materialize the full value of the dataset at `address`.
    fn read_value(&self, address: &str) -> Result<Value>;

    /// Whether `address` names an object in the file.
    fn contains(&self, address: &str) -> bool;

    /// Whether `address` names a dataset.
    fn is_dataset(&self, address: &str) -> bool {
        self.contains(address) && matches!(self.node_kind(address), Ok(NodeKind::Dataset))
    }

    /// Whether `address` names a group.
    fn is_group(&self, address: &str) -> bool {
        self.contains(address) && matches!(self.node_kind(address), Ok(NodeKind::Group))
    }
}
