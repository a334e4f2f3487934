//! Data access.
//!
//! This module defines the file-handle abstraction ([`HdfSource`]) that the
//! mapper and evaluator read through, the [`Value`] type they return, and the
//! two implementations: real HDF5 files and an in-memory tree.

pub mod address;
mod memory;
mod reader;
mod source;
mod value;

pub use memory::MemoryFile;
pub use reader::{Hdf5File, EXTENSIONS};
pub use source::{Attributes, ChildLink, HdfSource, LinkKind, NodeKind};
pub use value::{format_float, Value};
