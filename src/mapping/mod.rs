//! File-structure mapping.
//!
//! Walks a file once and indexes its groups and datasets by address, class
//! and short name. See [`HdfMap`].

mod map;
pub mod nexus;

pub use map::{build_map, DatasetInfo, GroupInfo, HdfMap, DEFAULT_CLASS, LOCAL_NAME, NX_CLASS};
pub use nexus::{
    default_axes_addresses, resolve_default_axes, resolve_strict_default_axes, DefaultAxes,
};
