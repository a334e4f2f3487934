//! Structural index of a hierarchical file.

use super::nexus::{resolve_default_axes, DefaultAxes};
use crate::data::address::{address_name, join_address};
use crate::data::{Attributes, HdfSource, LinkKind, NodeKind, Value};
use crate::error::Result;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// Group attribute holding the NeXus class.
pub const NX_CLASS: &str = "NX_class";
/// Dataset attribute holding an alternate short name.
pub const LOCAL_NAME: &str = "local_name";
/// Class given to groups without a readable class attribute.
pub const DEFAULT_CLASS: &str = "Group";
/// Groups nested deeper than this are not descended into.
const MAX_DEPTH: usize = 64;

/// A mapped group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupInfo {
    /// NeXus class, or `"Group"`.
    pub class: String,
    /// Short name.
    pub name: String,
}

/// A mapped dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Short name.
    pub name: String,
    /// Number of elements.
    pub size: usize,
    /// Shape; empty for scalars.
    pub shape: Vec<usize>,
    /// All attributes, read once while mapping.
    pub attrs: Attributes,
}

impl DatasetInfo {
    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// Index of every group and dataset in a file, grouped by role.
///
/// Built once per open file with [`build_map`] (or [`HdfMap::build`]) and
/// not updated afterwards; rebuild it when the file is reopened.
/// Every index keeps depth-first pre-order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HdfMap {
    /// address -> class and short name.
    pub groups: IndexMap<String, GroupInfo>,
    /// class -> group addresses. The first address is the default group of that class.
    pub classes: IndexMap<String, Vec<String>>,
    /// address -> dataset summary, soft-linked datasets excluded.
    pub datasets: IndexMap<String, DatasetInfo>,
    /// name -> address of every dataset with at least one dimension.
    pub arrays: IndexMap<String, String>,
    /// name -> address of every scalar dataset.
    pub values: IndexMap<String, String>,
    /// address -> summary of every dataset with three or more dimensions.
    pub image_data: IndexMap<String, DatasetInfo>,
    /// Arrays whose length is the most common array length in the file.
    pub scannables: IndexMap<String, String>,
    /// Lookup used for name resolution: values, then arrays, then scannables.
    pub combined: IndexMap<String, String>,
    /// NeXus default plot, when the file declares one.
    pub default_axes: Option<DefaultAxes>,
}

impl HdfMap {
    /// Map a file. Equivalent to [`build_map`].
    pub fn build(source: &dyn HdfSource) -> Result<Self> {
        build_map(source)
    }

    /// Address registered for `name` in the combined lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.combined.get(name).map(String::as_str)
    }

    /// Summary of the dataset registered for `name`.
    pub fn dataset_for(&self, name: &str) -> Option<&DatasetInfo> {
        self.get(name).and_then(|address| self.datasets.get(address))
    }

    /// First group address of a class, e.g. the default `NXdata` group.
    pub fn first_of_class(&self, class: &str) -> Option<&str> {
        self.classes
            .get(class)
            .and_then(|addresses| addresses.first())
            .map(String::as_str)
    }

    /// Element count shared by the scannables, if there are any.
    pub fn scannable_length(&self) -> Option<usize> {
        self.scannables
            .values()
            .next()
            .and_then(|address| self.datasets.get(address))
            .map(|info| info.size)
    }

    /// Address of the first default axis, if resolved.
    pub fn axes_address(&self) -> Option<&str> {
        self.arrays.get("axes").map(String::as_str)
    }

    /// Address of the default signal, if resolved.
    pub fn signal_address(&self) -> Option<&str> {
        self.arrays.get("signal").map(String::as_str)
    }
}

/// Walk a file once and build its [`HdfMap`].
///
/// Unreadable attributes and dangling links are logged and skipped; errors
/// listing a group's members propagate.
pub fn build_map(source: &dyn HdfSource) -> Result<HdfMap> {
    let mut map = HdfMap::default();

    match resolve_default_axes(source) {
        Ok(axes) => {
            if let Some(first) = axes.axes.first() {
                map.arrays.insert("axes".to_string(), first.clone());
            }
            map.arrays.insert("signal".to_string(), axes.signal.clone());
            map.default_axes = Some(axes);
        },
        Err(e) => tracing::debug!("No NeXus default axes: {}", e),
    }

    walk_group(source, "/", 0, &mut map)?;

    // Seeded entries may point at soft links, which are not registered.
    let datasets = &map.datasets;
    map.arrays.retain(|name, address| {
        let known = datasets.contains_key(address.as_str());
        if !known {
            tracing::debug!("Dropping {} -> {}: not a mapped dataset", name, address);
        }
        known
    });

    map.scannables = select_scannables(&map.arrays, &map.datasets);
    map.combined = map
        .values
        .iter()
        .chain(map.arrays.iter())
        .chain(map.scannables.iter())
        .map(|(name, address)| (name.clone(), address.clone()))
        .collect();

    tracing::info!(
        "Mapped {} groups, {} datasets ({} scannables of length {:?})",
        map.groups.len(),
        map.datasets.len(),
        map.scannables.len(),
        map.scannable_length()
    );
    Ok(map)
}

fn walk_group(source: &dyn HdfSource, group: &str, depth: usize, map: &mut HdfMap) -> Result<()> {
    if depth >= MAX_DEPTH {
        tracing::warn!("Not descending into {}: nested deeper than {}", group, MAX_DEPTH);
        return Ok(());
    }

    for link in source.children(group)? {
        let address = join_address(group, &link.name);
        let kind = match source.node_kind(&address) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", address, e);
                continue;
            },
        };

        match kind {
            NodeKind::Group => {
                register_group(source, &address, map);
                walk_group(source, &address, depth + 1, map)?;
            },
            NodeKind::Dataset if link.kind == LinkKind::Soft => {
                tracing::debug!("Skipping soft-linked dataset {}", address);
            },
            NodeKind::Dataset => register_dataset(source, &address, map),
            NodeKind::Other => {},
        }
    }
    Ok(())
}

fn register_group(source: &dyn HdfSource, address: &str, map: &mut HdfMap) {
    let class = match source.attribute(address, NX_CLASS) {
        Ok(Some(Value::Str(class))) => class,
        Ok(Some(other)) => other.to_string(),
        Ok(None) => DEFAULT_CLASS.to_string(),
        Err(e) => {
            tracing::warn!("Unreadable attributes on {}: {}", address, e);
            DEFAULT_CLASS.to_string()
        },
    };

    map.classes
        .entry(class.clone())
        .or_default()
        .push(address.to_string());
    map.groups.insert(
        address.to_string(),
        GroupInfo {
            class,
            name: address_name(address),
        },
    );
}

fn register_dataset(source: &dyn HdfSource, address: &str, map: &mut HdfMap) {
    let shape = match source.shape(address) {
        Ok(shape) => shape,
        Err(e) => {
            tracing::warn!("Skipping dataset {}: {}", address, e);
            return;
        },
    };
    let attrs = source.attributes(address).unwrap_or_else(|e| {
        tracing::warn!("Unreadable attributes on {}: {}", address, e);
        Attributes::new()
    });

    let name = address_name(address);
    let alt_name = attrs
        .get(LOCAL_NAME)
        .and_then(Value::as_str)
        .map(address_name);
    let info = DatasetInfo {
        name: name.clone(),
        size: shape.iter().product(),
        shape,
        attrs,
    };

    let index = if info.ndim() == 0 {
        &mut map.values
    } else {
        &mut map.arrays
    };
    index.insert(name, address.to_string());
    if let Some(alt_name) = alt_name {
        index.insert(alt_name, address.to_string());
    }

    if info.ndim() >= 3 {
        map.image_data.insert(address.to_string(), info.clone());
    }
    map.datasets.insert(address.to_string(), info);
}

/// Keep the arrays whose element count is the most common count above one.
///
/// Each dataset counts once, however many names point at it. Equal
/// frequencies resolve to the smallest length.
fn select_scannables(
    arrays: &IndexMap<String, String>,
    datasets: &IndexMap<String, DatasetInfo>,
) -> IndexMap<String, String> {
    let mut frequency: IndexMap<usize, usize> = IndexMap::new();
    let mut seen = HashSet::new();
    for address in arrays.values() {
        if !seen.insert(address.as_str()) {
            continue;
        }
        if let Some(info) = datasets.get(address) {
            if info.size > 1 {
                *frequency.entry(info.size).or_default() += 1;
            }
        }
    }

    let Some(length) = frequency
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(length, _)| *length)
    else {
        return IndexMap::new();
    };

    arrays
        .iter()
        .filter(|(_, address)| datasets.get(address.as_str()).map(|d| d.size) == Some(length))
        .map(|(name, address)| (name.clone(), address.clone()))
        .collect()
}
