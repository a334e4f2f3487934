//! NeXus default-plot resolution.
//!
//! Follows the `default` attribute chain from the file root to an entry group
//! and from there to a data group, then reads that group's `signal` and
//! `axes` attributes:
//!
//! ```text
//! /            @default = "entry1"
//! /entry1      @default = "measurement"
//! /entry1/measurement  @signal = "sum"  @axes = ["eta"]
//! ```

use crate::data::address::join_address;
use crate::data::{HdfSource, Value};
use crate::error::{HdfScanError, Result};
use serde::Serialize;

/// Data group used when an entry has no `default` attribute.
pub const FALLBACK_DATA_GROUP: &str = "measurement";

/// Resolved default plot of a NeXus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultAxes {
    /// Address of the entry group.
    pub entry: String,
    /// Address of the data group.
    pub data: String,
    /// Addresses of the axes datasets, in declared order.
    pub axes: Vec<String>,
    /// Address of the signal dataset.
    pub signal: String,
}

/// Resolve the default plot, falling back to the first entry and the
/// conventional data group when `default` attributes are missing.
///
/// Fails with [`HdfScanError::NexusDefault`] when the chain cannot be followed.
pub fn resolve_default_axes(source: &dyn HdfSource) -> Result<DefaultAxes> {
    let entry = match text_attr(source, "/", "default")? {
        Some(name) => join_address("/", &name),
        None => {
            let first = source
                .children("/")?
                .into_iter()
                .next()
                .ok_or_else(|| HdfScanError::nexus("file has no entries"))?;
            join_address("/", &first.name)
        },
    };
    let data_name =
        text_attr(source, &entry, "default")?.unwrap_or_else(|| FALLBACK_DATA_GROUP.to_string());
    resolve_data_group(source, entry, &data_name)
}

/// Resolve the default plot, requiring every `default` attribute to be present.
pub fn resolve_strict_default_axes(source: &dyn HdfSource) -> Result<DefaultAxes> {
    let entry_name = text_attr(source, "/", "default")?
        .ok_or_else(|| HdfScanError::nexus("file has no 'default' attribute"))?;
    let entry = join_address("/", &entry_name);
    let data_name = text_attr(source, &entry, "default")?
        .ok_or_else(|| HdfScanError::nexus(format!("{} has no 'default' attribute", entry)))?;
    resolve_data_group(source, entry, &data_name)
}

/// Addresses of the first default axis and the signal, or empty strings when
/// the file does not follow the convention.
pub fn default_axes_addresses(source: &dyn HdfSource) -> (String, String) {
    match resolve_default_axes(source) {
        Ok(axes) => (axes.axes.into_iter().next().unwrap_or_default(), axes.signal),
        Err(e) => {
            tracing::debug!("No default axes: {}", e);
            (String::new(), String::new())
        },
    }
}

fn resolve_data_group(
    source: &dyn HdfSource,
    entry: String,
    data_name: &str,
) -> Result<DefaultAxes> {
    if !source.is_group(&entry) {
        return Err(HdfScanError::nexus(format!("entry group {} not found", entry)));
    }
    let data = join_address(&entry, data_name);
    if !source.is_group(&data) {
        return Err(HdfScanError::nexus(format!("data group {} not found", data)));
    }

    let axes_names = match source.attribute(&data, "axes")? {
        Some(value) => name_list(&value)
            .ok_or_else(|| HdfScanError::nexus(format!("{}@axes is not text", data)))?,
        None => return Err(HdfScanError::nexus(format!("{} has no 'axes' attribute", data))),
    };
    let signal_name = text_attr(source, &data, "signal")?
        .ok_or_else(|| HdfScanError::nexus(format!("{} has no 'signal' attribute", data)))?;

    let axes = axes_names
        .iter()
        .map(|name| dataset_in(source, &data, name))
        .collect::<Result<Vec<_>>>()?;
    let signal = dataset_in(source, &data, &signal_name)?;

    Ok(DefaultAxes {
        entry,
        data,
        axes,
        signal,
    })
}

fn dataset_in(source: &dyn HdfSource, group: &str, name: &str) -> Result<String> {
    let address = join_address(group, name);
    if source.is_dataset(&address) {
        Ok(address)
    } else {
        Err(HdfScanError::nexus(format!("dataset {} not found", address)))
    }
}

fn text_attr(source: &dyn HdfSource, address: &str, name: &str) -> Result<Option<String>> {
    Ok(source
        .attribute(address, name)
        .map_err(|e| HdfScanError::nexus(format!("{}@{}: {}", address, name, e)))?
        .and_then(|value| name_list(&value))
        .and_then(|names| names.into_iter().next()))
}

/// A single name or a list of names.
fn name_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Str(s) => Some(vec![s.clone()]),
        Value::StrArray(a) => Some(a.iter().cloned().collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryFile;
    use pretty_assertions::assert_eq;

    fn nexus_file() -> MemoryFile {
        MemoryFile::new("/data/1040323.nxs")
            .attr("/", "default", "entry1")
            .attr("/entry1", "NX_class", "NXentry")
            .attr("/entry1", "default", "measurement")
            .attr("/entry1/measurement", "NX_class", "NXdata")
            .attr("/entry1/measurement", "signal", "sum")
            .attr(
                "/entry1/measurement",
                "axes",
                Value::StrArray(ndarray::arr1(&["eta".to_string()]).into_dyn()),
            )
            .dataset("/entry1/measurement/eta", Value::from_vec(vec![1.0, 2.0, 3.0]))
            .dataset("/entry1/measurement/sum", Value::from_vec(vec![5.0, 9.0, 4.0]))
    }

    #[test]
    fn test_resolve_default_axes() {
        let axes = resolve_default_axes(&nexus_file()).unwrap();
        assert_eq!(
            axes,
            DefaultAxes {
                entry: "/entry1".to_string(),
                data: "/entry1/measurement".to_string(),
                axes: vec!["/entry1/measurement/eta".to_string()],
                signal: "/entry1/measurement/sum".to_string(),
            }
        );
    }

    #[test]
    fn test_fallbacks_without_default_attributes() {
        let file = MemoryFile::new("scan.nxs")
            .attr("/entry1/measurement", "signal", "sum")
            .attr("/entry1/measurement", "axes", "eta")
            .dataset("/entry1/measurement/eta", Value::from_vec(vec![1.0, 2.0]))
            .dataset("/entry1/measurement/sum", Value::from_vec(vec![1.0, 2.0]));
        let (axes, signal) = default_axes_addresses(&file);
        assert_eq!(axes, "/entry1/measurement/eta");
        assert_eq!(signal, "/entry1/measurement/sum");

        let strict = resolve_strict_default_axes(&file);
        assert!(matches!(strict, Err(HdfScanError::NexusDefault(_))));
    }

    #[test]
    fn test_missing_signal_dataset_fails() {
        let file = MemoryFile::new("scan.nxs")
            .attr("/entry1/measurement", "signal", "missing")
            .attr("/entry1/measurement", "axes", "eta")
            .dataset("/entry1/measurement/eta", Value::from_vec(vec![1.0, 2.0]));
        assert!(resolve_default_axes(&file).is_err());
        assert_eq!(default_axes_addresses(&file), (String::new(), String::new()));
    }

    #[test]
    fn test_strict_accepts_compliant_file() {
        let axes = resolve_strict_default_axes(&nexus_file()).unwrap();
        assert_eq!(axes.signal, "/entry1/measurement/sum");
    }
}
