//! HDF5 file reader.

use super::{Attributes, ChildLink, HdfSource, LinkKind, NodeKind, Value};
use crate::error::{HdfScanError, Result};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Container, File, LinkType, Location, LocationType};
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};

/// Fixed-length strings are read through a buffer of this many bytes.
const FIXED_STRING_LEN: usize = 1024;

/// File extensions treated as HDF5/NeXus files.
pub const EXTENSIONS: [&str; 4] = [".nxs", ".hdf", ".hdf5", ".h5"];

/// An HDF5 file opened read-only.
///
/// Each instance owns its own handle; open one per thread.
#[derive(Debug)]
pub struct Hdf5File {
    path: PathBuf,
    file: File,
}

impl Hdf5File {
    /// Open an HDF5 file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| HdfScanError::file_open(path, e))?;
        tracing::info!("Opened {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Whether `path` is a readable HDF5 file.
    pub fn is_hdf5(path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        path.is_file() && File::open(path).is_ok()
    }

    /// The underlying HDF5 handle.
    pub fn inner(&self) -> &File {
        &self.file
    }

    fn location(&self, address: &str) -> Result<Location> {
        match self.node_kind(address)? {
            NodeKind::Group => Ok((*self.file.group(address)?).clone()),
            NodeKind::Dataset => Ok((**self.file.dataset(address)?).clone()),
            NodeKind::Other => Err(HdfScanError::not_a_dataset(address)),
        }
    }

    fn dataset(&self, address: &str) -> Result<hdf5::Dataset> {
        if !self.contains(address) {
            return Err(HdfScanError::not_found(address));
        }
        self.file
            .dataset(address)
            .map_err(|_| HdfScanError::not_a_dataset(address))
    }
}

impl HdfSource for Hdf5File {
    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn children(&self, group: &str) -> Result<Vec<ChildLink>> {
        let group = self.file.group(group)?;
        let links = group.iter_visit_default(Vec::new(), |_, name, info, links| {
            let kind = match info.link_type {
                LinkType::Hard => LinkKind::Hard,
                LinkType::Soft => LinkKind::Soft,
                LinkType::External => LinkKind::External,
            };
            links.push(ChildLink::new(name, kind));
            true
        })?;
        Ok(links)
    }

    fn node_kind(&self, address: &str) -> Result<NodeKind> {
        if address == "/" {
            return Ok(NodeKind::Group);
        }
        Ok(match self.file.loc_type_by_name(address)? {
            LocationType::Group => NodeKind::Group,
            LocationType::Dataset => NodeKind::Dataset,
            _ => NodeKind::Other,
        })
    }

    fn attributes(&self, address: &str) -> Result<Attributes> {
        let location = self.location(address)?;
        let mut attrs = Attributes::new();
        for name in location.attr_names()? {
            let attr = location.attr(&name)?;
            match read_container(&attr) {
                Ok(value) => {
                    attrs.insert(name, value);
                },
                Err(e) => {
                    tracing::debug!("Skipping attribute {}@{}: {}", address, name, e);
                },
            }
        }
        Ok(attrs)
    }

    fn attribute(&self, address: &str, name: &str) -> Result<Option<Value>> {
        let location = self.location(address)?;
        if !location.attr_names()?.iter().any(|n| n == name) {
            return Ok(None);
        }
        let attr = location.attr(name)?;
        read_container(&attr).map(Some)
    }

    fn shape(&self, address: &str) -> Result<Vec<usize>> {
        Ok(self.dataset(address)?.shape())
    }

    fn size(&self, address: &str) -> Result<usize> {
        Ok(self.dataset(address)?.size())
    }

    fn dtype(&self, address: &str) -> Result<String> {
        let descriptor = self.dataset(address)?.dtype()?.to_descriptor()?;
        Ok(dtype_name(&descriptor))
    }

    fn read_value(&self, address: &str) -> Result<Value> {
        let dataset = self.dataset(address)?;
        read_container(&dataset)
    }

    fn contains(&self, address: &str) -> bool {
        if address == "/" {
            return true;
        }
        if !address.starts_with('/') || address.contains("//") || address.ends_with('/') {
            return false;
        }
        // Every intermediate link must exist before H5Lexists can be asked about the leaf.
        let mut prefix = String::new();
        for segment in address.trim_start_matches('/').split('/') {
            prefix.push('/');
            prefix.push_str(segment);
            if !self.file.link_exists(&prefix) {
                return false;
            }
        }
        self.file.loc_type_by_name(address).is_ok()
    }
}

/// Numpy-style name for an HDF5 type.
fn dtype_name(descriptor: &TypeDescriptor) -> String {
    match descriptor {
        TypeDescriptor::Integer(size) => format!("int{}", *size as usize * 8),
        TypeDescriptor::Unsigned(size) => format!("uint{}", *size as usize * 8),
        TypeDescriptor::Float(size) => format!("float{}", *size as usize * 8),
        TypeDescriptor::Boolean => "bool".to_string(),
        TypeDescriptor::Enum(_) => "enum".to_string(),
        TypeDescriptor::Compound(_) => "compound".to_string(),
        TypeDescriptor::FixedAscii(n) | TypeDescriptor::FixedUnicode(n) => format!("|S{}", n),
        TypeDescriptor::VarLenAscii | TypeDescriptor::VarLenUnicode => "object".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

/// Read a dataset or attribute into a [`Value`].
///
/// Numeric data is converted to `f64` arrays; 0-d integers stay integers.
fn read_container(container: &Container) -> Result<Value> {
    let descriptor = container.dtype()?.to_descriptor()?;
    let shape = container.shape();
    let scalar = shape.is_empty();

    match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Enum(_)
            if scalar =>
        {
            Ok(Value::Int(container.read_scalar::<i64>()?))
        },
        TypeDescriptor::Boolean if scalar => Ok(Value::Bool(container.read_scalar::<bool>()?)),
        TypeDescriptor::Float(_) if scalar => Ok(Value::Float(container.read_scalar::<f64>()?)),
        TypeDescriptor::Integer(_)
        | TypeDescriptor::Unsigned(_)
        | TypeDescriptor::Enum(_)
        | TypeDescriptor::Float(_) => {
            let values: Vec<f64> = container.read_raw::<f64>()?;
            numeric_array(&shape, values)
        },
        TypeDescriptor::Boolean => {
            let values: Vec<bool> = container.read_raw::<bool>()?;
            numeric_array(&shape, values.into_iter().map(|b| b as u8 as f64).collect())
        },
        TypeDescriptor::VarLenUnicode => {
            let values = container.read_raw::<VarLenUnicode>()?;
            string_value(&shape, values.iter().map(|s| s.as_str().to_string()).collect())
        },
        TypeDescriptor::VarLenAscii => {
            let values = container.read_raw::<VarLenAscii>()?;
            string_value(&shape, values.iter().map(|s| s.as_str().to_string()).collect())
        },
        TypeDescriptor::FixedAscii(_) => {
            let values = container.read_raw::<FixedAscii<FIXED_STRING_LEN>>()?;
            string_value(&shape, values.iter().map(|s| s.as_str().to_string()).collect())
        },
        TypeDescriptor::FixedUnicode(_) => {
            let values = container.read_raw::<FixedUnicode<FIXED_STRING_LEN>>()?;
            string_value(&shape, values.iter().map(|s| s.as_str().to_string()).collect())
        },
        other => Err(HdfScanError::Hdf5(format!(
            "Unsupported data type: {}",
            dtype_name(&other)
        ))),
    }
}

fn numeric_array(shape: &[usize], values: Vec<f64>) -> Result<Value> {
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map(Value::from_array)
        .map_err(|e| HdfScanError::Hdf5(format!("Invalid shape/data size: {}", e)))
}

fn string_value(shape: &[usize], mut values: Vec<String>) -> Result<Value> {
    if shape.is_empty() {
        return Ok(Value::Str(values.pop().unwrap_or_default()));
    }
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map(Value::StrArray)
        .map_err(|e| HdfScanError::Hdf5(format!("Invalid shape/data size: {}", e)))
}
