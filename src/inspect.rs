//! Human-readable summaries of objects in a file.
//!
//! These back the `describe` command and anything else that wants to show a
//! group or dataset without building a full map.

use crate::data::address::{basename, parent_address};
use crate::data::{HdfSource, LinkKind, NodeKind, Value};
use crate::error::{HdfScanError, Result};
use crate::mapping::{HdfMap, NX_CLASS};
use ndarray::{Array2, Array3, Axis};

/// Datasets with more elements than this are not printed by [`describe`].
pub const MAX_TEXTVIEW_SIZE: usize = 1000;

/// Format a count with thousand separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Short text for the dataset at `address`.
///
/// Single-element datasets give their value; larger ones give
/// `"<dtype> <shape>"`. Anything that is not a dataset gives `default`.
pub fn dataset_summary(source: &dyn HdfSource, address: &str, default: &str) -> Result<String> {
    if !source.is_dataset(address) {
        return Ok(default.to_string());
    }
    if source.size(address)? > 1 {
        let shape = Value::shape_tuple(&source.shape(address)?);
        return Ok(format!("{} {}", source.dtype(address)?, shape));
    }
    let value = match source.read_value(address)? {
        Value::Array(a) if a.len() == 1 => a.iter().next().map_or(Value::None, |v| Value::Float(*v)),
        Value::StrArray(a) if a.len() == 1 => a.iter().next().map_or(Value::None, |s| Value::from(s.as_str())),
        other => other,
    };
    Ok(value.to_string())
}

/// How `address` is linked into its parent group.
pub fn link_kind(source: &dyn HdfSource, address: &str) -> Option<LinkKind> {
    if address == "/" {
        return Some(LinkKind::Hard);
    }
    let name = basename(address);
    source
        .children(parent_address(address))
        .ok()?
        .into_iter()
        .find(|link| link.name == name)
        .map(|link| link.kind)
}

/// Multi-line description of the object at `address`.
///
/// Lists kind, link type, NeXus class and attributes; datasets also get
/// shape, size, dtype and (when small enough) their values.
pub fn describe(source: &dyn HdfSource, address: &str) -> Result<String> {
    if !source.contains(address) {
        return Err(HdfScanError::not_found(address));
    }
    let kind = source.node_kind(address)?;
    let attrs = match source.attributes(address) {
        Ok(attrs) => attrs,
        Err(e) => {
            tracing::warn!("Could not read attributes of {}: {}", address, e);
            Default::default()
        },
    };

    let mut lines = vec![
        address.to_string(),
        format!("Kind: {:?}", kind),
        match link_kind(source, address) {
            Some(link) => format!("Link: {:?}", link),
            None => "Link: No link".to_string(),
        },
    ];
    if let Some(class) = attrs.get(NX_CLASS) {
        lines.push(format!("Class: {}", class));
    }

    lines.push(String::new());
    lines.push("attrs:".to_string());
    lines.extend(attrs.iter().map(|(name, value)| format!("{}: {}", name, value)));

    if kind == NodeKind::Dataset {
        let shape = source.shape(address)?;
        let size = source.size(address)?;
        lines.push(String::new());
        lines.push("--- Data ---".to_string());
        lines.push(format!("Shape: {}", Value::shape_tuple(&shape)));
        lines.push(format!("Size: {}", format_number(size)));
        lines.push(format!("Dtype: {}", source.dtype(address)?));
        lines.push("Values:".to_string());
        if size > MAX_TEXTVIEW_SIZE {
            lines.push("---Too large to view---".to_string());
        } else {
            lines.push(source.read_value(address)?.to_string());
        }
    }
    Ok(lines.join("\n"))
}

/// Address of the first dataset with three or more dimensions.
pub fn first_image_address(map: &HdfMap) -> Option<&str> {
    map.image_data.keys().next().map(String::as_str)
}

/// Problem preventing `address` being used as an image stack, if any.
pub fn check_image_dataset(source: &dyn HdfSource, address: &str) -> Option<String> {
    if address.is_empty() {
        return Some("Please select a Dataset address".to_string());
    }
    let file = source
        .file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if !source.is_dataset(address) {
        return Some(format!(
            "HDF File:\n{}\n does not contain the dataset:\n{}",
            file, address
        ));
    }
    match source.shape(address) {
        Ok(shape) if shape.len() >= 3 => None,
        Ok(shape) => Some(format!(
            "Dataset:\n{}\n is the wrong shape: {}",
            address,
            Value::shape_tuple(&shape)
        )),
        Err(e) => Some(e.to_string()),
    }
}

/// Flatten every dimension but the last two: `(prod(shape[..-2]), h, w)`.
///
/// Returns `None` for shapes with fewer than two dimensions.
pub fn image_stack_shape(shape: &[usize]) -> Option<(usize, usize, usize)> {
    match shape {
        [leading @ .., h, w] => Some((leading.iter().product(), *h, *w)),
        _ => None,
    }
}

/// Numeric stack at `address` viewed as `(images, h, w)`.
fn image_stack(source: &dyn HdfSource, address: &str) -> Result<Array3<f64>> {
    let array = match source.read_value(address)? {
        Value::Array(array) if array.ndim() >= 3 => array,
        other => {
            let shape = Value::shape_tuple(&other.shape());
            return Err(HdfScanError::image(
                address,
                format!("expected a numeric stack of 3 or more dimensions, got {}", shape),
            ));
        },
    };
    let shape = image_stack_shape(array.shape())
        .ok_or_else(|| HdfScanError::image(address, "dataset has fewer than two dimensions"))?;
    Array3::from_shape_vec(shape, array.iter().copied().collect())
        .map_err(|e| HdfScanError::image(address, e.to_string()))
}

/// One 2-D image from the stack at `address`.
///
/// `axis` 0 picks image `index`, counting through every leading dimension
/// in order, so a `(2, 3, h, w)` stack holds images 0 to 5. Axis 1 gives the
/// `(images, w)` slice at row `index` and axis 2 the `(images, h)` slice at
/// column `index`. Axes wrap modulo 3.
pub fn image_slice(
    source: &dyn HdfSource,
    address: &str,
    index: usize,
    axis: usize,
) -> Result<Array2<f64>> {
    let stack = image_stack(source, address)?;
    let axis = Axis(axis % 3);
    let len = stack.len_of(axis);
    if index >= len {
        let message = format!(
            "index {} is out of bounds for axis {} with size {}",
            index,
            axis.index(),
            len
        );
        return Err(HdfScanError::image(address, message));
    }
    Ok(stack.index_axis(axis, index).to_owned())
}

/// Item `index` along the first axis of the dataset at `address`.
///
/// Gives `0.0` when the address is empty, missing, scalar or too short.
pub fn array_value(source: &dyn HdfSource, address: &str, index: usize) -> Result<Value> {
    if address.is_empty() || !source.is_dataset(address) {
        return Ok(Value::Float(0.0));
    }
    let value = match source.read_value(address)? {
        Value::Array(a) if a.ndim() > 0 && index < a.len_of(Axis(0)) => {
            Value::from_array(a.index_axis(Axis(0), index).to_owned())
        },
        Value::StrArray(a) if a.ndim() > 0 && index < a.len_of(Axis(0)) => {
            let item = a.index_axis(Axis(0), index);
            match item.ndim() {
                0 => item.iter().next().map_or(Value::None, |s| Value::from(s.as_str())),
                _ => Value::StrArray(item.to_owned()),
            }
        },
        _ => Value::Float(0.0),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryFile;
    use ndarray::ArrayD;
    use ndarray::IxDyn;

    fn sample() -> MemoryFile {
        MemoryFile::new("/data/1.nxs")
            .attr("/entry", "NX_class", "NXentry")
            .dataset("/entry/title", "scan 1")
            .dataset("/entry/count", 7i64)
            .dataset("/entry/eta", Value::from_vec(vec![1.0, 2.0, 3.0]))
            .dataset(
                "/entry/detector/data",
                Value::Array(ArrayD::zeros(IxDyn(&[2, 4, 5]))),
            )
            .soft_link("/entry/data", "/entry/eta")
            .attr("/entry/eta", "units", "deg")
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_dataset_summary() {
        let file = sample();
        assert_eq!(dataset_summary(&file, "/entry/title", "").unwrap(), "scan 1");
        assert_eq!(dataset_summary(&file, "/entry/count", "").unwrap(), "7");
        assert_eq!(dataset_summary(&file, "/entry/eta", "").unwrap(), "float64 (3,)");
        assert_eq!(dataset_summary(&file, "/entry", "n/a").unwrap(), "n/a");
        assert_eq!(dataset_summary(&file, "/nope", "n/a").unwrap(), "n/a");
    }

    #[test]
    fn test_describe_dataset() {
        let file = sample();
        let text = describe(&file, "/entry/eta").unwrap();
        assert!(text.starts_with("/entry/eta\nKind: Dataset\nLink: Hard\n"));
        assert!(text.contains("units: deg"));
        assert!(text.contains("Shape: (3,)"));
        assert!(text.ends_with("[1. 2. 3.]"));
        assert!(describe(&file, "/entry/data").unwrap().contains("Link: Soft"));
        assert!(describe(&file, "/entry").unwrap().contains("Class: NXentry"));
        assert!(matches!(
            describe(&file, "/missing"),
            Err(HdfScanError::NotFound { .. })
        ));
    }

    #[test]
    fn test_large_dataset_not_printed() {
        let file = MemoryFile::new("/data/big.nxs")
            .dataset("/entry/big", Value::from_vec(vec![0.0; MAX_TEXTVIEW_SIZE + 1]));
        let text = describe(&file, "/entry/big").unwrap();
        assert!(text.ends_with("---Too large to view---"));
        assert!(text.contains("Size: 1,001"));
    }

    #[test]
    fn test_image_helpers() {
        let file = sample();
        let map = HdfMap::build(&file).unwrap();
        assert_eq!(first_image_address(&map), Some("/entry/detector/data"));
        assert_eq!(check_image_dataset(&file, "/entry/detector/data"), None);
        assert!(check_image_dataset(&file, "/entry/eta")
            .unwrap()
            .contains("wrong shape: (3,)"));
        assert!(check_image_dataset(&file, "/entry/none")
            .unwrap()
            .contains("does not contain"));
        assert!(check_image_dataset(&file, "").is_some());
        assert_eq!(image_stack_shape(&[2, 3, 4, 5]), Some((6, 4, 5)));
        assert_eq!(image_stack_shape(&[4, 5]), Some((1, 4, 5)));
        assert_eq!(image_stack_shape(&[5]), None);
    }

    fn stack_file() -> MemoryFile {
        let values = (0..120).map(|v| v as f64).collect();
        let stack = ArrayD::from_shape_vec(IxDyn(&[2, 3, 4, 5]), values).unwrap();
        MemoryFile::new("/data/stack.nxs")
            .dataset("/entry/detector/data", Value::Array(stack))
            .dataset("/entry/eta", Value::from_vec(vec![1.0, 2.0, 3.0]))
            .dataset("/entry/title", "scan 1")
    }

    #[test]
    fn test_image_slice_along_each_axis() {
        let file = stack_file();
        let address = "/entry/detector/data";

        // image 4 of the flattened (2, 3) leading dims is [1, 1]
        let image = image_slice(&file, address, 4, 0).unwrap();
        assert_eq!(image.dim(), (4, 5));
        assert_eq!(image[[0, 0]], 80.0);
        assert_eq!(image[[3, 4]], 99.0);

        let rows = image_slice(&file, address, 2, 1).unwrap();
        assert_eq!(rows.dim(), (6, 5));
        assert_eq!(rows[[0, 0]], 10.0);
        assert_eq!(rows[[5, 4]], 114.0);

        let columns = image_slice(&file, address, 3, 2).unwrap();
        assert_eq!(columns.dim(), (6, 4));
        assert_eq!(columns[[0, 0]], 3.0);
        assert_eq!(columns[[5, 3]], 118.0);

        assert_eq!(image_slice(&file, address, 4, 3).unwrap(), image);
    }

    #[test]
    fn test_image_slice_errors() {
        let file = stack_file();
        assert!(matches!(
            image_slice(&file, "/entry/detector/data", 6, 0),
            Err(HdfScanError::Image { .. })
        ));
        assert!(matches!(
            image_slice(&file, "/entry/eta", 0, 0),
            Err(HdfScanError::Image { .. })
        ));
        assert!(matches!(
            image_slice(&file, "/entry/none", 0, 0),
            Err(HdfScanError::NotFound { .. })
        ));
    }

    #[test]
    fn test_array_value() {
        let file = stack_file();
        assert_eq!(array_value(&file, "/entry/eta", 1).unwrap(), Value::Float(2.0));
        assert_eq!(array_value(&file, "/entry/eta", 3).unwrap(), Value::Float(0.0));
        assert_eq!(array_value(&file, "", 0).unwrap(), Value::Float(0.0));
        assert_eq!(array_value(&file, "/entry/none", 0).unwrap(), Value::Float(0.0));
        assert_eq!(array_value(&file, "/entry/title", 0).unwrap(), Value::Float(0.0));
        assert_eq!(
            array_value(&file, "/entry/detector/data", 1).unwrap().shape(),
            vec![3, 4, 5]
        );
    }
}
