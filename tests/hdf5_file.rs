mod common;

use common::write_scan;
use hdfscan::data::{Hdf5File, HdfSource, NodeKind, Value};
use hdfscan::eval::{evaluate, format_string};
use hdfscan::folder::{evaluate_folder, list_files, search_files, SearchOptions};
use hdfscan::inspect::{
    array_value, check_image_dataset, dataset_summary, describe, first_image_address, image_slice,
};
use hdfscan::mapping::{default_axes_addresses, resolve_strict_default_axes, HdfMap};
use hdfscan::HdfScanError;
use pretty_assertions::assert_eq;

fn open_scan(points: usize) -> (tempfile::TempDir, Hdf5File, HdfMap) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", points);
    let file = Hdf5File::open(&path).unwrap();
    let map = HdfMap::build(&file).unwrap();
    (dir, file, map)
}

#[test]
fn test_reader_basics() {
    let (_dir, file, _) = open_scan(5);
    assert!(file.contains("/entry1/measurement/eta"));
    assert!(!file.contains("/entry1/measurement/nope"));
    assert!(!file.contains("/nope/eta"));
    assert_eq!(file.node_kind("/entry1").unwrap(), NodeKind::Group);
    assert_eq!(file.shape("/entry1/instrument/detector/data").unwrap(), vec![5, 4, 5]);
    assert_eq!(file.dtype("/entry1/measurement/eta").unwrap(), "float64");
    assert_eq!(file.read_value("/entry1/title").unwrap(), Value::from("scan 1"));
    assert_eq!(file.read_value("/entry1/count_time").unwrap(), Value::Float(1.5));
    assert!(matches!(
        file.read_value("/entry1/missing"),
        Err(HdfScanError::NotFound { .. })
    ));
}

#[test]
fn test_map_of_real_file() {
    let (_dir, _file, map) = open_scan(5);

    assert_eq!(map.get("title"), Some("/entry1/title"));
    assert_eq!(map.get("eta"), Some("/entry1/measurement/eta"));
    assert_eq!(map.axes_address(), Some("/entry1/measurement/eta"));
    assert_eq!(map.signal_address(), Some("/entry1/measurement/sum"));
    assert_eq!(map.first_of_class("NXdata"), Some("/entry1/measurement"));
    assert_eq!(map.scannable_length(), Some(5));
    assert!(map.scannables.contains_key("total"));
    assert!(!map.scannables.contains_key("ub_matrix"));
    assert!(!map.scannables.contains_key("data"));
    assert!(map.values.contains_key("count_time"));
    assert_eq!(
        map.image_data.keys().collect::<Vec<_>>(),
        vec!["/entry1/instrument/detector/data"]
    );
}

#[test]
fn test_map_serializes_to_json() {
    let (_dir, _file, map) = open_scan(3);
    let json = serde_json::to_value(&map).unwrap();
    assert_eq!(json["values"]["title"], "/entry1/title");
    assert_eq!(json["default_axes"]["signal"], "/entry1/measurement/sum");
}

#[test]
fn test_nexus_defaults() {
    let (_dir, file, _) = open_scan(5);
    let strict = resolve_strict_default_axes(&file).unwrap();
    assert_eq!(strict.data, "/entry1/measurement");
    assert_eq!(
        default_axes_addresses(&file),
        (
            "/entry1/measurement/eta".to_string(),
            "/entry1/measurement/sum".to_string()
        )
    );
}

#[test]
fn test_evaluate_against_real_file() {
    let (_dir, file, map) = open_scan(5);
    assert_eq!(evaluate(&file, "eta.max()", &map).unwrap(), Value::Float(5.0));
    assert_eq!(evaluate(&file, "sum(total)", &map).unwrap(), Value::Float(515.0));
    assert_eq!(
        evaluate(&file, "np.max(sum) / count_time", &map).unwrap(),
        Value::Float(50.0 / 1.5)
    );
    assert_eq!(
        evaluate(&file, "signal_address", &map).unwrap(),
        Value::from("/entry1/measurement/sum")
    );
    assert_eq!(
        evaluate(&file, "/entry1/count_time", &map).unwrap(),
        Value::Float(1.5)
    );
}

#[test]
fn test_format_against_real_file() {
    let (_dir, file, map) = open_scan(5);
    assert_eq!(
        format_string(&file, "{title}: {eta.shape}", &map).unwrap(),
        "scan 1: (5,)"
    );
    assert_eq!(
        format_string(&file, "{filename} {count_time:.2f}s {scan_command!r}", &map).unwrap(),
        "1001.nxs 1.50s 'scan eta 1 5 1'"
    );
}

#[test]
fn test_inspect_real_file() {
    let (_dir, file, map) = open_scan(5);
    assert_eq!(dataset_summary(&file, "/entry1/title", "").unwrap(), "scan 1");
    assert_eq!(
        dataset_summary(&file, "/entry1/measurement/eta", "").unwrap(),
        "float64 (5,)"
    );
    let text = describe(&file, "/entry1/measurement").unwrap();
    assert!(text.contains("Class: NXdata"));
    assert!(text.contains("signal: sum"));
    assert_eq!(
        first_image_address(&map),
        Some("/entry1/instrument/detector/data")
    );
    assert_eq!(check_image_dataset(&file, "/entry1/instrument/detector/data"), None);

    let image = image_slice(&file, "/entry1/instrument/detector/data", 4, 0).unwrap();
    assert_eq!(image.dim(), (4, 5));
    assert!(image.iter().all(|&v| v == 1.0));
    let rows = image_slice(&file, "/entry1/instrument/detector/data", 3, 1).unwrap();
    assert_eq!(rows.dim(), (5, 5));
    assert_eq!(
        array_value(&file, "/entry1/measurement/eta", 2).unwrap(),
        Value::Float(3.0)
    );
}

#[test]
fn test_folder_search_and_batch_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    write_scan(dir.path(), "1.nxs", "first", 3);
    write_scan(dir.path(), "2.nxs", "second", 4);
    std::fs::write(dir.path().join("3.nxs"), b"not hdf5").unwrap();

    let options = SearchOptions {
        query: Some("1 4 1".to_string()),
        ..SearchOptions::default()
    };
    let found = search_files(dir.path(), &options).unwrap();
    assert_eq!(found, vec![dir.path().join("2.nxs")]);

    let files = list_files(dir.path(), ".nxs").unwrap();
    assert_eq!(files.len(), 3);
    let mut results = evaluate_folder(&files, "len(eta)");
    results.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(results[0].outcome.as_ref().unwrap(), &Value::Int(3));
    assert_eq!(results[1].outcome.as_ref().unwrap(), &Value::Int(4));
    assert!(results[2].outcome.is_err());
}
