//! Shared fixtures: small NeXus scan files written with the hdf5 crate.

#![allow(dead_code)]

use hdf5::types::VarLenUnicode;
use hdf5::{File, Location};
use ndarray::{arr0, arr1, Array1, Array3};
use std::path::{Path, PathBuf};

fn text(value: &str) -> VarLenUnicode {
    value.parse().unwrap()
}

fn text_attr(location: &Location, name: &str, value: &str) {
    location
        .new_attr_builder()
        .with_data(&arr0(text(value)))
        .create(name)
        .unwrap();
}

/// Write a scan file with `points` points:
///
/// ```text
/// /                              @default=entry1
/// /entry1                        NXentry, @default=measurement
/// /entry1/title                  "<title>"
/// /entry1/scan_command           "scan eta 1 <points> 1"
/// /entry1/count_time             1.5
/// /entry1/instrument/detector/data   (points, 4, 5)
/// /entry1/measurement            NXdata, @signal=sum, @axes=[eta]
/// /entry1/measurement/eta        1..=points
/// /entry1/measurement/sum        10 * eta
/// /entry1/measurement/total      eta + 100
/// /entry1/sample/ub_matrix       (3,)
/// ```
pub fn write_scan(dir: &Path, file_name: &str, title: &str, points: usize) -> PathBuf {
    let path = dir.join(file_name);
    let file = File::create(&path).unwrap();
    text_attr(&file, "default", "entry1");

    let entry = file.create_group("entry1").unwrap();
    text_attr(&entry, "NX_class", "NXentry");
    text_attr(&entry, "default", "measurement");
    entry
        .new_dataset_builder()
        .with_data(&arr0(text(title)))
        .create("title")
        .unwrap();
    entry
        .new_dataset_builder()
        .with_data(&arr0(text(&format!("scan eta 1 {} 1", points))))
        .create("scan_command")
        .unwrap();
    entry
        .new_dataset_builder()
        .with_data(&arr0(1.5f64))
        .create("count_time")
        .unwrap();

    let instrument = entry.create_group("instrument").unwrap();
    text_attr(&instrument, "NX_class", "NXinstrument");
    let detector = instrument.create_group("detector").unwrap();
    text_attr(&detector, "NX_class", "NXdetector");
    detector
        .new_dataset_builder()
        .with_data(&Array3::<f64>::ones((points, 4, 5)))
        .create("data")
        .unwrap();

    let measurement = entry.create_group("measurement").unwrap();
    text_attr(&measurement, "NX_class", "NXdata");
    text_attr(&measurement, "signal", "sum");
    measurement
        .new_attr_builder()
        .with_data(&arr1(&[text("eta")]))
        .create("axes")
        .unwrap();
    let eta: Array1<f64> = (1..=points).map(|i| i as f64).collect();
    measurement
        .new_dataset_builder()
        .with_data(&eta)
        .create("eta")
        .unwrap();
    measurement
        .new_dataset_builder()
        .with_data(&(&eta * 10.0))
        .create("sum")
        .unwrap();
    measurement
        .new_dataset_builder()
        .with_data(&(&eta + 100.0))
        .create("total")
        .unwrap();

    let sample = entry.create_group("sample").unwrap();
    text_attr(&sample, "NX_class", "NXsample");
    sample
        .new_dataset_builder()
        .with_data(&arr1(&[1.0, 0.0, 0.0]))
        .create("ub_matrix")
        .unwrap();

    path
}
