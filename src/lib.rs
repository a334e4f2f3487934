//! hdfscan - Map HDF5/NeXus scan files and evaluate expressions against them.
//!
//! hdfscan walks a file once, indexes every group and dataset by address,
//! class and short name, and lets a user refer to datasets by that short name
//! in expressions and format templates.
//!
//! # Features
//!
//! - One-pass structural map of a file ([`mapping::HdfMap`])
//! - NeXus default-plot resolution (axes and signal)
//! - Restricted expression language with numpy-like array operations
//! - Format templates such as `"{title}: {eta.shape}"`
//! - Folder listing, search and batch evaluation
//!
//! # Example
//!
//! ```ignore
//! use hdfscan::data::Hdf5File;
//! use hdfscan::eval::evaluate;
//! use hdfscan::mapping::HdfMap;
//!
//! // Open a scan file and map it
//! let file = Hdf5File::open("12345.nxs")?;
//! let map = HdfMap::build(&file)?;
//!
//! // Refer to datasets by short name
//! let peak = evaluate(&file, "np.max(sum) / count_time", &map)?;
//! println!("{} scannables, peak {}", map.scannables.len(), peak);
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unsafe_code)]

pub mod data;
pub mod error;
pub mod eval;
pub mod folder;
pub mod inspect;
pub mod mapping;

pub use data::{Hdf5File, HdfSource, MemoryFile, Value};
pub use error::{HdfScanError, Result};
pub use eval::{evaluate, format_string, EvalOptions, Evaluator};
pub use mapping::{build_map, HdfMap};
