//! Folder-level operations: listing scan files, searching inside them, and
//! evaluating one expression over many files.

use crate::data::{HdfSource, Hdf5File, Value};
use crate::error::Result;
use crate::eval::evaluate;
use crate::mapping::HdfMap;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Extension used when none is given.
pub const DEFAULT_EXTENSION: &str = ".nxs";

/// Dataset searched when no address is given.
pub const DEFAULT_SEARCH_ADDRESS: &str = "entry1/scan_command";

/// A sub-folder and how many scan files it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    /// Full path of the folder.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
    /// Number of files with the requested extension directly inside.
    pub file_count: usize,
}

/// Options for [`search_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Address of the dataset to look at in each file.
    pub address: String,
    /// Text to look for; `None` matches any file containing the dataset.
    pub query: Option<String>,
    /// Only files with this extension are opened.
    pub extension: String,
    /// Require the whole value to equal the query.
    pub whole_word: bool,
    /// Compare without lower-casing.
    pub case_sensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_SEARCH_ADDRESS.to_string(),
            query: None,
            extension: DEFAULT_EXTENSION.to_string(),
            whole_word: false,
            case_sensitive: false,
        }
    }
}

impl SearchOptions {
    /// Whether a dataset rendered as `value` satisfies the query.
    pub fn matches(&self, value: &str) -> bool {
        let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) else {
            return true;
        };
        let (query, value) = if self.case_sensitive {
            (query.to_string(), value.to_string())
        } else {
            (query.to_lowercase(), value.to_lowercase())
        };
        if self.whole_word {
            value == query
        } else {
            value.contains(&query)
        }
    }
}

/// Result of evaluating an expression in one file.
#[derive(Debug)]
pub struct FileEvaluation {
    /// File the expression was evaluated in.
    pub path: PathBuf,
    /// Value, or why the file could not be evaluated.
    pub outcome: Result<Value>,
}

/// Render a modification time like `Mon 01-Jan-2024 09:30`.
pub fn display_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%a %d-%b-%Y %H:%M")
        .to_string()
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Files in `dir` ending with `extension`, oldest first.
pub fn list_files(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir.as_ref())?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extension))
        .map(|path| (modified(&path), path))
        .collect();
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(extension))
        .unwrap_or(false)
}

/// Sub-folders of `dir` with their scan-file counts.
///
/// Folders that cannot be read are skipped.
pub fn list_folders(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<FolderSummary>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(dir.as_ref())?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                continue;
            },
        };
        let file_count = match list_files(&path, extension) {
            Ok(files) => files.len(),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                continue;
            },
        };
        folders.push(FolderSummary {
            path,
            modified,
            file_count,
        });
    }
    folders.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(folders)
}

/// Every file under `dir` (recursively) ending with `extension`, sorted by path.
///
/// Symbolic links to directories are not followed.
pub fn find_files(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            },
        };
        if !entry.file_type().is_dir() && has_extension(entry.path(), extension) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

/// Files under `topdir` whose dataset at `options.address` matches the query.
///
/// Files that are not HDF5 are skipped.
pub fn search_files(topdir: impl AsRef<Path>, options: &SearchOptions) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    for path in find_files(topdir, &options.extension)? {
        if !Hdf5File::is_hdf5(&path) {
            tracing::debug!("{} is not an HDF5 file", path.display());
            continue;
        }
        let file = Hdf5File::open(&path)?;
        if search_source(&file, options)? {
            matches.push(path);
        }
    }
    Ok(matches)
}

/// Whether one open file matches a search.
pub fn search_source(source: &dyn HdfSource, options: &SearchOptions) -> Result<bool> {
    let address = if options.address.starts_with('/') {
        options.address.clone()
    } else {
        format!("/{}", options.address)
    };
    if !source.is_dataset(&address) {
        return Ok(false);
    }
    if options.query.as_deref().map_or(true, str::is_empty) {
        return Ok(true);
    }
    let value = source.read_value(&address)?;
    Ok(options.matches(&value.to_string()))
}

/// Evaluate `expression` in each HDF5 file, each with its own handle and map.
pub fn evaluate_folder<P: AsRef<Path>>(files: &[P], expression: &str) -> Vec<FileEvaluation> {
    evaluate_with(files, expression, |path| Hdf5File::open(path))
}

/// Evaluate `expression` in each file opened by `open`.
///
/// Failures are reported per file and do not stop the batch.
pub fn evaluate_with<P, S, F>(files: &[P], expression: &str, open: F) -> Vec<FileEvaluation>
where
    P: AsRef<Path>,
    S: HdfSource,
    F: Fn(&Path) -> Result<S>,
{
    files
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let outcome = open(path).and_then(|source| {
                let map = HdfMap::build(&source)?;
                evaluate(&source, expression, &map)
            });
            if let Err(e) = &outcome {
                tracing::warn!("{}: {}", path.display(), e);
            }
            FileEvaluation {
                path: path.to_path_buf(),
                outcome,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryFile;
    use crate::error::HdfScanError;
    use std::fs::File;

    #[test]
    fn test_list_files_and_folders() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("1.nxs")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/2.nxs")).unwrap();
        File::create(dir.path().join("sub/3.nxs")).unwrap();

        let files = list_files(dir.path(), ".nxs").unwrap();
        assert_eq!(files, vec![dir.path().join("1.nxs")]);

        let folders = list_folders(dir.path(), ".nxs").unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].path, dir.path().join("sub"));
        assert_eq!(folders[0].file_count, 2);

        let all = find_files(dir.path(), ".nxs").unwrap();
        assert_eq!(all.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_files_skips_directory_links() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        File::create(dir.path().join("a/x.nxs")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a/loop")).unwrap();

        let all = find_files(dir.path(), ".nxs").unwrap();
        assert_eq!(all, vec![dir.path().join("a/x.nxs")]);
    }

    #[test]
    fn test_search_options_matching() {
        let mut options = SearchOptions {
            query: Some("Scan".to_string()),
            ..SearchOptions::default()
        };
        assert!(options.matches("scan eta 1 2 0.1"));
        options.case_sensitive = true;
        assert!(!options.matches("scan eta 1 2 0.1"));
        options.case_sensitive = false;
        options.whole_word = true;
        assert!(!options.matches("scan eta"));
        assert!(options.matches("SCAN"));
    }

    #[test]
    fn test_search_source() {
        let file = MemoryFile::new("/data/1.nxs").dataset("/entry1/scan_command", "scan eta 1 2 0.1");
        let mut options = SearchOptions::default();
        assert!(search_source(&file, &options).unwrap());
        options.query = Some("eta".to_string());
        assert!(search_source(&file, &options).unwrap());
        options.query = Some("chi".to_string());
        assert!(!search_source(&file, &options).unwrap());
        options.address = "/entry1/missing".to_string();
        options.query = None;
        assert!(!search_source(&file, &options).unwrap());
    }

    #[test]
    fn test_evaluate_with_reports_per_file() {
        let files = ["/data/1.nxs", "/data/2.nxs"];
        let results = evaluate_with(&files, "eta.sum()", |path: &Path| {
            if path.ends_with("2.nxs") {
                return Err(HdfScanError::file_open(path, "corrupt"));
            }
            Ok(MemoryFile::new(path).dataset("/entry/eta", Value::from_vec(vec![1.0, 2.0])))
        });
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome.as_ref().unwrap(), &Value::Float(3.0));
        assert!(matches!(
            results[1].outcome,
            Err(HdfScanError::FileOpen { .. })
        ));
    }

    #[test]
    fn test_display_timestamp_shape() {
        let text = display_timestamp(SystemTime::now());
        assert_eq!(text.split(' ').count(), 3);
    }
}
