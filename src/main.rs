//! hdfscan - Inspect HDF5/NeXus scan files from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hdfscan::data::Hdf5File;
use hdfscan::eval::{evaluate, format_string};
use hdfscan::folder::{self, SearchOptions, DEFAULT_EXTENSION, DEFAULT_SEARCH_ADDRESS};
use hdfscan::inspect;
use hdfscan::mapping::{resolve_default_axes, resolve_strict_default_axes, HdfMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "hdfscan")]
#[command(about = "Map HDF5/NeXus scan files and evaluate expressions against them", long_about = None)]
struct Args {
    /// Enable logging to specified file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the structural map of a file
    Map {
        /// HDF5/NeXus file
        file: PathBuf,
        /// Print the full map as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate an expression, e.g. "eta.max()"
    Eval {
        /// HDF5/NeXus file
        file: PathBuf,
        /// Expression using dataset names
        expression: String,
    },
    /// Render a format template, e.g. "{title}: {eta.shape}"
    Format {
        /// HDF5/NeXus file
        file: PathBuf,
        /// Template with {expression} fields
        template: String,
    },
    /// Print the NeXus default axes and signal
    Axes {
        /// HDF5/NeXus file
        file: PathBuf,
        /// Require every `default` attribute to be present
        #[arg(long)]
        strict: bool,
    },
    /// Describe the group or dataset at an address
    Describe {
        /// HDF5/NeXus file
        file: PathBuf,
        /// Absolute address, e.g. /entry1/title
        address: String,
    },
    /// List scan files in a folder, oldest first
    Files {
        /// Folder to list
        dir: PathBuf,
        /// File extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,
    },
    /// List sub-folders with modification time and file count
    Folders {
        /// Folder to list
        dir: PathBuf,
        /// File extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,
    },
    /// Search a folder tree for files whose dataset matches a query
    Search {
        /// Top folder
        dir: PathBuf,
        /// Dataset address to check in each file
        #[arg(long, default_value = DEFAULT_SEARCH_ADDRESS)]
        address: String,
        /// Text to look for; omit to match any file with the dataset
        #[arg(long)]
        query: Option<String>,
        /// Match the whole value only
        #[arg(long)]
        whole_word: bool,
        /// Case sensitive comparison
        #[arg(long)]
        case_sensitive: bool,
        /// File extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,
    },
    /// Evaluate an expression in every file of a folder
    Table {
        /// Folder of scan files
        dir: PathBuf,
        /// Expression using dataset names
        expression: String,
        /// File extension
        #[arg(long, default_value = DEFAULT_EXTENSION)]
        extension: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging: DEBUG to a file with --log, otherwise RUST_LOG to stderr
    if let Some(log_path) = &args.log {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
        tracing::info!("Starting hdfscan");
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    run(args.command)
}

fn open(path: &Path) -> Result<(Hdf5File, HdfMap)> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }
    let file = Hdf5File::open(path)?;
    let map = HdfMap::build(&file)
        .with_context(|| format!("Failed to map {}", path.display()))?;
    tracing::info!(
        "Mapped {}: {} groups, {} datasets, {} scannables",
        path.display(),
        map.groups.len(),
        map.datasets.len(),
        map.scannables.len()
    );
    Ok((file, map))
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Map { file, json } => {
            let (_, map) = open(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                print_map(&map);
            }
        },
        Command::Eval { file, expression } => {
            let (source, map) = open(&file)?;
            println!("{}", evaluate(&source, &expression, &map)?);
        },
        Command::Format { file, template } => {
            let (source, map) = open(&file)?;
            println!("{}", format_string(&source, &template, &map)?);
        },
        Command::Axes { file, strict } => {
            let (source, _) = open(&file)?;
            let axes = if strict {
                resolve_strict_default_axes(&source)?
            } else {
                resolve_default_axes(&source)?
            };
            println!("entry:  {}", axes.entry);
            println!("data:   {}", axes.data);
            println!("axes:   {}", axes.axes.join(", "));
            println!("signal: {}", axes.signal);
        },
        Command::Describe { file, address } => {
            let (source, _) = open(&file)?;
            println!("{}", inspect::describe(&source, &address)?);
        },
        Command::Files { dir, extension } => {
            for path in folder::list_files(&dir, &extension)? {
                println!("{}", path.display());
            }
        },
        Command::Folders { dir, extension } => {
            for summary in folder::list_folders(&dir, &extension)? {
                println!(
                    "{}\t{}\t{}",
                    summary.path.display(),
                    folder::display_timestamp(summary.modified),
                    summary.file_count
                );
            }
        },
        Command::Search {
            dir,
            address,
            query,
            whole_word,
            case_sensitive,
            extension,
        } => {
            let options = SearchOptions {
                address,
                query,
                extension,
                whole_word,
                case_sensitive,
            };
            for path in folder::search_files(&dir, &options)? {
                println!("{}", path.display());
            }
        },
        Command::Table {
            dir,
            expression,
            extension,
        } => {
            let files = folder::list_files(&dir, &extension)?;
            for row in folder::evaluate_folder(&files, &expression) {
                let name = row
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match row.outcome {
                    Ok(value) => println!("{}\t{}", name, value),
                    Err(e) => println!("{}\tError: {}", name, e),
                }
            }
        },
    }
    Ok(())
}

fn print_section(title: &str, entries: &indexmap::IndexMap<String, String>) {
    println!("{}:", title);
    for (name, address) in entries {
        println!("  {} -> {}", name, address);
    }
}

fn print_map(map: &HdfMap) {
    println!("Groups: {}  Datasets: {}", map.groups.len(), map.datasets.len());
    println!("Classes:");
    for (class, addresses) in &map.classes {
        println!("  {} -> {}", class, addresses.join(", "));
    }
    print_section("Values", &map.values);
    print_section("Arrays", &map.arrays);
    print_section("Scannables", &map.scannables);
    if let Some(length) = map.scannable_length() {
        println!("Scan length: {}", length);
    }
    if !map.image_data.is_empty() {
        println!("Images:");
        for (address, info) in &map.image_data {
            println!("  {} {:?}", address, info.shape);
        }
    }
}
