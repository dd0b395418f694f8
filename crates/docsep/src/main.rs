//! docsep - split planning and window inspection CLI
//!
//! Usage:
//!   docsep split <dir>             Plan a train/validation split
//!   docsep inspect <dir> -i N      Sample one window and print labels
//!   docsep check <dir>             Verify scan files and transcriptions
//!
//! Scan trees are expected as one directory per document, optionally
//! nested one level deeper with one directory per inventory, with
//! PAGE-XML transcriptions in a `page/` subdirectory next to the scans.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use docsep_core::{
    label_window, load_config, natural_path_cmp, split_scan_paths, BoundaryLabel, Config,
    Coordinate, Hierarchy, HierarchicalIndex, PageXmlTextProvider, Slot, WindowSampler,
};

#[derive(Parser)]
#[command(name = "docsep", version, about = "Windowed page-boundary sampling tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a train/validation split over a scan directory tree
    Split {
        /// Directory containing one subdirectory per document
        dir: PathBuf,
        /// Training share of the split
        #[arg(long)]
        ratio: Option<f64>,
        /// Shuffle seed
        #[arg(long)]
        seed: Option<u64>,
        /// Optional TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sample one window and print its coordinates and labels
    Inspect {
        /// Scan directory tree
        dir: PathBuf,
        /// Flat sample index (the center scan)
        #[arg(short, long)]
        index: usize,
        /// RNG seed for the sampler perturbations
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Optional TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Verify that every scan file and its transcription are readable
    Check {
        /// Scan directory tree
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Split {
            dir,
            ratio,
            seed,
            config,
            json,
        } => cmd_split(&dir, ratio, seed, config.as_deref(), json),
        Command::Inspect {
            dir,
            index,
            seed,
            config,
        } => cmd_inspect(&dir, index, seed, config.as_deref()),
        Command::Check { dir } => cmd_check(&dir),
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn cmd_split(
    dir: &Path,
    ratio: Option<f64>,
    seed: Option<u64>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = resolve_config(config)?;
    let ratio = ratio.unwrap_or_else(|| config.split_ratio());
    let seed = seed.unwrap_or_else(|| config.split_seed());

    let paths = collect_scan_paths(dir)?;
    if paths.is_empty() {
        bail!("no scan images found under {}", dir.display());
    }
    let plan = split_scan_paths(&paths, ratio, seed)?;

    if json {
        #[derive(Serialize)]
        struct JsonPlan<'a> {
            training: &'a [Vec<PathBuf>],
            validation: &'a [Vec<PathBuf>],
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonPlan {
                training: &plan.training,
                validation: &plan.validation,
            })?
        );
        return Ok(());
    }

    println!(
        "{} {} documents ({} scans) / {} {} documents ({} scans)",
        "train:".green().bold(),
        plan.training.len(),
        plan.training_paths().len(),
        "val:".yellow().bold(),
        plan.validation.len(),
        plan.validation_paths().len(),
    );
    for group in &plan.training {
        print_group(group, "train".green());
    }
    for group in &plan.validation {
        print_group(group, "val".yellow());
    }
    Ok(())
}

fn print_group(group: &[PathBuf], tag: colored::ColoredString) {
    if let Some(parent) = group[0].parent() {
        println!("  [{tag}] {} ({} scans)", parent.display(), group.len());
    }
}

fn cmd_inspect(dir: &Path, index: usize, seed: u64, config: Option<&Path>) -> Result<()> {
    let config = resolve_config(config)?;
    let hierarchy = Arc::new(Hierarchy::new(discover_hierarchy(dir)?)?);
    let flat = Arc::new(HierarchicalIndex::new(Arc::clone(&hierarchy)));

    let center = flat.coordinate_of(index).with_context(|| {
        format!("index {index} out of range, dataset has {} scans", flat.size())
    })?;

    let sampler = WindowSampler::new(Arc::clone(&flat), config.sampler_config())?;
    let mut rng = StdRng::seed_from_u64(seed);
    let window = sampler.sample(center, &mut rng)?;
    let labels = label_window(&window);

    #[derive(Serialize)]
    struct Inspection<'a> {
        center: Coordinate,
        coordinates: &'a [Slot],
        labels: &'a [BoundaryLabel],
        paths: Vec<Option<PathBuf>>,
    }
    let paths = window
        .retained()
        .iter()
        .map(|slot| {
            slot.coordinate()
                .and_then(|c| hierarchy.scan_path(c).map(Path::to_path_buf))
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&Inspection {
            center,
            coordinates: window.retained(),
            labels: &labels,
            paths,
        })?
    );
    Ok(())
}

fn cmd_check(dir: &Path) -> Result<()> {
    let paths = collect_scan_paths(dir)?;
    if paths.is_empty() {
        bail!("no scan images found under {}", dir.display());
    }

    let bar = ProgressBar::new(paths.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .expect("valid progress template"),
    );
    bar.set_message("Checking files");

    let mut missing_images = 0usize;
    let mut missing_xml = 0usize;
    for path in &paths {
        if fs::metadata(path).is_err() {
            missing_images += 1;
            warn!(path = %path.display(), "unreadable image");
        }
        let xml = PageXmlTextProvider::xml_path(path);
        if fs::metadata(&xml).is_err() {
            missing_xml += 1;
            warn!(path = %xml.display(), "missing transcription");
        }
        bar.inc(1);
    }
    bar.finish();

    if missing_images == 0 && missing_xml == 0 {
        println!("{} {} scans verified", "ok:".green().bold(), paths.len());
        Ok(())
    } else {
        bail!("{missing_images} unreadable images, {missing_xml} missing transcriptions");
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Direct child directories of `dir` in natural order, skipping the
/// PAGE-XML `page/` directories.
fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.file_name().is_some_and(|n| n != "page") {
            dirs.push(path);
        }
    }
    dirs.sort_by(|a, b| natural_path_cmp(a, b));
    Ok(dirs)
}

/// Image files directly inside `dir`, in natural order.
fn images_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| natural_path_cmp(a, b));
    Ok(images)
}

/// All scan images anywhere under `dir`, in natural order.
fn collect_scan_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = images_in(dir)?;
    for child in child_dirs(dir)? {
        paths.extend(collect_scan_paths(&child)?);
    }
    paths.sort_by(|a, b| natural_path_cmp(a, b));
    Ok(paths)
}

/// Discover the inventory → document → scan layout of a directory.
///
/// A child directory holding images directly is a document; a child
/// directory holding such document directories is an inventory.
/// Document directories found at the top level are gathered into one
/// implicit inventory.
fn discover_hierarchy(dir: &Path) -> Result<Vec<Vec<Vec<PathBuf>>>> {
    let mut inventories = Vec::new();
    let mut top_level_docs = Vec::new();

    for child in child_dirs(dir)? {
        let images = images_in(&child)?;
        if !images.is_empty() {
            top_level_docs.push(images);
            continue;
        }
        let mut documents = Vec::new();
        for doc_dir in child_dirs(&child)? {
            let images = images_in(&doc_dir)?;
            if !images.is_empty() {
                documents.push(images);
            }
        }
        if !documents.is_empty() {
            inventories.push(documents);
        }
    }

    if !top_level_docs.is_empty() {
        inventories.push(top_level_docs);
    }
    if inventories.is_empty() {
        bail!("no scan images found under {}", dir.display());
    }
    Ok(inventories)
}
