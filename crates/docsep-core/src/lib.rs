//! docsep-core: windowed sampling engine for page-boundary training data
//!
//! This crate provides:
//! - A three-level scan hierarchy (inventory → document → scan) with a
//!   dense flat index and edge-returning navigation
//! - Window construction around a center scan, with wraparound policy
//!   and randomized perturbations for augmentation
//! - Start/middle/end boundary labels derived per window position
//! - A bounded, single-flight LRU cache of decoded per-scan assets
//! - Deterministic train/validation split planning that keeps every
//!   document's scans together
//!
//! The neural network consuming the assembled samples lives elsewhere;
//! this crate ends at the [`dataset::Sample`] payload.

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod hierarchy;
pub mod label;
pub mod provider;
pub mod split;
pub mod window;

// Re-exports
pub use cache::{Asset, AssetCache, DEFAULT_CACHE_CAPACITY};
pub use config::{load_config, Config, DEFAULT_SPLIT_RATIO, DEFAULT_SPLIT_SEED};
pub use dataset::{Mode, Sample, SeparationDataset};
pub use error::{DocsepError, Result};
pub use hierarchy::{Coordinate, DocumentId, Hierarchy, HierarchicalIndex};
pub use label::{label_window, BoundaryLabel};
pub use provider::{
    FsImageProvider, ImagePayload, ImageProvider, LineRecord, PageTranscription,
    PageXmlTextProvider, TextProvider,
};
pub use split::{natural_path_cmp, split_scan_paths, SplitPlan};
pub use window::{SamplerConfig, Slot, Window, WindowSampler};
