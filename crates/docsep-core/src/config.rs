//! Configuration loading for docsep datasets.
//!
//! All sections and fields are optional in the TOML file; accessors
//! fill in the documented defaults. A missing file yields the default
//! configuration. Value validation happens where the values are used:
//! the sampler validates its probabilities, the split planner its
//! ratio.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{DocsepError, Result};
use crate::window::SamplerConfig;

/// Default training share of the split.
pub const DEFAULT_SPLIT_RATIO: f64 = 0.8;

/// Default split shuffle seed.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub sampler: Option<SamplerSection>,
    pub cache: Option<CacheSection>,
    pub split: Option<SplitSection>,
    pub assets: Option<AssetSection>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SamplerSection {
    pub number_of_images: Option<usize>,
    pub sample_same_inventory: Option<bool>,
    pub wrap_round: Option<bool>,
    pub prob_shuffle_document: Option<f64>,
    pub prob_randomize_document_order: Option<f64>,
    pub prob_random_scan_insert: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CacheSection {
    pub capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SplitSection {
    pub ratio: Option<f64>,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AssetSection {
    pub thumbnail_root: Option<PathBuf>,
}

impl Config {
    /// Sampler configuration with defaults applied. The values are
    /// validated by `WindowSampler::new`.
    pub fn sampler_config(&self) -> SamplerConfig {
        let defaults = SamplerConfig::default();
        let section = self.sampler.clone().unwrap_or_default();
        SamplerConfig {
            number_of_images: section
                .number_of_images
                .unwrap_or(defaults.number_of_images),
            sample_same_inventory: section
                .sample_same_inventory
                .unwrap_or(defaults.sample_same_inventory),
            wrap_round: section.wrap_round.unwrap_or(defaults.wrap_round),
            prob_shuffle_document: section
                .prob_shuffle_document
                .unwrap_or(defaults.prob_shuffle_document),
            prob_randomize_document_order: section
                .prob_randomize_document_order
                .unwrap_or(defaults.prob_randomize_document_order),
            prob_random_scan_insert: section
                .prob_random_scan_insert
                .unwrap_or(defaults.prob_random_scan_insert),
        }
    }

    /// Asset cache capacity. Defaults to [`DEFAULT_CACHE_CAPACITY`].
    pub fn cache_capacity(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.capacity)
            .unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    /// Training share of the split. Defaults to [`DEFAULT_SPLIT_RATIO`].
    pub fn split_ratio(&self) -> f64 {
        self.split
            .as_ref()
            .and_then(|s| s.ratio)
            .unwrap_or(DEFAULT_SPLIT_RATIO)
    }

    /// Split shuffle seed. Defaults to [`DEFAULT_SPLIT_SEED`].
    pub fn split_seed(&self) -> u64 {
        self.split
            .as_ref()
            .and_then(|s| s.seed)
            .unwrap_or(DEFAULT_SPLIT_SEED)
    }

    /// Root directory of pre-generated thumbnails, if configured.
    pub fn thumbnail_root(&self) -> Option<&Path> {
        self.assets
            .as_ref()
            .and_then(|a| a.thumbnail_root.as_deref())
    }
}

/// Load configuration from a TOML file. A missing file yields the
/// default configuration; malformed TOML is a configuration error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        DocsepError::Configuration(format!("invalid config {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/docsep.toml")).unwrap();
        assert_eq!(config.cache_capacity(), DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.split_ratio(), DEFAULT_SPLIT_RATIO);
        assert_eq!(config.split_seed(), DEFAULT_SPLIT_SEED);
        assert_eq!(config.sampler_config().number_of_images, 3);
        assert!(config.thumbnail_root().is_none());
    }

    #[test]
    fn test_full_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docsep.toml");
        fs::write(
            &path,
            r#"
[sampler]
number_of_images = 5
wrap_round = true
prob_shuffle_document = 0.25

[cache]
capacity = 64

[split]
ratio = 0.9
seed = 101

[assets]
thumbnail_root = "/data/thumbnails"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let sampler = config.sampler_config();
        assert_eq!(sampler.number_of_images, 5);
        assert!(sampler.wrap_round);
        assert_eq!(sampler.prob_shuffle_document, 0.25);
        // Unset fields keep their defaults.
        assert!(sampler.sample_same_inventory);
        assert_eq!(sampler.prob_random_scan_insert, 0.0);
        assert_eq!(config.cache_capacity(), 64);
        assert_eq!(config.split_ratio(), 0.9);
        assert_eq!(config.split_seed(), 101);
        assert_eq!(
            config.thumbnail_root(),
            Some(Path::new("/data/thumbnails"))
        );
    }

    #[test]
    fn test_malformed_toml_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docsep.toml");
        fs::write(&path, "[sampler\nnumber_of_images = ").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(DocsepError::Configuration(_))
        ));
    }
}
