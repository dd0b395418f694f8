//! Sample assembly: window → resolved assets → labeled payload.
//!
//! A [`SeparationDataset`] is built once per partition and addressed by
//! flat sample index. Each call walks the hierarchy for a window,
//! resolves every coordinate through the shared [`AssetCache`], derives
//! boundary labels and hands back a self-contained [`Sample`]. Calls
//! share no mutable state beyond the cache, so a worker pool may invoke
//! `sample` for many indices concurrently.

use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::AssetCache;
use crate::error::{DocsepError, Result};
use crate::hierarchy::{Hierarchy, HierarchicalIndex};
use crate::label::{label_window, BoundaryLabel};
use crate::provider::{ImagePayload, ImageProvider, LineRecord, TextProvider};
use crate::window::{SamplerConfig, Slot, WindowSampler};

/// Dataset role. Labels are derived for training and validation;
/// test-time samples carry payloads only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Val,
    Test,
}

impl Mode {
    fn with_labels(self) -> bool {
        matches!(self, Mode::Train | Mode::Val)
    }
}

/// One assembled training sample: the retained window positions with
/// their payloads, aligned by index.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Decoded images; [`ImagePayload::Absent`] for missing positions
    /// and unloadable scans.
    pub images: Vec<ImagePayload>,
    /// Page sizes as (height, width); (0, 0) for missing positions.
    pub shapes: Vec<(u32, u32)>,
    /// Transcription lines; empty for missing positions.
    pub texts: Vec<Vec<LineRecord>>,
    /// Boundary labels, present in train/val mode. Placeholder labels
    /// mark missing positions and must be excluded from loss terms.
    pub labels: Option<Vec<BoundaryLabel>>,
    /// The window coordinates these payloads came from.
    pub coordinates: Vec<Slot>,
    /// Source image paths; `None` for missing positions.
    pub paths: Vec<Option<PathBuf>>,
}

/// Windowed dataset over one hierarchy partition.
pub struct SeparationDataset {
    index: Arc<HierarchicalIndex>,
    sampler: WindowSampler,
    cache: Arc<AssetCache>,
    mode: Mode,
}

impl SeparationDataset {
    /// Build a dataset: flat index, sampler and asset cache over one
    /// hierarchy.
    pub fn new(
        hierarchy: Arc<Hierarchy>,
        mode: Mode,
        config: SamplerConfig,
        image_provider: Box<dyn ImageProvider>,
        text_provider: Box<dyn TextProvider>,
        cache_capacity: usize,
    ) -> Result<Self> {
        let index = Arc::new(HierarchicalIndex::new(Arc::clone(&hierarchy)));
        let sampler = WindowSampler::new(Arc::clone(&index), config)?;
        let cache = Arc::new(AssetCache::new(
            hierarchy,
            image_provider,
            text_provider,
            cache_capacity,
        )?);
        Ok(Self {
            index,
            sampler,
            cache,
            mode,
        })
    }

    /// Number of samples (one per scan).
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Whether the dataset holds no scans.
    pub fn is_empty(&self) -> bool {
        self.index.size() == 0
    }

    /// The flat index over the hierarchy.
    pub fn index(&self) -> &Arc<HierarchicalIndex> {
        &self.index
    }

    /// The shared asset cache.
    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Assemble the sample centered on the scan at `flat_index`.
    ///
    /// Runs to completion or fails atomically; a returned sample is
    /// always fully populated across all retained positions.
    pub fn sample(&self, flat_index: usize, rng: &mut impl Rng) -> Result<Sample> {
        let center = self.index.coordinate_of(flat_index).ok_or_else(|| {
            DocsepError::Configuration(format!(
                "sample index {flat_index} out of range for dataset of {}",
                self.index.size()
            ))
        })?;

        let window = self.sampler.sample(center, rng)?;
        let labels = self.mode.with_labels().then(|| label_window(&window));

        let retained = window.retained();
        let mut images = Vec::with_capacity(retained.len());
        let mut shapes = Vec::with_capacity(retained.len());
        let mut texts = Vec::with_capacity(retained.len());
        let mut paths = Vec::with_capacity(retained.len());

        for slot in retained {
            match slot.coordinate() {
                Some(coord) => {
                    let asset = self.cache.resolve(coord)?;
                    images.push(asset.image.clone());
                    shapes.push(asset.shape);
                    texts.push(asset.lines.clone());
                    paths.push(
                        self.index
                            .hierarchy()
                            .scan_path(coord)
                            .map(|p| p.to_path_buf()),
                    );
                }
                None => {
                    images.push(ImagePayload::Absent);
                    shapes.push((0, 0));
                    texts.push(Vec::new());
                    paths.push(None);
                }
            }
        }

        Ok(Sample {
            images,
            shapes,
            texts,
            labels,
            coordinates: retained.to_vec(),
            paths,
        })
    }
}

impl std::fmt::Debug for SeparationDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeparationDataset")
            .field("len", &self.len())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PageTranscription;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::Path;

    /// Providers that synthesize assets from the path, touching no
    /// filesystem.
    struct StubProvider;

    impl ImageProvider for StubProvider {
        fn load(&self, path: &Path) -> ImagePayload {
            if path.to_string_lossy().contains("absent") {
                ImagePayload::Absent
            } else {
                ImagePayload::Rgb(image::RgbImage::new(2, 2))
            }
        }
    }

    impl TextProvider for StubProvider {
        fn parse(&self, path: &Path) -> Result<PageTranscription> {
            Ok(PageTranscription {
                lines: vec![LineRecord {
                    id: "l1".to_string(),
                    text: path.to_string_lossy().into_owned(),
                    coords: vec![(0, 0), (10, 10)],
                    bbox: None,
                    baseline: vec![],
                }],
                size: (30, 20),
            })
        }
    }

    fn path(name: &str) -> PathBuf {
        PathBuf::from(format!("/scans/{name}.jpg"))
    }

    fn dataset(mode: Mode, config: SamplerConfig) -> SeparationDataset {
        let hierarchy = Arc::new(
            Hierarchy::new(vec![vec![
                vec![path("a0"), path("a1")],
                vec![path("b0")],
                vec![path("c0"), path("c1"), path("c2")],
            ]])
            .unwrap(),
        );
        SeparationDataset::new(
            hierarchy,
            mode,
            config,
            Box::new(StubProvider),
            Box::new(StubProvider),
            16,
        )
        .unwrap()
    }

    #[test]
    fn test_len_matches_scan_count() {
        let ds = dataset(Mode::Train, SamplerConfig::default());
        assert_eq!(ds.len(), 6);
        assert!(!ds.is_empty());
    }

    #[test]
    fn test_sample_is_fully_populated() {
        let ds = dataset(Mode::Train, SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let sample = ds.sample(3, &mut rng).unwrap();
        assert_eq!(sample.images.len(), 3);
        assert_eq!(sample.shapes.len(), 3);
        assert_eq!(sample.texts.len(), 3);
        assert_eq!(sample.coordinates.len(), 3);
        assert_eq!(sample.paths.len(), 3);
        assert_eq!(sample.labels.as_ref().unwrap().len(), 3);
        for (i, slot) in sample.coordinates.iter().enumerate() {
            assert!(!slot.is_missing());
            assert_eq!(sample.shapes[i], (30, 20));
            assert!(sample.images[i].is_present());
            assert_eq!(sample.texts[i].len(), 1);
        }
    }

    #[test]
    fn test_missing_positions_get_placeholders() {
        // Center at the first scan of the hierarchy, no wraparound: the
        // first retained position is missing.
        let ds = dataset(Mode::Train, SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let sample = ds.sample(0, &mut rng).unwrap();
        assert!(sample.coordinates[0].is_missing());
        assert_eq!(sample.images[0], ImagePayload::Absent);
        assert_eq!(sample.shapes[0], (0, 0));
        assert!(sample.texts[0].is_empty());
        assert!(sample.paths[0].is_none());
        assert!(sample.labels.as_ref().unwrap()[0].is_placeholder());
        // The center itself starts its document.
        assert!(sample.labels.as_ref().unwrap()[1].start);
    }

    #[test]
    fn test_test_mode_has_no_labels() {
        let ds = dataset(Mode::Test, SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let sample = ds.sample(2, &mut rng).unwrap();
        assert!(sample.labels.is_none());
        assert_eq!(sample.coordinates.len(), 3);
    }

    #[test]
    fn test_boundary_labels_in_assembled_sample() {
        // Sample centered on b0 (single-scan document): start and end.
        let ds = dataset(Mode::Val, SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let sample = ds.sample(2, &mut rng).unwrap();
        let labels = sample.labels.unwrap();
        let center = labels[1];
        assert!(center.start);
        assert!(center.end);
        assert!(!center.middle);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let ds = dataset(Mode::Train, SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            ds.sample(6, &mut rng),
            Err(DocsepError::Configuration(_))
        ));
    }

    #[test]
    fn test_repeated_sampling_reuses_cache() {
        let ds = dataset(Mode::Train, SamplerConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        ds.sample(3, &mut rng).unwrap();
        let misses_after_first = ds.cache().misses();
        ds.sample(3, &mut rng).unwrap();
        assert_eq!(ds.cache().misses(), misses_after_first);
        assert!(ds.cache().hits() > 0);
    }
}
