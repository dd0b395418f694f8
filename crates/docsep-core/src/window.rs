//! Window construction over the scan hierarchy.
//!
//! Given a center coordinate, the sampler walks the hierarchy backward
//! and forward to build a fixed-width window of consecutive scans,
//! crossing document and inventory boundaries as needed. Three
//! independent perturbations can be applied for data augmentation:
//! shuffling the scans of a document being entered, replacing the
//! structurally adjacent document with a randomly drawn one, and
//! overwriting one non-center slot with a foreign scan.
//!
//! All randomness flows through the `&mut impl Rng` passed into
//! [`WindowSampler::sample`]; the sampler holds no RNG and no mutable
//! state, so a seeded generator reproduces a window exactly and
//! concurrent calls never interfere.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{DocsepError, Result};
use crate::hierarchy::{Coordinate, DocumentId, HierarchicalIndex};

/// Sampler parameters. Validated once at [`WindowSampler::new`].
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Window width emitted to the consumer. The constructed window
    /// carries two extra helper slots used only for boundary labels.
    pub number_of_images: usize,
    /// Restrict cross-document walks and random draws to the center's
    /// inventory.
    pub sample_same_inventory: bool,
    /// Treat the hierarchy as circular instead of emitting missing
    /// sentinels at its edges.
    pub wrap_round: bool,
    /// Probability of shuffling the scans of each document entered
    /// (including the center's own document).
    pub prob_shuffle_document: f64,
    /// Probability, per extension step, of jumping to a randomly drawn
    /// document instead of the structurally adjacent one.
    pub prob_randomize_document_order: f64,
    /// Probability of overwriting one non-center slot with a scan from
    /// a different document.
    pub prob_random_scan_insert: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            number_of_images: 3,
            sample_same_inventory: true,
            wrap_round: false,
            prob_shuffle_document: 0.0,
            prob_randomize_document_order: 0.0,
            prob_random_scan_insert: 0.0,
        }
    }
}

impl SamplerConfig {
    /// Slots walked backward from the center.
    pub fn steps_back(&self) -> usize {
        self.number_of_images / 2 + 1
    }

    /// Slots walked forward from the center.
    pub fn steps_forward(&self) -> usize {
        self.number_of_images + 1 - self.steps_back()
    }

    fn validate(&self) -> Result<()> {
        if self.number_of_images == 0 {
            return Err(DocsepError::Configuration(
                "number_of_images must be greater than 0".to_string(),
            ));
        }
        for (name, p) in [
            ("prob_shuffle_document", self.prob_shuffle_document),
            (
                "prob_randomize_document_order",
                self.prob_randomize_document_order,
            ),
            ("prob_random_scan_insert", self.prob_random_scan_insert),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DocsepError::Configuration(format!(
                    "{name} must be in [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}

/// One window position: a real scan or the explicit "no such neighbor"
/// sentinel produced when a non-wrapping walk runs off the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Slot {
    /// A valid scan coordinate.
    Scan(Coordinate),
    /// No neighbor exists in this direction.
    Missing,
}

impl Slot {
    /// The coordinate, if this slot holds one.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Slot::Scan(coord) => Some(*coord),
            Slot::Missing => None,
        }
    }

    /// Whether this slot is the missing sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, Slot::Missing)
    }

    /// Document identity of the scan, if any. A missing slot counts as
    /// belonging to no document.
    pub fn document_id(&self) -> Option<DocumentId> {
        self.coordinate().map(|c| c.document_id())
    }
}

/// An ordered window of `steps_back + 1 + steps_forward` slots around a
/// center scan. The center slot is never missing. The first and last
/// slot exist only to give the boundary labeler context and are not
/// part of the emitted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    slots: Vec<Slot>,
    steps_back: usize,
}

impl Window {
    /// All slots, helper slots included.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The retained positions: everything except the two helper slots.
    pub fn retained(&self) -> &[Slot] {
        &self.slots[1..self.slots.len() - 1]
    }

    /// Number of retained positions (`number_of_images`).
    pub fn retained_len(&self) -> usize {
        self.slots.len() - 2
    }

    /// The center coordinate.
    pub fn center(&self) -> Coordinate {
        match self.slots[self.steps_back] {
            Slot::Scan(coord) => coord,
            // Construction guarantees a real center.
            Slot::Missing => unreachable!("window center is never missing"),
        }
    }

    /// Neighbors of retained position `i`: `(prev, current, next)` over
    /// the full slot list, sentinel-aware.
    pub fn context(&self, i: usize) -> (Slot, Slot, Slot) {
        (self.slots[i], self.slots[i + 1], self.slots[i + 2])
    }
}

enum Direction {
    Back,
    Forward,
}

/// Builds windows by walking a [`HierarchicalIndex`].
#[derive(Debug)]
pub struct WindowSampler {
    index: Arc<HierarchicalIndex>,
    config: SamplerConfig,
}

impl WindowSampler {
    /// Create a sampler, validating the configuration.
    pub fn new(index: Arc<HierarchicalIndex>, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { index, config })
    }

    /// The sampler's configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Build the window around `center`.
    ///
    /// Always returns a complete window of
    /// `steps_back + 1 + steps_forward` slots or fails before producing
    /// anything; no partial window ever escapes.
    pub fn sample(&self, center: Coordinate, rng: &mut impl Rng) -> Result<Window> {
        if !self.index.is_in_bounds(center) {
            return Err(DocsepError::Configuration(format!(
                "window center {center:?} is out of bounds"
            )));
        }

        let (prev_in_doc, next_in_doc) = self.center_document_neighbors(center, rng);

        let mut slots = self.walk(Direction::Back, center, prev_in_doc, rng);
        slots.push(Slot::Scan(center));
        slots.extend(self.walk(Direction::Forward, center, next_in_doc, rng));

        self.insert_random_scan(&mut slots, center, rng);

        Ok(Window {
            slots,
            steps_back: self.config.steps_back(),
        })
    }

    /// Same-document neighbors of the center, split into the before and
    /// after lists. With probability `prob_shuffle_document` the
    /// document's scans are permuted first and the permutation is split
    /// around the center; the shuffle is local to this window and
    /// no-ops for single-scan documents.
    fn center_document_neighbors(
        &self,
        center: Coordinate,
        rng: &mut impl Rng,
    ) -> (Vec<Coordinate>, Vec<Coordinate>) {
        let doc = center.document_id();
        let scan_count = self.index.all_scans_in_document(doc).len();

        if scan_count > 1 && roll(self.config.prob_shuffle_document, rng) {
            tracing::debug!(?center, "shuffling center document");
            let mut all = self.index.all_scans_in_document(doc);
            all.shuffle(rng);
            let center_pos = all
                .iter()
                .position(|&c| c == center)
                .unwrap_or(all.len() - 1);
            let after = all.split_off(center_pos + 1);
            all.pop();
            return (all, after);
        }

        let prev = (0..center.scan)
            .map(|k| Coordinate::new(doc.inventory, doc.document, k))
            .collect();
        let next = (center.scan + 1..scan_count)
            .map(|k| Coordinate::new(doc.inventory, doc.document, k))
            .collect();
        (prev, next)
    }

    /// Walk one direction until `steps_back`/`steps_forward` slots are
    /// collected, entering adjacent documents as needed. Returns the
    /// slots in window order (farthest first for the backward
    /// direction).
    ///
    /// Internally the list is kept in closest-to-center-first order so
    /// both directions share one loop; the backward result is reversed
    /// at the end.
    fn walk(
        &self,
        direction: Direction,
        center: Coordinate,
        in_doc: Vec<Coordinate>,
        rng: &mut impl Rng,
    ) -> Vec<Slot> {
        let target = match direction {
            Direction::Back => self.config.steps_back(),
            Direction::Forward => self.config.steps_forward(),
        };

        // Closest-to-center first. The center document's before-list is
        // in page order, so the backward walk reverses it here.
        let mut slots: Vec<Slot> = match direction {
            Direction::Back => in_doc.into_iter().rev().map(Slot::Scan).collect(),
            Direction::Forward => in_doc.into_iter().map(Slot::Scan).collect(),
        };

        let mut cursor = center.document_id();
        while slots.len() < target {
            match self.adjacent_document(&direction, cursor, rng) {
                Some(next_doc) => {
                    let mut scans = self.index.all_scans_in_document(next_doc);
                    if scans.len() > 1 && roll(self.config.prob_shuffle_document, rng) {
                        scans.shuffle(rng);
                    }
                    match direction {
                        Direction::Back => slots.extend(scans.into_iter().rev().map(Slot::Scan)),
                        Direction::Forward => slots.extend(scans.into_iter().map(Slot::Scan)),
                    }
                    cursor = next_doc;
                }
                None => slots.push(Slot::Missing),
            }
        }
        slots.truncate(target);

        if matches!(direction, Direction::Back) {
            slots.reverse();
        }
        slots
    }

    /// The document to enter next in the given direction, or `None`
    /// when the walk has run off the hierarchy and wraparound is
    /// disabled.
    ///
    /// Each call independently chooses between sequential mode and
    /// randomized mode with `prob_randomize_document_order`. Randomized
    /// mode degrades to sequential when no alternative document exists.
    fn adjacent_document(
        &self,
        direction: &Direction,
        current: DocumentId,
        rng: &mut impl Rng,
    ) -> Option<DocumentId> {
        if roll(self.config.prob_randomize_document_order, rng) {
            if let Some(random) = self.random_other_document(current, rng) {
                tracing::debug!(?current, ?random, "randomized document order");
                return Some(random);
            }
        }

        let sequential = match direction {
            Direction::Back => self.index.prev_document(current),
            Direction::Forward => self.index.next_document(current),
        };
        if sequential.is_some() {
            return sequential;
        }

        if !self.config.wrap_round {
            return None;
        }

        // Wraparound: stay in the inventory or step to the adjacent
        // one, wrapping the inventory list itself if needed.
        if self.config.sample_same_inventory {
            return match direction {
                Direction::Back => self.index.last_document(current.inventory),
                Direction::Forward => self.index.first_document(current.inventory),
            };
        }
        match direction {
            Direction::Back => {
                let inventory = self
                    .index
                    .prev_inventory(current.inventory)
                    .unwrap_or_else(|| self.index.last_inventory());
                self.index.last_document(inventory)
            }
            Direction::Forward => {
                let inventory = self
                    .index
                    .next_inventory(current.inventory)
                    .unwrap_or_else(|| self.index.first_inventory());
                self.index.first_document(inventory)
            }
        }
    }

    /// Draw a document uniformly at random, excluding `current`.
    ///
    /// Same-inventory mode draws from the current inventory only.
    /// Cross-inventory mode draws an inventory uniformly first
    /// (excluding none); if that draw lands on the current inventory
    /// and it holds no other document, one redraw over the remaining
    /// inventories settles it. Returns `None` when `current` is the
    /// only document anywhere reachable.
    fn random_other_document(&self, current: DocumentId, rng: &mut impl Rng) -> Option<DocumentId> {
        let hierarchy = self.index.hierarchy();

        if self.config.sample_same_inventory {
            let count = hierarchy.document_count(current.inventory);
            if count < 2 {
                return None;
            }
            return Some(DocumentId {
                inventory: current.inventory,
                document: random_index_excluding(count, current.document, rng),
            });
        }

        let inventory_count = hierarchy.inventory_count();
        let mut inventory = rng.random_range(0..inventory_count);
        if inventory == current.inventory && hierarchy.document_count(inventory) < 2 {
            if inventory_count < 2 {
                return None;
            }
            inventory = random_index_excluding(inventory_count, current.inventory, rng);
        }

        let count = hierarchy.document_count(inventory);
        let document = if inventory == current.inventory {
            random_index_excluding(count, current.document, rng)
        } else {
            rng.random_range(0..count)
        };
        Some(DocumentId {
            inventory,
            document,
        })
    }

    /// With probability `prob_random_scan_insert`, overwrite one
    /// uniformly chosen non-center slot with a scan from a different
    /// document, as a negative example. No-op when the draw finds no
    /// eligible alternative document. The center is never overwritten.
    fn insert_random_scan(&self, slots: &mut [Slot], center: Coordinate, rng: &mut impl Rng) {
        if !roll(self.config.prob_random_scan_insert, rng) {
            return;
        }

        let hierarchy = self.index.hierarchy();
        let center_pos = self.config.steps_back();

        let inventory = if self.config.sample_same_inventory {
            center.inventory
        } else {
            rng.random_range(0..hierarchy.inventory_count())
        };
        let doc_count = hierarchy.document_count(inventory);
        let document = if inventory == center.inventory {
            if doc_count < 2 {
                return;
            }
            random_index_excluding(doc_count, center.document, rng)
        } else {
            rng.random_range(0..doc_count)
        };
        let scan = rng.random_range(0..hierarchy.scan_count(inventory, document));

        let mut position = rng.random_range(0..slots.len() - 1);
        if position >= center_pos {
            position += 1;
        }
        tracing::debug!(position, "inserting random foreign scan");
        slots[position] = Slot::Scan(Coordinate::new(inventory, document, scan));
    }
}

/// Bernoulli trial: true with probability `p`.
fn roll(p: f64, rng: &mut impl Rng) -> bool {
    p > 0.0 && rng.random::<f64>() < p
}

/// Uniform draw from `[0, high)` excluding one value.
///
/// Draws from a range one smaller and shifts past the excluded value.
fn random_index_excluding(high: usize, excluding: usize, rng: &mut impl Rng) -> usize {
    debug_assert!(high >= 2 && excluding < high);
    let choice = rng.random_range(0..high - 1);
    if choice >= excluding {
        choice + 1
    } else {
        choice
    }
}
