//! Three-level scan hierarchy and its dense flat index.
//!
//! Scans are organized as inventory → document → scan. Order is
//! semantically meaningful (scan order reflects physical page order)
//! and is preserved exactly as given; nothing in this module ever
//! re-sorts. The [`HierarchicalIndex`] flattens the hierarchy into a
//! dense 0-based index and provides the navigation primitives the
//! window sampler walks with.
//!
//! All navigation is edge-returning: stepping past either end of the
//! hierarchy yields `None`, never an implicit wraparound. Wraparound is
//! an explicit sampler policy, decided by the caller.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{DocsepError, Result};

/// Identifies one scan inside the hierarchy.
///
/// Valid iff every component is within bounds of its parent level.
/// Coordinates are never negative-index-wrapped; bounds checking goes
/// through [`HierarchicalIndex::is_in_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Coordinate {
    /// Index of the inventory within the hierarchy.
    pub inventory: usize,
    /// Index of the document within the inventory.
    pub document: usize,
    /// Index of the scan within the document.
    pub scan: usize,
}

impl Coordinate {
    /// Create a coordinate. No bounds checking happens here.
    pub fn new(inventory: usize, document: usize, scan: usize) -> Self {
        Self {
            inventory,
            document,
            scan,
        }
    }

    /// The (inventory, document) pair identifying the document this
    /// scan belongs to.
    pub fn document_id(&self) -> DocumentId {
        DocumentId {
            inventory: self.inventory,
            document: self.document,
        }
    }
}

/// Identifies one document inside the hierarchy.
///
/// Two scans belong to the same document iff their `DocumentId`s are
/// equal; comparing bare document indices is not enough, since every
/// inventory restarts document numbering at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentId {
    /// Index of the inventory within the hierarchy.
    pub inventory: usize,
    /// Index of the document within the inventory.
    pub document: usize,
}

/// The ordered inventory → document → scan path collection.
///
/// Immutable after construction. Owns only path references: decoded
/// assets live in the [`crate::cache::AssetCache`], never here.
#[derive(Debug)]
pub struct Hierarchy {
    inventories: Vec<Vec<Vec<PathBuf>>>,
}

impl Hierarchy {
    /// Build a hierarchy from nested path lists.
    ///
    /// Fails with [`DocsepError::Construction`] if the hierarchy is
    /// empty, any inventory has no documents, or any document has no
    /// scans. A `Hierarchy` that exists is therefore always navigable.
    pub fn new(inventories: Vec<Vec<Vec<PathBuf>>>) -> Result<Self> {
        if inventories.is_empty() {
            return Err(DocsepError::Construction(
                "hierarchy has no inventories".to_string(),
            ));
        }
        for (i, inventory) in inventories.iter().enumerate() {
            if inventory.is_empty() {
                return Err(DocsepError::Construction(format!(
                    "inventory {i} has no documents"
                )));
            }
            for (j, document) in inventory.iter().enumerate() {
                if document.is_empty() {
                    return Err(DocsepError::Construction(format!(
                        "document {j} in inventory {i} has no scans"
                    )));
                }
            }
        }
        Ok(Self { inventories })
    }

    /// Number of inventories.
    pub fn inventory_count(&self) -> usize {
        self.inventories.len()
    }

    /// Number of documents in an inventory, or 0 if out of bounds.
    pub fn document_count(&self, inventory: usize) -> usize {
        self.inventories.get(inventory).map_or(0, Vec::len)
    }

    /// Number of scans in a document, or 0 if out of bounds.
    pub fn scan_count(&self, inventory: usize, document: usize) -> usize {
        self.inventories
            .get(inventory)
            .and_then(|inv| inv.get(document))
            .map_or(0, Vec::len)
    }

    /// Path of the scan at a coordinate, or `None` if out of bounds.
    pub fn scan_path(&self, coord: Coordinate) -> Option<&Path> {
        self.inventories
            .get(coord.inventory)?
            .get(coord.document)?
            .get(coord.scan)
            .map(PathBuf::as_path)
    }

    /// Iterate over every scan path in hierarchy order.
    ///
    /// Used by the CLI accessibility check; the hierarchy itself never
    /// touches the filesystem.
    pub fn iter_scan_paths(&self) -> impl Iterator<Item = &Path> {
        self.inventories
            .iter()
            .flat_map(|inv| inv.iter())
            .flat_map(|doc| doc.iter())
            .map(PathBuf::as_path)
    }
}

/// Dense flat index over a [`Hierarchy`] plus navigation primitives.
///
/// Built once per dataset partition by a single forward scan; immutable
/// thereafter.
#[derive(Debug)]
pub struct HierarchicalIndex {
    hierarchy: Arc<Hierarchy>,
    /// Flat index → coordinate, in hierarchy order.
    flat: Vec<Coordinate>,
}

impl HierarchicalIndex {
    /// Build the flat index by one forward scan over the hierarchy.
    pub fn new(hierarchy: Arc<Hierarchy>) -> Self {
        let mut flat = Vec::new();
        for i in 0..hierarchy.inventory_count() {
            for j in 0..hierarchy.document_count(i) {
                for k in 0..hierarchy.scan_count(i, j) {
                    flat.push(Coordinate::new(i, j, k));
                }
            }
        }
        Self { hierarchy, flat }
    }

    /// The hierarchy this index was built over.
    pub fn hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchy
    }

    /// Total scan count across all inventories and documents.
    pub fn size(&self) -> usize {
        self.flat.len()
    }

    /// Coordinate of the scan at a flat index, or `None` if out of range.
    pub fn coordinate_of(&self, flat_index: usize) -> Option<Coordinate> {
        self.flat.get(flat_index).copied()
    }

    /// Flat index of a coordinate, or `None` if out of bounds.
    pub fn flat_index_of(&self, coord: Coordinate) -> Option<usize> {
        if !self.is_in_bounds(coord) {
            return None;
        }
        let mut index = 0;
        for i in 0..coord.inventory {
            for j in 0..self.hierarchy.document_count(i) {
                index += self.hierarchy.scan_count(i, j);
            }
        }
        for j in 0..coord.document {
            index += self.hierarchy.scan_count(coord.inventory, j);
        }
        Some(index + coord.scan)
    }

    /// Whether a coordinate addresses an existing scan.
    pub fn is_in_bounds(&self, coord: Coordinate) -> bool {
        coord.scan < self.hierarchy.scan_count(coord.inventory, coord.document)
    }

    /// Whether `coord.scan` falls inside its document, ignoring whether
    /// the inventory/document components are themselves valid.
    pub fn scan_in_document(&self, coord: Coordinate) -> bool {
        coord.scan < self.hierarchy.scan_count(coord.inventory, coord.document)
    }

    /// First document of an inventory, or `None` if the inventory does
    /// not exist.
    pub fn first_document(&self, inventory: usize) -> Option<DocumentId> {
        if self.hierarchy.document_count(inventory) == 0 {
            return None;
        }
        Some(DocumentId {
            inventory,
            document: 0,
        })
    }

    /// Last document of an inventory, or `None` if the inventory does
    /// not exist.
    pub fn last_document(&self, inventory: usize) -> Option<DocumentId> {
        let count = self.hierarchy.document_count(inventory);
        if count == 0 {
            return None;
        }
        Some(DocumentId {
            inventory,
            document: count - 1,
        })
    }

    /// Structurally next document within the same inventory, or `None`
    /// at the inventory's end. Callers decide whether to wrap.
    pub fn next_document(&self, id: DocumentId) -> Option<DocumentId> {
        if id.document + 1 >= self.hierarchy.document_count(id.inventory) {
            return None;
        }
        Some(DocumentId {
            inventory: id.inventory,
            document: id.document + 1,
        })
    }

    /// Structurally previous document within the same inventory, or
    /// `None` at the inventory's start.
    pub fn prev_document(&self, id: DocumentId) -> Option<DocumentId> {
        if id.document == 0 || id.document >= self.hierarchy.document_count(id.inventory) {
            return None;
        }
        Some(DocumentId {
            inventory: id.inventory,
            document: id.document - 1,
        })
    }

    /// First inventory index.
    pub fn first_inventory(&self) -> usize {
        0
    }

    /// Last inventory index.
    pub fn last_inventory(&self) -> usize {
        self.hierarchy.inventory_count() - 1
    }

    /// Next inventory, or `None` past the end.
    pub fn next_inventory(&self, inventory: usize) -> Option<usize> {
        if inventory + 1 >= self.hierarchy.inventory_count() {
            return None;
        }
        Some(inventory + 1)
    }

    /// Previous inventory, or `None` before the start.
    pub fn prev_inventory(&self, inventory: usize) -> Option<usize> {
        if inventory == 0 || inventory >= self.hierarchy.inventory_count() {
            return None;
        }
        Some(inventory - 1)
    }

    /// All scan coordinates of a document, in page order. Empty if the
    /// document does not exist.
    pub fn all_scans_in_document(&self, id: DocumentId) -> Vec<Coordinate> {
        let count = self.hierarchy.scan_count(id.inventory, id.document);
        (0..count)
            .map(|k| Coordinate::new(id.inventory, id.document, k))
            .collect()
    }
}
