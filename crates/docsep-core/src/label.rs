//! Ground-truth boundary labels derived from a window.
//!
//! Each retained window position is labeled start/middle/end by
//! comparing its document identity against its two neighbors, using the
//! window's helper slots for context at the extremes. A missing
//! neighbor counts as a different document, so a scan at the edge of a
//! non-wrapping walk is a boundary.

use serde::Serialize;

use crate::window::{Slot, Window};

/// Boundary label of one window position.
///
/// Exactly one of the three flags is true for a real scan. A missing
/// position carries the all-false placeholder and must be excluded from
/// any label-dependent computation by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundaryLabel {
    /// First scan of its document within the traversal.
    pub start: bool,
    /// Interior scan: both neighbors share the document.
    pub middle: bool,
    /// Last scan of its document within the traversal.
    pub end: bool,
}

impl BoundaryLabel {
    /// The placeholder attached to missing positions.
    pub const PLACEHOLDER: Self = Self {
        start: false,
        middle: false,
        end: false,
    };

    /// Whether this is the missing-position placeholder.
    pub fn is_placeholder(&self) -> bool {
        !self.start && !self.middle && !self.end
    }
}

/// Derive labels for every retained position of a window.
///
/// Document identity is the full (inventory, document) pair; document
/// numbering restarts per inventory, so bare document indices would
/// mislabel windows crossing an inventory boundary.
pub fn label_window(window: &Window) -> Vec<BoundaryLabel> {
    (0..window.retained_len())
        .map(|i| {
            let (prev, current, next) = window.context(i);
            label_position(prev, current, next)
        })
        .collect()
}

fn label_position(prev: Slot, current: Slot, next: Slot) -> BoundaryLabel {
    let current_doc = match current.document_id() {
        Some(doc) => doc,
        None => return BoundaryLabel::PLACEHOLDER,
    };
    let start = prev.document_id() != Some(current_doc);
    let end = next.document_id() != Some(current_doc);
    BoundaryLabel {
        start,
        middle: !start && !end,
        end,
    }
}
