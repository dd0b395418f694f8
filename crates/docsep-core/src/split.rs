//! Train/validation split planning.
//!
//! Scans are grouped by parent directory (one directory per document)
//! and whole groups are assigned to one side, so a document's scans are
//! never divided across partitions. Determinism comes from a natural
//! sort of the paths before a seeded shuffle of the groups; the order
//! of scans inside a group is the natural order, untouched by the
//! shuffle.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::error::{DocsepError, Result};

/// A planned partition of scan paths into training and validation
/// sets, grouped by document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    /// Training documents, each a group of scan paths in natural order.
    pub training: Vec<Vec<PathBuf>>,
    /// Validation documents.
    pub validation: Vec<Vec<PathBuf>>,
}

impl SplitPlan {
    /// All training scan paths, flattened in group order.
    pub fn training_paths(&self) -> Vec<PathBuf> {
        self.training.iter().flatten().cloned().collect()
    }

    /// All validation scan paths, flattened in group order.
    pub fn validation_paths(&self) -> Vec<PathBuf> {
        self.validation.iter().flatten().cloned().collect()
    }
}

/// Partition scan paths into training and validation sets.
///
/// `ratio` is the training share and must lie strictly between 0 and 1;
/// the first `round(ratio * group_count)` shuffled groups go to
/// training. The same `seed` always produces the same plan.
pub fn split_scan_paths(paths: &[PathBuf], ratio: f64, seed: u64) -> Result<SplitPlan> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(DocsepError::Configuration(format!(
            "split ratio must be in (0, 1), got {ratio}"
        )));
    }

    let mut sorted: Vec<PathBuf> = paths.to_vec();
    sorted.sort_by(|a, b| natural_path_cmp(a, b));

    // Group consecutive paths sharing a parent directory.
    let mut groups: Vec<Vec<PathBuf>> = Vec::new();
    for path in sorted {
        match groups.last_mut() {
            Some(group) if group[0].parent() == path.parent() => group.push(path),
            _ => groups.push(vec![path]),
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    groups.shuffle(&mut rng);

    let split_at = (ratio * groups.len() as f64).round() as usize;
    let split_at = split_at.min(groups.len());
    let validation = groups.split_off(split_at);

    Ok(SplitPlan {
        training: groups,
        validation,
    })
}

/// Natural (human) order over paths: digit runs compare numerically,
/// everything else byte-wise. `page_2` sorts before `page_10`.
pub fn natural_path_cmp(a: &Path, b: &Path) -> Ordering {
    natural_cmp(&a.to_string_lossy(), &b.to_string_lossy())
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let run_a = digit_run(a, &mut i);
            let run_b = digit_run(b, &mut j);
            let ord = run_a
                .len()
                .cmp(&run_b.len())
                .then_with(|| run_a.cmp(run_b));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = a[i].cmp(&b[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

/// Advance past a digit run and return it with leading zeros stripped.
fn digit_run<'a>(bytes: &'a [u8], pos: &mut usize) -> &'a [u8] {
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let mut run = &bytes[start..*pos];
    while run.len() > 1 && run[0] == b'0' {
        run = &run[1..];
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn doc_paths(doc: usize, scans: usize) -> Vec<PathBuf> {
        (0..scans)
            .map(|k| PathBuf::from(format!("/scans/doc{doc}/page_{k}.jpg")))
            .collect()
    }

    #[test]
    fn test_ratio_bounds_rejected() {
        let paths = doc_paths(0, 2);
        assert!(split_scan_paths(&paths, 0.0, 1).is_err());
        assert!(split_scan_paths(&paths, 1.0, 1).is_err());
        assert!(split_scan_paths(&paths, -0.5, 1).is_err());
    }

    #[test]
    fn test_eighty_twenty_over_ten_documents() {
        let paths: Vec<PathBuf> = (0..10).flat_map(|d| doc_paths(d, 1)).collect();
        let plan = split_scan_paths(&paths, 0.8, 42).unwrap();
        assert_eq!(plan.training.len(), 8);
        assert_eq!(plan.validation.len(), 2);

        // Union reconstructs the input, intersection is empty.
        let train: HashSet<PathBuf> = plan.training_paths().into_iter().collect();
        let val: HashSet<PathBuf> = plan.validation_paths().into_iter().collect();
        assert!(train.is_disjoint(&val));
        let union: HashSet<PathBuf> = train.union(&val).cloned().collect();
        let input: HashSet<PathBuf> = paths.into_iter().collect();
        assert_eq!(union, input);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let paths: Vec<PathBuf> = (0..10).flat_map(|d| doc_paths(d, 3)).collect();
        let a = split_scan_paths(&paths, 0.8, 101).unwrap();
        let b = split_scan_paths(&paths, 0.8, 101).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_documents_never_split() {
        let paths: Vec<PathBuf> = (0..6).flat_map(|d| doc_paths(d, 4)).collect();
        for seed in 0..10 {
            let plan = split_scan_paths(&paths, 0.5, seed).unwrap();
            for group in plan.training.iter().chain(plan.validation.iter()) {
                assert_eq!(group.len(), 4);
                let parent = group[0].parent();
                assert!(group.iter().all(|p| p.parent() == parent));
            }
        }
    }

    #[test]
    fn test_scan_order_inside_group_is_natural() {
        // Input deliberately out of order, with a name that sorts
        // wrongly under plain lexicographic order.
        let paths = vec![
            PathBuf::from("/scans/doc0/page_10.jpg"),
            PathBuf::from("/scans/doc0/page_2.jpg"),
            PathBuf::from("/scans/doc0/page_1.jpg"),
        ];
        let plan = split_scan_paths(&paths, 0.5, 7).unwrap();
        let group = plan
            .training
            .first()
            .or(plan.validation.first())
            .unwrap();
        assert_eq!(
            group
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            vec!["page_1.jpg", "page_2.jpg", "page_10.jpg"]
        );
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("page_2", "page_10"), Ordering::Less);
        assert_eq!(natural_cmp("page_10", "page_2"), Ordering::Greater);
        assert_eq!(natural_cmp("page_02", "page_2"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("a1b2", "a1b10"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abcd"), Ordering::Less);
    }
}
