//! [`ClusterHistory`] – ghost-detection filter.
//!
//! When the point cloud has not refreshed since the last pick, the segmenter
//! keeps reporting objects that are already in the basket.  The history
//! remembers positions that were acted on and rejects new detections whose
//! x coordinate lies within an absolute tolerance of a remembered one.
//!
//! Only x is compared; y and z are ignored.
//!
//! # Example
//!
//! ```rust
//! use locobot_perception::dedup::ClusterHistory;
//! use locobot_types::{Cluster, Vec3};
//!
//! let history = ClusterHistory::new(0.05);
//! let batch = vec![
//!     Cluster::at("a", Vec3::new(0.10, 0.0, 0.0)),
//!     Cluster::at("b", Vec3::new(0.12, 0.1, 0.0)),
//!     Cluster::at("c", Vec3::new(0.50, 0.0, 0.0)),
//! ];
//! let outcome = history.filter(batch);
//! assert_eq!(outcome.kept.len(), 2);
//! assert_eq!(outcome.dropped[0].name, "b");
//! ```

use std::collections::VecDeque;

use locobot_types::{Cluster, Vec3};
use tracing::debug;

/// Tolerance (metres) below which two x coordinates are treated as the same
/// object.
pub const DEFAULT_DEDUP_TOLERANCE: f32 = 0.05;

/// Result of [`ClusterHistory::filter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    /// Clusters to act on, in their original order.
    pub kept: Vec<Cluster>,
    /// Clusters rejected as duplicates.
    pub dropped: Vec<Cluster>,
}

/// Positions of previously handled clusters.
///
/// Append-only unless a limit is set with
/// [`with_limit`][ClusterHistory::with_limit], in which case the oldest
/// entries age out first.
#[derive(Debug, Clone)]
pub struct ClusterHistory {
    entries: VecDeque<Vec3>,
    tolerance: f32,
    limit: Option<usize>,
}

impl Default for ClusterHistory {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TOLERANCE)
    }
}

impl ClusterHistory {
    /// Empty, unbounded history comparing with `tolerance`.
    pub fn new(tolerance: f32) -> Self {
        Self {
            entries: VecDeque::new(),
            tolerance,
            limit: None,
        }
    }

    /// Keep at most `limit` entries.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self.trim();
        self
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remembered positions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.entries.iter()
    }

    /// Remember `position`.
    pub fn record(&mut self, position: Vec3) {
        self.entries.push_back(position);
        self.trim();
    }

    /// `true` if `x` is within tolerance of any remembered position.
    pub fn contains_x(&self, x: f32) -> bool {
        self.entries.iter().any(|p| self.is_close(x, p.x))
    }

    /// Split `clusters` into those to act on and those rejected.
    ///
    /// A cluster is rejected if its x coordinate is within tolerance of a
    /// remembered position or of any earlier cluster in the same batch.
    pub fn filter(&self, clusters: Vec<Cluster>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        let mut seen: Vec<f32> = Vec::with_capacity(clusters.len());

        for cluster in clusters {
            let x = cluster.position.x;
            let duplicate = self.contains_x(x) || seen.iter().any(|&s| self.is_close(x, s));
            seen.push(x);
            if duplicate {
                debug!(name = %cluster.name, x, "dropping duplicate cluster");
                outcome.dropped.push(cluster);
            } else {
                outcome.kept.push(cluster);
            }
        }
        outcome
    }

    /// Inclusive comparison.  Decimal positions exactly `tolerance` apart
    /// (0.10 and 0.15) can land a few ulps further apart in f32, so the
    /// bound carries a rounding allowance scaled to the operands.
    fn is_close(&self, a: f32, b: f32) -> bool {
        let slack = 4.0 * f32::EPSILON * a.abs().max(b.abs()).max(1.0);
        (a - b).abs() <= self.tolerance + slack
    }

    fn trim(&mut self) {
        if let Some(limit) = self.limit {
            while self.entries.len() > limit {
                self.entries.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_x(name: &str, x: f32) -> Cluster {
        Cluster::at(name, Vec3::new(x, 0.0, 0.02))
    }

    fn names(clusters: &[Cluster]) -> Vec<&str> {
        clusters.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn drops_later_cluster_within_tolerance_in_same_batch() {
        let history = ClusterHistory::default();
        let outcome = history.filter(vec![at_x("a", 0.10), at_x("b", 0.12), at_x("c", 0.50)]);
        assert_eq!(names(&outcome.kept), ["a", "c"]);
        assert_eq!(names(&outcome.dropped), ["b"]);
    }

    #[test]
    fn keeps_clusters_further_apart_than_tolerance() {
        let history = ClusterHistory::default();
        let outcome = history.filter(vec![at_x("a", 0.10), at_x("b", 0.20), at_x("c", 0.31)]);
        assert_eq!(names(&outcome.kept), ["a", "b", "c"]);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn pairs_exactly_one_tolerance_apart_are_duplicates() {
        for (a, b) in [(0.0, 0.05), (0.10, 0.15), (0.20, 0.25), (0.30, 0.35), (0.40, 0.45)] {
            let outcome = ClusterHistory::default().filter(vec![at_x("a", a), at_x("b", b)]);
            assert_eq!(names(&outcome.kept), ["a"], "pair {a}/{b}");
            assert_eq!(names(&outcome.dropped), ["b"], "pair {a}/{b}");

            let mut history = ClusterHistory::default();
            history.record(Vec3::new(a, 0.0, 0.0));
            assert!(history.contains_x(b), "history {a} vs {b}");
        }
    }

    #[test]
    fn pair_just_beyond_tolerance_is_kept() {
        let outcome = ClusterHistory::default().filter(vec![at_x("a", 0.10), at_x("b", 0.151)]);
        assert_eq!(names(&outcome.kept), ["a", "b"]);
    }

    #[test]
    fn drops_cluster_matching_history() {
        let mut history = ClusterHistory::default();
        history.record(Vec3::new(0.30, 0.1, 0.0));
        let outcome = history.filter(vec![at_x("ghost", 0.33), at_x("new", 0.40)]);
        assert_eq!(names(&outcome.kept), ["new"]);
        assert_eq!(names(&outcome.dropped), ["ghost"]);
    }

    #[test]
    fn ignores_y_and_z() {
        let mut history = ClusterHistory::default();
        history.record(Vec3::new(0.25, 0.3, 0.0));
        // Same x, entirely different y/z: still treated as the same object.
        let outcome = history.filter(vec![Cluster::at("other", Vec3::new(0.25, -0.3, 0.2))]);
        assert!(outcome.kept.is_empty());
    }

    #[test]
    fn chain_of_near_neighbours_drops_each_later_one() {
        let history = ClusterHistory::default();
        let outcome = history.filter(vec![at_x("a", 0.10), at_x("b", 0.14), at_x("c", 0.18)]);
        assert_eq!(names(&outcome.kept), ["a"]);
    }

    #[test]
    fn unbounded_by_default() {
        let mut history = ClusterHistory::default();
        for i in 0..100 {
            history.record(Vec3::new(i as f32, 0.0, 0.0));
        }
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn limit_ages_out_oldest_entries() {
        let mut history = ClusterHistory::default().with_limit(Some(2));
        history.record(Vec3::new(0.1, 0.0, 0.0));
        history.record(Vec3::new(0.3, 0.0, 0.0));
        history.record(Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(history.len(), 2);
        assert!(!history.contains_x(0.1));
        assert!(history.contains_x(0.52));
    }

    #[test]
    fn empty_batch_yields_empty_outcome() {
        let outcome = ClusterHistory::default().filter(Vec::new());
        assert_eq!(outcome, FilterOutcome::default());
    }
}
