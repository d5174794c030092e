//! `locobot-perception` – spatial bookkeeping for the pick-and-place loop.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine]: directed graph of
//!   named reference frames and the rigid transforms relating them.
//! - [`clusters`] – ordering of segmentation results along an axis.
//! - [`dedup`] – [`ClusterHistory`][dedup::ClusterHistory]: suppresses ghost
//!   detections left behind by a point cloud that has not refreshed.

pub mod clusters;
pub mod dedup;
pub mod transform;

pub use clusters::sort_clusters;
pub use dedup::{ClusterHistory, DEFAULT_DEDUP_TOLERANCE, FilterOutcome};
pub use transform::{Quaternion, TfEngine, Transform3D};
