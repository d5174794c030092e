//! `ClusterSource` trait for point-cloud segmentation.

use locobot_types::{Cluster, ClusterQuery, LocoError};

/// Object clusters segmented from the depth camera's point cloud.
pub trait ClusterSource: Send {
    /// Return the current clusters, expressed in `query.ref_frame` and
    /// sorted by `query.sort_axis`.
    ///
    /// `Ok(None)` means the segmentation service ran but reported failure;
    /// callers treat it as "nothing seen".
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::Transform`] if positions cannot be expressed in
    /// the requested frame, or [`LocoError::Perception`] if the service is
    /// unreachable.
    fn get_cluster_positions(&mut self, query: &ClusterQuery) -> Result<Option<Vec<Cluster>>, LocoError>;
}
