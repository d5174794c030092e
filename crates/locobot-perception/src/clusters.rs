//! Ordering of segmentation results.

use locobot_types::{Axis, Cluster};

/// Sort `clusters` by their position along `axis`, ascending unless
/// `reverse` is set.
///
/// The sort is stable, so clusters at the same coordinate keep the order the
/// segmenter produced them in.  NaN coordinates sort after every finite value
/// in ascending order.
pub fn sort_clusters(clusters: &mut [Cluster], axis: Axis, reverse: bool) {
    clusters.sort_by(|a, b| {
        let ord = a.position.along(axis).total_cmp(&b.position.along(axis));
        if reverse { ord.reverse() } else { ord }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use locobot_types::Vec3;

    fn names(clusters: &[Cluster]) -> Vec<&str> {
        clusters.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn sorts_left_to_right_on_y_descending() {
        let mut clusters = vec![
            Cluster::at("right", Vec3::new(0.3, -0.2, 0.0)),
            Cluster::at("left", Vec3::new(0.3, 0.2, 0.0)),
            Cluster::at("middle", Vec3::new(0.3, 0.0, 0.0)),
        ];
        sort_clusters(&mut clusters, Axis::Y, true);
        assert_eq!(names(&clusters), ["left", "middle", "right"]);
    }

    #[test]
    fn sorts_ascending_without_reverse() {
        let mut clusters = vec![
            Cluster::at("far", Vec3::new(0.5, 0.0, 0.0)),
            Cluster::at("near", Vec3::new(0.2, 0.0, 0.0)),
        ];
        sort_clusters(&mut clusters, Axis::X, false);
        assert_eq!(names(&clusters), ["near", "far"]);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let mut clusters = vec![
            Cluster::at("a", Vec3::new(0.1, 0.0, 0.0)),
            Cluster::at("b", Vec3::new(0.2, 0.0, 0.0)),
        ];
        sort_clusters(&mut clusters, Axis::Z, true);
        assert_eq!(names(&clusters), ["a", "b"]);
    }
}
