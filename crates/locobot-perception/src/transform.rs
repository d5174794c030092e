//! Frame tree for the Locobot.
//!
//! Keeps a directed graph of named reference frames (`locobot/base_link`,
//! `locobot/plate_link`, `locobot/arm_base_link`, …) and the rigid transforms
//! that relate them.  [`TfEngine::lookup`] composes a chain of edges via BFS;
//! [`TfEngine::transform_point`] re-expresses a point from one frame in
//! another, walking edges in either direction.
//!
//! # Example
//!
//! ```rust
//! use locobot_perception::transform::{TfEngine, Transform3D, Quaternion};
//! use locobot_types::Vec3;
//!
//! let mut tf = TfEngine::new();
//! tf.set_transform("locobot/base_link", "locobot/plate_link",
//!     Transform3D::new(Vec3::new(0.1, 0.0, 0.1), Quaternion::identity()));
//! tf.set_transform("locobot/plate_link", "locobot/arm_base_link",
//!     Transform3D::new(Vec3::new(0.0, 0.0, 0.05), Quaternion::identity()));
//!
//! let t = tf.lookup("locobot/base_link", "locobot/arm_base_link").unwrap();
//! assert!((t.translation.z - 0.15).abs() < 1e-5);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use locobot_types::{LocoError, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation from fixed-axis roll, pitch and yaw (radians), applied in
    /// that order.
    pub fn from_rpy(roll: f32, pitch: f32, yaw: f32) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self::new(
            cr * cp * cy + sr * sp * sy,
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
        )
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// Pose of a child frame relative to its parent.
///
/// A point expressed in the child frame is mapped into the parent frame by
/// rotating it by `rotation` and then adding `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: if `self` = T_A_B and `other` = T_B_C the
    /// result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// T_B_A for a transform T_A_B.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        let t = inv_rot.rotate(self.translation);
        Self::new(Vec3::new(-t.x, -t.y, -t.z), inv_rot)
    }

    /// Map a point from the child frame into the parent frame.
    pub fn apply(self, p: Vec3) -> Vec3 {
        self.translation.add(self.rotation.rotate(p))
    }

    /// The same translation with the rotation discarded.
    pub fn position_only(self) -> Self {
        Self::new(self.translation, Quaternion::identity())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A directed graph of named reference frames and the [`Transform3D`]s that
/// relate them.
///
/// Edges are stored parent → child.  [`lookup`][Self::lookup] only follows
/// edges forward; [`resolve`][Self::resolve] also walks them backwards by
/// inverting, which is what point re-expression needs.
#[derive(Debug, Default, Clone)]
pub struct TfEngine {
    /// `edges[parent][child] = Transform3D`
    edges: HashMap<String, HashMap<String, Transform3D>>,
}

impl TfEngine {
    /// Create an empty frame tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the transform from `parent_frame` to `child_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
    }

    /// `true` if an edge `parent_frame → child_frame` has been registered.
    pub fn has_transform(&self, parent_frame: &str, child_frame: &str) -> bool {
        self.edges
            .get(parent_frame)
            .is_some_and(|children| children.contains_key(child_frame))
    }

    /// Compose the forward chain from `source_frame` down to `target_frame`.
    ///
    /// Returns `None` if `target_frame` is not reachable following edges in
    /// their stored direction.
    pub fn lookup(&self, source_frame: &str, target_frame: &str) -> Option<Transform3D> {
        self.search(source_frame, target_frame, false)
    }

    /// Like [`lookup`][Self::lookup] but also walks edges child → parent.
    ///
    /// The result maps points expressed in `target_frame` into
    /// `source_frame`.
    pub fn resolve(&self, source_frame: &str, target_frame: &str) -> Option<Transform3D> {
        self.search(source_frame, target_frame, true)
    }

    /// Re-express `point`, given in `from_frame`, in `to_frame`.
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::Transform`] when the two frames are not
    /// connected.
    pub fn transform_point(&self, to_frame: &str, from_frame: &str, point: Vec3) -> Result<Vec3, LocoError> {
        self.resolve(to_frame, from_frame)
            .map(|t| t.apply(point))
            .ok_or_else(|| {
                LocoError::Transform(format!("no path from '{from_frame}' to '{to_frame}'"))
            })
    }

    fn search(&self, source_frame: &str, target_frame: &str, bidirectional: bool) -> Option<Transform3D> {
        if source_frame == target_frame {
            return Some(Transform3D::identity());
        }

        // BFS; each queue item carries the composed transform accumulated
        // from source_frame to the current node.
        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((source_frame.to_string(), Transform3D::identity()));
        visited.insert(source_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            for (next, edge_tf) in self.neighbours(&current, bidirectional) {
                if visited.contains(&next) {
                    continue;
                }
                let composed = accumulated.compose(edge_tf);
                if next == target_frame {
                    return Some(composed);
                }
                visited.insert(next.clone());
                queue.push_back((next, composed));
            }
        }

        None
    }

    fn neighbours(&self, frame: &str, bidirectional: bool) -> Vec<(String, Transform3D)> {
        let mut out: Vec<(String, Transform3D)> = self
            .edges
            .get(frame)
            .map(|children| children.iter().map(|(c, t)| (c.clone(), *t)).collect())
            .unwrap_or_default();
        if bidirectional {
            for (parent, children) in &self.edges {
                if let Some(t) = children.get(frame) {
                    out.push((parent.clone(), t.inverse()));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    fn close(a: Vec3, b: Vec3) -> bool {
        a.sub(b).norm() < 1e-5
    }

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(close(r, Vec3::new(0.0, 1.0, 0.0)), "got {r:?}");
    }

    #[test]
    fn from_rpy_matches_hand_built_yaw() {
        let q = Quaternion::from_rpy(0.0, 0.0, FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-5);
        assert!((q.z - FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn pitch_down_rotates_forward_axis_toward_floor() {
        // Positive pitch about +Y tips +X toward -Z.
        let q = Quaternion::from_rpy(0.0, FRAC_PI_2, 0.0);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(close(r, Vec3::new(0.0, 0.0, -1.0)), "got {r:?}");
    }

    #[test]
    fn inverse_undoes_transform() {
        let t = Transform3D::new(
            Vec3::new(0.3, -0.1, 0.2),
            Quaternion::from_rpy(0.1, 0.4, -0.7),
        );
        let p = Vec3::new(0.5, 0.25, -0.1);
        assert!(close(t.inverse().apply(t.apply(p)), p));
        let id = t.compose(t.inverse());
        assert!(close(id.translation, Vec3::zero()));
    }

    #[test]
    fn position_only_drops_rotation() {
        let t = Transform3D::new(Vec3::new(1.0, 2.0, 3.0), Quaternion::from_rpy(0.0, 0.0, 1.0));
        let p = t.position_only();
        assert_eq!(p.rotation, Quaternion::identity());
        assert_eq!(p.translation, t.translation);
    }

    #[test]
    fn lookup_same_frame_returns_identity() {
        let tf = TfEngine::new();
        assert_eq!(tf.lookup("map", "map").unwrap(), Transform3D::identity());
    }

    #[test]
    fn lookup_composed_chain() {
        let mut tf = TfEngine::new();
        tf.set_transform(
            "locobot/base_link",
            "locobot/plate_link",
            Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()),
        );
        tf.set_transform(
            "locobot/plate_link",
            "locobot/arm_base_link",
            Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity()),
        );
        let t = tf.lookup("locobot/base_link", "locobot/arm_base_link").unwrap();
        assert!((t.translation.x - 1.5).abs() < 1e-5);
        assert!(tf.has_transform("locobot/base_link", "locobot/plate_link"));
        assert!(!tf.has_transform("locobot/plate_link", "locobot/base_link"));
    }

    #[test]
    fn lookup_is_directional_but_resolve_is_not() {
        let mut tf = TfEngine::new();
        tf.set_transform(
            "world",
            "robot",
            Transform3D::new(Vec3::new(2.0, 0.0, 0.0), Quaternion::identity()),
        );
        assert!(tf.lookup("robot", "world").is_none());
        let back = tf.resolve("robot", "world").unwrap();
        assert!((back.translation.x + 2.0).abs() < 1e-5);
    }

    #[test]
    fn transform_point_through_sibling_frames() {
        // camera and arm both hang off base_link; a point seen by the camera
        // must be re-expressed relative to the arm.
        let mut tf = TfEngine::new();
        tf.set_transform(
            "base",
            "camera",
            Transform3D::new(Vec3::new(0.0, 0.0, 0.5), Quaternion::identity()),
        );
        tf.set_transform(
            "base",
            "arm",
            Transform3D::new(Vec3::new(0.1, 0.0, 0.1), Quaternion::identity()),
        );
        let p = tf
            .transform_point("arm", "camera", Vec3::new(0.3, 0.0, -0.5))
            .unwrap();
        assert!(close(p, Vec3::new(0.2, 0.0, -0.1)), "got {p:?}");
    }

    #[test]
    fn transform_point_without_path_errors() {
        let tf = TfEngine::new();
        let err = tf.transform_point("a", "b", Vec3::zero()).unwrap_err();
        assert!(matches!(err, LocoError::Transform(_)));
    }

    #[test]
    fn set_transform_overrides_previous() {
        let mut tf = TfEngine::new();
        tf.set_transform("a", "b", Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity()));
        tf.set_transform("a", "b", Transform3D::new(Vec3::new(5.0, 0.0, 0.0), Quaternion::identity()));
        assert!((tf.lookup("a", "b").unwrap().translation.x - 5.0).abs() < 1e-5);
    }
}
