use std::collections::HashMap;

use crate::Slug;

/// Solid angle of a full sphere around the viewer, in steradians.
pub const MAX_SOLID_ANGLE: f64 = 4.0 * std::f64::consts::PI;

/// Camera position and view direction at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: glam::Vec3,
    pub forward: glam::Vec3,
}

impl CameraPose {
    pub fn new(position: glam::Vec3, forward: glam::Vec3) -> Self {
        Self {
            position,
            forward: forward.normalize_or(glam::Vec3::NEG_Z),
        }
    }

    /// How closely `target` sits to the view direction, as
    /// `1 - deviation_degrees / 360`.
    ///
    /// 1.0 when the target lies dead ahead, 0.5 at a 180 degree deviation.
    /// A target coincident with the camera counts as dead ahead.
    pub fn view_alignment(&self, target: glam::Vec3) -> f64 {
        let to_target = target - self.position;
        if to_target.length_squared() == 0.0 {
            return 1.0;
        }
        let forward = self.forward.normalize_or(glam::Vec3::NEG_Z);
        let deviation = forward.angle_between(to_target).to_degrees() as f64;
        1.0 - deviation / 360.0
    }
}

/// World-space bounding sphere of one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: glam::Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: glam::Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Apparent solid angle of the sphere seen from `eye`, normalized
    /// against [`MAX_SOLID_ANGLE`] so the result lies in [0, 1].
    ///
    /// An eye inside the sphere subtends the maximum, 1.0.
    pub fn solid_angle_from(&self, eye: glam::Vec3) -> f64 {
        let distance = (self.center - eye).length() as f64;
        let radius = self.radius as f64;
        if distance <= radius {
            return 1.0;
        }
        let sin_alpha = radius / distance;
        let cos_alpha = (1.0 - sin_alpha * sin_alpha).sqrt();
        2.0 * std::f64::consts::PI * (1.0 - cos_alpha) / MAX_SOLID_ANGLE
    }
}

/// Read-only view of the camera now and at two predicted future instants,
/// plus each entity's bounding sphere.
///
/// Produced by the rendering/motion collaborator once per scheduling tick.
#[derive(Debug, Clone)]
pub struct VisibilitySnapshot {
    poses: [CameraPose; 3],
    bounds: HashMap<Slug, BoundingSphere>,
}

impl VisibilitySnapshot {
    /// Snapshot from the current pose and two predicted horizon poses.
    pub fn new(now: CameraPose, predicted: [CameraPose; 2]) -> Self {
        Self {
            poses: [now, predicted[0], predicted[1]],
            bounds: HashMap::new(),
        }
    }

    /// Snapshot for a camera that is not moving.
    pub fn fixed(pose: CameraPose) -> Self {
        Self::new(pose, [pose, pose])
    }

    pub fn insert(&mut self, slug: Slug, sphere: BoundingSphere) {
        self.bounds.insert(slug, sphere);
    }

    pub fn with_entity(mut self, slug: impl Into<Slug>, sphere: BoundingSphere) -> Self {
        self.insert(slug.into(), sphere);
        self
    }

    /// Poses at now and the two prediction horizons, in that order.
    pub fn poses(&self) -> &[CameraPose; 3] {
        &self.poses
    }

    pub fn bounds(&self, slug: &Slug) -> Option<&BoundingSphere> {
        self.bounds.get(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn solid_angle_is_normalized() {
        let sphere = BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 2.0);
        for distance in [2.5_f32, 5.0, 50.0, 5000.0] {
            let eye = Vec3::new(0.0, 0.0, 10.0 - distance);
            let sa = sphere.solid_angle_from(eye);
            assert!(sa > 0.0 && sa < 1.0, "solid angle {sa} out of range");
        }
    }

    #[test]
    fn solid_angle_maxes_inside_sphere() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 3.0);
        assert_eq!(sphere.solid_angle_from(Vec3::new(1.0, 1.0, 1.0)), 1.0);
        // On the surface counts as inside.
        assert_eq!(sphere.solid_angle_from(Vec3::new(3.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn solid_angle_matches_closed_form() {
        // r = 1, d = 2: sin = 1/2, cos = sqrt(3)/2, omega = 2pi(1 - cos)
        let sphere = BoundingSphere::new(Vec3::new(2.0, 0.0, 0.0), 1.0);
        let expected = (1.0 - (0.75_f64).sqrt()) / 2.0;
        let got = sphere.solid_angle_from(Vec3::ZERO);
        assert!((got - expected).abs() < 1e-9, "{got} vs {expected}");
    }

    #[test]
    fn solid_angle_shrinks_with_distance() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 1.0);
        let near = sphere.solid_angle_from(Vec3::new(2.0, 0.0, 0.0));
        let far = sphere.solid_angle_from(Vec3::new(20.0, 0.0, 0.0));
        assert!(near > far);
    }

    #[test]
    fn view_alignment_ahead_and_behind() {
        let pose = CameraPose::new(Vec3::ZERO, Vec3::X);
        assert_eq!(pose.view_alignment(Vec3::new(5.0, 0.0, 0.0)), 1.0);
        let behind = pose.view_alignment(Vec3::new(-5.0, 0.0, 0.0));
        assert!((behind - 0.5).abs() < 1e-6);
    }

    #[test]
    fn view_alignment_of_coincident_target() {
        let pose = CameraPose::new(Vec3::splat(3.0), Vec3::Y);
        assert_eq!(pose.view_alignment(Vec3::splat(3.0)), 1.0);
    }

    #[test]
    fn fixed_snapshot_repeats_pose() {
        let pose = CameraPose::new(Vec3::ZERO, Vec3::Z);
        let snapshot = VisibilitySnapshot::fixed(pose)
            .with_entity("tree", BoundingSphere::new(Vec3::new(0.0, 0.0, 4.0), 1.0));
        assert_eq!(snapshot.poses(), &[pose, pose, pose]);
        assert!(snapshot.bounds(&Slug::new("tree")).is_some());
        assert!(snapshot.bounds(&Slug::new("rock")).is_none());
    }
}
