use glam::{Mat4, Vec3, Vec4};

use crate::bounds::Aabb;

/// Plane `normal · p + distance = 0` with the normal pointing into the
/// half-space that counts as inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Build from raw `ax + by + cz + d` coefficients, normalizing the normal.
    pub fn from_coefficients(v: Vec4) -> Self {
        let normal = v.truncate();
        let length = normal.length();
        if length < f32::EPSILON {
            return Self {
                normal: Vec3::Y,
                distance: 0.0,
            };
        }
        Self {
            normal: normal / length,
            distance: v.w / length,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Six clip planes extracted from a view-projection matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract planes from a right-handed view-projection with a `0..1` depth
    /// range (the convention of `Mat4::perspective_rh`).
    pub fn from_view_projection(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r2),      // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) >= 0.0)
    }

    /// Conservative box test: `false` only when the box is fully outside one plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            plane.signed_distance(positive) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn point_in_front_is_inside() {
        let f = looking_down_negative_z();
        assert!(f.contains_point(Vec3::new(0.0, 0.0, -10.0)));
    }

    #[test]
    fn point_behind_or_beyond_far_is_outside() {
        let f = looking_down_negative_z();
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, -200.0)));
    }

    #[test]
    fn box_straddling_plane_intersects() {
        let f = looking_down_negative_z();
        let b = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(f.intersects_aabb(&b));
    }

    #[test]
    fn box_off_to_the_side_is_culled() {
        let f = looking_down_negative_z();
        let b = Aabb::new(Vec3::new(50.0, -1.0, -11.0), Vec3::new(52.0, 1.0, -9.0));
        assert!(!f.intersects_aabb(&b));
    }
}
