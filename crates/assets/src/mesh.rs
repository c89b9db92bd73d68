//! CPU-side mesh generation for the primitive shapes the city is built from.
//!
//! All shapes are centered on the origin; renderers upload the data once per
//! cached geometry.

use std::f32::consts::{PI, TAU};

/// Indexed triangle mesh with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    fn push(&mut self, position: [f32; 3], normal: [f32; 3]) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        (self.positions.len() - 1) as u32
    }

    fn quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.indices.extend_from_slice(&[a, b, c, c, d, a]);
    }
}

pub fn box_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let (x, y, z) = (width * 0.5, height * 0.5, depth * 0.5);
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-x, -y, z], [x, -y, z], [x, y, z], [-x, y, z]]),
        ([0.0, 0.0, -1.0], [[x, -y, -z], [-x, -y, -z], [-x, y, -z], [x, y, -z]]),
        ([1.0, 0.0, 0.0], [[x, -y, z], [x, -y, -z], [x, y, -z], [x, y, z]]),
        ([-1.0, 0.0, 0.0], [[-x, -y, -z], [-x, -y, z], [-x, y, z], [-x, y, -z]]),
        ([0.0, 1.0, 0.0], [[-x, y, z], [x, y, z], [x, y, -z], [-x, y, -z]]),
        ([0.0, -1.0, 0.0], [[-x, -y, -z], [x, -y, -z], [x, -y, z], [-x, -y, z]]),
    ];
    let mut mesh = MeshData::default();
    for (normal, corners) in faces {
        let [a, b, c, d] = corners.map(|p| mesh.push(p, normal));
        mesh.quad(a, b, c, d);
    }
    mesh
}

/// Horizontal quad facing +Y.
pub fn plane_mesh(width: f32, depth: f32) -> MeshData {
    let (x, z) = (width * 0.5, depth * 0.5);
    let up = [0.0, 1.0, 0.0];
    let mut mesh = MeshData::default();
    let a = mesh.push([-x, 0.0, z], up);
    let b = mesh.push([x, 0.0, z], up);
    let c = mesh.push([x, 0.0, -z], up);
    let d = mesh.push([-x, 0.0, -z], up);
    mesh.quad(a, b, c, d);
    mesh
}

/// Open-ended side plus caps; a zero top radius makes a cone.
pub fn cylinder_mesh(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let half = height * 0.5;
    let slope = (radius_bottom - radius_top) / height.max(f32::EPSILON);
    let mut mesh = MeshData::default();

    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (sin, cos) = theta.sin_cos();
        let n = normalize3([sin, slope, cos]);
        mesh.push([radius_top * sin, half, radius_top * cos], n);
        mesh.push([radius_bottom * sin, -half, radius_bottom * cos], n);
    }
    for i in 0..segments {
        let top = i * 2;
        let bottom = top + 1;
        let next_top = top + 2;
        let next_bottom = top + 3;
        mesh.quad(bottom, next_bottom, next_top, top);
    }

    for (y, radius, normal_y) in [(half, radius_top, 1.0f32), (-half, radius_bottom, -1.0)] {
        if radius <= 0.0 {
            continue;
        }
        let center = mesh.push([0.0, y, 0.0], [0.0, normal_y, 0.0]);
        let first = center + 1;
        for i in 0..segments {
            let theta = i as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            mesh.push([radius * sin, y, radius * cos], [0.0, normal_y, 0.0]);
        }
        for i in 0..segments {
            let a = first + i;
            let b = first + (i + 1) % segments;
            if normal_y > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }
    mesh
}

pub fn cone_mesh(radius: f32, height: f32, segments: u32) -> MeshData {
    cylinder_mesh(0.0, radius, height, segments)
}

/// UV sphere; `stretch` pushes the upper and lower hemispheres apart, which
/// turns the sphere into a capsule with a cylindrical middle of that length.
fn stretched_sphere(radius: f32, stretch: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut mesh = MeshData::default();

    for row in 0..=height_segments {
        let phi = row as f32 / height_segments as f32 * PI;
        let (sin_phi, cos_phi) = phi.sin_cos();
        let offset = if cos_phi >= 0.0 { stretch * 0.5 } else { -stretch * 0.5 };
        for col in 0..=width_segments {
            let theta = col as f32 / width_segments as f32 * TAU;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let n = [sin_phi * sin_theta, cos_phi, sin_phi * cos_theta];
            mesh.push([n[0] * radius, n[1] * radius + offset, n[2] * radius], n);
        }
    }

    let stride = width_segments + 1;
    for row in 0..height_segments {
        for col in 0..width_segments {
            let a = row * stride + col;
            let b = a + stride;
            mesh.quad(a, b, b + 1, a + 1);
        }
    }
    mesh
}

pub fn sphere_mesh(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    stretched_sphere(radius, 0.0, width_segments, height_segments)
}

pub fn capsule_mesh(radius: f32, length: f32) -> MeshData {
    stretched_sphere(radius, length, 16, 12)
}

fn normalize3(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        return [0.0, 1.0, 0.0];
    }
    [v[0] / len, v[1] / len, v[2] / len]
}
