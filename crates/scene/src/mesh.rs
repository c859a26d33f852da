//! CPU-side mesh data.
//!
//! Meshes are built procedurally here; uploading them to device-local
//! buffers is the renderer's job.

use glam::{Vec2, Vec3};
use vkframe_rhi::vertex::Vertex;

/// Index into [`crate::Scene::meshes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    /// Triangle list, three indices per face, counter-clockwise.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Axis-aligned unit cube centered on the origin, 24 vertices with face normals.
    pub fn cube(color: Vec3) -> Self {
        // (normal, tangent u, tangent v) per face
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let corners = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u, v) in faces {
            let base = vertices.len() as u32;
            for corner in corners {
                let position = (normal + u * corner.x + v * corner.y) * 0.5;
                let uv = Vec2::new((corner.x + 1.0) * 0.5, 1.0 - (corner.y + 1.0) * 0.5);
                vertices.push(Vertex::new(position, color, normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self {
            name: "cube".to_string(),
            vertices,
            indices,
        }
    }

    /// Flat square in the XZ plane facing +Y.
    pub fn plane(half_extent: f32, color: Vec3) -> Self {
        let corners = [
            (Vec3::new(-half_extent, 0.0, half_extent), Vec2::new(0.0, 1.0)),
            (Vec3::new(half_extent, 0.0, half_extent), Vec2::new(1.0, 1.0)),
            (Vec3::new(half_extent, 0.0, -half_extent), Vec2::new(1.0, 0.0)),
            (Vec3::new(-half_extent, 0.0, -half_extent), Vec2::new(0.0, 0.0)),
        ];
        let vertices = corners
            .into_iter()
            .map(|(position, uv)| Vertex::new(position, color, Vec3::Y, uv))
            .collect();

        Self {
            name: "plane".to_string(),
            vertices,
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Minimum and maximum corner of the vertex positions, `None` when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.min(v.position), max.max(v.position))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts_and_bounds() {
        let cube = MeshData::cube(Vec3::ONE);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
        let (min, max) = cube.bounds().unwrap();
        assert_eq!(min, Vec3::splat(-0.5));
        assert_eq!(max, Vec3::splat(0.5));
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let cube = MeshData::cube(Vec3::ONE);
        for triangle in cube.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.vertices[triangle[i] as usize]);
            let face_normal = (b.position - a.position).cross(c.position - a.position);
            assert!(face_normal.dot(a.normal) > 0.0);
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = MeshData::plane(5.0, Vec3::splat(0.5));
        assert_eq!(plane.vertices.len(), 4);
        assert_eq!(plane.index_count(), 6);
        let [a, b, c] = [0, 1, 2].map(|i| plane.vertices[plane.indices[i] as usize].position);
        assert!((b - a).cross(c - a).y > 0.0);
    }

    #[test]
    fn test_empty_bounds() {
        assert!(MeshData::default().bounds().is_none());
    }
}
