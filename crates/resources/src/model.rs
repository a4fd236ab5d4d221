//! Model and mesh loading from OBJ files.
//!
//! Meshes hold deinterleaved positions, normals, and indices; the render
//! layer interleaves them into its vertex format when uploading. Files
//! without normals get them computed from triangle geometry.

use std::path::Path;

use glam::Vec3;
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};

/// A triangle mesh with one attribute stream per component.
#[derive(Debug, Default, Clone)]
pub struct Mesh {
    /// Vertex positions in object space.
    pub positions: Vec<Vec3>,
    /// Per-vertex unit normals, same length as `positions`.
    pub normals: Vec<Vec3>,
    /// Triangle list indices into the attribute streams.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Returns the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Returns the number of indices, which is what a draw call consumes.
    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Returns the number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns true if the mesh carries a normal for every position.
    #[inline]
    pub fn has_normals(&self) -> bool {
        !self.positions.is_empty() && self.normals.len() == self.positions.len()
    }

    /// Computes smooth per-vertex normals from triangle geometry.
    ///
    /// Each triangle contributes its unnormalized face cross product to its
    /// three vertices; since the cross product length is twice the triangle
    /// area, large faces weigh more than slivers. Vertices referenced by no
    /// triangle fall back to +Y.
    pub fn compute_normals(&mut self) {
        let mut accumulated = vec![Vec3::ZERO; self.positions.len()];

        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let e1 = self.positions[i1] - self.positions[i0];
            let e2 = self.positions[i2] - self.positions[i0];
            let face = e1.cross(e2);
            accumulated[i0] += face;
            accumulated[i1] += face;
            accumulated[i2] += face;
        }

        self.normals = accumulated
            .into_iter()
            .map(|n| n.normalize_or(Vec3::Y))
            .collect();
    }
}

/// A model containing one or more meshes.
#[derive(Debug, Default, Clone)]
pub struct Model {
    /// Meshes in this model.
    pub meshes: Vec<Mesh>,
    /// Axis-aligned bounding box minimum.
    pub aabb_min: Vec3,
    /// Axis-aligned bounding box maximum.
    pub aabb_max: Vec3,
}

impl Model {
    /// Load a model from an OBJ file.
    ///
    /// Faces are triangulated and attribute streams unified to a single
    /// index. Meshes without normals get smooth normals computed from
    /// their triangles.
    ///
    /// # Arguments
    /// * `path` - Path to the .obj file
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed or holds no meshes.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let (models, _materials) =
            tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|e| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if models.is_empty() {
            return Err(ResourceError::NoMeshes(path.to_path_buf()));
        }

        let mut meshes = Vec::with_capacity(models.len());
        for model in models {
            let raw = model.mesh;
            if raw.positions.is_empty() {
                return Err(ResourceError::NoPositionData);
            }

            let positions: Vec<Vec3> = raw
                .positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2]))
                .collect();
            let normals: Vec<Vec3> = raw
                .normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2]))
                .collect();

            let mut mesh = Mesh {
                positions,
                normals,
                indices: raw.indices,
            };

            if !mesh.has_normals() {
                debug!(
                    "Mesh '{}' has no normals, computing from geometry",
                    model.name
                );
                mesh.compute_normals();
            }

            meshes.push(mesh);
        }

        let mut loaded = Self {
            meshes,
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ZERO,
        };
        loaded.recompute_aabb();

        info!(
            "Loaded OBJ {:?}: {} mesh(es), {} vertices, {} triangles",
            path,
            loaded.meshes.len(),
            loaded.total_vertices(),
            loaded.total_triangles()
        );

        Ok(loaded)
    }

    /// Builds the built-in cube used when no model file is given.
    ///
    /// The cube is centered on the origin with the given edge length. Each
    /// face has its own four vertices so normals stay flat, and triangles
    /// wind counter-clockwise seen from outside.
    pub fn cube(edge: f32) -> Self {
        let h = edge * 0.5;

        // Four corners per face: front, back, right, left, top, bottom
        let face_corners = [
            [
                Vec3::new(-h, -h, h),
                Vec3::new(h, -h, h),
                Vec3::new(h, h, h),
                Vec3::new(-h, h, h),
            ],
            [
                Vec3::new(h, -h, -h),
                Vec3::new(-h, -h, -h),
                Vec3::new(-h, h, -h),
                Vec3::new(h, h, -h),
            ],
            [
                Vec3::new(h, -h, h),
                Vec3::new(h, -h, -h),
                Vec3::new(h, h, -h),
                Vec3::new(h, h, h),
            ],
            [
                Vec3::new(-h, -h, -h),
                Vec3::new(-h, -h, h),
                Vec3::new(-h, h, h),
                Vec3::new(-h, h, -h),
            ],
            [
                Vec3::new(-h, h, h),
                Vec3::new(h, h, h),
                Vec3::new(h, h, -h),
                Vec3::new(-h, h, -h),
            ],
            [
                Vec3::new(-h, -h, -h),
                Vec3::new(h, -h, -h),
                Vec3::new(h, -h, h),
                Vec3::new(-h, -h, h),
            ],
        ];
        let face_normals = [
            Vec3::Z,
            Vec3::NEG_Z,
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (face, corners) in face_corners.iter().enumerate() {
            let base = (face * 4) as u32;
            positions.extend_from_slice(corners);
            normals.extend(std::iter::repeat_n(face_normals[face], 4));
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self {
            meshes: vec![Mesh {
                positions,
                normals,
                indices,
            }],
            aabb_min: Vec3::splat(-h),
            aabb_max: Vec3::splat(h),
        }
    }

    /// Recomputes the bounding box from all mesh positions.
    pub fn recompute_aabb(&mut self) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any = false;

        for mesh in &self.meshes {
            for &p in &mesh.positions {
                min = min.min(p);
                max = max.max(p);
                any = true;
            }
        }

        if any {
            self.aabb_min = min;
            self.aabb_max = max;
        } else {
            self.aabb_min = Vec3::ZERO;
            self.aabb_max = Vec3::ZERO;
        }
    }

    /// Returns the vertex count summed over all meshes.
    pub fn total_vertices(&self) -> usize {
        self.meshes.iter().map(Mesh::vertex_count).sum()
    }

    /// Returns the triangle count summed over all meshes.
    pub fn total_triangles(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_flat_unit_normals() {
        let model = Model::cube(2.0);
        assert_eq!(model.meshes.len(), 1);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.has_normals());

        for normal in &mesh.normals {
            assert!((normal.length() - 1.0).abs() < 1e-6);
        }

        assert_eq!(model.aabb_min, Vec3::splat(-1.0));
        assert_eq!(model.aabb_max, Vec3::splat(1.0));
    }

    #[test]
    fn cube_triangles_wind_counter_clockwise_outward() {
        let model = Model::cube(1.0);
        let mesh = &model.meshes[0];

        for tri in mesh.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let e1 = mesh.positions[i1] - mesh.positions[i0];
            let e2 = mesh.positions[i2] - mesh.positions[i0];
            // CCW winding means the geometric normal agrees with the stored one
            let geometric = e1.cross(e2);
            assert!(geometric.dot(mesh.normals[i0]) > 0.0);
        }
    }

    #[test]
    fn computed_normals_match_flat_triangle() {
        let mut mesh = Mesh {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            normals: Vec::new(),
            indices: vec![0, 1, 2],
        };

        mesh.compute_normals();

        assert_eq!(mesh.normals.len(), 3);
        for normal in &mesh.normals {
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-6));
        }
    }

    #[test]
    fn computed_normals_weight_by_triangle_area() {
        // Vertex 0 is shared by a large triangle facing +Z and a tiny one
        // facing +Y; the average should lean strongly toward +Z.
        let mut mesh = Mesh {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
                Vec3::new(0.0, 0.0, -0.1),
                Vec3::new(0.1, 0.0, -0.1),
            ],
            normals: Vec::new(),
            indices: vec![0, 1, 2, 0, 3, 4],
        };

        mesh.compute_normals();

        let shared = mesh.normals[0];
        assert!(shared.dot(Vec3::Z) > shared.dot(Vec3::Y));
        assert!(shared.dot(Vec3::Z) > 0.99);
    }

    #[test]
    fn unreferenced_vertices_fall_back_to_up() {
        let mut mesh = Mesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(5.0, 5.0, 5.0)],
            normals: Vec::new(),
            indices: vec![0, 1, 2],
        };

        mesh.compute_normals();
        assert_eq!(mesh.normals[3], Vec3::Y);
    }

    #[test]
    fn load_computes_missing_normals_and_bounds() {
        let path = std::env::temp_dir().join("facet_resources_triangle_test.obj");
        std::fs::write(
            &path,
            "v 0.0 0.0 0.0\nv 2.0 0.0 0.0\nv 0.0 2.0 0.0\nf 1 2 3\n",
        )
        .unwrap();

        let model = Model::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.has_normals());
        for normal in &mesh.normals {
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-6));
        }

        assert_eq!(model.aabb_min, Vec3::ZERO);
        assert_eq!(model.aabb_max, Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn load_reports_missing_files() {
        let path = std::env::temp_dir().join("facet_resources_does_not_exist.obj");
        assert!(Model::load(&path).is_err());
    }
}
