//! Mesh data consumed by the renderer

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use crate::backend::types::Vertex;
use crate::geometry::{Aabb, Bounds};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique mesh identity, used to group instanced draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index range drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMesh {
    pub first_index: u32,
    pub index_count: u32,
}

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    id: MeshId,
    pub name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    sub_meshes: Vec<SubMesh>,
    bounds: Bounds,
}

impl Mesh {
    /// Build a mesh. An empty `sub_meshes` list means one sub-mesh covering
    /// every index.
    pub fn new(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>, sub_meshes: Vec<SubMesh>) -> Self {
        let sub_meshes = if sub_meshes.is_empty() {
            vec![SubMesh {
                first_index: 0,
                index_count: indices.len() as u32,
            }]
        } else {
            sub_meshes
        };
        let bounds = Aabb::from_points(vertices.iter().map(|v| v.position))
            .map(Bounds::from_aabb)
            .unwrap_or_default();

        Self {
            id: MeshId::next(),
            name: name.to_string(),
            vertices,
            indices,
            sub_meshes,
            bounds,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    /// Local-space bounds
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Bake one sub-mesh of each part into a single world-space mesh.
    ///
    /// Returns `None` when there is nothing to merge.
    pub fn merged(name: &str, parts: &[(&Mesh, SubMesh, Mat4)]) -> Option<Mesh> {
        if parts.is_empty() {
            return None;
        }

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for (mesh, sub_mesh, world) in parts {
            let normal_matrix = Mat3::from_mat4(world.inverse().transpose());
            let base = vertices.len() as u32;

            vertices.extend(mesh.vertices.iter().map(|v| Vertex {
                position: world.transform_point3(v.position),
                normal: (normal_matrix * v.normal).normalize_or_zero(),
                uv: v.uv,
                tangent: world
                    .transform_vector3(v.tangent.truncate())
                    .normalize_or_zero()
                    .extend(v.tangent.w),
            }));

            let start = sub_mesh.first_index as usize;
            let end = (start + sub_mesh.index_count as usize).min(mesh.indices.len());
            indices.extend(mesh.indices[start.min(end)..end].iter().map(|i| i + base));
        }

        Some(Mesh::new(name, vertices, indices, Vec::new()))
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let faces = [
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, -Vec3::X),
            (Vec3::X, -Vec3::Z),
            (-Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (-Vec3::Y, Vec3::X),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, tangent) in faces {
            let bitangent = normal.cross(tangent);
            let base = vertices.len() as u32;
            let corners = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];
            for (u, v) in corners {
                vertices.push(Vertex {
                    position: normal * 0.5 + tangent * u + bitangent * v,
                    normal,
                    uv: Vec2::new(u + 0.5, 0.5 - v),
                    tangent: tangent.extend(1.0),
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Mesh::new("cube", vertices, indices, Vec::new())
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32) -> Self {
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let vertices = [(-hw, -hd, 0.0, 0.0), (hw, -hd, 1.0, 0.0), (hw, hd, 1.0, 1.0), (-hw, hd, 0.0, 1.0)]
            .into_iter()
            .map(|(x, z, u, v)| Vertex {
                position: Vec3::new(x, 0.0, z),
                normal: Vec3::Y,
                uv: Vec2::new(u, v),
                tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            })
            .collect();

        Mesh::new("plane", vertices, vec![0, 2, 1, 0, 3, 2], Vec::new())
    }
}
