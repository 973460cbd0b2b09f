//! Model and mesh loading from glTF files.
//!
//! Every primitive of every mesh instance in the default scene becomes one
//! [`Mesh`], with node transforms baked into positions and normals. Vertex
//! colors come from `COLOR_0` when present, multiplied by the material's
//! base color factor.

use std::path::Path;

use glam::{Mat3, Mat4, Vec3, Vec4};
use tracing::{debug, info, warn};

use crate::error::{ResourceError, ResourceResult};

/// Triangle-list mesh with parallel vertex streams.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Checks that every stream has one entry per position and every index
    /// names an existing vertex.
    pub fn validate(&self, name: &str) -> ResourceResult<()> {
        let vertex_count = self.positions.len();
        for (stream, len) in [("normals", self.normals.len()), ("colors", self.colors.len())] {
            if len != vertex_count {
                return Err(ResourceError::StreamLength {
                    mesh: name.to_string(),
                    stream,
                    expected: vertex_count,
                    found: len,
                });
            }
        }

        match self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            Some(&index) => Err(ResourceError::IndexOutOfRange {
                mesh: name.to_string(),
                index,
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    /// Iterates `(position, normal, color)` per vertex.
    ///
    /// Streams are zipped; [`Mesh::validate`] guarantees equal lengths for
    /// loaded meshes.
    pub fn vertices(&self) -> impl Iterator<Item = (Vec3, Vec3, Vec3)> + '_ {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.colors)
            .map(|((&p, &n), &c)| (p, n, c))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
}

impl Model {
    /// Loads a `.gltf` or `.glb` file.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::FileNotFound`] for a missing file,
    /// [`ResourceError::GltfLoad`] if the file cannot be parsed and
    /// [`ResourceError::NoMeshes`] if it holds no drawable geometry.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let (document, buffers, _images) =
            gltf::import(path).map_err(|e| ResourceError::GltfLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut meshes = Vec::new();
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next());

        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    collect_node(&node, Mat4::IDENTITY, &buffers, &mut meshes)?;
                }
            }
            None => {
                for mesh in document.meshes() {
                    collect_mesh(&mesh, Mat4::IDENTITY, &buffers, &mut meshes)?;
                }
            }
        }

        if meshes.is_empty() {
            return Err(ResourceError::NoMeshes(path.to_path_buf()));
        }

        let model = Self::from_meshes(meshes);
        info!(
            "Loaded model {:?}: {} mesh(es), {} vertices, {} indices",
            path,
            model.meshes.len(),
            model.vertex_count(),
            model.index_count()
        );
        Ok(model)
    }

    /// Builds a model and computes its bounding box.
    pub fn from_meshes(meshes: Vec<Mesh>) -> Self {
        let mut aabb_min = Vec3::splat(f32::MAX);
        let mut aabb_max = Vec3::splat(f32::MIN);
        for position in meshes.iter().flat_map(|m| &m.positions) {
            aabb_min = aabb_min.min(*position);
            aabb_max = aabb_max.max(*position);
        }
        if aabb_min.x > aabb_max.x {
            aabb_min = Vec3::ZERO;
            aabb_max = Vec3::ZERO;
        }

        Self {
            meshes,
            aabb_min,
            aabb_max,
        }
    }

    /// Unit cube centred on the origin, white, with flat face normals.
    pub fn unit_cube() -> Self {
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::NEG_Z),
            (Vec3::NEG_X, Vec3::Y, Vec3::Z),
            (Vec3::Y, Vec3::NEG_Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::Z, Vec3::X),
            (Vec3::Z, Vec3::Y, Vec3::X),
            (Vec3::NEG_Z, Vec3::Y, Vec3::NEG_X),
        ];

        let mut mesh = Mesh::default();
        for (normal, up, side) in FACES {
            let base = mesh.positions.len() as u32;
            for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
                mesh.positions.push(normal * 0.5 + side * u + up * v);
                mesh.normals.push(normal);
                mesh.colors.push(Vec3::ONE);
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::from_meshes(vec![mesh])
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(Mesh::vertex_count).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len()).sum()
    }
}

fn collect_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<Mesh>,
) -> ResourceResult<()> {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        collect_mesh(&mesh, transform, buffers, out)?;
    }
    for child in node.children() {
        collect_node(&child, transform, buffers, out)?;
    }
    Ok(())
}

fn collect_mesh(
    mesh: &gltf::Mesh,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<Mesh>,
) -> ResourceResult<()> {
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
    let mesh_name = mesh.name().unwrap_or("<unnamed>").to_string();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!(
                "Skipping non-triangle primitive ({:?}) in mesh '{}'",
                primitive.mode(),
                mesh_name
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or_else(|| ResourceError::NoPositionData {
                mesh: mesh_name.clone(),
            })?
            .map(|p| transform.transform_point3(Vec3::from(p)))
            .collect();

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals
                .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                .collect(),
            None => vec![Vec3::Y; positions.len()],
        };

        let base_color =
            Vec4::from(primitive.material().pbr_metallic_roughness().base_color_factor()).truncate();
        let colors: Vec<Vec3> = match reader.read_colors(0) {
            Some(colors) => colors
                .into_rgb_f32()
                .map(|c| Vec3::from(c) * base_color)
                .collect(),
            None => vec![base_color; positions.len()],
        };

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        debug!(
            "Primitive of '{}': {} vertices, {} indices",
            mesh_name,
            positions.len(),
            indices.len()
        );

        let primitive_mesh = Mesh {
            positions,
            normals,
            colors,
            indices,
        };
        primitive_mesh.validate(&mesh_name)?;
        out.push(primitive_mesh);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_cube_geometry() {
        let cube = Model::unit_cube();
        assert_eq!(cube.meshes.len(), 1);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.aabb_min, Vec3::splat(-0.5));
        assert_eq!(cube.aabb_max, Vec3::splat(0.5));
    }

    #[test]
    fn test_unit_cube_normals_point_outwards() {
        let cube = Model::unit_cube();
        for (position, normal, color) in cube.meshes[0].vertices() {
            assert!(position.dot(normal) > 0.0);
            assert_eq!(color, Vec3::ONE);
        }
    }

    #[test]
    fn test_unit_cube_winding_matches_normals() {
        let mesh = &Model::unit_cube().meshes[0];
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| mesh.positions[tri[i] as usize]);
            let face_normal = (b - a).cross(c - a).normalize();
            assert!(face_normal.abs_diff_eq(mesh.normals[tri[0] as usize], 1e-5));
        }
    }

    #[test]
    fn test_validate_accepts_unit_cube() {
        assert!(Model::unit_cube().meshes[0].validate("cube").is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_index() {
        let mut mesh = Model::unit_cube().meshes.remove(0);
        mesh.indices[5] = 24;

        match mesh.validate("cube") {
            Err(ResourceError::IndexOutOfRange {
                index,
                vertex_count,
                ..
            }) => assert_eq!((index, vertex_count), (24, 24)),
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_short_stream() {
        let mut mesh = Model::unit_cube().meshes.remove(0);
        mesh.colors.pop();

        match mesh.validate("cube") {
            Err(ResourceError::StreamLength {
                stream,
                expected,
                found,
                ..
            }) => assert_eq!((stream, expected, found), ("colors", 24, 23)),
            other => panic!("expected StreamLength, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_model_bounds() {
        let model = Model::from_meshes(Vec::new());
        assert_eq!(model.aabb_min, Vec3::ZERO);
        assert_eq!(model.aabb_max, Vec3::ZERO);
    }

    #[test]
    fn test_missing_file() {
        let result = Model::load(Path::new("does/not/exist.gltf"));
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }
}
