//! OBJ model loading.

use std::path::Path;

use glam::Vec3;
use tracing::{debug, info};

use dreams_scene::Aabb;

use crate::error::{ResourceError, ResourceResult};

/// One mesh worth of vertex and index data.
#[derive(Debug, Default)]
pub struct MeshData {
    /// Vertex positions in object space.
    pub positions: Vec<Vec3>,
    /// Vertex normals, one per position.
    pub normals: Vec<Vec3>,
    /// Texture coordinates, one per position.
    pub tex_coords: Vec<[f32; 2]>,
    /// Triangle indices.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// A loaded model: its meshes and object-space bounds.
///
/// The bounds feed both the hitbox wireframes and the per-frame AABB
/// write-back; a model with no geometry gets a zero-size finite box.
#[derive(Debug, Default)]
pub struct ModelData {
    /// Meshes in the model.
    pub meshes: Vec<MeshData>,
    /// Object-space bounding box over all meshes.
    pub bounds: Aabb,
}

impl ModelData {
    /// Loads a model from an OBJ file.
    ///
    /// Faces are triangulated and vertex attributes unified onto a single
    /// index per vertex. Missing normals or texture coordinates are filled
    /// with zeros so every mesh is drawable.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or contains no meshes.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        debug!("Loading OBJ model from {:?}", path);

        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };

        let (models, _materials) =
            tobj::load_obj(path, &options).map_err(|e| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if models.is_empty() {
            return Err(ResourceError::EmptyModel(path.to_path_buf()));
        }

        let mut meshes = Vec::with_capacity(models.len());
        for model in &models {
            meshes.push(convert_mesh(&model.mesh));
        }

        let bounds = Aabb::from_points(
            meshes
                .iter()
                .flat_map(|mesh| mesh.positions.iter().copied()),
        );

        info!(
            "Loaded model {:?}: {} mesh(es), {} vertices",
            path,
            meshes.len(),
            meshes.iter().map(MeshData::vertex_count).sum::<usize>()
        );

        Ok(Self { meshes, bounds })
    }

    /// Total vertex count across all meshes.
    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(MeshData::vertex_count).sum()
    }

    /// Loads a model, substituting `fallback` when the file is missing so a
    /// run without shipped assets still has geometry to draw.
    pub fn load_or(path: &Path, fallback: impl FnOnce() -> Self) -> Self {
        match Self::load(path) {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!("Falling back to procedural model for {:?}: {e}", path);
                fallback()
            }
        }
    }

    /// An axis-aligned cube with the given half extent.
    pub fn cube(half: f32) -> Self {
        let face = |normal: Vec3, right: Vec3, up: Vec3| -> MeshData {
            let origin = normal * half;
            let corners = [
                origin - right * half - up * half,
                origin + right * half - up * half,
                origin + right * half + up * half,
                origin - right * half + up * half,
            ];
            MeshData {
                positions: corners.to_vec(),
                normals: vec![normal; 4],
                tex_coords: vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
                indices: vec![0, 1, 2, 0, 2, 3],
            }
        };

        let meshes = vec![
            face(Vec3::X, Vec3::NEG_Z, Vec3::Y),
            face(Vec3::NEG_X, Vec3::Z, Vec3::Y),
            face(Vec3::Y, Vec3::X, Vec3::NEG_Z),
            face(Vec3::NEG_Y, Vec3::X, Vec3::Z),
            face(Vec3::Z, Vec3::X, Vec3::Y),
            face(Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        Self {
            bounds: Aabb::new(Vec3::splat(-half), Vec3::splat(half)),
            meshes,
        }
    }

    /// A flat ground plane spanning `[-extent, extent]` on x/z.
    pub fn plane(extent: f32) -> Self {
        let mesh = MeshData {
            positions: vec![
                Vec3::new(-extent, 0.0, -extent),
                Vec3::new(extent, 0.0, -extent),
                Vec3::new(extent, 0.0, extent),
                Vec3::new(-extent, 0.0, extent),
            ],
            normals: vec![Vec3::Y; 4],
            tex_coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            indices: vec![0, 2, 1, 0, 3, 2],
        };

        Self {
            bounds: Aabb::new(
                Vec3::new(-extent, 0.0, -extent),
                Vec3::new(extent, 0.0, extent),
            ),
            meshes: vec![mesh],
        }
    }
}

fn convert_mesh(mesh: &tobj::Mesh) -> MeshData {
    let vertex_count = mesh.positions.len() / 3;

    let positions = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();

    let normals = if mesh.normals.len() == mesh.positions.len() {
        mesh.normals
            .chunks_exact(3)
            .map(|n| Vec3::new(n[0], n[1], n[2]))
            .collect()
    } else {
        vec![Vec3::ZERO; vertex_count]
    };

    let tex_coords = if mesh.texcoords.len() == vertex_count * 2 {
        mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect()
    } else {
        vec![[0.0, 0.0]; vertex_count]
    };

    MeshData {
        positions,
        normals,
        tex_coords,
        indices: mesh.indices.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_obj(name: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("dreams_test_{name}_{}.obj", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_unit_quad() {
        let path = write_temp_obj(
            "quad",
            "v -1.0 0.0 -1.0\nv 1.0 0.0 -1.0\nv 1.0 0.0 1.0\nv -1.0 0.0 1.0\n\
             vn 0.0 1.0 0.0\n\
             f 1//1 2//1 3//1\nf 1//1 3//1 4//1\n",
        );

        let model = ModelData::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.normals.len(), mesh.positions.len());
        assert_eq!(mesh.tex_coords.len(), mesh.positions.len());

        assert_eq!(model.bounds.min, Vec3::new(-1.0, 0.0, -1.0));
        assert_eq!(model.bounds.max, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ModelData::load(Path::new("/nonexistent/model.obj"));
        assert!(matches!(result, Err(ResourceError::ObjLoad { .. })));
    }

    #[test]
    fn test_load_or_falls_back() {
        let model = ModelData::load_or(Path::new("/nonexistent/model.obj"), || ModelData::cube(1.0));
        assert_eq!(model.bounds.min, Vec3::splat(-1.0));
    }

    #[test]
    fn test_cube_primitive() {
        let cube = ModelData::cube(0.5);
        assert_eq!(cube.meshes.len(), 6);
        assert_eq!(cube.total_vertex_count(), 24);
        assert_eq!(cube.bounds.min, Vec3::splat(-0.5));
        assert_eq!(cube.bounds.max, Vec3::splat(0.5));
        // Two triangles per face.
        assert!(cube.meshes.iter().all(|mesh| mesh.indices.len() == 6));
    }

    #[test]
    fn test_plane_primitive() {
        let plane = ModelData::plane(10.0);
        assert_eq!(plane.meshes.len(), 1);
        assert_eq!(plane.bounds.extent().y, 0.0);
        assert!(plane.meshes[0].normals.iter().all(|&n| n == Vec3::Y));
    }
}
