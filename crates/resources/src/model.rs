//! Wavefront OBJ model loading.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use meshview_resources::ObjModel;
//!
//! # fn example() -> meshview_resources::ResourceResult<()> {
//! let model = ObjModel::load(Path::new("assets/viking_room.obj"))?;
//! for span in model.draw_ranges().spans() {
//!     println!("material {} draws {} indices", span.material, span.index_count);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use tracing::{debug, info, warn};

use crate::draw_range::{DrawRange, DrawRanges};
use crate::error::{ResourceError, ResourceResult};
use crate::material::MaterialInfo;

/// A vertex as read from the file.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl MeshVertex {
    /// Bit pattern used to merge identical vertices.
    fn key(&self) -> [u32; 8] {
        [
            self.position.x.to_bits(),
            self.position.y.to_bits(),
            self.position.z.to_bits(),
            self.normal.x.to_bits(),
            self.normal.y.to_bits(),
            self.normal.z.to_bits(),
            self.tex_coord.x.to_bits(),
            self.tex_coord.y.to_bits(),
        ]
    }
}

/// A triangulated OBJ model with one shared vertex and index list.
#[derive(Debug, Clone)]
pub struct ObjModel {
    path: PathBuf,
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    draw_ranges: DrawRanges,
    materials: Vec<MaterialInfo>,
}

impl ObjModel {
    /// Load an OBJ file and the MTL libraries it references.
    ///
    /// A missing or broken MTL file is logged and the model falls back to a
    /// single default material.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        };

        let (models, materials) =
            tobj::load_obj(path, &options).map_err(|source| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                source,
            })?;

        let materials = match materials {
            Ok(materials) => Some(materials),
            Err(e) => {
                warn!("Ignoring materials of {:?}: {}", path, e);
                None
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let model = Self::from_tobj(path, &models, materials.as_deref(), base_dir)?;

        info!(
            "Loaded {:?}: {} vertices, {} triangles, {} materials, {} draw ranges",
            path,
            model.vertex_count(),
            model.triangle_count(),
            model.materials.len(),
            model.draw_ranges.len()
        );

        Ok(model)
    }

    /// Merge tobj meshes into one model.
    ///
    /// `materials` is `None` when the MTL library could not be read, in which
    /// case mesh material ids are ignored.
    fn from_tobj(
        path: &Path,
        models: &[tobj::Model],
        materials: Option<&[tobj::Material]>,
        base_dir: &Path,
    ) -> ResourceResult<Self> {
        let mut vertices: Vec<MeshVertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut ranges: Vec<DrawRange> = Vec::new();
        let mut unique: HashMap<[u32; 8], u32> = HashMap::new();

        let material_count = materials.map_or(0, <[tobj::Material]>::len);

        for model in models {
            let mesh = &model.mesh;
            if mesh.indices.is_empty() {
                continue;
            }

            let material = match (materials, mesh.material_id) {
                (Some(_), Some(id)) if id < material_count => id,
                (Some(_), Some(id)) => {
                    return Err(ResourceError::MaterialOutOfRange {
                        mesh: model.name.clone(),
                        material: id,
                        count: material_count,
                    });
                }
                _ => 0,
            };
            let material =
                u32::try_from(material).map_err(|_| ResourceError::TooLarge("materials"))?;

            for &index in &mesh.indices {
                let vertex = read_vertex(mesh, index as usize);
                let next = u32::try_from(vertices.len())
                    .map_err(|_| ResourceError::TooLarge("vertices"))?;
                let id = *unique.entry(vertex.key()).or_insert_with(|| {
                    vertices.push(vertex);
                    next
                });
                indices.push(id);
            }

            let end =
                u32::try_from(indices.len()).map_err(|_| ResourceError::TooLarge("indices"))?;
            match ranges.last_mut() {
                Some(last) if last.material == material => last.end = end,
                _ => ranges.push(DrawRange::new(material, end)),
            }

            debug!(
                "Mesh '{}': material {}, cumulative index count {}",
                model.name, material, end
            );
        }

        if indices.is_empty() {
            return Err(ResourceError::EmptyModel(path.to_path_buf()));
        }

        let mut material_infos: Vec<MaterialInfo> = materials
            .unwrap_or_default()
            .iter()
            .map(|m| MaterialInfo::from_tobj(m, base_dir))
            .collect();
        if material_infos.is_empty() {
            material_infos.push(MaterialInfo::fallback());
        }

        let index_count = indices.len() as u32;
        Self::from_parts(
            path.to_path_buf(),
            vertices,
            indices,
            DrawRanges::new(ranges, index_count)?,
            material_infos,
        )
    }

    /// Assemble a model from already-built parts.
    ///
    /// Fails when the draw ranges do not cover `indices`, an index points
    /// past the vertex list, or a range names a missing material.
    pub fn from_parts(
        path: PathBuf,
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
        draw_ranges: DrawRanges,
        materials: Vec<MaterialInfo>,
    ) -> ResourceResult<Self> {
        if indices.is_empty() {
            return Err(ResourceError::EmptyModel(path));
        }
        if draw_ranges.index_count() as usize != indices.len() {
            return Err(ResourceError::InvalidDrawRanges(format!(
                "ranges cover {} indices but the model has {}",
                draw_ranges.index_count(),
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(ResourceError::InvalidDrawRanges(format!(
                "index {} is out of bounds for {} vertices",
                bad,
                vertices.len()
            )));
        }
        if draw_ranges.max_material() as usize >= materials.len() {
            return Err(ResourceError::MaterialOutOfRange {
                mesh: path.display().to_string(),
                material: draw_ranges.max_material() as usize,
                count: materials.len(),
            });
        }

        Ok(Self {
            path,
            vertices,
            indices,
            draw_ranges,
            materials,
        })
    }

    /// File the model was loaded from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deduplicated vertices.
    #[inline]
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    /// Triangle list indices, grouped by material.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Per-material index ranges.
    #[inline]
    pub fn draw_ranges(&self) -> &DrawRanges {
        &self.draw_ranges
    }

    /// Materials in the order the draw ranges index them.
    #[inline]
    pub fn materials(&self) -> &[MaterialInfo] {
        &self.materials
    }

    /// Number of unique vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices.
    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

fn read_vertex(mesh: &tobj::Mesh, index: usize) -> MeshVertex {
    let vec3 = |data: &[f32]| {
        data.get(3 * index..3 * index + 3)
            .map_or(Vec3::ZERO, Vec3::from_slice)
    };

    let tex_coord = mesh
        .texcoords
        .get(2 * index..2 * index + 2)
        .map_or(Vec2::ZERO, |uv| Vec2::new(uv[0], 1.0 - uv[1]));

    MeshVertex {
        position: vec3(&mesh.positions),
        normal: vec3(&mesh.normals),
        tex_coord,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(positions: Vec<f32>, texcoords: Vec<f32>, indices: Vec<u32>) -> tobj::Mesh {
        tobj::Mesh {
            positions,
            texcoords,
            indices,
            ..Default::default()
        }
    }

    fn triangle() -> Vec<f32> {
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
    }

    #[test]
    fn test_read_vertex_flips_v_and_defaults_normal() {
        let mesh = mesh(triangle(), vec![0.0, 0.25, 1.0, 1.0, 0.5, 0.0], vec![0, 1, 2]);
        let vertex = read_vertex(&mesh, 0);
        assert_eq!(vertex.position, Vec3::ZERO);
        assert_eq!(vertex.normal, Vec3::ZERO);
        assert_eq!(vertex.tex_coord, Vec2::new(0.0, 0.75));
    }

    #[test]
    fn test_read_vertex_without_texcoords() {
        let mesh = mesh(triangle(), Vec::new(), vec![0, 1, 2]);
        assert_eq!(read_vertex(&mesh, 2).tex_coord, Vec2::ZERO);
    }

    #[test]
    fn test_from_tobj_deduplicates_across_meshes() {
        let models = vec![
            tobj::Model::new(mesh(triangle(), Vec::new(), vec![0, 1, 2]), "a".into()),
            tobj::Model::new(mesh(triangle(), Vec::new(), vec![2, 1, 0]), "b".into()),
        ];

        let model = ObjModel::from_tobj(Path::new("t.obj"), &models, None, Path::new("")).unwrap();
        assert_eq!(model.vertex_count(), 3);
        assert_eq!(model.indices(), &[0, 1, 2, 2, 1, 0]);
        // No MTL: one range, one fallback material.
        assert_eq!(model.draw_ranges().as_slice(), &[DrawRange::new(0, 6)]);
        assert_eq!(model.materials().len(), 1);
    }

    #[test]
    fn test_from_tobj_coalesces_adjacent_materials() {
        let with_material = |id: usize, name: &str| {
            let mut m = mesh(triangle(), Vec::new(), vec![0, 1, 2]);
            m.material_id = Some(id);
            tobj::Model::new(m, name.into())
        };
        let models = vec![
            with_material(0, "a"),
            with_material(0, "b"),
            with_material(1, "c"),
        ];
        let materials = vec![
            tobj::Material {
                name: "red".into(),
                ..Default::default()
            },
            tobj::Material {
                name: "blue".into(),
                ..Default::default()
            },
        ];

        let model =
            ObjModel::from_tobj(Path::new("t.obj"), &models, Some(&materials), Path::new(""))
                .unwrap();
        assert_eq!(
            model.draw_ranges().as_slice(),
            &[DrawRange::new(0, 6), DrawRange::new(1, 9)]
        );
        assert_eq!(model.materials()[1].name, "blue");
    }

    #[test]
    fn test_from_tobj_rejects_unknown_material() {
        let mut m = mesh(triangle(), Vec::new(), vec![0, 1, 2]);
        m.material_id = Some(3);
        let models = vec![tobj::Model::new(m, "a".into())];
        let materials = vec![tobj::Material::default()];

        let result =
            ObjModel::from_tobj(Path::new("t.obj"), &models, Some(&materials), Path::new(""));
        assert!(matches!(
            result,
            Err(ResourceError::MaterialOutOfRange { material: 3, .. })
        ));
    }

    #[test]
    fn test_from_tobj_empty() {
        let result = ObjModel::from_tobj(Path::new("t.obj"), &[], None, Path::new(""));
        assert!(matches!(result, Err(ResourceError::EmptyModel(_))));
    }

    #[test]
    fn test_from_parts_rejects_out_of_bounds_index() {
        let result = ObjModel::from_parts(
            PathBuf::from("t.obj"),
            vec![MeshVertex::default(); 2],
            vec![0, 1, 2],
            DrawRanges::single(3),
            vec![MaterialInfo::fallback()],
        );
        assert!(matches!(result, Err(ResourceError::InvalidDrawRanges(_))));
    }
}
