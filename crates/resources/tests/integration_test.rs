//! Integration tests for OBJ/MTL loading.

use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use meshview_resources::{DrawRange, MaterialInfo, ObjModel, ResourceError};

/// Create an empty fixture directory under the system temp dir.
fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meshview_resources_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

const TWO_MATERIAL_OBJ: &str = "\
mtllib scene.mtl
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
o floor
usemtl stone
f 1/1/1 2/2/1 3/3/1 4/4/1
o poster
usemtl paper
f 1/1/1 2/2/1 3/3/1
";

const TWO_MATERIAL_MTL: &str = "\
newmtl stone
Kd 0.7 0.7 0.7
map_Kd textures/stone.png
map_Ks stone_spec.png

newmtl paper
Kd 1.0 1.0 1.0
";

#[test]
fn test_load_obj_with_materials() {
    let dir = fixture_dir("two_materials");
    fs::write(dir.join("scene.obj"), TWO_MATERIAL_OBJ).unwrap();
    fs::write(dir.join("scene.mtl"), TWO_MATERIAL_MTL).unwrap();

    let model = ObjModel::load(&dir.join("scene.obj")).expect("Failed to load OBJ model");

    // The quad triangulates to 6 indices, the poster adds 3.
    assert_eq!(model.index_count(), 9);
    assert_eq!(model.triangle_count(), 3);
    // The poster reuses three of the quad's vertices.
    assert_eq!(model.vertex_count(), 4);

    assert_eq!(
        model.draw_ranges().as_slice(),
        &[DrawRange::new(0, 6), DrawRange::new(1, 9)]
    );

    let materials = model.materials();
    assert_eq!(materials.len(), 2);
    assert_eq!(materials[0].name, "stone");
    assert_eq!(
        materials[0].diffuse_texture,
        Some(dir.join("textures/stone.png"))
    );
    assert_eq!(materials[0].specular_texture, Some(dir.join("stone_spec.png")));
    assert_eq!(materials[1].diffuse_texture, None);

    for vertex in model.vertices() {
        assert_relative_eq!(vertex.normal.z, 1.0);
    }
    // vt 0.0 1.0 on the fourth corner is stored flipped.
    let corner = model
        .vertices()
        .iter()
        .find(|v| v.position.x == 0.0 && v.position.y == 1.0)
        .unwrap();
    assert_relative_eq!(corner.tex_coord.y, 0.0);
}

#[test]
fn test_load_obj_without_mtl_uses_fallback_material() {
    let dir = fixture_dir("no_mtl");
    fs::write(
        dir.join("tri.obj"),
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
    )
    .unwrap();

    let model = ObjModel::load(&dir.join("tri.obj")).unwrap();
    assert_eq!(model.materials(), &[MaterialInfo::fallback()]);
    assert_eq!(model.draw_ranges().as_slice(), &[DrawRange::new(0, 3)]);
    // No normals or texcoords in the file.
    assert!(model.vertices().iter().all(|v| v.normal == glam::Vec3::ZERO));
    assert!(model.vertices().iter().all(|v| v.tex_coord == glam::Vec2::ZERO));
}

#[test]
fn test_load_missing_file() {
    let result = ObjModel::load(&std::env::temp_dir().join("meshview_does_not_exist.obj"));
    assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
}

#[test]
fn test_load_obj_without_faces() {
    let dir = fixture_dir("no_faces");
    fs::write(dir.join("points.obj"), "v 0 0 0\nv 1 0 0\n").unwrap();

    let result = ObjModel::load(&dir.join("points.obj"));
    assert!(matches!(result, Err(ResourceError::EmptyModel(_))));
}
