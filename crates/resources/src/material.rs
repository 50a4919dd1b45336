//! Material definitions read from MTL files.

use std::path::{Path, PathBuf};

/// Texture maps a material names. Paths are already resolved against
/// the directory of the OBJ file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialInfo {
    pub name: String,
    /// `map_Kd`
    pub diffuse_texture: Option<PathBuf>,
    /// `map_Ks`
    pub specular_texture: Option<PathBuf>,
    /// `map_Ka`
    pub ambient_texture: Option<PathBuf>,
}

impl MaterialInfo {
    /// Material assigned to models whose OBJ file has no usable MTL.
    pub fn fallback() -> Self {
        Self {
            name: "default".to_string(),
            ..Self::default()
        }
    }

    /// Material with texture paths resolved against `base_dir`.
    pub(crate) fn from_tobj(material: &tobj::Material, base_dir: &Path) -> Self {
        let resolve = |name: &Option<String>| {
            name.as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| base_dir.join(n))
        };

        Self {
            name: material.name.clone(),
            diffuse_texture: resolve(&material.diffuse_texture),
            specular_texture: resolve(&material.specular_texture),
            ambient_texture: resolve(&material.ambient_texture),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tobj_resolves_relative_to_base_dir() {
        let material = tobj::Material {
            name: "wood".to_string(),
            diffuse_texture: Some("textures/wood.png".to_string()),
            specular_texture: Some("  ".to_string()),
            ..Default::default()
        };

        let info = MaterialInfo::from_tobj(&material, Path::new("/models/house"));
        assert_eq!(info.name, "wood");
        assert_eq!(
            info.diffuse_texture,
            Some(PathBuf::from("/models/house/textures/wood.png"))
        );
        assert_eq!(info.specular_texture, None);
        assert_eq!(info.ambient_texture, None);
    }

    #[test]
    fn test_fallback_has_no_textures() {
        let material = MaterialInfo::fallback();
        assert_eq!(material.name, "default");
        assert!(material.diffuse_texture.is_none());
    }
}
