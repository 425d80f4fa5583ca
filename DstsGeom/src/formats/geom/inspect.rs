//! Geom file inspection utilities
//!
//! Summarises a decoded document for display or JSON dumps.

use std::path::Path;

use serde::Serialize;

use super::GeomDocument;
use super::dictionary::ParameterDictionary;
use super::header::GEOM_VERSION;
use super::mesh::Topology;
use super::shader_name::ShaderName;
use super::vertex::VertexSchema;
use crate::error::Result;

/// Summary of a geom file.
#[derive(Debug, Clone, Serialize)]
pub struct GeomInfo {
    pub version: u32,
    pub bone_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub has_color_lookup: bool,
    pub bones: Vec<BoneInfo>,
    pub meshes: Vec<MeshInfo>,
    pub materials: Vec<MaterialInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoneInfo {
    pub name: Option<String>,
    pub name_hash: u32,
    pub parent: Option<usize>,
    pub is_effect: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeshInfo {
    pub name: Option<String>,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub topology: Topology,
    /// Layout the writer would emit. `None` when the vertices cannot be packed.
    pub schema: Option<VertexSchema>,
    pub material: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialInfo {
    pub name: Option<String>,
    pub name_hash: u32,
    pub shaders: Vec<String>,
    pub uniforms: Vec<String>,
    pub settings: Vec<String>,
    pub textures: Vec<String>,
}

impl GeomDocument {
    /// Build a serialisable summary of this document.
    #[must_use]
    pub fn info(&self) -> GeomInfo {
        let bones = self
            .skeleton
            .bones
            .iter()
            .map(|b| BoneInfo {
                name: b.name.clone(),
                name_hash: b.stored_hash(),
                parent: b.parent,
                is_effect: b.is_effect_bone(),
            })
            .collect();

        let meshes = self
            .meshes
            .iter()
            .map(|m| MeshInfo {
                name: m.name.clone(),
                vertex_count: m.vertices.len(),
                triangle_count: m.triangle_count(),
                topology: m.topology,
                schema: m.pack_vertices().ok().map(|(schema, _)| schema),
                material: m.material,
            })
            .collect();

        let materials = self
            .materials
            .iter()
            .map(|m| MaterialInfo {
                name: m.name.clone(),
                name_hash: m.stored_hash(),
                shaders: m.shaders.iter().map(ShaderName::to_text).collect(),
                uniforms: m.uniforms.iter().map(|u| u.parameter_name.clone()).collect(),
                settings: m.settings.iter().map(|s| s.parameter_name.clone()).collect(),
                textures: m.texture_names().map(str::to_string).collect(),
            })
            .collect();

        GeomInfo {
            version: GEOM_VERSION,
            bone_count: self.skeleton.len(),
            mesh_count: self.meshes.len(),
            material_count: self.materials.len(),
            has_color_lookup: self.color_lookup.is_some(),
            bones,
            meshes,
            materials,
        }
    }
}

/// Read a geom file and summarise it.
///
/// # Errors
/// Returns an error if the file cannot be read or fails validation.
pub fn inspect_geom<P: AsRef<Path>>(source: P, dict: &ParameterDictionary) -> Result<GeomInfo> {
    let document = GeomDocument::read_file(source, dict)?;
    Ok(document.info())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::geom::material::Material;
    use crate::formats::geom::mesh::Mesh;
    use crate::formats::geom::skeleton::Bone;
    use crate::formats::geom::vertex::{AttributeSlot, AttributeValue, Vertex};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_info_summarises_document() {
        let mut doc = GeomDocument::new();
        let root = doc.skeleton.push_bone(Bone::new("root"));
        doc.skeleton.push_bone(Bone::new("ef_spark").with_parent(root));
        doc.materials.push(Material::new("skin"));

        let mut mesh = Mesh::new("body");
        mesh.topology = Topology::TriangleStrip;
        for x in [0.0, 1.0, 2.0, 3.0] {
            mesh.vertices.push(
                Vertex::new().with(AttributeSlot::Position, AttributeValue::F32(vec![x, 0.0, 0.0])),
            );
        }
        mesh.indices = vec![0, 1, 2, 3];
        doc.meshes.push(mesh);

        let info = doc.info();
        assert_eq!(info.version, 316);
        assert_eq!(info.bone_count, 2);
        assert_eq!(info.bones[1].parent, Some(0));
        assert!(info.bones[1].is_effect);
        assert_eq!(info.meshes[0].triangle_count, 2);
        assert_eq!(info.meshes[0].schema.as_ref().map(|s| s.stride), Some(12));
        assert_eq!(info.materials[0].name.as_deref(), Some("skin"));

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["meshes"][0]["topology"], "triangle_strip");
    }

    #[test]
    fn test_inspect_geom_file() {
        let mut doc = GeomDocument::new();
        doc.skeleton.push_bone(Bone::new("root"));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.geom");
        doc.write_file(&path).unwrap();

        let info = inspect_geom(&path, &ParameterDictionary::new()).unwrap();
        assert_eq!(info.bone_count, 1);
        assert_eq!(info.mesh_count, 0);
        assert!(!info.has_color_lookup);
    }
}
