//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! Meshes: vertices, index topology, skinning palette and material binding

use glam::Vec3;
use serde::Serialize;

use super::bounds::Bounds;
use super::vertex::{AttributeSlot, Vertex, VertexSchema};
use crate::error::{Error, Result};
use crate::utils::name_hash;

/// How the index list forms triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    #[default]
    TriangleList,
    TriangleStrip,
}

impl Topology {
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            4 => Some(Self::TriangleList),
            5 => Some(Self::TriangleStrip),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::TriangleList => 4,
            Self::TriangleStrip => 5,
        }
    }
}

/// The eight independent mesh flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MeshFlags(pub [bool; 8]);

impl MeshFlags {
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self(std::array::from_fn(|i| bits & (1 << i) != 0))
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &set)| if set { acc | (1 << i) } else { acc })
    }

    #[must_use]
    pub fn get(self, bit: usize) -> bool {
        self.0.get(bit).copied().unwrap_or(false)
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        if let Some(flag) = self.0.get_mut(bit) {
            *flag = value;
        }
    }
}

/// One bone weight acting on a vertex. `bone` indexes the mesh palette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneInfluence {
    pub bone: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub name_hash: u32,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    pub topology: Topology,
    /// Skeleton bone indices the vertices are skinned against.
    pub matrix_palette: Vec<usize>,
    /// Index into the document's material list.
    pub material: usize,
    pub influences_per_vertex: u8,
    pub flags: MeshFlags,
    pub index_type: u16,
    pub unknown_0x18: u64,
    pub unknown_0x4c: u32,
    pub unknown_0x50: u32,
}

impl Mesh {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut mesh = Self::default();
        mesh.set_name(name);
        mesh
    }

    pub fn set_name(&mut self, name: &str) {
        self.name_hash = name_hash(name);
        self.name = Some(name.to_string());
    }

    /// Expand the index list into a flat triangle list.
    ///
    /// Strips alternate winding: every odd triangle swaps its first two
    /// corners. Degenerate strip triangles are dropped but still count
    /// towards the alternation.
    #[must_use]
    pub fn triangle_indices(&self) -> Vec<u32> {
        let indices = self.indices.iter().map(|&i| u32::from(i));
        match self.topology {
            Topology::TriangleList => {
                let full = self.indices.len() / 3 * 3;
                indices.take(full).collect()
            }
            Topology::TriangleStrip => {
                let mut out = Vec::new();
                for (n, window) in self.indices.windows(3).enumerate() {
                    let (a, b, c) = (window[0], window[1], window[2]);
                    if a == b || b == c || a == c {
                        continue;
                    }
                    let triangle = if n % 2 == 0 { [a, b, c] } else { [b, a, c] };
                    out.extend(triangle.map(u32::from));
                }
                out
            }
        }
    }

    /// Number of triangles after strip expansion.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangle_indices().len() / 3
    }

    /// Derive the schema from the first vertex and pack every vertex with it.
    pub fn pack_vertices(&self) -> Result<(VertexSchema, Vec<u8>)> {
        let Some(first) = self.vertices.first() else {
            return Ok((VertexSchema::default(), Vec::new()));
        };
        let schema = VertexSchema::derive(first)?;
        let bytes = schema.pack(&self.vertices)?;
        Ok((schema, bytes))
    }

    /// Replace the vertex list with the contents of a packed buffer.
    pub fn unpack_vertices(&mut self, schema: &VertexSchema, bytes: &[u8]) -> Result<()> {
        self.vertices = schema.unpack(bytes)?;
        Ok(())
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> {
        self.vertices.iter().filter_map(Vertex::position)
    }

    /// Bounds over every vertex position.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(self.positions())
    }

    /// Skinning influences of one vertex.
    ///
    /// With no declared influences every vertex follows palette entry 0. With
    /// one, the palette index rides in the fourth position component. Two or
    /// more come from the bone index and bone weight attributes.
    pub fn bone_influences(&self, vertex: usize) -> Result<Vec<BoneInfluence>> {
        let v = self
            .vertices
            .get(vertex)
            .ok_or_else(|| Error::out_of_range(None, "vertex", vertex as u64, self.vertices.len()))?;

        match self.influences_per_vertex {
            0 => Ok(vec![BoneInfluence { bone: 0, weight: 1.0 }]),
            1 => {
                let index = v
                    .get(AttributeSlot::Position)
                    .and_then(|p| p.to_f32_vec().get(3).copied())
                    .ok_or_else(|| {
                        Error::inconsistent(
                            None,
                            format!("vertex {vertex} has no fourth position component for its bone index"),
                        )
                    })?;
                Ok(vec![BoneInfluence {
                    bone: index.round() as u32,
                    weight: 1.0,
                }])
            }
            n => {
                let missing = |slot: AttributeSlot| {
                    Error::inconsistent(
                        None,
                        format!("mesh declares {n} influences but vertex {vertex} lacks {slot:?}"),
                    )
                };
                let bones = v
                    .get(AttributeSlot::BoneIndex)
                    .ok_or_else(|| missing(AttributeSlot::BoneIndex))?
                    .to_f32_vec();
                let weights = v
                    .get(AttributeSlot::BoneWeight)
                    .ok_or_else(|| missing(AttributeSlot::BoneWeight))?
                    .to_normalised_vec();
                Ok(bones
                    .into_iter()
                    .zip(weights)
                    .take(usize::from(n))
                    .map(|(bone, weight)| BoneInfluence {
                        bone: bone as u32,
                        weight,
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::geom::vertex::AttributeValue;
    use pretty_assertions::assert_eq;

    fn strip(indices: &[u16]) -> Mesh {
        Mesh {
            indices: indices.to_vec(),
            topology: Topology::TriangleStrip,
            ..Mesh::default()
        }
    }

    #[test]
    fn test_strip_alternates_winding() {
        assert_eq!(strip(&[0, 1, 2, 3]).triangle_indices(), vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_strip_degenerate_keeps_parity() {
        // (1,2,2) and (2,2,3) are dropped; (2,3,4) is the fourth window so it flips.
        let mesh = strip(&[0, 1, 2, 2, 3, 4]);
        assert_eq!(mesh.triangle_indices(), vec![0, 1, 2, 3, 2, 4]);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_list_passthrough() {
        let mesh = Mesh {
            indices: vec![0, 1, 2, 2, 1, 3, 9],
            ..Mesh::default()
        };
        assert_eq!(mesh.triangle_indices(), vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_flags_bits() {
        let flags = MeshFlags::from_bits(0b1000_0101);
        assert!(flags.get(0) && flags.get(2) && flags.get(7));
        assert!(!flags.get(1));
        assert_eq!(flags.bits(), 0b1000_0101);
    }

    #[test]
    fn test_influences_legacy_rules() {
        let mut mesh = Mesh::new("body");
        mesh.vertices.push(
            Vertex::new().with(AttributeSlot::Position, AttributeValue::F32(vec![0.0, 0.0, 0.0, 3.0])),
        );
        assert_eq!(
            mesh.bone_influences(0).unwrap(),
            vec![BoneInfluence { bone: 0, weight: 1.0 }]
        );

        mesh.influences_per_vertex = 1;
        assert_eq!(
            mesh.bone_influences(0).unwrap(),
            vec![BoneInfluence { bone: 3, weight: 1.0 }]
        );

        mesh.influences_per_vertex = 2;
        assert!(mesh.bone_influences(0).is_err());
        mesh.vertices[0].set(AttributeSlot::BoneIndex, AttributeValue::U8(vec![4, 7]));
        mesh.vertices[0].set(AttributeSlot::BoneWeight, AttributeValue::U8(vec![255, 0]));
        assert_eq!(
            mesh.bone_influences(0).unwrap(),
            vec![
                BoneInfluence { bone: 4, weight: 1.0 },
                BoneInfluence { bone: 7, weight: 0.0 },
            ]
        );
    }

    #[test]
    fn test_pack_vertices_empty_mesh() {
        let (schema, bytes) = Mesh::new("empty").pack_vertices().unwrap();
        assert_eq!(schema.stride, 0);
        assert!(bytes.is_empty());
    }
}
