//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! Whole-document read and write.
//!
//! Writing collects every string first, computes the complete layout from
//! the in-memory model, then emits the sections in order. Nothing stored in a
//! previously read file is reused for offsets, counts or bounds.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use glam::{Mat4, Vec3};

use super::bounds::Bounds;
use super::dictionary::ParameterDictionary;
use super::header::{
    ATTRIBUTE_DESCRIPTOR_SIZE, CLUT_SIZE, ColorLookup, GEOM_HEADER_SIZE, GEOM_VERSION, GeomHeader,
    IBPM_SIZE, MESH_HEADER_SIZE, MeshHeader, NAME_TABLE_HEADER_SIZE, NameTableHeader,
    read_descriptor, write_descriptor,
};
use super::material::Material;
use super::mesh::{Mesh, MeshFlags, Topology};
use super::options::CodecOptions;
use super::skeleton::Skeleton;
use super::stream::{GeomReader, GeomWriter};
use super::string_table::{StringBlock, StringTable};
use super::transform::{from_rows, to_rows};
use super::validate;
use super::vertex::{AttributeDescriptor, VertexSchema};
use crate::error::{Error, Result};
use crate::utils::{align_up, name_hash};

const SECTION_ALIGNMENT: u64 = 16;
const FIELD_IBPM_COUNT: u64 = 0x0C;
const FIELD_DOCUMENT_CENTRE: u64 = 0x14;
const FIELD_PRIMITIVE_TYPE: u64 = 0x32;
const FIELD_MATERIAL_INDEX: u64 = 0x40;

/// A decoded geom file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeomDocument {
    pub skeleton: Skeleton,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub color_lookup: Option<ColorLookup>,
    pub unknown_0x10: u32,
    pub unknown_0x30: u32,
    pub unknown_0x34: u32,
}

/// Positions of one mesh's payload, relative to the document base.
struct MeshLayout {
    schema: VertexSchema,
    vertex_bytes: Vec<u8>,
    vertices: u64,
    palette: u64,
    indices: u64,
    attributes: u64,
}

/// Everything the writer needs to know before emitting a byte.
struct Layout {
    strings: StringTable,
    bone_names: Vec<String>,
    material_names: Vec<String>,
    name_table: u64,
    bone_name_offsets: u64,
    material_name_offsets: u64,
    mesh_headers: u64,
    meshes: Vec<MeshLayout>,
    materials: u64,
    ibpm: u64,
    clut: u64,
    strings_offset: u64,
    skeleton: u64,
    end: u64,
}

impl GeomDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inverse bind pose of every bone as written to the file.
    ///
    /// Effect bones carry the identity.
    pub fn inverse_bind_poses(&self) -> Result<Vec<Mat4>> {
        let mut poses = self.skeleton.inverse_bind_poses()?;
        for (pose, bone) in poses.iter_mut().zip(&self.skeleton.bones) {
            if bone.is_effect_bone() {
                *pose = Mat4::IDENTITY;
            }
        }
        Ok(poses)
    }

    /// Union of every mesh's vertex positions, with no sphere radius.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(self.meshes.iter().flat_map(Mesh::positions)).without_radius()
    }

    // ==================== Reading ====================

    /// Read a document whose header sits at `options.base_offset`.
    pub fn read_from<R: Read + Seek>(
        source: &mut R,
        dict: &ParameterDictionary,
        options: &CodecOptions,
    ) -> Result<Self> {
        let mut reader = GeomReader::new(source)?;
        let base = options.base_offset;
        let tolerance = options.tolerance;

        reader.seek_to(base)?;
        let header = GeomHeader::read(&mut reader)?;
        tracing::debug!(
            "Geom header at {base:#x}: {} meshes, {} materials, {} bind poses",
            header.mesh_count,
            header.material_count,
            header.ibpm_count
        );

        let strings = Self::read_strings_block(&mut reader, &header, base)?;
        let (bone_names, material_names) = Self::read_name_table(&mut reader, &header, &strings)?;

        let mut skeleton = if header.skeleton_offset == 0 {
            Skeleton::new()
        } else {
            Skeleton::read(&mut reader, base + header.skeleton_offset)?
        };
        skeleton.resolve_names(&bone_names);
        tracing::debug!("Skeleton: {} bones", skeleton.len());

        let ibpm_pos = base + header.ibpm_offset;
        if usize::from(header.ibpm_count) != skeleton.len() {
            return Err(Error::inconsistent(
                Some(base + FIELD_IBPM_COUNT),
                format!(
                    "{} inverse bind poses for {} bones",
                    header.ibpm_count,
                    skeleton.len()
                ),
            ));
        }
        reader.seek_to(ibpm_pos)?;
        reader.ensure_available(IBPM_SIZE * u64::from(header.ibpm_count))?;
        let mut stored_poses = Vec::with_capacity(skeleton.len());
        for _ in 0..header.ibpm_count {
            stored_poses.push(from_rows(&reader.read_f32_array::<12>()?));
        }
        validate::check_bind_poses(&skeleton, &stored_poses, ibpm_pos, tolerance)?;

        let mut meshes = Vec::with_capacity(usize::from(header.mesh_count));
        for index in 0..usize::from(header.mesh_count) {
            let header_pos = base + header.mesh_offset + MESH_HEADER_SIZE * index as u64;
            let mesh = Self::read_mesh(
                &mut reader,
                header_pos,
                base,
                &strings,
                skeleton.len(),
                usize::from(header.material_count),
                tolerance,
            )?;
            meshes.push(mesh);
        }

        reader.seek_to(base + header.material_offset)?;
        let mut materials = Vec::with_capacity(usize::from(header.material_count));
        for _ in 0..header.material_count {
            materials.push(Material::read(&mut reader, dict, &strings)?);
        }
        resolve_material_names(&mut materials, &material_names);
        tracing::debug!("Read {} materials", materials.len());

        let color_lookup = if header.clut_offset == 0 {
            None
        } else {
            reader.seek_to(base + header.clut_offset)?;
            Some(ColorLookup::read(&mut reader)?)
        };

        let document = Self {
            skeleton,
            meshes,
            materials,
            color_lookup,
            unknown_0x10: header.unknown_0x10,
            unknown_0x30: header.unknown_0x30,
            unknown_0x34: header.unknown_0x34,
        };

        validate::check_document_bounds(
            &document.bounds(),
            Vec3::from_array(header.centre),
            Vec3::from_array(header.extents),
            base + FIELD_DOCUMENT_CENTRE,
            tolerance,
        )?;

        Ok(document)
    }

    /// Load the strings block, which runs up to the next section or the end
    /// of the source.
    fn read_strings_block<R: Read + Seek>(
        reader: &mut GeomReader<'_, R>,
        header: &GeomHeader,
        base: u64,
    ) -> Result<StringBlock> {
        let start = header.strings_offset;
        let next_section = [
            header.mesh_offset,
            header.material_offset,
            header.ibpm_offset,
            header.clut_offset,
            header.name_table_offset,
            header.skeleton_offset,
        ]
        .into_iter()
        .filter(|&offset| offset > start)
        .min();

        let end = match next_section {
            Some(offset) => base + offset,
            None => reader.source_len(),
        };
        let len = end.saturating_sub(base + start);
        reader.seek_to(base + start)?;
        let bytes = reader.read_bytes(len as usize)?;
        tracing::trace!("Strings block at {start:#x}: {len} bytes");

        Ok(StringBlock {
            bytes,
            start: base + start,
            base,
        })
    }

    fn read_name_table<R: Read + Seek>(
        reader: &mut GeomReader<'_, R>,
        header: &GeomHeader,
        strings: &StringBlock,
    ) -> Result<(Vec<String>, Vec<String>)> {
        if header.name_table_offset == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        let base = strings.base;
        reader.seek_to(base + header.name_table_offset)?;
        let table = NameTableHeader::read(reader)?;

        let mut read_names = |offsets_offset: u64, count: u32| -> Result<Vec<String>> {
            reader.seek_to(base + offsets_offset)?;
            reader.ensure_available(8 * u64::from(count))?;
            let offsets = (0..count)
                .map(|_| reader.read_u64())
                .collect::<Result<Vec<_>>>()?;
            offsets.into_iter().map(|o| strings.resolve(o)).collect()
        };

        let bones = read_names(table.bone_name_offsets_offset, table.bone_name_count)?;
        let materials =
            read_names(table.material_name_offsets_offset, table.material_name_count)?;
        Ok((bones, materials))
    }

    fn read_mesh<R: Read + Seek>(
        reader: &mut GeomReader<'_, R>,
        header_pos: u64,
        base: u64,
        strings: &StringBlock,
        bone_count: usize,
        material_count: usize,
        tolerance: f32,
    ) -> Result<Mesh> {
        reader.seek_to(header_pos)?;
        let header = MeshHeader::read(reader)?;

        let topology = Topology::from_code(header.primitive_type).ok_or_else(|| {
            Error::unsupported(
                header_pos + FIELD_PRIMITIVE_TYPE,
                format!("primitive type {}", header.primitive_type),
            )
        })?;
        if header.material_index as usize >= material_count {
            return Err(Error::out_of_range(
                Some(header_pos + FIELD_MATERIAL_INDEX),
                "material",
                header.material_index,
                material_count,
            ));
        }

        reader.seek_to(base + header.attributes_offset)?;
        let mut attributes: Vec<AttributeDescriptor> =
            Vec::with_capacity(usize::from(header.attribute_count));
        for _ in 0..header.attribute_count {
            let start = reader.position();
            let descriptor = read_descriptor(reader)?;
            if attributes.iter().any(|d| d.slot == descriptor.slot) {
                return Err(Error::InvalidEncoding {
                    offset: Some(start),
                    message: format!("{:?} is described more than once", descriptor.slot),
                });
            }
            attributes.push(descriptor);
        }
        let schema = VertexSchema {
            attributes,
            stride: header.bytes_per_vertex,
        };

        let vertex_len = u64::from(header.bytes_per_vertex) * u64::from(header.vertex_count);
        reader.seek_to(base + header.vertices_offset)?;
        reader.ensure_available(vertex_len)?;
        let vertex_bytes = reader.read_bytes(vertex_len as usize)?;

        let palette_pos = base + header.matrix_palette_offset;
        reader.seek_to(palette_pos)?;
        reader.ensure_available(4 * u64::from(header.matrix_palette_count))?;
        let mut matrix_palette = Vec::with_capacity(usize::from(header.matrix_palette_count));
        for i in 0..u64::from(header.matrix_palette_count) {
            let bone = reader.read_u32()?;
            if bone as usize >= bone_count {
                return Err(Error::out_of_range(
                    Some(palette_pos + 4 * i),
                    "palette bone",
                    bone,
                    bone_count,
                ));
            }
            matrix_palette.push(bone as usize);
        }

        reader.seek_to(base + header.indices_offset)?;
        reader.ensure_available(2 * u64::from(header.index_count))?;
        let indices = (0..header.index_count)
            .map(|_| reader.read_u16())
            .collect::<Result<Vec<_>>>()?;

        let name = if header.name_offset == 0 {
            None
        } else {
            Some(strings.resolve(header.name_offset)?)
        };

        let mut mesh = Mesh {
            name,
            name_hash: header.name_hash,
            vertices: Vec::new(),
            indices,
            topology,
            matrix_palette,
            material: header.material_index as usize,
            influences_per_vertex: header.influences_per_vertex,
            flags: MeshFlags::from_bits(header.flags),
            index_type: header.index_type,
            unknown_0x18: header.unknown_0x18,
            unknown_0x4c: header.unknown_0x4c,
            unknown_0x50: header.unknown_0x50,
        };
        mesh.unpack_vertices(&schema, &vertex_bytes)
            .map_err(|e| e.located(base + header.vertices_offset))?;

        let stored_bounds = Bounds {
            centre: Vec3::from_array(header.centre),
            half_extents: Vec3::from_array(header.extents),
            radius: header.bounding_radius,
            ..Bounds::default()
        };
        validate::check_mesh(&mesh, &schema, &stored_bounds, header_pos, tolerance)?;

        tracing::debug!(
            "Mesh {:?} at {header_pos:#x}: {} vertices, {} indices, stride {}",
            mesh.name,
            mesh.vertices.len(),
            mesh.indices.len(),
            schema.stride
        );
        Ok(mesh)
    }

    // ==================== Writing ====================

    /// Write the document with its header at `options.base_offset`.
    ///
    /// Returns the number of bytes written from the base.
    pub fn write_to<W: Write + Seek>(&self, sink: &mut W, options: &CodecOptions) -> Result<u64> {
        let layout = self.compute_layout()?;
        let ibpms = self.inverse_bind_poses()?;
        let bounds = self.bounds();

        let mut writer = GeomWriter::new(sink)?;
        let base = options.base_offset;
        writer.seek_to(base)?;

        let header = GeomHeader {
            version: GEOM_VERSION,
            mesh_count: count_u16(self.meshes.len(), "mesh")?,
            material_count: count_u16(self.materials.len(), "material")?,
            light_count: 0,
            camera_count: 0,
            ibpm_count: count_u16(ibpms.len(), "bone")?,
            unknown_0x10: self.unknown_0x10,
            centre: bounds.centre.to_array(),
            extents: bounds.half_extents.to_array(),
            unknown_0x30: self.unknown_0x30,
            unknown_0x34: self.unknown_0x34,
            skeleton_file_size: self.skeleton.byte_size(),
            mesh_offset: layout.mesh_headers,
            material_offset: layout.materials,
            light_offset: 0,
            camera_offset: 0,
            ibpm_offset: layout.ibpm,
            strings_offset: layout.strings_offset,
            clut_offset: layout.clut,
            name_table_offset: layout.name_table,
            skeleton_offset: layout.skeleton,
        };
        header.write(&mut writer)?;

        writer.pad_to(base + layout.name_table)?;
        NameTableHeader {
            bone_name_count: layout.bone_names.len() as u32,
            material_name_count: layout.material_names.len() as u32,
            bone_name_offsets_offset: layout.bone_name_offsets,
            material_name_offsets_offset: layout.material_name_offsets,
        }
        .write(&mut writer)?;
        for name in layout.bone_names.iter().chain(&layout.material_names) {
            writer.write_u64(layout.string_offset(name)?)?;
        }

        writer.pad_to(base + layout.mesh_headers)?;
        for (mesh, mesh_layout) in self.meshes.iter().zip(&layout.meshes) {
            Self::mesh_header(mesh, mesh_layout, &layout)?.write(&mut writer)?;
        }

        for (mesh, mesh_layout) in self.meshes.iter().zip(&layout.meshes) {
            writer.pad_to(base + mesh_layout.vertices)?;
            writer.write_bytes(&mesh_layout.vertex_bytes)?;
            writer.pad_to(base + mesh_layout.palette)?;
            for &bone in &mesh.matrix_palette {
                writer.write_u32(bone as u32)?;
            }
            writer.pad_to(base + mesh_layout.indices)?;
            for &index in &mesh.indices {
                writer.write_u16(index)?;
            }
            writer.pad_to(base + mesh_layout.attributes)?;
            for descriptor in &mesh_layout.schema.attributes {
                write_descriptor(&mut writer, descriptor)?;
            }
        }

        writer.pad_to(base + layout.materials)?;
        for material in &self.materials {
            material.write(&mut writer, &layout.strings, layout.strings_offset)?;
        }

        writer.pad_to(base + layout.ibpm)?;
        for pose in &ibpms {
            writer.write_f32_slice(&to_rows(pose))?;
        }

        if let Some(clut) = &self.color_lookup {
            writer.pad_to(base + layout.clut)?;
            clut.write(&mut writer)?;
        }

        writer.pad_to(base + layout.strings_offset)?;
        writer.write_bytes(layout.strings.as_bytes())?;

        writer.pad_to(base + layout.skeleton)?;
        self.skeleton.write(&mut writer)?;

        let written = writer.position() - base;
        debug_assert_eq!(written, layout.end);
        tracing::debug!(
            "Wrote geom: {} meshes, {} materials, {} bones, {written:#x} bytes",
            self.meshes.len(),
            self.materials.len(),
            self.skeleton.len()
        );
        Ok(written)
    }

    fn compute_layout(&self) -> Result<Layout> {
        let bone_count = self.skeleton.len();
        let mut strings = StringTable::new();

        let bone_names: Vec<String> =
            self.skeleton.bones.iter().filter_map(|b| b.name.clone()).collect();
        let material_names: Vec<String> =
            self.materials.iter().filter_map(|m| m.name.clone()).collect();
        for name in bone_names.iter().chain(&material_names) {
            strings.add(name);
        }
        for mesh in &self.meshes {
            if let Some(name) = &mesh.name {
                strings.add(name);
            }
        }
        for material in &self.materials {
            for texture in material.texture_names() {
                strings.add(texture);
            }
        }

        let mut pos = align_up(GEOM_HEADER_SIZE, SECTION_ALIGNMENT);
        let name_table = pos;
        let bone_name_offsets = name_table + NAME_TABLE_HEADER_SIZE;
        let material_name_offsets = bone_name_offsets + 8 * bone_names.len() as u64;
        pos = align_up(
            material_name_offsets + 8 * material_names.len() as u64,
            SECTION_ALIGNMENT,
        );

        let mesh_headers = pos;
        pos = align_up(pos + MESH_HEADER_SIZE * self.meshes.len() as u64, SECTION_ALIGNMENT);

        let mut meshes = Vec::with_capacity(self.meshes.len());
        for (index, mesh) in self.meshes.iter().enumerate() {
            if mesh.material >= self.materials.len() {
                return Err(Error::out_of_range(
                    None,
                    "material",
                    mesh.material as u64,
                    self.materials.len(),
                ));
            }
            if let Some(&bone) = mesh.matrix_palette.iter().find(|&&b| b >= bone_count) {
                return Err(Error::out_of_range(None, "palette bone", bone as u64, bone_count));
            }
            let (schema, vertex_bytes) = mesh.pack_vertices().inspect_err(|_| {
                tracing::warn!("Mesh {index} ({:?}) cannot be packed", mesh.name);
            })?;

            let vertices = pos;
            let palette = align_up(vertices + vertex_bytes.len() as u64, SECTION_ALIGNMENT);
            let indices =
                align_up(palette + 4 * mesh.matrix_palette.len() as u64, SECTION_ALIGNMENT);
            let attributes = align_up(indices + 2 * mesh.indices.len() as u64, SECTION_ALIGNMENT);
            pos = align_up(
                attributes + ATTRIBUTE_DESCRIPTOR_SIZE * schema.attributes.len() as u64,
                SECTION_ALIGNMENT,
            );
            meshes.push(MeshLayout {
                schema,
                vertex_bytes,
                vertices,
                palette,
                indices,
                attributes,
            });
        }

        let materials = pos;
        pos = align_up(
            pos + self.materials.iter().map(Material::record_size).sum::<u64>(),
            SECTION_ALIGNMENT,
        );

        let ibpm = pos;
        pos = align_up(pos + IBPM_SIZE * bone_count as u64, SECTION_ALIGNMENT);

        let clut = if self.color_lookup.is_some() {
            let clut = pos;
            pos = align_up(pos + CLUT_SIZE, SECTION_ALIGNMENT);
            clut
        } else {
            0
        };

        let strings_offset = pos;
        pos = align_up(pos + strings.as_bytes().len() as u64, SECTION_ALIGNMENT);

        let skeleton = pos;
        let end = skeleton + self.skeleton.byte_size();

        Ok(Layout {
            strings,
            bone_names,
            material_names,
            name_table,
            bone_name_offsets,
            material_name_offsets,
            mesh_headers,
            meshes,
            materials,
            ibpm,
            clut,
            strings_offset,
            skeleton,
            end,
        })
    }

    fn mesh_header(mesh: &Mesh, mesh_layout: &MeshLayout, layout: &Layout) -> Result<MeshHeader> {
        let bounds = mesh.bounds();
        let name_offset = match &mesh.name {
            Some(name) => layout.string_offset(name)?,
            None => 0,
        };
        Ok(MeshHeader {
            vertices_offset: mesh_layout.vertices,
            indices_offset: mesh_layout.indices,
            matrix_palette_offset: mesh_layout.palette,
            unknown_0x18: mesh.unknown_0x18,
            attributes_offset: mesh_layout.attributes,
            matrix_palette_count: count_u16(mesh.matrix_palette.len(), "palette bone")?,
            attribute_count: mesh_layout.schema.attributes.len() as u16,
            bytes_per_vertex: mesh_layout.schema.stride,
            index_type: mesh.index_type,
            influences_per_vertex: mesh.influences_per_vertex,
            flags: mesh.flags.bits(),
            primitive_type: mesh.topology.code(),
            name_hash: mesh.name.as_deref().map_or(mesh.name_hash, name_hash),
            name_offset,
            material_index: mesh.material as u32,
            vertex_count: mesh.vertices.len() as u32,
            index_count: mesh.indices.len() as u32,
            unknown_0x4c: mesh.unknown_0x4c,
            unknown_0x50: mesh.unknown_0x50,
            bounding_radius: bounds.radius,
            centre: bounds.centre.to_array(),
            extents: bounds.half_extents.to_array(),
            controller_offset: 0,
        })
    }

    // ==================== Convenience ====================

    pub fn from_bytes(data: &[u8], dict: &ParameterDictionary) -> Result<Self> {
        Self::read_from(&mut Cursor::new(data), dict, &CodecOptions::default())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor, &CodecOptions::default())?;
        Ok(cursor.into_inner())
    }

    pub fn read_file<P: AsRef<Path>>(path: P, dict: &ParameterDictionary) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading {}", path.display());
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader, dict, &CodecOptions::default())
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        tracing::debug!("Writing {}", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer, &CodecOptions::default())?;
        writer.flush()?;
        Ok(())
    }
}

impl Layout {
    fn string_offset(&self, name: &str) -> Result<u64> {
        self.strings
            .offset_of(name)
            .map(|offset| self.strings_offset + offset)
            .ok_or_else(|| {
                Error::inconsistent(None, format!("{name:?} missing from string table"))
            })
    }
}

fn resolve_material_names(materials: &mut [Material], names: &[String]) {
    for name in names {
        let hash = name_hash(name);
        let mut matched = false;
        for material in materials.iter_mut().filter(|m| m.name_hash == hash) {
            material.set_name(name);
            matched = true;
        }
        if !matched {
            tracing::warn!("Material name {name:?} ({hash:#010x}) matches no material");
        }
    }
    for (index, material) in materials.iter().enumerate() {
        if material.name.is_none() {
            tracing::warn!("Material {index} ({:#010x}) has no name", material.name_hash);
        }
    }
}

fn count_u16(len: usize, what: &'static str) -> Result<u16> {
    u16::try_from(len)
        .map_err(|_| Error::out_of_range(None, what, len as u64, usize::from(u16::MAX)))
}

/// Attach a source position to an error raised by an in-memory step.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::geom::material::ShaderUniform;
    use crate::formats::geom::skeleton::Bone;
    use crate::formats::geom::transform::Transform;
    use crate::formats::geom::vertex::{AttributeSlot, AttributeValue, Vertex};
    use pretty_assertions::assert_eq;

    fn dict() -> ParameterDictionary {
        ParameterDictionary::from_pairs([(0x10, "DiffuseColor"), (0x11, "DiffuseMap")])
    }

    fn sample() -> GeomDocument {
        let dict = dict();
        let mut doc = GeomDocument::new();
        let root = doc.skeleton.push_bone(
            Bone::new("root").with_local(Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
        );
        doc.skeleton.push_bone(Bone::new("ef_hand").with_parent(root));
        doc.skeleton.update_world_transforms().unwrap();

        let mut material = Material::new("mat_a");
        material
            .uniforms
            .push(ShaderUniform::with_texture("DiffuseMap", "tex_a", 1, &dict).unwrap());
        material
            .uniforms
            .push(ShaderUniform::with_floats("DiffuseColor", &[1.0, 1.0, 1.0, 1.0], &dict).unwrap());
        doc.materials.push(material);

        let mut mesh = Mesh::new("mesh_a");
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]] {
            mesh.vertices.push(
                Vertex::new()
                    .with(AttributeSlot::Position, AttributeValue::F32(p.to_vec()))
                    .with(AttributeSlot::Uv1, AttributeValue::F32(vec![p[0], p[1]])),
            );
        }
        mesh.indices = vec![0, 1, 2];
        mesh.matrix_palette = vec![0];
        doc.meshes.push(mesh);
        doc.color_lookup = Some(ColorLookup {
            color: [1, 2, 3, 4],
            ..ColorLookup::default()
        });
        doc
    }

    #[test]
    fn test_write_read_round_trip() {
        let doc = sample();
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(bytes.len() % 16, 0);
        let read = GeomDocument::from_bytes(&bytes, &dict()).unwrap();
        assert_eq!(read, doc);
    }

    #[test]
    fn test_base_offset() {
        let doc = sample();
        let options = CodecOptions::new().with_base_offset(0x40);
        let mut cursor = Cursor::new(Vec::new());
        let written = doc.write_to(&mut cursor, &options).unwrap();
        let data = cursor.into_inner();
        assert_eq!(data.len() as u64, 0x40 + written);

        let read = GeomDocument::read_from(&mut Cursor::new(data), &dict(), &options).unwrap();
        assert_eq!(read, doc);
    }

    #[test]
    fn test_missing_dictionary_entry() {
        let bytes = sample().to_bytes().unwrap();
        let err = GeomDocument::from_bytes(&bytes, &ParameterDictionary::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding { .. }));
    }

    #[test]
    fn test_material_index_checked_on_write() {
        let mut doc = sample();
        doc.meshes[0].material = 3;
        assert!(matches!(doc.to_bytes(), Err(Error::OutOfRange { what: "material", .. })));
    }

    #[test]
    fn test_truncated_input() {
        let bytes = sample().to_bytes().unwrap();
        let err = GeomDocument::from_bytes(&bytes[..0x60], &dict()).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { .. }));
    }

    #[test]
    fn test_effect_bone_writes_identity_bind_pose() {
        let doc = sample();
        let poses = doc.inverse_bind_poses().unwrap();
        assert_eq!(poses[1], Mat4::IDENTITY);
        assert_eq!(poses[0], Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)));
    }

    #[test]
    fn test_assigned_names_are_hashed_on_write() {
        let mut doc = sample();
        doc.skeleton.bones[0].name = Some("pelvis".to_string());
        doc.skeleton.bones[1].name = Some("hand".to_string());
        doc.materials[0].name = Some("mat_b".to_string());

        let poses = doc.inverse_bind_poses().unwrap();
        assert_eq!(poses[1], Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)));

        let read = GeomDocument::from_bytes(&doc.to_bytes().unwrap(), &dict()).unwrap();
        let pelvis = &read.skeleton.bones[0];
        assert_eq!(pelvis.name.as_deref(), Some("pelvis"));
        assert_eq!(pelvis.name_hash, name_hash("pelvis"));
        assert_eq!(read.skeleton.bones[1].name.as_deref(), Some("hand"));
        assert!(!read.skeleton.bones[1].is_effect);
        assert_eq!(read.materials[0].name.as_deref(), Some("mat_b"));
        assert_eq!(read.materials[0].name_hash, name_hash("mat_b"));
    }

    #[test]
    fn test_assigned_effect_name_marks_bone() {
        let mut doc = sample();
        doc.skeleton.bones[0].name = Some("ef_root".to_string());
        assert!(doc.skeleton.bones[0].is_effect_bone());
        assert_eq!(doc.inverse_bind_poses().unwrap()[0], Mat4::IDENTITY);

        let read = GeomDocument::from_bytes(&doc.to_bytes().unwrap(), &dict()).unwrap();
        assert!(read.skeleton.bones[0].is_effect);
        assert_eq!(read.skeleton.find_by_name("ef_root"), Some(0));
    }
}
