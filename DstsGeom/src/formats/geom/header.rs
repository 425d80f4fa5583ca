//! Fixed-size header records of the geom container.
//!
//! Offsets stored in these records are relative to the document base.

use std::io::{Read, Seek, Write};

use super::stream::{GeomReader, GeomWriter};
use super::vertex::{AttributeDescriptor, AttributeSlot, ElementType, MAX_COMPONENTS};
use crate::error::{Error, Result};

pub const GEOM_VERSION: u32 = 316;
pub const GEOM_HEADER_SIZE: u64 = 0xA8;
pub const NAME_TABLE_HEADER_SIZE: u64 = 0x18;
pub const MESH_HEADER_SIZE: u64 = 0x80;
pub const ATTRIBUTE_DESCRIPTOR_SIZE: u64 = 8;
pub const IBPM_SIZE: u64 = 12 * 4;
pub const CLUT_SIZE: u64 = 0x20;

// Field positions, for error reporting.
const FIELD_LIGHT_COUNT: u64 = 0x08;
const FIELD_CAMERA_COUNT: u64 = 0x0A;
const FIELD_CONTROLLER_OFFSET: u64 = 0x70;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct GeomHeader {
    pub version: u32,
    pub mesh_count: u16,
    pub material_count: u16,
    pub light_count: u16,
    pub camera_count: u16,
    pub ibpm_count: u16,
    pub unknown_0x10: u32,
    pub centre: [f32; 3],
    pub extents: [f32; 3],
    pub unknown_0x30: u32,
    pub unknown_0x34: u32,
    pub skeleton_file_size: u64,
    pub mesh_offset: u64,
    pub material_offset: u64,
    pub light_offset: u64,
    pub camera_offset: u64,
    pub ibpm_offset: u64,
    pub strings_offset: u64,
    pub clut_offset: u64,
    pub name_table_offset: u64,
    pub skeleton_offset: u64,
}

impl GeomHeader {
    pub fn read<R: Read + Seek>(reader: &mut GeomReader<'_, R>) -> Result<Self> {
        let start = reader.position();
        let version = reader.read_u32()?;
        if version != GEOM_VERSION {
            return Err(Error::MalformedHeader {
                offset: start,
                message: format!("unsupported geom version {version}, expected {GEOM_VERSION}"),
            });
        }

        let mesh_count = reader.read_u16()?;
        let material_count = reader.read_u16()?;
        let light_count = reader.read_u16()?;
        let camera_count = reader.read_u16()?;
        let ibpm_count = reader.read_u16()?;
        reader.skip(2)?;

        if light_count != 0 {
            return Err(Error::unsupported(
                start + FIELD_LIGHT_COUNT,
                format!("{light_count} light(s)"),
            ));
        }
        if camera_count != 0 {
            return Err(Error::unsupported(
                start + FIELD_CAMERA_COUNT,
                format!("{camera_count} camera(s)"),
            ));
        }

        let unknown_0x10 = reader.read_u32()?;
        let centre = reader.read_f32_array()?;
        let extents = reader.read_f32_array()?;
        reader.skip(4)?;
        let unknown_0x30 = reader.read_u32()?;
        let unknown_0x34 = reader.read_u32()?;
        let skeleton_file_size = reader.read_u64()?;
        reader.skip(8)?;

        let mesh_offset = reader.read_u64()?;
        let material_offset = reader.read_u64()?;
        let light_offset = reader.read_u64()?;
        let camera_offset = reader.read_u64()?;
        let ibpm_offset = reader.read_u64()?;
        reader.skip(8)?;
        let strings_offset = reader.read_u64()?;
        let clut_offset = reader.read_u64()?;
        reader.skip(8)?;
        let name_table_offset = reader.read_u64()?;
        let skeleton_offset = reader.read_u64()?;
        reader.skip(8)?;

        Ok(Self {
            version,
            mesh_count,
            material_count,
            light_count,
            camera_count,
            ibpm_count,
            unknown_0x10,
            centre,
            extents,
            unknown_0x30,
            unknown_0x34,
            skeleton_file_size,
            mesh_offset,
            material_offset,
            light_offset,
            camera_offset,
            ibpm_offset,
            strings_offset,
            clut_offset,
            name_table_offset,
            skeleton_offset,
        })
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut GeomWriter<'_, W>) -> Result<()> {
        writer.write_u32(self.version)?;
        writer.write_u16(self.mesh_count)?;
        writer.write_u16(self.material_count)?;
        writer.write_u16(self.light_count)?;
        writer.write_u16(self.camera_count)?;
        writer.write_u16(self.ibpm_count)?;
        writer.write_zeros(2)?;
        writer.write_u32(self.unknown_0x10)?;
        writer.write_f32_slice(&self.centre)?;
        writer.write_f32_slice(&self.extents)?;
        writer.write_zeros(4)?;
        writer.write_u32(self.unknown_0x30)?;
        writer.write_u32(self.unknown_0x34)?;
        writer.write_u64(self.skeleton_file_size)?;
        writer.write_zeros(8)?;
        writer.write_u64(self.mesh_offset)?;
        writer.write_u64(self.material_offset)?;
        writer.write_u64(self.light_offset)?;
        writer.write_u64(self.camera_offset)?;
        writer.write_u64(self.ibpm_offset)?;
        writer.write_zeros(8)?;
        writer.write_u64(self.strings_offset)?;
        writer.write_u64(self.clut_offset)?;
        writer.write_zeros(8)?;
        writer.write_u64(self.name_table_offset)?;
        writer.write_u64(self.skeleton_offset)?;
        writer.write_zeros(8)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NameTableHeader {
    pub bone_name_count: u32,
    pub material_name_count: u32,
    pub bone_name_offsets_offset: u64,
    pub material_name_offsets_offset: u64,
}

impl NameTableHeader {
    pub fn read<R: Read + Seek>(reader: &mut GeomReader<'_, R>) -> Result<Self> {
        Ok(Self {
            bone_name_count: reader.read_u32()?,
            material_name_count: reader.read_u32()?,
            bone_name_offsets_offset: reader.read_u64()?,
            material_name_offsets_offset: reader.read_u64()?,
        })
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut GeomWriter<'_, W>) -> Result<()> {
        writer.write_u32(self.bone_name_count)?;
        writer.write_u32(self.material_name_count)?;
        writer.write_u64(self.bone_name_offsets_offset)?;
        writer.write_u64(self.material_name_offsets_offset)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MeshHeader {
    pub vertices_offset: u64,
    pub indices_offset: u64,
    pub matrix_palette_offset: u64,
    pub unknown_0x18: u64,
    pub attributes_offset: u64,
    pub matrix_palette_count: u16,
    pub attribute_count: u16,
    pub bytes_per_vertex: u16,
    pub index_type: u16,
    pub influences_per_vertex: u8,
    pub flags: u8,
    pub primitive_type: u16,
    pub name_hash: u32,
    pub name_offset: u64,
    pub material_index: u32,
    pub vertex_count: u32,
    pub index_count: u32,
    pub unknown_0x4c: u32,
    pub unknown_0x50: u32,
    pub bounding_radius: f32,
    pub centre: [f32; 3],
    pub extents: [f32; 3],
    pub controller_offset: u64,
}

impl MeshHeader {
    pub fn read<R: Read + Seek>(reader: &mut GeomReader<'_, R>) -> Result<Self> {
        let start = reader.position();
        let header = Self {
            vertices_offset: reader.read_u64()?,
            indices_offset: reader.read_u64()?,
            matrix_palette_offset: reader.read_u64()?,
            unknown_0x18: reader.read_u64()?,
            attributes_offset: reader.read_u64()?,
            matrix_palette_count: reader.read_u16()?,
            attribute_count: reader.read_u16()?,
            bytes_per_vertex: reader.read_u16()?,
            index_type: reader.read_u16()?,
            influences_per_vertex: reader.read_u8()?,
            flags: reader.read_u8()?,
            primitive_type: reader.read_u16()?,
            name_hash: reader.read_u32()?,
            name_offset: reader.read_u64()?,
            material_index: reader.read_u32()?,
            vertex_count: reader.read_u32()?,
            index_count: reader.read_u32()?,
            unknown_0x4c: reader.read_u32()?,
            unknown_0x50: reader.read_u32()?,
            bounding_radius: reader.read_f32()?,
            centre: reader.read_f32_array()?,
            extents: reader.read_f32_array()?,
            controller_offset: reader.read_u64()?,
        };
        reader.skip(8)?;

        if header.controller_offset != 0 {
            return Err(Error::unsupported(
                start + FIELD_CONTROLLER_OFFSET,
                "mesh controller",
            ));
        }
        Ok(header)
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut GeomWriter<'_, W>) -> Result<()> {
        writer.write_u64(self.vertices_offset)?;
        writer.write_u64(self.indices_offset)?;
        writer.write_u64(self.matrix_palette_offset)?;
        writer.write_u64(self.unknown_0x18)?;
        writer.write_u64(self.attributes_offset)?;
        writer.write_u16(self.matrix_palette_count)?;
        writer.write_u16(self.attribute_count)?;
        writer.write_u16(self.bytes_per_vertex)?;
        writer.write_u16(self.index_type)?;
        writer.write_u8(self.influences_per_vertex)?;
        writer.write_u8(self.flags)?;
        writer.write_u16(self.primitive_type)?;
        writer.write_u32(self.name_hash)?;
        writer.write_u64(self.name_offset)?;
        writer.write_u32(self.material_index)?;
        writer.write_u32(self.vertex_count)?;
        writer.write_u32(self.index_count)?;
        writer.write_u32(self.unknown_0x4c)?;
        writer.write_u32(self.unknown_0x50)?;
        writer.write_f32(self.bounding_radius)?;
        writer.write_f32_slice(&self.centre)?;
        writer.write_f32_slice(&self.extents)?;
        writer.write_u64(self.controller_offset)?;
        writer.write_zeros(8)?;
        Ok(())
    }
}

pub(crate) fn read_descriptor<R: Read + Seek>(
    reader: &mut GeomReader<'_, R>,
) -> Result<AttributeDescriptor> {
    let start = reader.position();
    let slot_code = reader.read_u16()?;
    let count = reader.read_u16()?;
    let type_code = reader.read_u16()?;
    let offset = reader.read_u16()?;

    let slot = AttributeSlot::from_code(slot_code).ok_or_else(|| Error::InvalidEncoding {
        offset: Some(start),
        message: format!("unknown vertex attribute slot {slot_code}"),
    })?;
    let element_type = ElementType::from_code(type_code).ok_or_else(|| Error::InvalidEncoding {
        offset: Some(start + 4),
        message: format!("unknown vertex element type {type_code}"),
    })?;
    if count == 0 || usize::from(count) > MAX_COMPONENTS {
        return Err(Error::InvalidEncoding {
            offset: Some(start + 2),
            message: format!("{slot:?} declares {count} components, expected 1 to {MAX_COMPONENTS}"),
        });
    }

    Ok(AttributeDescriptor {
        slot,
        count,
        element_type,
        offset,
    })
}

pub(crate) fn write_descriptor<W: Write + Seek>(
    writer: &mut GeomWriter<'_, W>,
    descriptor: &AttributeDescriptor,
) -> Result<()> {
    writer.write_u16(descriptor.slot.code())?;
    writer.write_u16(descriptor.count)?;
    writer.write_u16(descriptor.element_type.code())?;
    writer.write_u16(descriptor.offset)?;
    Ok(())
}

/// Colour lookup block, carried through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorLookup {
    pub unknown_0x00: [u8; 16],
    pub color: [u8; 4],
    pub unknown_0x14: [u8; 12],
}

impl ColorLookup {
    pub(crate) fn read<R: Read + Seek>(reader: &mut GeomReader<'_, R>) -> Result<Self> {
        Ok(Self {
            unknown_0x00: reader.read_array()?,
            color: reader.read_array()?,
            unknown_0x14: reader.read_array()?,
        })
    }

    pub(crate) fn write<W: Write + Seek>(&self, writer: &mut GeomWriter<'_, W>) -> Result<()> {
        writer.write_bytes(&self.unknown_0x00)?;
        writer.write_bytes(&self.color)?;
        writer.write_bytes(&self.unknown_0x14)?;
        Ok(())
    }
}
