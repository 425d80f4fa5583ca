//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! Skeleton block: bone hierarchy, bind-pose transforms and name hashes.
//!
//! The header's section offsets are anchor-relative: each one counts from the
//! position of its own field, not from the start of the block.

use std::io::{Read, Seek, Write};

use glam::{Mat4, Quat, Vec3, Vec4};

use super::stream::{GeomReader, GeomWriter};
use super::transform::{Transform, invert_affine};
use crate::error::{Error, Result};
use crate::utils::{align_up, name_hash};

pub const SKELETON_MAGIC: [u8; 4] = *b"20SE";
pub const SKELETON_HEADER_SIZE: u64 = 0x40;
/// Parent slot value marking a root bone.
pub const NO_PARENT: u16 = 0x7FFF;
/// Name prefix of effect attachment bones.
pub const EFFECT_PREFIX: &str = "ef_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    Open,
    Done,
}

const BONE_TRANSFORM_SIZE: u64 = 0x30;
const SECTION_ALIGNMENT: u64 = 16;

// Field positions inside the header, used as offset anchors.
const FIELD_FLOAT_CHANNEL_COUNT: u64 = 0x12;
const FIELD_BONE_TRANSFORM: u64 = 0x18;
const FIELD_PARENT_BONES: u64 = 0x1C;
const FIELD_NAME_HASHES: u64 = 0x20;
const FIELD_CHANNEL_INDICES: u64 = 0x24;
const FIELD_CHANNEL_HASHES: u64 = 0x28;
const FIELD_CHANNEL_FLAGS: u64 = 0x2C;

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name_hash: u32,
    pub name: Option<String>,
    /// Transform relative to the parent bone.
    pub local: Transform,
    /// Cached world-space transform, see [`Skeleton::update_world_transforms`].
    pub world: Transform,
    pub parent: Option<usize>,
    pub is_effect: bool,
}

impl Bone {
    /// A named root bone at the identity pose.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut bone = Self::from_hash(0);
        bone.set_name(name);
        bone
    }

    /// An unnamed root bone known only by its hash.
    #[must_use]
    pub fn from_hash(name_hash: u32) -> Self {
        Self {
            name_hash,
            name: None,
            local: Transform::IDENTITY,
            world: Transform::IDENTITY,
            parent: None,
            is_effect: false,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_local(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    pub fn set_name(&mut self, name: &str) {
        self.name_hash = name_hash(name);
        self.is_effect = name.starts_with(EFFECT_PREFIX);
        self.name = Some(name.to_string());
    }

    /// Hash written to the file: derived from the name when there is one.
    #[must_use]
    pub fn stored_hash(&self) -> u32 {
        self.name.as_deref().map_or(self.name_hash, name_hash)
    }

    /// Whether the bone is an effect attachment, judged by name when named.
    #[must_use]
    pub fn is_effect_bone(&self) -> bool {
        self.name
            .as_deref()
            .map_or(self.is_effect, |name| name.starts_with(EFFECT_PREFIX))
    }
}

/// Section positions inside a written skeleton block, relative to its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SkeletonLayout {
    pub transforms: u64,
    pub selectors: u64,
    pub hashes: u64,
    pub end: u64,
}

impl SkeletonLayout {
    pub fn for_bones(count: usize) -> Self {
        let n = count as u64;
        let transforms = align_up(SKELETON_HEADER_SIZE + 4 * n, SECTION_ALIGNMENT);
        let selectors = align_up(transforms + BONE_TRANSFORM_SIZE * n, SECTION_ALIGNMENT);
        let hashes = align_up(selectors + 2 * n, SECTION_ALIGNMENT);
        let end = align_up(hashes + 4 * n, SECTION_ALIGNMENT);
        Self {
            transforms,
            selectors,
            hashes,
            end,
        }
    }
}

/// One `(bone, parent)` entry of the parent-pair table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentPair {
    pub bone: u16,
    pub parent: u16,
}

/// Ordered arena of bones. Parents are referenced by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

impl Skeleton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Size of the block [`Skeleton::write_to`] produces.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        SkeletonLayout::for_bones(self.bones.len()).end
    }

    /// Append a bone and return its index.
    pub fn push_bone(&mut self, bone: Bone) -> usize {
        self.bones.push(bone);
        self.bones.len() - 1
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.bones
            .iter()
            .position(|b| b.name.as_deref() == Some(name))
    }

    #[must_use]
    pub fn find_by_hash(&self, hash: u32) -> Option<usize> {
        self.bones.iter().position(|b| b.name_hash == hash)
    }

    /// World matrix of every bone, parents resolved through the arena.
    ///
    /// Each bone is resolved once; a bone met again while its own ancestor
    /// walk is still open closes a cycle. Fails on parent indices outside the
    /// skeleton and on cycles.
    pub fn world_matrices(&self) -> Result<Vec<Mat4>> {
        let count = self.bones.len();
        let mut world = vec![Mat4::IDENTITY; count];
        let mut state = vec![Visit::Pending; count];
        let mut chain = Vec::new();

        for start in 0..count {
            let mut current = Some(start);
            while let Some(index) = current {
                match state[index] {
                    Visit::Done => break,
                    Visit::Open => {
                        return Err(Error::inconsistent(
                            None,
                            format!("bone hierarchy contains a cycle through bone {index}"),
                        ));
                    }
                    Visit::Pending => {}
                }
                state[index] = Visit::Open;
                chain.push(index);
                current = match self.bones[index].parent {
                    Some(parent) if parent >= count => {
                        return Err(Error::out_of_range(None, "parent bone", parent as u64, count));
                    }
                    parent => parent,
                };
            }

            // Topmost ancestor last in, so popping resolves parents first.
            while let Some(index) = chain.pop() {
                let local = self.bones[index].local.to_matrix();
                world[index] = match self.bones[index].parent {
                    Some(parent) => world[parent] * local,
                    None => local,
                };
                state[index] = Visit::Done;
            }
        }

        Ok(world)
    }

    /// World-space position of every bone.
    pub fn world_positions(&self) -> Result<Vec<Vec3>> {
        Ok(self
            .world_matrices()?
            .iter()
            .map(|m| m.w_axis.truncate())
            .collect())
    }

    /// Recompute the cached world transform of every bone.
    pub fn update_world_transforms(&mut self) -> Result<()> {
        let matrices = self.world_matrices()?;
        for (bone, matrix) in self.bones.iter_mut().zip(&matrices) {
            bone.world = Transform::from_matrix(matrix);
        }
        Ok(())
    }

    /// Inverse bind-pose matrix per bone: the inverse of its world matrix.
    pub fn inverse_bind_poses(&self) -> Result<Vec<Mat4>> {
        self.world_matrices()?.iter().map(invert_affine).collect()
    }

    /// Attach names from a name table by matching hashes.
    ///
    /// Returns how many bones received a name. Names that match nothing and
    /// bones that stay unnamed are logged.
    pub fn resolve_names(&mut self, names: &[String]) -> usize {
        let mut resolved = 0;
        for name in names {
            let hash = name_hash(name);
            let mut matched = false;
            for bone in self.bones.iter_mut().filter(|b| b.name_hash == hash) {
                bone.set_name(name);
                matched = true;
                resolved += 1;
            }
            if !matched {
                tracing::warn!("Bone name {name:?} ({hash:#010x}) matches no bone");
            }
        }
        for (index, bone) in self.bones.iter().enumerate() {
            if bone.name.is_none() {
                tracing::warn!("Bone {index} ({:#010x}) has no name", bone.name_hash);
            }
        }
        resolved
    }

    /// Read a skeleton block whose header starts at `offset` in `reader`.
    pub fn read_from<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        let mut reader = GeomReader::new(reader)?;
        Self::read(&mut reader, offset)
    }

    /// Write the skeleton block at the current position. Returns its size.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<u64> {
        let mut writer = GeomWriter::new(writer)?;
        self.write(&mut writer)
    }

    pub(crate) fn read<R: Read + Seek>(reader: &mut GeomReader<'_, R>, base: u64) -> Result<Self> {
        reader.seek_to(base)?;
        let magic: [u8; 4] = reader.read_array()?;
        if magic != SKELETON_MAGIC {
            return Err(Error::MalformedHeader {
                offset: base,
                message: format!("expected skeleton magic {SKELETON_MAGIC:?}, found {magic:?}"),
            });
        }

        let _file_size = reader.read_u64()?;
        let _hashes_bytecount = reader.read_u32()?;
        let bone_count = reader.read_u16()? as usize;
        let float_channel_count = reader.read_u16()?;
        let _parent_vector_size = reader.read_u32()?;
        let transforms_rel = reader.read_u32()?;
        let selectors_rel = reader.read_u32()?;
        let hashes_rel = reader.read_u32()?;
        reader.skip(12 + 0xC)?;
        let pair_count = reader.read_u32()? as usize;

        if float_channel_count != 0 {
            return Err(Error::unsupported(
                base + FIELD_FLOAT_CHANNEL_COUNT,
                format!("{float_channel_count} float channel(s)"),
            ));
        }

        tracing::debug!(
            "Reading skeleton at {base:#x}: {bone_count} bones, {pair_count} parent pairs"
        );

        reader.ensure_available(4 * pair_count as u64)?;
        let mut pairs = Vec::with_capacity(pair_count);
        for _ in 0..pair_count {
            pairs.push(ParentPair {
                bone: reader.read_u16()?,
                parent: reader.read_u16()?,
            });
        }

        reader.seek_to(base + FIELD_BONE_TRANSFORM + u64::from(transforms_rel))?;
        reader.ensure_available(BONE_TRANSFORM_SIZE * bone_count as u64)?;
        let mut bones = Vec::with_capacity(bone_count);
        for _ in 0..bone_count {
            let rotation = reader.read_f32_array::<4>()?;
            let position = reader.read_f32_array::<4>()?;
            let scale = reader.read_f32_array::<4>()?;
            let mut bone = Bone::from_hash(0);
            bone.local = Transform {
                rotation: Quat::from_array(rotation),
                position: Vec4::from_array(position).truncate(),
                scale: Vec4::from_array(scale).truncate(),
            };
            bones.push(bone);
        }

        let selectors_pos = base + FIELD_PARENT_BONES + u64::from(selectors_rel);
        reader.seek_to(selectors_pos)?;
        let mut selectors = Vec::with_capacity(bone_count);
        for _ in 0..bone_count {
            selectors.push(reader.read_u16()?);
        }

        reader.seek_to(base + FIELD_NAME_HASHES + u64::from(hashes_rel))?;
        for bone in &mut bones {
            bone.name_hash = reader.read_u32()?;
        }

        for (i, &selector) in selectors.iter().enumerate() {
            let field = Some(selectors_pos + 2 * i as u64);
            let pair = pairs
                .get(selector as usize)
                .ok_or_else(|| Error::out_of_range(field, "parent pair", selector, pairs.len()))?;
            if pair.parent == NO_PARENT {
                continue;
            }
            let pair_pos = Some(base + SKELETON_HEADER_SIZE + 4 * u64::from(selector));
            if pair.bone as usize >= bone_count {
                return Err(Error::out_of_range(pair_pos, "bone", pair.bone, bone_count));
            }
            if pair.parent as usize >= bone_count {
                return Err(Error::out_of_range(pair_pos, "parent bone", pair.parent, bone_count));
            }
            bones[pair.bone as usize].parent = Some(pair.parent as usize);
        }

        let mut skeleton = Skeleton { bones };
        skeleton
            .update_world_transforms()
            .map_err(|e| e.located(base + SKELETON_HEADER_SIZE))?;
        Ok(skeleton)
    }

    pub(crate) fn write<W: Write + Seek>(&self, writer: &mut GeomWriter<'_, W>) -> Result<u64> {
        let count = self.bones.len();
        if count >= usize::from(NO_PARENT) {
            return Err(Error::out_of_range(
                None,
                "bone",
                count as u64,
                usize::from(NO_PARENT),
            ));
        }
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(parent) = bone.parent.filter(|&p| p >= count) {
                return Err(Error::inconsistent(
                    None,
                    format!("bone {index} references parent {parent} outside the skeleton"),
                ));
            }
        }

        let layout = SkeletonLayout::for_bones(count);
        let end = layout.end;
        let rel = |target: u64, field: u64| (target - field) as u32;
        let base = writer.position();

        writer.write_bytes(&SKELETON_MAGIC)?;
        writer.write_u64(end)?;
        writer.write_u32((4 * count) as u32)?;
        writer.write_u16(count as u16)?;
        writer.write_u16(0)?;
        writer.write_u32(count as u32)?;
        writer.write_u32(rel(layout.transforms, FIELD_BONE_TRANSFORM))?;
        writer.write_u32(rel(layout.selectors, FIELD_PARENT_BONES))?;
        writer.write_u32(rel(layout.hashes, FIELD_NAME_HASHES))?;
        writer.write_u32(rel(end, FIELD_CHANNEL_INDICES))?;
        writer.write_u32(rel(end, FIELD_CHANNEL_HASHES))?;
        writer.write_u32(rel(end, FIELD_CHANNEL_FLAGS))?;
        writer.write_zeros(0xC)?;
        writer.write_u32(count as u32)?;

        for (index, bone) in self.bones.iter().enumerate() {
            writer.write_u16(index as u16)?;
            writer.write_u16(bone.parent.map_or(NO_PARENT, |p| p as u16))?;
        }
        writer.align(base, SECTION_ALIGNMENT)?;

        for bone in &self.bones {
            let t = &bone.local;
            writer.write_f32_slice(&t.rotation.to_array())?;
            writer.write_f32_slice(&t.position.extend(1.0).to_array())?;
            writer.write_f32_slice(&t.scale.extend(1.0).to_array())?;
        }
        writer.align(base, SECTION_ALIGNMENT)?;

        for index in 0..count {
            writer.write_u16(index as u16)?;
        }
        writer.align(base, SECTION_ALIGNMENT)?;

        for bone in &self.bones {
            writer.write_u32(bone.stored_hash())?;
        }
        writer.align(base, SECTION_ALIGNMENT)?;

        debug_assert_eq!(writer.position() - base, end);
        tracing::debug!("Wrote skeleton: {count} bones, {end:#x} bytes");
        Ok(end)
    }
}

impl From<Vec<Bone>> for Skeleton {
    fn from(bones: Vec<Bone>) -> Self {
        Self { bones }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::geom::transform::matrices_approx_eq;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Cursor;

    fn write_raw_skeleton(pairs: &[(u16, u16)], selectors: &[u16], hashes: &[u32]) -> Vec<u8> {
        let bones = selectors.len();
        let mut out = Vec::new();
        let pairs_end = align_up(0x40 + 4 * pairs.len() as u64, 16);
        let transforms = pairs_end;
        let sel = align_up(transforms + 0x30 * bones as u64, 16);
        let hash = align_up(sel + 2 * bones as u64, 16);
        let end = align_up(hash + 4 * bones as u64, 16);

        out.extend_from_slice(b"20SE");
        out.write_u64::<LittleEndian>(end).unwrap();
        out.write_u32::<LittleEndian>(4 * bones as u32).unwrap();
        out.write_u16::<LittleEndian>(bones as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u32::<LittleEndian>(bones as u32).unwrap();
        out.write_u32::<LittleEndian>((transforms - 0x18) as u32).unwrap();
        out.write_u32::<LittleEndian>((sel - 0x1C) as u32).unwrap();
        out.write_u32::<LittleEndian>((hash - 0x20) as u32).unwrap();
        for field in [0x24u64, 0x28, 0x2C] {
            out.write_u32::<LittleEndian>((end - field) as u32).unwrap();
        }
        out.extend_from_slice(&[0; 0xC]);
        out.write_u32::<LittleEndian>(pairs.len() as u32).unwrap();
        for &(b, p) in pairs {
            out.write_u16::<LittleEndian>(b).unwrap();
            out.write_u16::<LittleEndian>(p).unwrap();
        }
        out.resize(transforms as usize, 0);
        for _ in 0..bones {
            for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0] {
                out.write_f32::<LittleEndian>(v).unwrap();
            }
        }
        out.resize(sel as usize, 0);
        for &s in selectors {
            out.write_u16::<LittleEndian>(s).unwrap();
        }
        out.resize(hash as usize, 0);
        for &h in hashes {
            out.write_u32::<LittleEndian>(h).unwrap();
        }
        out.resize(end as usize, 0);
        out
    }

    #[test]
    fn test_parent_pairs_resolve() {
        let data = write_raw_skeleton(&[(0, NO_PARENT), (1, 0)], &[0, 1], &[10, 20]);
        let skeleton = Skeleton::read_from(&mut Cursor::new(data), 0).unwrap();
        assert_eq!(skeleton.len(), 2);
        assert_eq!(skeleton.bones[0].parent, None);
        assert_eq!(skeleton.bones[1].parent, Some(0));
        assert_eq!(skeleton.bones[1].name_hash, 20);
    }

    #[test]
    fn test_selector_out_of_range() {
        let data = write_raw_skeleton(&[(0, NO_PARENT)], &[0, 5], &[1, 2]);
        let err = Skeleton::read_from(&mut Cursor::new(data), 0).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { what: "parent pair", index: 5, .. }));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = write_raw_skeleton(&[], &[], &[]);
        data[0] = b'X';
        let err = Skeleton::read_from(&mut Cursor::new(data), 0).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { offset: 0, .. }));
    }

    #[test]
    fn test_float_channels_unsupported() {
        let mut data = write_raw_skeleton(&[], &[], &[]);
        data[0x12] = 1;
        let err = Skeleton::read_from(&mut Cursor::new(data), 0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { offset: Some(0x12), .. }));
    }

    #[test]
    fn test_cycle_detected() {
        let skeleton = Skeleton::from(vec![
            Bone::new("a").with_parent(1),
            Bone::new("b").with_parent(0),
        ]);
        let err = skeleton.world_matrices().unwrap_err();
        assert!(matches!(err, Error::InconsistentInvariant { .. }));
    }

    #[test]
    fn test_cycle_in_file_reports_pairs() {
        let data = write_raw_skeleton(&[(0, 2), (1, 0), (2, 1)], &[0, 1, 2], &[1, 2, 3]);
        let err = Skeleton::read_from(&mut Cursor::new(data), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InconsistentInvariant);
        assert_eq!(err.offset(), Some(SKELETON_HEADER_SIZE));
    }

    #[test]
    fn test_deep_chain_resolves() {
        let depth = 20_000;
        let step = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        // Children first, so the walk from bone 0 climbs the whole chain.
        let bones = (0..depth)
            .map(|i| {
                let bone = Bone::from_hash(i as u32).with_local(step);
                if i + 1 < depth { bone.with_parent(i + 1) } else { bone }
            })
            .collect::<Vec<_>>();
        let skeleton = Skeleton::from(bones);

        let positions = skeleton.world_positions().unwrap();
        assert_eq!(positions.len(), depth);
        assert_eq!(positions[depth - 1], Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(positions[0], Vec3::new(depth as f32, 0.0, 0.0));
    }

    #[test]
    fn test_world_composes_parent_first() {
        let mut skeleton = Skeleton::new();
        let root = skeleton.push_bone(
            Bone::new("root").with_local(Transform::from_translation(Vec3::new(1.0, 0.0, 0.0))),
        );
        skeleton.push_bone(
            Bone::new("child")
                .with_parent(root)
                .with_local(Transform::from_translation(Vec3::new(0.0, 2.0, 0.0))),
        );
        let positions = skeleton.world_positions().unwrap();
        assert_eq!(positions[1], Vec3::new(1.0, 2.0, 0.0));

        let ibpms = skeleton.inverse_bind_poses().unwrap();
        assert!(matrices_approx_eq(
            &ibpms[1],
            &Mat4::from_translation(Vec3::new(-1.0, -2.0, 0.0)),
            1e-4
        ));
    }

    #[test]
    fn test_write_then_read() {
        let mut skeleton = Skeleton::new();
        let root = skeleton.push_bone(Bone::new("root"));
        skeleton.push_bone(
            Bone::new("ef_spark")
                .with_parent(root)
                .with_local(Transform::from_translation(Vec3::new(0.0, 0.0, 5.0))),
        );
        skeleton.push_bone(Bone::new("arm").with_parent(root));
        skeleton.update_world_transforms().unwrap();

        let mut cursor = Cursor::new(Vec::new());
        let size = skeleton.write_to(&mut cursor).unwrap();
        let data = cursor.into_inner();
        assert_eq!(size as usize, data.len());
        assert_eq!(size, skeleton.byte_size());
        assert_eq!(size % 16, 0);

        let read = Skeleton::read_from(&mut Cursor::new(data), 0).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read.bones[1].parent, Some(0));
        assert_eq!(read.bones[2].name_hash, name_hash("arm"));
        assert!(read.bones[1].world.approx_eq(&skeleton.bones[1].world, 1e-4));
    }

    #[test]
    fn test_effect_prefix() {
        assert!(Bone::new("ef_flash").is_effect);
        assert!(!Bone::new("eff").is_effect);
    }
}
