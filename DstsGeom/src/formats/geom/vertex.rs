//! Typed vertex attributes and the per-mesh schema that packs them.

use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;
use half::f16;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::align_up;

/// Largest number of scalar components one slot may hold.
pub const MAX_COMPONENTS: usize = 4;
const SLOT_COUNT: usize = 11;
const ATTRIBUTE_ALIGNMENT: u64 = 4;

/// Attribute slots in canonical order. Discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum AttributeSlot {
    Position = 1,
    Normal = 2,
    Tangent = 3,
    Binormal = 4,
    Uv1 = 5,
    Uv2 = 6,
    Uv3 = 7,
    Unknown8 = 8,
    Color = 9,
    BoneIndex = 10,
    BoneWeight = 11,
}

impl AttributeSlot {
    pub const ALL: [Self; SLOT_COUNT] = [
        Self::Position,
        Self::Normal,
        Self::Tangent,
        Self::Binormal,
        Self::Uv1,
        Self::Uv2,
        Self::Uv3,
        Self::Unknown8,
        Self::Color,
        Self::BoneIndex,
        Self::BoneWeight,
    ];

    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code).checked_sub(1)?).copied()
    }

    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }

    fn index(self) -> usize {
        self as usize - 1
    }
}

/// Scalar type of an attribute's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F16,
}

impl ElementType {
    /// Decode a wire code. Codes 9 and 10 are older aliases of 7 and 8.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::U8),
            2 => Some(Self::I8),
            3 => Some(Self::U16),
            4 => Some(Self::I16),
            5 => Some(Self::U32),
            6 => Some(Self::I32),
            7 | 9 => Some(Self::F32),
            8 | 10 => Some(Self::F16),
            _ => None,
        }
    }

    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::U8 => 1,
            Self::I8 => 2,
            Self::U16 => 3,
            Self::I16 => 4,
            Self::U32 => 5,
            Self::I32 => 6,
            Self::F32 => 7,
            Self::F16 => 8,
        }
    }

    /// Size of one component in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }

    /// Largest value of an integer type, used to normalise integer weights.
    fn integer_max(self) -> Option<f32> {
        match self {
            Self::U8 => Some(f32::from(u8::MAX)),
            Self::I8 => Some(f32::from(i8::MAX)),
            Self::U16 => Some(f32::from(u16::MAX)),
            Self::I16 => Some(f32::from(i16::MAX)),
            Self::U32 => Some(u32::MAX as f32),
            Self::I32 => Some(i32::MAX as f32),
            Self::F32 | Self::F16 => None,
        }
    }
}

/// Up to four components of a single element type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F16(Vec<f16>),
}

impl AttributeValue {
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::U8(_) => ElementType::U8,
            Self::I8(_) => ElementType::I8,
            Self::U16(_) => ElementType::U16,
            Self::I16(_) => ElementType::I16,
            Self::U32(_) => ElementType::U32,
            Self::I32(_) => ElementType::I32,
            Self::F32(_) => ElementType::F32,
            Self::F16(_) => ElementType::F16,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F16(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Components widened to `f32`.
    #[must_use]
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::U8(v) => v.iter().map(|&x| f32::from(x)).collect(),
            Self::I8(v) => v.iter().map(|&x| f32::from(x)).collect(),
            Self::U16(v) => v.iter().map(|&x| f32::from(x)).collect(),
            Self::I16(v) => v.iter().map(|&x| f32::from(x)).collect(),
            Self::U32(v) => v.iter().map(|&x| x as f32).collect(),
            Self::I32(v) => v.iter().map(|&x| x as f32).collect(),
            Self::F32(v) => v.clone(),
            Self::F16(v) => v.iter().map(|x| x.to_f32()).collect(),
        }
    }

    /// Components as weights in `0..=1`; integer types are divided by their max.
    #[must_use]
    pub fn to_normalised_vec(&self) -> Vec<f32> {
        let values = self.to_f32_vec();
        match self.element_type().integer_max() {
            Some(max) => values.into_iter().map(|v| v / max).collect(),
            None => values,
        }
    }

    /// Decode `count` little-endian components from `bytes`.
    pub(crate) fn read_le(ty: ElementType, count: usize, bytes: &[u8]) -> Self {
        let chunks = bytes.chunks_exact(ty.size()).take(count);
        match ty {
            ElementType::U8 => Self::U8(bytes[..count].to_vec()),
            ElementType::I8 => Self::I8(bytes[..count].iter().map(|&b| b as i8).collect()),
            ElementType::U16 => Self::U16(chunks.map(LittleEndian::read_u16).collect()),
            ElementType::I16 => Self::I16(chunks.map(LittleEndian::read_i16).collect()),
            ElementType::U32 => Self::U32(chunks.map(LittleEndian::read_u32).collect()),
            ElementType::I32 => Self::I32(chunks.map(LittleEndian::read_i32).collect()),
            ElementType::F32 => Self::F32(chunks.map(LittleEndian::read_f32).collect()),
            ElementType::F16 => Self::F16(
                chunks
                    .map(|c| f16::from_bits(LittleEndian::read_u16(c)))
                    .collect(),
            ),
        }
    }

    /// Encode all components little-endian into the front of `out`.
    pub(crate) fn write_le(&self, out: &mut [u8]) {
        match self {
            Self::U8(v) => out[..v.len()].copy_from_slice(v),
            Self::I8(v) => {
                for (dst, &x) in out.iter_mut().zip(v) {
                    *dst = x as u8;
                }
            }
            Self::U16(v) => LittleEndian::write_u16_into(v, &mut out[..v.len() * 2]),
            Self::I16(v) => LittleEndian::write_i16_into(v, &mut out[..v.len() * 2]),
            Self::U32(v) => LittleEndian::write_u32_into(v, &mut out[..v.len() * 4]),
            Self::I32(v) => LittleEndian::write_i32_into(v, &mut out[..v.len() * 4]),
            Self::F32(v) => LittleEndian::write_f32_into(v, &mut out[..v.len() * 4]),
            Self::F16(v) => {
                for (chunk, x) in out.chunks_exact_mut(2).zip(v) {
                    LittleEndian::write_u16(chunk, x.to_bits());
                }
            }
        }
    }
}

/// One vertex: an optional value per attribute slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertex {
    slots: [Option<AttributeValue>; SLOT_COUNT],
}

impl Vertex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Vertex::set`].
    #[must_use]
    pub fn with(mut self, slot: AttributeSlot, value: AttributeValue) -> Self {
        self.set(slot, value);
        self
    }

    /// Value in `slot`. Empty values count as absent.
    #[must_use]
    pub fn get(&self, slot: AttributeSlot) -> Option<&AttributeValue> {
        self.slots[slot.index()].as_ref().filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, slot: AttributeSlot, value: AttributeValue) {
        self.slots[slot.index()] = Some(value);
    }

    pub fn clear(&mut self, slot: AttributeSlot) {
        self.slots[slot.index()] = None;
    }

    /// Present slots in canonical order.
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeSlot, &AttributeValue)> {
        AttributeSlot::ALL
            .iter()
            .filter_map(|&slot| self.get(slot).map(|v| (slot, v)))
    }

    /// First three position components, when a position is present.
    #[must_use]
    pub fn position(&self) -> Option<Vec3> {
        let values = self.get(AttributeSlot::Position)?.to_f32_vec();
        Some(Vec3::new(
            values.first().copied().unwrap_or_default(),
            values.get(1).copied().unwrap_or_default(),
            values.get(2).copied().unwrap_or_default(),
        ))
    }

    pub fn normal(&self) -> Option<&AttributeValue> {
        self.get(AttributeSlot::Normal)
    }

    pub fn uv1(&self) -> Option<&AttributeValue> {
        self.get(AttributeSlot::Uv1)
    }

    pub fn color(&self) -> Option<&AttributeValue> {
        self.get(AttributeSlot::Color)
    }

    pub fn bone_indices(&self) -> Option<&AttributeValue> {
        self.get(AttributeSlot::BoneIndex)
    }

    pub fn bone_weights(&self) -> Option<&AttributeValue> {
        self.get(AttributeSlot::BoneWeight)
    }
}

/// Placement of one slot inside a packed vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    pub slot: AttributeSlot,
    pub count: u16,
    pub element_type: ElementType,
    pub offset: u16,
}

impl AttributeDescriptor {
    /// Bytes covered by this attribute.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        usize::from(self.count) * self.element_type.size()
    }
}

/// Ordered descriptors plus the vertex stride.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VertexSchema {
    pub attributes: Vec<AttributeDescriptor>,
    pub stride: u16,
}

impl VertexSchema {
    /// Lay out every slot present in `first`, each on a 4-byte boundary.
    pub fn derive(first: &Vertex) -> Result<Self> {
        let mut attributes = Vec::new();
        let mut running = 0u64;
        for (slot, value) in first.attributes() {
            if value.len() > MAX_COMPONENTS {
                return Err(Error::inconsistent(
                    None,
                    format!(
                        "{slot:?} holds {} components, at most {MAX_COMPONENTS} allowed",
                        value.len()
                    ),
                ));
            }
            let offset = align_up(running, ATTRIBUTE_ALIGNMENT);
            let descriptor = AttributeDescriptor {
                slot,
                count: value.len() as u16,
                element_type: value.element_type(),
                offset: offset as u16,
            };
            running = offset + descriptor.byte_len() as u64;
            attributes.push(descriptor);
        }
        Ok(Self {
            attributes,
            stride: align_up(running, ATTRIBUTE_ALIGNMENT) as u16,
        })
    }

    /// Check that `vertex` has exactly the slots, types and counts of this schema.
    ///
    /// Descriptor order does not matter.
    pub fn check(&self, vertex: &Vertex, index: usize) -> Result<()> {
        for descriptor in &self.attributes {
            let found = vertex.get(descriptor.slot);
            let matches = found.is_some_and(|value| {
                value.element_type() == descriptor.element_type
                    && value.len() == usize::from(descriptor.count)
            });
            if !matches {
                return Err(Error::inconsistent(
                    None,
                    format!(
                        "vertex {index} does not match the mesh schema at {:?}: found {:?}",
                        descriptor.slot,
                        found.map(|v| (v.element_type(), v.len()))
                    ),
                ));
            }
        }
        let extra = vertex
            .attributes()
            .find(|(slot, _)| self.attributes.iter().all(|d| d.slot != *slot));
        if let Some((slot, _)) = extra {
            return Err(Error::inconsistent(
                None,
                format!("vertex {index} has {slot:?}, which the mesh schema lacks"),
            ));
        }
        Ok(())
    }

    /// Every attribute must fit inside the stride.
    pub fn validate(&self) -> Result<()> {
        for descriptor in &self.attributes {
            if usize::from(descriptor.offset) + descriptor.byte_len() > usize::from(self.stride) {
                return Err(Error::inconsistent(
                    None,
                    format!(
                        "{:?} at offset {} with {} byte(s) overruns the {}-byte stride",
                        descriptor.slot,
                        descriptor.offset,
                        descriptor.byte_len(),
                        self.stride
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Pack `vertices` into a zero-filled buffer of `stride * len` bytes.
    pub fn pack(&self, vertices: &[Vertex]) -> Result<Vec<u8>> {
        self.validate()?;
        let stride = usize::from(self.stride);
        let mut buffer = vec![0u8; stride * vertices.len()];
        for (index, vertex) in vertices.iter().enumerate() {
            self.check(vertex, index)?;
            let base = index * stride;
            for descriptor in &self.attributes {
                if let Some(value) = vertex.get(descriptor.slot) {
                    let start = base + usize::from(descriptor.offset);
                    value.write_le(&mut buffer[start..start + descriptor.byte_len()]);
                }
            }
        }
        Ok(buffer)
    }

    /// Split a packed buffer back into vertices.
    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<Vertex>> {
        self.validate()?;
        let stride = usize::from(self.stride);
        if stride == 0 {
            if bytes.is_empty() {
                return Ok(Vec::new());
            }
            return Err(Error::inconsistent(
                None,
                format!("{} vertex byte(s) with a zero stride", bytes.len()),
            ));
        }
        if bytes.len() % stride != 0 {
            return Err(Error::inconsistent(
                None,
                format!("{} vertex byte(s) is not a multiple of the {stride}-byte stride", bytes.len()),
            ));
        }

        let vertices = bytes
            .chunks_exact(stride)
            .map(|chunk| {
                let mut vertex = Vertex::new();
                for descriptor in &self.attributes {
                    let start = usize::from(descriptor.offset);
                    let value = AttributeValue::read_le(
                        descriptor.element_type,
                        usize::from(descriptor.count),
                        &chunk[start..start + descriptor.byte_len()],
                    );
                    vertex.set(descriptor.slot, value);
                }
                vertex
            })
            .collect();
        Ok(vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_vertex(x: f32) -> Vertex {
        Vertex::new()
            .with(AttributeSlot::Position, AttributeValue::F32(vec![x, 1.0, 2.0]))
            .with(
                AttributeSlot::Normal,
                AttributeValue::F16(vec![f16::from_f32(0.0), f16::from_f32(1.0), f16::ZERO]),
            )
            .with(AttributeSlot::Color, AttributeValue::U8(vec![255, 128, 0, 255]))
            .with(AttributeSlot::BoneIndex, AttributeValue::I8(vec![-1]))
    }

    #[test]
    fn test_slot_codes() {
        assert_eq!(AttributeSlot::from_code(1), Some(AttributeSlot::Position));
        assert_eq!(AttributeSlot::from_code(11), Some(AttributeSlot::BoneWeight));
        assert_eq!(AttributeSlot::from_code(0), None);
        assert_eq!(AttributeSlot::from_code(12), None);
    }

    #[test]
    fn test_element_type_aliases() {
        assert_eq!(ElementType::from_code(9), Some(ElementType::F32));
        assert_eq!(ElementType::from_code(10), Some(ElementType::F16));
        assert_eq!(ElementType::F16.code(), 8);
        assert_eq!(ElementType::from_code(11), None);
    }

    #[test]
    fn test_derive_schema_aligns_offsets() {
        let schema = VertexSchema::derive(&sample_vertex(0.0)).unwrap();
        let layout: Vec<(AttributeSlot, u16, u16)> = schema
            .attributes
            .iter()
            .map(|d| (d.slot, d.count, d.offset))
            .collect();
        assert_eq!(
            layout,
            vec![
                (AttributeSlot::Position, 3, 0),
                (AttributeSlot::Normal, 3, 12),
                (AttributeSlot::Color, 4, 20),
                (AttributeSlot::BoneIndex, 1, 24),
            ]
        );
        assert_eq!(schema.stride, 28);
    }

    #[test]
    fn test_pack_unpack() {
        let vertices = vec![sample_vertex(0.5), sample_vertex(-3.0)];
        let schema = VertexSchema::derive(&vertices[0]).unwrap();
        let bytes = schema.pack(&vertices).unwrap();
        assert_eq!(bytes.len(), 56);
        // Padding between the half normal and the colour stays zero.
        assert_eq!(&bytes[18..20], &[0, 0]);
        assert_eq!(schema.unpack(&bytes).unwrap(), vertices);
    }

    #[test]
    fn test_pack_rejects_mixed_schema() {
        let mut odd = sample_vertex(1.0);
        odd.set(AttributeSlot::Uv1, AttributeValue::F32(vec![0.0, 0.0]));
        let vertices = vec![sample_vertex(0.0), odd];
        let schema = VertexSchema::derive(&vertices[0]).unwrap();
        let err = schema.pack(&vertices).unwrap_err();
        assert!(matches!(err, Error::InconsistentInvariant { .. }));
    }

    #[test]
    fn test_empty_slot_is_absent() {
        let vertex = Vertex::new()
            .with(AttributeSlot::Position, AttributeValue::F32(vec![1.0, 2.0, 3.0]))
            .with(AttributeSlot::Uv2, AttributeValue::F32(Vec::new()));
        let schema = VertexSchema::derive(&vertex).unwrap();
        assert_eq!(schema.attributes.len(), 1);
        assert_eq!(schema.stride, 12);
    }

    #[test]
    fn test_normalised_weights() {
        let weights = AttributeValue::U8(vec![255, 0]);
        assert_eq!(weights.to_normalised_vec(), vec![1.0, 0.0]);
        let weights = AttributeValue::F32(vec![0.25, 0.75]);
        assert_eq!(weights.to_normalised_vec(), vec![0.25, 0.75]);
    }
}
