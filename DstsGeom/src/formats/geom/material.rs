//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! Materials, shader uniforms and shader settings.
//!
//! A material record is a fixed header followed directly by its uniform
//! records and then its setting records.

use std::io::{Read, Seek, Write};

use byteorder::{ByteOrder, LittleEndian};

use super::dictionary::ParameterDictionary;
use super::shader_name::{ShaderName, WORD_COUNT};
use super::stream::{GeomReader, GeomWriter};
use super::string_table::{StringBlock, StringTable};
use crate::error::{Error, Result};
use crate::utils::name_hash;

/// Shader name slots per material.
pub const SHADER_SLOTS: usize = 14;
pub const MATERIAL_HEADER_SIZE: u64 = 0x328;
/// Size of one uniform or setting record.
pub const PARAMETER_RECORD_SIZE: u64 = 0x20;
pub const PAYLOAD_SIZE: usize = 16;
pub const MAX_UNIFORM_FLOATS: usize = 4;

/// Value carried by a uniform. The wire form tells them apart by float count,
/// zero meaning texture.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Floats(Vec<f32>),
    Texture { name: String, aux: u32 },
}

impl UniformValue {
    /// Float count written to the record; 0 for textures.
    #[must_use]
    pub fn float_count(&self) -> u32 {
        match self {
            Self::Floats(values) => values.len() as u32,
            Self::Texture { .. } => 0,
        }
    }

    #[must_use]
    pub fn texture_name(&self) -> Option<&str> {
        match self {
            Self::Texture { name, .. } => Some(name),
            Self::Floats(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUniform {
    pub parameter_id: u32,
    pub parameter_name: String,
    pub value: UniformValue,
    pub unknown_0x18: u32,
    pub unknown_0x1c: u32,
}

impl ShaderUniform {
    /// A float-vector uniform for the named parameter.
    pub fn with_floats(parameter: &str, values: &[f32], dict: &ParameterDictionary) -> Result<Self> {
        let mut uniform = Self::unset(parameter, dict)?;
        uniform.set_floats(values)?;
        Ok(uniform)
    }

    /// A texture uniform for the named parameter.
    pub fn with_texture(
        parameter: &str,
        texture: &str,
        aux: u32,
        dict: &ParameterDictionary,
    ) -> Result<Self> {
        let mut uniform = Self::unset(parameter, dict)?;
        uniform.set_texture(texture, aux);
        Ok(uniform)
    }

    fn unset(parameter: &str, dict: &ParameterDictionary) -> Result<Self> {
        Ok(Self {
            parameter_id: dict.resolve_id(parameter)?,
            parameter_name: parameter.to_string(),
            value: UniformValue::Floats(vec![0.0]),
            unknown_0x18: 0,
            unknown_0x1c: 0,
        })
    }

    /// Replace the value with 1 to 4 floats.
    pub fn set_floats(&mut self, values: &[f32]) -> Result<()> {
        if values.is_empty() || values.len() > MAX_UNIFORM_FLOATS {
            return Err(Error::InvalidEncoding {
                offset: None,
                message: format!(
                    "uniform {} needs 1 to {MAX_UNIFORM_FLOATS} floats, got {}",
                    self.parameter_name,
                    values.len()
                ),
            });
        }
        self.value = UniformValue::Floats(values.to_vec());
        Ok(())
    }

    /// Replace the value with a texture reference.
    pub fn set_texture(&mut self, name: &str, aux: u32) {
        self.value = UniformValue::Texture {
            name: name.to_string(),
            aux,
        };
    }

    pub fn set_parameter_name(&mut self, name: &str, dict: &ParameterDictionary) -> Result<()> {
        self.parameter_id = dict.resolve_id(name)?;
        self.parameter_name = name.to_string();
        Ok(())
    }

    pub fn set_parameter_id(&mut self, id: u32, dict: &ParameterDictionary) -> Result<()> {
        self.parameter_name = dict.resolve_name(id, None)?.to_string();
        self.parameter_id = id;
        Ok(())
    }

    fn read<R: Read + Seek>(
        reader: &mut GeomReader<'_, R>,
        dict: &ParameterDictionary,
        strings: &StringBlock,
    ) -> Result<Self> {
        let record = reader.position();
        let payload: [u8; PAYLOAD_SIZE] = reader.read_array()?;
        let parameter_id = reader.read_u32()?;
        let float_count = reader.read_u32()? as usize;
        let unknown_0x18 = reader.read_u32()?;
        let unknown_0x1c = reader.read_u32()?;

        let parameter_name = dict.resolve_name(parameter_id, Some(record + 0x10))?.to_string();

        let value = match float_count {
            0 => {
                let offset = LittleEndian::read_u64(&payload[..8]);
                let length = LittleEndian::read_u32(&payload[8..12]);
                let aux = LittleEndian::read_u32(&payload[12..]);
                let name = strings.resolve(offset)?;
                if name.len() != length as usize {
                    tracing::warn!(
                        "Texture {name:?} of uniform {parameter_name} records length {length}"
                    );
                }
                UniformValue::Texture { name, aux }
            }
            n if n <= MAX_UNIFORM_FLOATS => {
                let mut values = vec![0.0f32; n];
                LittleEndian::read_f32_into(&payload[..n * 4], &mut values);
                UniformValue::Floats(values)
            }
            n => {
                return Err(Error::InvalidEncoding {
                    offset: Some(record + 0x14),
                    message: format!("uniform float count {n} exceeds {MAX_UNIFORM_FLOATS}"),
                });
            }
        };

        tracing::trace!("Uniform {parameter_name} ({parameter_id:#x}): {value:?}");
        Ok(Self {
            parameter_id,
            parameter_name,
            value,
            unknown_0x18,
            unknown_0x1c,
        })
    }

    fn write<W: Write + Seek>(
        &self,
        writer: &mut GeomWriter<'_, W>,
        strings: &StringTable,
        strings_offset: u64,
    ) -> Result<()> {
        let mut payload = [0u8; PAYLOAD_SIZE];
        match &self.value {
            UniformValue::Floats(values) => {
                if values.is_empty() || values.len() > MAX_UNIFORM_FLOATS {
                    return Err(Error::InvalidEncoding {
                        offset: None,
                        message: format!(
                            "uniform {} holds {} floats",
                            self.parameter_name,
                            values.len()
                        ),
                    });
                }
                LittleEndian::write_f32_into(values, &mut payload[..values.len() * 4]);
            }
            UniformValue::Texture { name, aux } => {
                let offset = strings.offset_of(name).ok_or_else(|| {
                    Error::inconsistent(None, format!("texture {name:?} missing from string table"))
                })?;
                LittleEndian::write_u64(&mut payload[..8], strings_offset + offset);
                LittleEndian::write_u32(&mut payload[8..12], name.len() as u32);
                LittleEndian::write_u32(&mut payload[12..], *aux);
            }
        }
        writer.write_bytes(&payload)?;
        writer.write_u32(self.parameter_id)?;
        writer.write_u32(self.value.float_count())?;
        writer.write_u32(self.unknown_0x18)?;
        writer.write_u32(self.unknown_0x1c)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSetting {
    pub parameter_id: u32,
    pub parameter_name: String,
    pub payload: [u8; PAYLOAD_SIZE],
    pub unknown_0x14: u32,
    pub unknown_0x18: u32,
    pub unknown_0x1c: u32,
}

impl ShaderSetting {
    pub fn new(parameter: &str, payload: [u8; PAYLOAD_SIZE], dict: &ParameterDictionary) -> Result<Self> {
        Ok(Self {
            parameter_id: dict.resolve_id(parameter)?,
            parameter_name: parameter.to_string(),
            payload,
            unknown_0x14: 0,
            unknown_0x18: 0,
            unknown_0x1c: 0,
        })
    }

    pub fn set_parameter_name(&mut self, name: &str, dict: &ParameterDictionary) -> Result<()> {
        self.parameter_id = dict.resolve_id(name)?;
        self.parameter_name = name.to_string();
        Ok(())
    }

    pub fn set_parameter_id(&mut self, id: u32, dict: &ParameterDictionary) -> Result<()> {
        self.parameter_name = dict.resolve_name(id, None)?.to_string();
        self.parameter_id = id;
        Ok(())
    }

    fn read<R: Read + Seek>(
        reader: &mut GeomReader<'_, R>,
        dict: &ParameterDictionary,
    ) -> Result<Self> {
        let record = reader.position();
        let payload = reader.read_array()?;
        let parameter_id = reader.read_u32()?;
        let parameter_name = dict.resolve_name(parameter_id, Some(record + 0x10))?.to_string();
        Ok(Self {
            parameter_id,
            parameter_name,
            payload,
            unknown_0x14: reader.read_u32()?,
            unknown_0x18: reader.read_u32()?,
            unknown_0x1c: reader.read_u32()?,
        })
    }

    fn write<W: Write + Seek>(&self, writer: &mut GeomWriter<'_, W>) -> Result<()> {
        writer.write_bytes(&self.payload)?;
        writer.write_u32(self.parameter_id)?;
        writer.write_u32(self.unknown_0x14)?;
        writer.write_u32(self.unknown_0x18)?;
        writer.write_u32(self.unknown_0x1c)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub name_hash: u32,
    pub shaders: [ShaderName; SHADER_SLOTS],
    pub uniforms: Vec<ShaderUniform>,
    pub settings: Vec<ShaderSetting>,
    pub unknown_0x314: u32,
    pub unknown_0x318: u32,
    pub unknown_0x31c: u32,
    pub unknown_0x324: u16,
    pub unknown_0x326: u16,
}

impl Material {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let mut material = Self::default();
        material.set_name(name);
        material
    }

    pub fn set_name(&mut self, name: &str) {
        self.name_hash = name_hash(name);
        self.name = Some(name.to_string());
    }

    /// Hash written to the file: derived from the name when there is one.
    #[must_use]
    pub fn stored_hash(&self) -> u32 {
        self.name.as_deref().map_or(self.name_hash, name_hash)
    }

    #[must_use]
    pub fn uniform(&self, parameter: &str) -> Option<&ShaderUniform> {
        self.uniforms.iter().find(|u| u.parameter_name == parameter)
    }

    /// Bytes taken by the header plus its records.
    #[must_use]
    pub fn record_size(&self) -> u64 {
        MATERIAL_HEADER_SIZE
            + PARAMETER_RECORD_SIZE * (self.uniforms.len() + self.settings.len()) as u64
    }

    /// Texture names referenced by uniforms, for interning before layout.
    pub fn texture_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.iter().filter_map(|u| u.value.texture_name())
    }

    pub(crate) fn read<R: Read + Seek>(
        reader: &mut GeomReader<'_, R>,
        dict: &ParameterDictionary,
        strings: &StringBlock,
    ) -> Result<Self> {
        let start = reader.position();
        let name_hash = reader.read_u32()?;
        let mut shaders = [ShaderName::default(); SHADER_SLOTS];
        for shader in &mut shaders {
            let mut words = [0u32; WORD_COUNT];
            for word in &mut words {
                *word = reader.read_u32()?;
            }
            *shader = ShaderName(words);
        }
        let unknown_0x314 = reader.read_u32()?;
        let unknown_0x318 = reader.read_u32()?;
        let unknown_0x31c = reader.read_u32()?;
        let uniform_count = reader.read_u8()?;
        let setting_count = reader.read_u8()?;
        reader.skip(2)?;
        let unknown_0x324 = reader.read_u16()?;
        let unknown_0x326 = reader.read_u16()?;

        tracing::trace!(
            "Material {name_hash:#010x} at {start:#x}: {uniform_count} uniforms, {setting_count} settings"
        );

        let uniforms = (0..uniform_count)
            .map(|_| ShaderUniform::read(reader, dict, strings))
            .collect::<Result<Vec<_>>>()?;
        let settings = (0..setting_count)
            .map(|_| ShaderSetting::read(reader, dict))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: None,
            name_hash,
            shaders,
            uniforms,
            settings,
            unknown_0x314,
            unknown_0x318,
            unknown_0x31c,
            unknown_0x324,
            unknown_0x326,
        })
    }

    pub(crate) fn write<W: Write + Seek>(
        &self,
        writer: &mut GeomWriter<'_, W>,
        strings: &StringTable,
        strings_offset: u64,
    ) -> Result<()> {
        let uniform_count = u8::try_from(self.uniforms.len()).map_err(|_| {
            Error::out_of_range(None, "uniform", self.uniforms.len() as u64, usize::from(u8::MAX))
        })?;
        let setting_count = u8::try_from(self.settings.len()).map_err(|_| {
            Error::out_of_range(None, "setting", self.settings.len() as u64, usize::from(u8::MAX))
        })?;

        writer.write_u32(self.stored_hash())?;
        for shader in &self.shaders {
            for &word in shader.words() {
                writer.write_u32(word)?;
            }
        }
        writer.write_u32(self.unknown_0x314)?;
        writer.write_u32(self.unknown_0x318)?;
        writer.write_u32(self.unknown_0x31c)?;
        writer.write_u8(uniform_count)?;
        writer.write_u8(setting_count)?;
        writer.write_zeros(2)?;
        writer.write_u16(self.unknown_0x324)?;
        writer.write_u16(self.unknown_0x326)?;

        for uniform in &self.uniforms {
            uniform.write(writer, strings, strings_offset)?;
        }
        for setting in &self.settings {
            setting.write(writer)?;
        }
        Ok(())
    }
}
