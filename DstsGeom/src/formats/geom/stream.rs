//! Positioned little-endian reader and writer over seekable byte sources.
//!
//! Every section of a geom file is reached through an offset field, so both
//! directions work on `Read + Seek` / `Write + Seek` rather than plain streams.
//! Positions are tracked locally so that failures can report where they
//! happened without an extra `stream_position` call per read.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

fn map_read_error(err: io::Error, offset: u64, len: usize) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedInput { offset, len }
    } else {
        Error::Io(err)
    }
}

/// Reader that remembers its absolute position.
pub(crate) struct GeomReader<'r, R> {
    inner: &'r mut R,
    pos: u64,
    len: u64,
}

impl<'r, R: Read + Seek> GeomReader<'r, R> {
    pub fn new(inner: &'r mut R) -> Result<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self { inner, pos, len })
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, len: u64) -> Result<()> {
        self.seek_to(self.pos + len)
    }

    /// Total length of the source, measured once when the reader was created.
    pub fn source_len(&self) -> u64 {
        self.len
    }

    /// Fail unless `len` more bytes exist past the cursor.
    ///
    /// Called before any buffer is sized from a count stored in the file.
    pub fn ensure_available(&self, len: u64) -> Result<()> {
        if self.pos.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                len: usize::try_from(len).unwrap_or(usize::MAX),
            });
        }
        Ok(())
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.pos;
        self.inner
            .read_exact(buf)
            .map_err(|e| map_read_error(e, offset, buf.len()))?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_available(len as u64)?;
        let mut buf = vec![0u8; len];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let offset = self.pos;
        let v = self.inner.read_u8().map_err(|e| map_read_error(e, offset, 1))?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let offset = self.pos;
        let v = self
            .inner
            .read_u16::<LittleEndian>()
            .map_err(|e| map_read_error(e, offset, 2))?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let offset = self.pos;
        let v = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(|e| map_read_error(e, offset, 4))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let offset = self.pos;
        let v = self
            .inner
            .read_u64::<LittleEndian>()
            .map_err(|e| map_read_error(e, offset, 8))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let offset = self.pos;
        let v = self
            .inner
            .read_f32::<LittleEndian>()
            .map_err(|e| map_read_error(e, offset, 4))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0.0f32; N];
        for v in &mut out {
            *v = self.read_f32()?;
        }
        Ok(out)
    }
}

/// Writer that remembers its absolute position.
pub(crate) struct GeomWriter<'w, W> {
    inner: &'w mut W,
    pos: u64,
}

impl<'w, W: Write + Seek> GeomWriter<'w, W> {
    pub fn new(inner: &'w mut W) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Advance to the next multiple of `alignment` relative to `anchor`.
    ///
    /// Padding is realised by seeking; when the cursor moved, the last byte of
    /// the gap is written as zero so the sink actually grows to the new length.
    pub fn align(&mut self, anchor: u64, alignment: u64) -> Result<()> {
        let rel = self.pos - anchor;
        let rem = rel % alignment;
        if rem != 0 {
            let target = self.pos + (alignment - rem);
            self.seek_to(target - 1)?;
            self.write_u8(0)?;
        }
        Ok(())
    }

    /// Fill with zeros up to `target`, which must not lie behind the cursor.
    pub fn pad_to(&mut self, target: u64) -> Result<()> {
        debug_assert!(target >= self.pos, "pad_to target behind cursor");
        if target > self.pos {
            self.seek_to(target - 1)?;
            self.write_u8(0)?;
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_zeros(&mut self, len: usize) -> Result<()> {
        self.write_bytes(&vec![0u8; len])
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.inner.write_u8(v)?;
        self.pos += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.pos += 2;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(v)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.inner.write_f32::<LittleEndian>(v)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) -> Result<()> {
        for &v in values {
            self.write_f32(v)?;
        }
        Ok(())
    }
}
