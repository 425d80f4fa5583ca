//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! String table management for the geom strings block

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Deduplicating, append-only interner for NUL-terminated names.
///
/// Offset 0 always holds the empty string.
#[derive(Debug, Clone)]
pub struct StringTable {
    data: Vec<u8>,
    offsets: HashMap<String, u64>,
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        let mut offsets = HashMap::new();
        offsets.insert(String::new(), 0);
        StringTable {
            data: vec![0],
            offsets,
        }
    }

    /// Add a string to the table, returns its offset within the block
    pub fn add(&mut self, s: &str) -> u64 {
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }

        let offset = self.data.len() as u64;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }

    /// Get offset of a previously added string
    #[must_use]
    pub fn offset_of(&self, s: &str) -> Option<u64> {
        self.offsets.get(s).copied()
    }

    /// Raw block contents, ready to be written
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of distinct strings, including the empty string
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Read the name starting at `position` out of a loaded strings block.
    ///
    /// `block_start` is the source position of `block[0]`; both positions are
    /// absolute so errors point into the source.
    pub fn resolve(block: &[u8], block_start: u64, position: u64) -> Result<String> {
        let block_len = block.len();
        let Some(start) = position
            .checked_sub(block_start)
            .map(|rel| rel as usize)
            .filter(|&rel| rel < block_len)
        else {
            return Err(Error::out_of_range(
                Some(position),
                "string",
                position,
                block_len,
            ));
        };

        let tail = &block[start..];
        let end = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::TruncatedInput {
                offset: position,
                len: tail.len() + 1,
            })?;

        String::from_utf8(tail[..end].to_vec()).map_err(|e| Error::InvalidEncoding {
            offset: Some(position),
            message: format!("name is not valid UTF-8: {e}"),
        })
    }
}

/// A strings block read from a source, for resolving name offsets.
///
/// Name offsets in a document are relative to the document base; `start`
/// and `base` are absolute positions in the source.
#[derive(Debug, Clone, Default)]
pub(crate) struct StringBlock {
    pub bytes: Vec<u8>,
    pub start: u64,
    pub base: u64,
}

impl StringBlock {
    pub fn resolve(&self, offset: u64) -> Result<String> {
        StringTable::resolve(&self.bytes, self.start, self.base + offset)
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_is_preregistered() {
        let mut table = StringTable::new();
        assert_eq!(table.add(""), 0);
        assert_eq!(table.as_bytes(), &[0]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.add("bone_root");
        let b = table.add("mat_body");
        assert_eq!(a, 1);
        assert_eq!(b, 1 + "bone_root".len() as u64 + 1);
        assert_eq!(table.add("bone_root"), a);
        assert_eq!(table.offset_of("mat_body"), Some(b));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_resolve_scans_to_terminator() {
        let mut table = StringTable::new();
        let a = table.add("alpha");
        let b = table.add("beta");
        let block = table.as_bytes();
        assert_eq!(StringTable::resolve(block, 0x100, 0x100 + a).unwrap(), "alpha");
        assert_eq!(StringTable::resolve(block, 0x100, 0x100 + b).unwrap(), "beta");
        assert_eq!(StringTable::resolve(block, 0x100, 0x100).unwrap(), "");
    }

    #[test]
    fn test_resolve_rejects_outside_block() {
        let table = StringTable::new();
        let err = StringTable::resolve(table.as_bytes(), 0x100, 0x80).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { what: "string", .. }));
        let err = StringTable::resolve(table.as_bytes(), 0x100, 0x101).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn test_resolve_missing_terminator() {
        let err = StringTable::resolve(b"abc", 0, 1).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { offset: 1, .. }));
    }
}
