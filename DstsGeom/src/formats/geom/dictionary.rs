//! Shader parameter id/name dictionary.
//!
//! The dictionary is built once by the caller and then only read, so one
//! instance can be shared across threads decoding different documents.

use std::collections::HashMap;
use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One dictionary entry as it appears in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterDictionary {
    names: HashMap<u32, String>,
    ids: HashMap<String, u32>,
}

impl ParameterDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, name)` pairs. Later duplicates replace earlier ones.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let mut dict = Self::new();
        for (id, name) in pairs {
            let name = name.into();
            dict.ids.insert(name.clone(), id);
            dict.names.insert(id, name);
        }
        dict
    }

    /// Parse a binary table of `u32 id` + NUL-padded name records.
    pub fn from_fixed_records<R: Read>(mut reader: R, name_len: usize) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let record_len = 4 + name_len;
        let records = data.chunks_exact(record_len);
        if !records.remainder().is_empty() {
            let complete = data.len() / record_len * record_len;
            return Err(Error::TruncatedInput {
                offset: complete as u64,
                len: record_len,
            });
        }

        let mut pairs = Vec::with_capacity(data.len() / record_len);
        for (index, record) in records.enumerate() {
            let id = LittleEndian::read_u32(&record[..4]);
            let field = &record[4..];
            let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
            let name = std::str::from_utf8(&field[..end]).map_err(|e| Error::InvalidEncoding {
                offset: Some((index * record_len + 4) as u64),
                message: format!("parameter name is not valid UTF-8: {e}"),
            })?;
            pairs.push((id, name.to_string()));
        }

        tracing::debug!("Loaded {} shader parameters", pairs.len());
        Ok(Self::from_pairs(pairs))
    }

    /// Parse `[{"id": 1, "name": "DiffuseColor"}, ...]`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<ParameterEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let entries: Vec<ParameterEntry> = serde_json::from_reader(reader)?;
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: Vec<ParameterEntry>) -> Self {
        Self::from_pairs(entries.into_iter().map(|e| (e.id, e.name)))
    }

    /// Entries sorted by id, ready for `serde_json`.
    #[must_use]
    pub fn entries(&self) -> Vec<ParameterEntry> {
        let mut entries: Vec<ParameterEntry> = self
            .names
            .iter()
            .map(|(&id, name)| ParameterEntry {
                id,
                name: name.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    #[must_use]
    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Like [`name_of`](Self::name_of), failing on unknown ids.
    pub fn resolve_name(&self, id: u32, offset: Option<u64>) -> Result<&str> {
        self.name_of(id).ok_or_else(|| Error::InvalidEncoding {
            offset,
            message: format!("unknown shader parameter id {id:#x}"),
        })
    }

    /// Like [`id_of`](Self::id_of), failing on unknown names.
    pub fn resolve_id(&self, name: &str) -> Result<u32> {
        self.id_of(name).ok_or_else(|| Error::InvalidEncoding {
            offset: None,
            message: format!("unknown shader parameter {name:?}"),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_ways() {
        let dict = ParameterDictionary::from_pairs([(1, "DiffuseColor"), (0x20, "Bumpiness")]);
        assert_eq!(dict.name_of(0x20), Some("Bumpiness"));
        assert_eq!(dict.id_of("DiffuseColor"), Some(1));
        assert_eq!(dict.len(), 2);
        assert!(matches!(
            dict.resolve_name(7, Some(0x400)),
            Err(Error::InvalidEncoding { offset: Some(0x400), .. })
        ));
        assert!(dict.resolve_id("Missing").is_err());
    }

    #[test]
    fn test_fixed_records() {
        let mut data = Vec::new();
        for (id, name) in [(5u32, "Glossiness"), (9, "EmissiveColor")] {
            data.extend_from_slice(&id.to_le_bytes());
            let mut field = [0u8; 16];
            field[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(&field);
        }
        let dict = ParameterDictionary::from_fixed_records(data.as_slice(), 16).unwrap();
        assert_eq!(dict.name_of(9), Some("EmissiveColor"));

        data.pop();
        let err = ParameterDictionary::from_fixed_records(data.as_slice(), 16).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput { offset: 20, .. }));
    }

    #[test]
    fn test_json() {
        let dict = ParameterDictionary::from_json_str(
            r#"[{"id": 3, "name": "AlphaRef"}, {"id": 1, "name": "DiffuseColor"}]"#,
        )
        .unwrap();
        assert_eq!(dict.id_of("AlphaRef"), Some(3));
        let entries = dict.entries();
        assert_eq!(entries[0].name, "DiffuseColor");

        let json = serde_json::to_string(&entries).unwrap();
        let again = ParameterDictionary::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(again.entries(), entries);
    }
}
