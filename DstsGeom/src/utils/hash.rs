//! Hashing utilities

/// Name checksum stored in place of bone, mesh and material names.
///
/// This is the reflected CRC-32 (poly `0x04C11DB7`, init `0xFFFFFFFF`) but the
/// game skips the final xor, so the value is the bitwise complement of the
/// standard CRC-32.
#[must_use]
pub fn name_hash(name: &str) -> u32 {
    !crc32fast::hash(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_hash() {
        // Standard CRC-32 check value is 0xCBF43926
        assert_eq!(name_hash("123456789"), !0xCBF43926);
        assert_eq!(name_hash(""), 0xFFFFFFFF);
    }
}
