//! Base-46 text form of shader names.
//!
//! A shader name is stored as 14 `u32` words. Each word prints as six digits
//! of a 46-symbol alphabet, and the groups are joined with `_` after every
//! third one.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ALPHABET: &[u8; 46] = b"0123456789abcdefghijklmnopqrstuvwxyz#$[]{}+@=&";
const BASE: u32 = 46;
/// Characters per encoded word.
pub const GROUP_LEN: usize = 6;
/// Words per shader name.
pub const WORD_COUNT: usize = 14;
const GROUPS_PER_SEPARATOR: usize = 3;

fn digit_value(c: u8) -> Option<u32> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u32)
}

/// Encode one word as exactly six base-46 digits, most significant first.
#[must_use]
pub fn encode_word(mut value: u32) -> String {
    let mut digits = [ALPHABET[0]; GROUP_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(value % BASE) as usize];
        value /= BASE;
    }
    digits.iter().map(|&b| b as char).collect()
}

/// Decode six base-46 digits back into a word.
pub fn decode_word(text: &str) -> Result<u32> {
    if text.len() != GROUP_LEN {
        return Err(Error::InvalidEncoding {
            offset: None,
            message: format!("expected {GROUP_LEN} base-46 digits, got {text:?}"),
        });
    }
    text.bytes().try_fold(0u32, |acc, c| {
        let digit = digit_value(c).ok_or_else(|| Error::InvalidEncoding {
            offset: None,
            message: format!("{:?} is not a base-46 digit", c as char),
        })?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| Error::InvalidEncoding {
                offset: None,
                message: format!("{text:?} does not fit in 32 bits"),
            })
    })
}

/// The 14 words naming one shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderName(pub [u32; WORD_COUNT]);

impl ShaderName {
    #[must_use]
    pub fn words(&self) -> &[u32; WORD_COUNT] {
        &self.0
    }

    /// Encoded text, 14 groups with `_` after every third.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(WORD_COUNT * (GROUP_LEN + 1));
        for (i, &word) in self.0.iter().enumerate() {
            if i != 0 && i % GROUPS_PER_SEPARATOR == 0 {
                out.push('_');
            }
            out.push_str(&encode_word(word));
        }
        out
    }

    /// Parse the encoded text. Separators are ignored wherever they appear.
    pub fn from_text(text: &str) -> Result<Self> {
        let digits: String = text.chars().filter(|&c| c != '_').collect();
        if digits.len() != WORD_COUNT * GROUP_LEN || !digits.is_ascii() {
            return Err(Error::InvalidEncoding {
                offset: None,
                message: format!(
                    "shader name needs {} base-46 digits, got {:?}",
                    WORD_COUNT * GROUP_LEN,
                    text
                ),
            });
        }

        let mut words = [0u32; WORD_COUNT];
        for (word, group) in words.iter_mut().zip(digits.as_bytes().chunks_exact(GROUP_LEN)) {
            // ASCII was checked above, so every group is valid UTF-8.
            let group = std::str::from_utf8(group).unwrap_or_default();
            *word = decode_word(group)?;
        }
        Ok(Self(words))
    }
}

impl fmt::Display for ShaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl FromStr for ShaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_fixed_width() {
        assert_eq!(encode_word(0), "000000");
        assert_eq!(encode_word(45), "00000&");
        assert_eq!(encode_word(46), "000010");
        assert_eq!(encode_word(u32::MAX).len(), 6);
    }

    #[test]
    fn test_word_round_trip() {
        for n in [0, 1, 45, 46, 2115, 97_336, 0x1234_5678, u32::MAX - 1, u32::MAX] {
            assert_eq!(decode_word(&encode_word(n)).unwrap(), n);
        }
    }

    #[test]
    fn test_decode_rejects_foreign_characters() {
        assert!(matches!(
            decode_word("00000A"),
            Err(Error::InvalidEncoding { offset: None, .. })
        ));
        assert!(decode_word("0000").is_err());
        // 46^6 exceeds u32::MAX, so the largest digits overflow.
        assert!(decode_word("&&&&&&").is_err());
    }

    #[test]
    fn test_shader_name_text() {
        let mut words = [0u32; WORD_COUNT];
        words[0] = 1;
        words[13] = 46;
        let name = ShaderName(words);
        let text = name.to_text();
        assert_eq!(text.len(), 84 + 4);
        assert_eq!(text.matches('_').count(), 4);
        assert!(text.starts_with("000001000000000000_"));
        assert!(text.ends_with("_000000000010"));
        assert_eq!(ShaderName::from_text(&text).unwrap(), name);
        assert_eq!(text.parse::<ShaderName>().unwrap(), name);
    }

    #[test]
    fn test_shader_name_wrong_length() {
        assert!(ShaderName::from_text("000000_000000").is_err());
    }
}
