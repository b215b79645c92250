//! Joliet detection and UCS-2 identifier decoding.
//!
//! A Supplementary Volume Descriptor is a Joliet volume when its escape
//! sequence area opens with one of `%/@`, `%/C`, `%/E` (levels 1–3).
//! Identifiers on such a volume are UCS-2, big-endian, with a small set of
//! characters the specification forbids outright.

use ofs_types::ParseError;
use serde::{Deserialize, Serialize};

/// Joliet interchange level, from the SVD escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JolietLevel {
    Level1,
    Level2,
    Level3,
}

impl JolietLevel {
    /// Detect the level from a 32-byte escape sequence area.
    #[must_use]
    pub fn from_escape_area(escapes: &[u8; 32]) -> Option<Self> {
        match &escapes[..3] {
            b"%/@" => Some(Self::Level1),
            b"%/C" => Some(Self::Level2),
            b"%/E" => Some(Self::Level3),
            _ => None,
        }
    }
}

/// Whether Joliet forbids `c` in identifiers.
#[must_use]
pub fn is_forbidden(c: char) -> bool {
    c <= '\u{1F}' || matches!(c, '*' | '/' | ':' | ';' | '?' | '\\')
}

/// Decode a UCS-2BE record identifier, strictly.
///
/// Fails on odd byte length, unpaired surrogates, and any forbidden
/// character. Trailing NUL padding is dropped before validation.
pub fn decode_identifier(bytes: &[u8]) -> Result<String, ParseError> {
    if bytes.len() % 2 != 0 {
        return Err(ParseError::DecodeError {
            field: "joliet_identifier",
            reason: "odd byte length",
        });
    }

    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    let mut name = String::with_capacity(bytes.len() / 2);
    for decoded in char::decode_utf16(units) {
        let c = decoded.map_err(|_| ParseError::DecodeError {
            field: "joliet_identifier",
            reason: "unpaired surrogate",
        })?;
        name.push(c);
    }

    while name.ends_with('\0') {
        name.pop();
    }

    if let Some(bad) = name.chars().find(|c| is_forbidden(*c)) {
        return Err(ParseError::ForbiddenCharacter {
            field: "joliet_identifier",
            codepoint: bad as u32,
        });
    }

    Ok(name)
}

/// Encode an identifier as UCS-2BE bytes, the inverse of
/// [`decode_identifier`] for names within the Joliet character set.
#[must_use]
pub fn encode_identifier(name: &str) -> Vec<u8> {
    name.encode_utf16()
        .flat_map(|unit| unit.to_be_bytes())
        .collect()
}

/// Lossy UCS-2BE decode for descriptor text fields (volume identifiers and
/// friends), where bad units degrade to replacement characters and trailing
/// space/NUL padding is trimmed.
#[must_use]
pub fn ucs2_lossy(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>()
        .trim_end_matches([' ', '\0'])
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_sequences_select_levels() {
        let mut escapes = [0_u8; 32];
        escapes[..3].copy_from_slice(b"%/@");
        assert_eq!(
            JolietLevel::from_escape_area(&escapes),
            Some(JolietLevel::Level1)
        );
        escapes[..3].copy_from_slice(b"%/C");
        assert_eq!(
            JolietLevel::from_escape_area(&escapes),
            Some(JolietLevel::Level2)
        );
        escapes[..3].copy_from_slice(b"%/E");
        assert_eq!(
            JolietLevel::from_escape_area(&escapes),
            Some(JolietLevel::Level3)
        );
        escapes[..3].copy_from_slice(b"%/X");
        assert_eq!(JolietLevel::from_escape_area(&escapes), None);
    }

    #[test]
    fn decode_round_trips_unicode_names() {
        let encoded = encode_identifier("Résumé.pdf");
        assert_eq!(decode_identifier(&encoded).expect("decode"), "Résumé.pdf");
        // Re-encoding a decoded identifier is bit-identical.
        assert_eq!(
            encode_identifier(&decode_identifier(&encoded).expect("decode")),
            encoded
        );
    }

    #[test]
    fn decode_rejects_odd_length() {
        assert!(matches!(
            decode_identifier(&[0x00, 0x41, 0x00]),
            Err(ParseError::DecodeError { .. })
        ));
    }

    #[test]
    fn decode_rejects_forbidden_characters() {
        for bad in ['*', '/', ':', ';', '?', '\\', '\u{1}'] {
            let mut name = String::from("file");
            name.push(bad);
            let err = decode_identifier(&encode_identifier(&name)).expect_err("forbidden");
            assert_eq!(
                err,
                ParseError::ForbiddenCharacter {
                    field: "joliet_identifier",
                    codepoint: bad as u32,
                }
            );
        }
    }

    #[test]
    fn decode_rejects_unpaired_surrogate() {
        let bytes = [0xD8, 0x00, 0x00, 0x41];
        assert!(matches!(
            decode_identifier(&bytes),
            Err(ParseError::DecodeError { .. })
        ));
    }

    #[test]
    fn decode_trims_trailing_nul_padding() {
        let mut encoded = encode_identifier("ABC");
        encoded.extend_from_slice(&[0, 0]);
        assert_eq!(decode_identifier(&encoded).expect("decode"), "ABC");
    }

    #[test]
    fn lossy_text_replaces_and_trims() {
        let mut bytes = encode_identifier("VOL");
        bytes.extend(encode_identifier("     "));
        assert_eq!(ucs2_lossy(&bytes), "VOL");
        let unpaired = [0xD8, 0x00];
        assert_eq!(ucs2_lossy(&unpaired), "\u{FFFD}");
    }
}
