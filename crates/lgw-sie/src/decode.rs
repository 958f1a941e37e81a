// SPDX-License-Identifier: MIT OR Apache-2.0
//! Byte-level decoding of SIE files.
//!
//! Files arrive in IBM code page 437 (the SIE standard), UTF-8, or UTF-8
//! with a byte-order mark.  Detection is by byte pattern: a BOM wins, then
//! valid multi-byte UTF-8, then CP437.  Invalid input produces a diagnostic
//! error; there is no silent substitution character.

use thiserror::Error;

/// Decoding failures, with the offending byte offset where known.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A UTF-8 BOM was present but the remaining bytes are not valid UTF-8.
    #[error("file declares UTF-8 (BOM) but byte {offset} starts an invalid sequence")]
    InvalidUtf8AfterBom {
        /// Offset of the first invalid byte, counted after the BOM.
        offset: usize,
    },
    /// A UTF-16 BOM was found; SIE files are never UTF-16.
    #[error("UTF-16 byte-order mark found; SIE files must be CP437 or UTF-8")]
    Utf16NotSupported,
    /// A control byte that cannot occur in SIE text.
    #[error("control byte 0x{byte:02x} at offset {offset}")]
    ControlByte {
        /// The offending byte.
        byte: u8,
        /// Byte offset in the input.
        offset: usize,
    },
    /// The file is empty.
    #[error("empty input")]
    Empty,
}

/// Decode raw SIE bytes into normalized UTF-8 text.
pub fn decode_sie_bytes(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return Err(DecodeError::Utf16NotSupported);
    }

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let text = std::str::from_utf8(rest)
            .map_err(|e| DecodeError::InvalidUtf8AfterBom {
                offset: e.valid_up_to(),
            })?;
        check_controls(text.as_bytes())?;
        return Ok(text.to_owned());
    }

    // No BOM: prefer UTF-8 when the bytes are valid UTF-8 (covers pure
    // ASCII), otherwise fall back to CP437 where every byte has a mapping.
    if let Ok(text) = std::str::from_utf8(bytes) {
        check_controls(bytes)?;
        return Ok(text.to_owned());
    }

    check_controls(bytes)?;
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b < 0x80 {
            out.push(b as char);
        } else {
            out.push(CP437_HIGH[(b - 0x80) as usize]);
        }
    }
    Ok(out)
}

fn check_controls(bytes: &[u8]) -> Result<(), DecodeError> {
    for (offset, &b) in bytes.iter().enumerate() {
        if b < 0x20 && b != b'\t' && b != b'\r' && b != b'\n' {
            return Err(DecodeError::ControlByte { byte: b, offset });
        }
    }
    Ok(())
}

/// The upper half of IBM code page 437 (0x80..=0xFF).
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', // 0x80
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', // 0x90
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', // 0xA0
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', // 0xB0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', // 0xC0
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', // 0xD0
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', // 0xE0
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}', // 0xF0
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_passes_through() {
        let text = decode_sie_bytes(b"#FNAMN \"Test AB\"\r\n").unwrap();
        assert_eq!(text, "#FNAMN \"Test AB\"\r\n");
    }

    #[test]
    fn cp437_swedish_letters() {
        // "Fåglarnas Förening" with å=0x86, ö=0x94.
        let bytes = b"F\x86glarnas F\x94rening";
        assert_eq!(decode_sie_bytes(bytes).unwrap(), "Fåglarnas Förening");
    }

    #[test]
    fn cp437_uppercase_swedish_letters() {
        // Å=0x8F Ä=0x8E Ö=0x99.
        let bytes = b"\x8F\x8E\x99";
        assert_eq!(decode_sie_bytes(bytes).unwrap(), "ÅÄÖ");
    }

    #[test]
    fn utf8_without_bom_is_kept() {
        let text = "#FNAMN \"Räkenskap AB\"";
        assert_eq!(decode_sie_bytes(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("#FNAMN \"Åre AB\"".as_bytes());
        assert_eq!(decode_sie_bytes(&bytes).unwrap(), "#FNAMN \"Åre AB\"");
    }

    #[test]
    fn bom_with_invalid_utf8_is_diagnosed() {
        let bytes = vec![0xEF, 0xBB, 0xBF, b'a', 0xFF, b'b'];
        assert_eq!(
            decode_sie_bytes(&bytes).unwrap_err(),
            DecodeError::InvalidUtf8AfterBom { offset: 1 }
        );
    }

    #[test]
    fn utf16_bom_is_rejected() {
        assert_eq!(
            decode_sie_bytes(&[0xFF, 0xFE, 0x41, 0x00]).unwrap_err(),
            DecodeError::Utf16NotSupported
        );
    }

    #[test]
    fn stray_control_byte_is_diagnosed() {
        let err = decode_sie_bytes(b"#KONTO\x011910").unwrap_err();
        assert_eq!(
            err,
            DecodeError::ControlByte {
                byte: 0x01,
                offset: 6
            }
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(decode_sie_bytes(b"").unwrap_err(), DecodeError::Empty);
    }

    #[test]
    fn every_high_byte_decodes() {
        let bytes: Vec<u8> = (0x80..=0xFFu8).collect();
        let text = decode_sie_bytes(&bytes).unwrap();
        assert_eq!(text.chars().count(), 128);
    }
}
