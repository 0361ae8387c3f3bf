//! Byte-to-text decoding for log input.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::EncodingError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Text encodings the normalizer can decode
///
/// Names are matched like the `--encoding` flag: case, `-` and `_` are
/// ignored, so `UTF-8`, `utf8` and `Utf_8` are the same encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// ISO-8859-1; every byte maps to one char, so decoding cannot fail
    Latin1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Guess the encoding from a byte-order mark, defaulting to UTF-8
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(UTF16LE_BOM) {
            Self::Utf16Le
        } else if bytes.starts_with(UTF16BE_BOM) {
            Self::Utf16Be
        } else {
            Self::Utf8
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        match name.as_str() {
            "utf8" => Ok(Self::Utf8),
            "utf16" | "utf16le" => Ok(Self::Utf16Le),
            "utf16be" => Ok(Self::Utf16Be),
            "latin1" | "iso88591" | "l1" => Ok(Self::Latin1),
            _ => Err(EncodingError::Unsupported(s.to_string())),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = EncodingError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<Encoding> for String {
    fn from(encoding: Encoding) -> Self {
        encoding.as_str().to_string()
    }
}

/// Decode `bytes` as text
///
/// Without a declared encoding the byte-order mark decides, falling back to
/// UTF-8. A BOM matching the encoding is dropped.
pub fn decode(bytes: &[u8], declared: Option<Encoding>) -> Result<Cow<'_, str>, EncodingError> {
    let encoding = declared.unwrap_or_else(|| Encoding::sniff(bytes));
    match encoding {
        Encoding::Utf8 => {
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            let bom_len = bytes.len() - body.len();
            std::str::from_utf8(body)
                .map(Cow::Borrowed)
                .map_err(|e| EncodingError::InvalidSequence {
                    encoding,
                    offset: bom_len + e.valid_up_to(),
                })
        }
        Encoding::Utf16Le => decode_utf16(bytes, UTF16LE_BOM, encoding, u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(bytes, UTF16BE_BOM, encoding, u16::from_be_bytes),
        Encoding::Latin1 => Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
    }
}

fn decode_utf16(
    bytes: &[u8],
    bom: &[u8],
    encoding: Encoding,
    to_unit: fn([u8; 2]) -> u16,
) -> Result<Cow<'static, str>, EncodingError> {
    let body = bytes.strip_prefix(bom).unwrap_or(bytes);
    let bom_len = bytes.len() - body.len();
    if body.len() % 2 != 0 {
        return Err(EncodingError::Truncated {
            encoding,
            len: bytes.len(),
        });
    }

    let units = body.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    let mut text = String::with_capacity(body.len() / 2);
    let mut offset = bom_len;
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => {
                text.push(c);
                offset += c.len_utf16() * 2;
            }
            Err(_) => return Err(EncodingError::InvalidSequence { encoding, offset }),
        }
    }
    Ok(Cow::Owned(text))
}
