//! Character encodings for CSV files.
//!
//! CSV text is handled as UTF-8 internally and transcoded at the file
//! boundary. JSON output is always UTF-8 and never passes through here.

use crate::{Error, Result};
use encoding_rs::{EUC_JP, Encoding, SHIFT_JIS, UTF_16BE, UTF_16LE};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// External text encoding of a CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// UTF-8 (BOM stripped on input, never written).
    #[default]
    Utf8,
    /// UTF-16 little-endian without a byte-order mark; a mark on input is skipped.
    Utf16,
    /// UTF-16 big-endian with a byte-order mark.
    Utf16BeWithSignature,
    /// UTF-16 little-endian with a byte-order mark.
    Utf16LeWithSignature,
    /// Shift-JIS.
    ShiftJis,
    /// EUC-JP.
    EucJp,
}

impl TextEncoding {
    /// Returns all supported encodings.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Utf8,
            Self::Utf16,
            Self::Utf16BeWithSignature,
            Self::Utf16LeWithSignature,
            Self::ShiftJis,
            Self::EucJp,
        ]
    }

    /// Returns the configuration name of the encoding.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16 => "utf-16",
            Self::Utf16BeWithSignature => "utf-16be-with-signature",
            Self::Utf16LeWithSignature => "utf-16le-with-signature",
            Self::ShiftJis => "sjis",
            Self::EucJp => "euc-jp",
        }
    }

    /// Encodes UTF-8 text into bytes of this encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text has characters the
    /// encoding cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Utf16 => Ok(encode_utf16(text, None, u16::to_le_bytes)),
            Self::Utf16LeWithSignature => {
                Ok(encode_utf16(text, Some(UTF16LE_BOM), u16::to_le_bytes))
            },
            Self::Utf16BeWithSignature => {
                Ok(encode_utf16(text, Some(UTF16BE_BOM), u16::to_be_bytes))
            },
            Self::ShiftJis => encode_legacy(SHIFT_JIS, text),
            Self::EucJp => encode_legacy(EUC_JP, text),
        }
    }

    /// Decodes bytes of this encoding into UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the bytes are malformed, or if a
    /// `-with-signature` encoding does not find its own byte-order mark.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(body.to_vec())
                    .map_err(|e| Error::InvalidInput(format!("input is not valid utf-8: {e}")))
            },
            Self::Utf16 => {
                let body = bytes.strip_prefix(UTF16LE_BOM).unwrap_or(bytes);
                decode_strict(UTF_16LE, body, *self)
            },
            Self::Utf16LeWithSignature => decode_signed(bytes, UTF16LE_BOM, UTF_16LE, *self),
            Self::Utf16BeWithSignature => decode_signed(bytes, UTF16BE_BOM, UTF_16BE, *self),
            Self::ShiftJis => decode_strict(SHIFT_JIS, bytes, *self),
            Self::EucJp => decode_strict(EUC_JP, bytes, *self),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|e| e.as_str() == name)
            .ok_or_else(|| Error::UnsupportedEncoding(s.to_string()))
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn encode_utf16(text: &str, bom: Option<&[u8]>, to_bytes: fn(u16) -> [u8; 2]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    if let Some(bom) = bom {
        out.extend_from_slice(bom);
    }
    for unit in text.encode_utf16() {
        out.extend_from_slice(&to_bytes(unit));
    }
    out
}

fn encode_legacy(encoding: &'static Encoding, text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_unmappable) = encoding.encode(text);
    if had_unmappable {
        return Err(Error::InvalidInput(format!(
            "text contains characters that cannot be written as {}",
            encoding.name()
        )));
    }
    Ok(bytes.into_owned())
}

fn decode_signed(
    bytes: &[u8],
    bom: &[u8],
    encoding: &'static Encoding,
    label: TextEncoding,
) -> Result<String> {
    if let Some(body) = bytes.strip_prefix(bom) {
        return decode_strict(encoding, body, label);
    }
    let problem = if bytes.starts_with(UTF16LE_BOM) || bytes.starts_with(UTF16BE_BOM) {
        "has the opposite byte-order mark"
    } else {
        "has no byte-order mark"
    };
    Err(Error::InvalidInput(format!("{label} input {problem}")))
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8], label: TextEncoding) -> Result<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
        .ok_or_else(|| Error::InvalidInput(format!("input is not valid {label}")))
}
