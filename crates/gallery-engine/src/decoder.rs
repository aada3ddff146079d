//! Turns raw EXIF tag values into cleaned text.

use anyhow::{bail, Context, Result};

use crate::tiff::TagValue;

const ASCII_HEADER: &[u8] = b"ASCII\0\0\0";
const UNICODE_HEADER: &[u8] = b"UNICODE\0";
const EXIF_HEADER: &[u8] = b"Exif\0\0";

const USER_COMMENT_HEADERS: [&[u8]; 4] = [
    ASCII_HEADER,
    UNICODE_HEADER,
    b"JIS\0\0\0\0\0",
    b"\0\0\0\0\0\0\0\0",
];
const USER_COMMENT_MARKERS: [&str; 3] = ["UNICODE", "ASCII", "JIS"];
/// Bytes inspected when guessing the UserComment text width.
const WIDTH_SAMPLE_LEN: usize = 20;
const BYTE_ORDER_SAMPLE_UNITS: usize = 64;

const LABEL_PREFIXES: [&str; 2] = ["Workflow:", "Prompt:"];

/// EXIF slots that may carry generation metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagSlot {
    ImageDescription,
    Make,
    Model,
    Copyright,
    UserComment,
}

impl TagSlot {
    pub const ALL: [TagSlot; 5] = [
        Self::ImageDescription,
        Self::Make,
        Self::Model,
        Self::Copyright,
        Self::UserComment,
    ];

    pub fn id(self) -> u16 {
        match self {
            Self::ImageDescription => 0x010e,
            Self::Make => 0x010f,
            Self::Model => 0x0110,
            Self::Copyright => 0x8298,
            Self::UserComment => 0x9286,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ImageDescription => "ImageDescription",
            Self::Make => "Make",
            Self::Model => "Model",
            Self::Copyright => "Copyright",
            Self::UserComment => "UserComment",
        }
    }

    /// Slots ComfyUI-style writers use for the node graph.
    pub fn is_prompt_likely(self) -> bool {
        matches!(self, Self::Make | Self::Model)
    }

    /// Slots used for the editor workflow document.
    pub fn is_workflow_likely(self) -> bool {
        matches!(self, Self::ImageDescription | Self::Copyright)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTag {
    pub slot: TagSlot,
    pub text: String,
}

/// Decodes one tag. Never fails: undecodable input falls back to a plain
/// string conversion and the failure is noted in the returned trace lines.
pub fn decode_tag(slot: TagSlot, raw: &TagValue) -> (String, Vec<String>) {
    let mut trace = Vec::new();
    let decoded = match raw {
        TagValue::Bytes(bytes) if slot == TagSlot::UserComment => decode_user_comment(bytes),
        TagValue::Bytes(bytes) => decode_bytes(bytes),
        other => Ok(other.display_text()),
    };
    let mut text = decoded.unwrap_or_else(|err| {
        trace.push(format!("Decode failed for {}: {err:#}", slot.name()));
        raw.display_text()
    });
    if slot == TagSlot::UserComment {
        text = strip_marker_word(&text).to_string();
    }

    trace.push(format!(
        "Exif {} found. Length: {}",
        slot.name(),
        text.chars().count()
    ));

    if let Some((label, rest)) = strip_label(&text) {
        trace.push(format!("  -> Stripped '{label}' prefix"));
        text = rest.to_string();
    }
    (text, trace)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<String> {
    let text = if let Some(body) = bytes.strip_prefix(ASCII_HEADER) {
        String::from_utf8(body.to_vec()).context("ASCII payload is not valid UTF-8")?
    } else if let Some(body) = bytes.strip_prefix(UNICODE_HEADER) {
        decode_utf16(body, Endian::Little)?
    } else if let Some(body) = bytes.strip_prefix(EXIF_HEADER) {
        String::from_utf8(body.to_vec()).context("Exif payload is not valid UTF-8")?
    } else {
        return Ok(lossy_text(bytes));
    };
    Ok(text.trim_end_matches('\0').to_string())
}

/// A `UNICODE\0` header always means UTF-16; only the byte order is guessed.
/// Without it the width guess looks at where NULs fall in the first bytes,
/// so short or mostly non-Latin UTF-16 text can be misread as 8-bit.
pub fn decode_user_comment(bytes: &[u8]) -> Result<String> {
    let (header, body) = USER_COMMENT_HEADERS
        .iter()
        .find_map(|header| bytes.strip_prefix(*header).map(|body| (Some(*header), body)))
        .unwrap_or((None, bytes));
    let width = match (header, guess_width(body)) {
        (Some(header), TextWidth::Narrow) if header == UNICODE_HEADER => {
            TextWidth::Wide(guess_byte_order(body))
        }
        (_, width) => width,
    };
    let text = match width {
        TextWidth::Wide(endian) => decode_utf16(&body[..body.len() & !1], endian)?,
        TextWidth::Narrow => lossy_text(body),
    };
    Ok(text.replace('\0', ""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextWidth {
    Wide(Endian),
    Narrow,
}

fn guess_width(body: &[u8]) -> TextWidth {
    if body.starts_with(&[0xFF, 0xFE]) {
        return TextWidth::Wide(Endian::Little);
    }
    if body.starts_with(&[0xFE, 0xFF]) {
        return TextWidth::Wide(Endian::Big);
    }

    let sample = &body[..body.len().min(WIDTH_SAMPLE_LEN)];
    let pairs = sample.len() / 2;
    if pairs == 0 {
        return TextWidth::Narrow;
    }
    let odd_nulls = sample
        .chunks_exact(2)
        .filter(|pair| pair[0] != 0 && pair[1] == 0)
        .count();
    let even_nulls = sample
        .chunks_exact(2)
        .filter(|pair| pair[0] == 0 && pair[1] != 0)
        .count();

    if odd_nulls * 2 >= pairs {
        TextWidth::Wide(Endian::Little)
    } else if even_nulls * 2 >= pairs {
        TextWidth::Wide(Endian::Big)
    } else {
        TextWidth::Narrow
    }
}

/// Byte order for UTF-16 without NUL bytes (CJK and similar): the order
/// that yields more code points from common scripts wins, little-endian on
/// a tie.
fn guess_byte_order(body: &[u8]) -> Endian {
    let score = |endian: Endian| {
        body.chunks_exact(2)
            .take(BYTE_ORDER_SAMPLE_UNITS)
            .map(|pair| match endian {
                Endian::Little => u16::from_le_bytes([pair[0], pair[1]]),
                Endian::Big => u16::from_be_bytes([pair[0], pair[1]]),
            })
            .filter(|unit| is_common_code_unit(*unit))
            .count()
    };
    if score(Endian::Big) > score(Endian::Little) {
        Endian::Big
    } else {
        Endian::Little
    }
}

fn is_common_code_unit(unit: u16) -> bool {
    matches!(
        unit,
        0x0009 | 0x000A | 0x000D
            | 0x0020..=0x007E
            | 0x00A0..=0x00FF
            | 0x3000..=0x30FF
            | 0x4E00..=0x9FFF
            | 0xAC00..=0xD7A3
            | 0xFF00..=0xFFEF
    )
}

fn decode_utf16(body: &[u8], default: Endian) -> Result<String> {
    if body.len() % 2 != 0 {
        bail!("UTF-16 payload has odd length {}", body.len());
    }
    let (endian, body) = match body {
        [0xFF, 0xFE, rest @ ..] => (Endian::Little, rest),
        [0xFE, 0xFF, rest @ ..] => (Endian::Big, rest),
        _ => (default, body),
    };
    let units = body
        .chunks_exact(2)
        .map(|pair| match endian {
            Endian::Little => u16::from_le_bytes([pair[0], pair[1]]),
            Endian::Big => u16::from_be_bytes([pair[0], pair[1]]),
        })
        .collect::<Vec<u16>>();
    String::from_utf16(&units).context("invalid UTF-16 payload")
}

/// UTF-8 with invalid sequences and NULs dropped.
fn lossy_text(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text.replace('\0', "")
}

fn strip_marker_word(text: &str) -> &str {
    let trimmed = text.trim_start_matches(&['\0', ' '][..]);
    for marker in USER_COMMENT_MARKERS {
        let Some(rest) = trimmed.strip_prefix(marker) else {
            continue;
        };
        if rest.chars().next().is_some_and(char::is_alphanumeric) {
            continue;
        }
        return rest.trim_start_matches(&['\0', ' ', ':'][..]);
    }
    text
}

fn strip_label(text: &str) -> Option<(&'static str, &str)> {
    LABEL_PREFIXES
        .into_iter()
        .find_map(|label| text.strip_prefix(label).map(|rest| (label, rest.trim())))
}
