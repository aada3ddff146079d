//! Minimal TIFF directory walker for EXIF blocks.
//!
//! Only IFD0 and the Exif sub-IFD are read. Values of type ASCII, BYTE,
//! UNDEFINED, SHORT and LONG are kept; everything else is ignored.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

pub const EXIF_IFD_POINTER: u16 = 0x8769;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const IFD_ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Bytes(Vec<u8>),
    Text(String),
    Unsigned(Vec<u32>),
}

impl TagValue {
    /// Plain string conversion, used when a proper decode is not possible.
    pub fn display_text(&self) -> String {
        match self {
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes).replace('\0', ""),
            Self::Text(text) => text.clone(),
            Self::Unsigned(values) => values
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Tags from the primary directory (IFD0) and the Exif sub-IFD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifStore {
    pub primary: BTreeMap<u16, TagValue>,
    pub sub_ifd: BTreeMap<u16, TagValue>,
}

impl ExifStore {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.sub_ifd.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            Self::Little => u16::from_le_bytes(raw),
            Self::Big => u16::from_be_bytes(raw),
        }
    }

    fn u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            Self::Little => u32::from_le_bytes(raw),
            Self::Big => u32::from_be_bytes(raw),
        }
    }
}

/// Parses a raw EXIF block. Structural problems past the header are
/// reported as warnings and the tags read so far are kept.
pub fn parse_exif(raw: &[u8]) -> Result<(ExifStore, Vec<String>)> {
    let data = raw.strip_prefix(EXIF_HEADER).unwrap_or(raw);
    if data.len() < 8 {
        bail!("EXIF block too short ({} bytes)", data.len());
    }
    let order = match &data[..2] {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        other => bail!("unknown EXIF byte order {other:02x?}"),
    };
    let magic = order.u16(&data[2..4]);
    if magic != 42 {
        bail!("bad TIFF magic {magic}");
    }

    let mut warnings = Vec::new();
    let ifd0 = order.u32(&data[4..8]) as usize;
    let mut primary = read_ifd(data, order, ifd0, &mut warnings).context("unreadable IFD0")?;

    let mut sub_ifd = BTreeMap::new();
    if let Some(pointer) = primary.remove(&EXIF_IFD_POINTER) {
        match pointer {
            TagValue::Unsigned(values) if !values.is_empty() => {
                match read_ifd(data, order, values[0] as usize, &mut warnings) {
                    Ok(tags) => sub_ifd = tags,
                    Err(err) => warnings.push(format!("Exif sub-IFD unreadable: {err:#}")),
                }
            }
            _ => warnings.push("Exif sub-IFD pointer has an unexpected type".to_string()),
        }
    }

    Ok((ExifStore { primary, sub_ifd }, warnings))
}

fn read_ifd(
    data: &[u8],
    order: ByteOrder,
    offset: usize,
    warnings: &mut Vec<String>,
) -> Result<BTreeMap<u16, TagValue>> {
    let header = data
        .get(offset..offset.saturating_add(2))
        .with_context(|| format!("IFD offset {offset} is outside the EXIF block"))?;
    let count = order.u16(header) as usize;

    let mut tags = BTreeMap::new();
    for index in 0..count {
        let start = offset + 2 + index * IFD_ENTRY_LEN;
        let Some(entry) = data.get(start..start + IFD_ENTRY_LEN) else {
            warnings.push(format!("IFD entry {index} at offset {start} is truncated"));
            break;
        };
        let tag = order.u16(&entry[0..2]);
        let kind = order.u16(&entry[2..4]);
        let units = order.u32(&entry[4..8]) as usize;
        let Some(unit_len) = unit_len(kind) else {
            continue;
        };
        let Some(len) = unit_len.checked_mul(units) else {
            warnings.push(format!("tag 0x{tag:04x} has an absurd length"));
            continue;
        };

        let payload = if len <= 4 {
            &entry[8..8 + len]
        } else {
            let at = order.u32(&entry[8..12]) as usize;
            match at.checked_add(len).and_then(|end| data.get(at..end)) {
                Some(payload) => payload,
                None => {
                    warnings.push(format!("tag 0x{tag:04x} points outside the EXIF block"));
                    continue;
                }
            }
        };

        let value = match kind {
            1 | 7 => TagValue::Bytes(payload.to_vec()),
            2 => TagValue::Text(
                String::from_utf8_lossy(payload)
                    .trim_end_matches('\0')
                    .to_string(),
            ),
            3 => TagValue::Unsigned(
                payload
                    .chunks_exact(2)
                    .map(|chunk| u32::from(order.u16(chunk)))
                    .collect(),
            ),
            _ => TagValue::Unsigned(payload.chunks_exact(4).map(|chunk| order.u32(chunk)).collect()),
        };
        tags.insert(tag, value);
    }
    Ok(tags)
}

fn unit_len(kind: u16) -> Option<usize> {
    match kind {
        1 | 2 | 7 => Some(1),
        3 => Some(2),
        4 => Some(4),
        _ => None,
    }
}
