#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

const IHDR_END: usize = 8 + 8 + 13 + 4;
const EXIF_IFD_POINTER: u16 = 0x8769;

/// Small PNG carrying the given `tEXt` chunks and an optional `eXIf` block.
pub fn png_with_metadata(text: &[(&str, &str)], exif: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([40, 80, 120])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    let mut chunks = Vec::new();
    for (keyword, value) in text {
        let mut data = keyword.as_bytes().to_vec();
        data.push(0);
        data.extend_from_slice(value.as_bytes());
        chunks.extend(chunk(b"tEXt", &data));
    }
    if let Some(exif) = exif {
        chunks.extend(chunk(b"eXIf", exif));
    }
    bytes.splice(IHDR_END..IHDR_END, chunks);
    Ok(bytes)
}

pub fn write_png(dir: &Path, name: &str, text: &[(&str, &str)]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, png_with_metadata(text, None)?)?;
    Ok(path)
}

fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc_input = kind.to_vec();
    crc_input.extend_from_slice(data);
    out.extend(crc32(&crc_input).to_be_bytes());
    out
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// Little-endian TIFF block: IFD0 `primary` entries plus an Exif sub-IFD
/// when `sub` is non-empty. Entries are `(tag, type, payload)`.
pub fn exif_block(primary: &[(u16, u16, Vec<u8>)], sub: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
    let mut directories = vec![primary.to_vec()];
    if !sub.is_empty() {
        directories[0].push((EXIF_IFD_POINTER, 4, Vec::new()));
        directories.push(sub.to_vec());
    }

    let ifd_len = |entries: &Vec<(u16, u16, Vec<u8>)>| 2 + entries.len() * 12 + 4;
    let sub_offset = 8 + ifd_len(&directories[0]);
    let mut data_offset = 8 + directories.iter().map(ifd_len).sum::<usize>();

    let mut out = b"II".to_vec();
    out.extend(42u16.to_le_bytes());
    out.extend(8u32.to_le_bytes());
    let mut data_area = Vec::new();
    for entries in &directories {
        out.extend((entries.len() as u16).to_le_bytes());
        for (tag, kind, payload) in entries {
            out.extend(tag.to_le_bytes());
            out.extend(kind.to_le_bytes());
            if *tag == EXIF_IFD_POINTER {
                out.extend(1u32.to_le_bytes());
                out.extend((sub_offset as u32).to_le_bytes());
                continue;
            }
            out.extend((payload.len() as u32).to_le_bytes());
            if payload.len() <= 4 {
                let mut inline = payload.clone();
                inline.resize(4, 0);
                out.extend(inline);
            } else {
                out.extend((data_offset as u32).to_le_bytes());
                data_offset += payload.len();
                data_area.extend_from_slice(payload);
            }
        }
        out.extend(0u32.to_le_bytes());
    }
    out.extend(data_area);
    out
}

pub fn ascii(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}
