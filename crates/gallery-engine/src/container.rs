use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageDecoder, ImageFormat, ImageReader};
use indexmap::IndexMap;

use crate::tiff::{parse_exif, ExifStore};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("File not found {}", .0.display())]
    NotFound(PathBuf),

    #[error("{reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Everything the extractor needs from an image file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMetadata {
    /// Native text fields (PNG `tEXt`/`iTXt`), in file order.
    pub text_fields: IndexMap<String, String>,
    pub exif: ExifStore,
    /// Non-fatal problems met while reading EXIF.
    pub warnings: Vec<String>,
}

impl ContainerMetadata {
    pub fn is_empty(&self) -> bool {
        self.text_fields.is_empty() && self.exif.is_empty()
    }
}

pub trait ContainerReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ContainerMetadata, ContainerError>;
}

/// Reads images from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContainerReader;

impl ContainerReader for FileContainerReader {
    fn read(&self, path: &Path) -> Result<ContainerMetadata, ContainerError> {
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ContainerError::NotFound(path.to_path_buf()),
            _ => ContainerError::Unreadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;
        read_container_bytes(&bytes).map_err(|err| ContainerError::Unreadable {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })
    }
}

/// Fails only when the bytes are not a decodable image.
pub fn read_container_bytes(bytes: &[u8]) -> Result<ContainerMetadata> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?;
    let format = reader.format().context("unrecognized image format")?;
    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("cannot identify image file ({format:?})"))?;

    let mut metadata = ContainerMetadata::default();
    if format == ImageFormat::Png {
        metadata.text_fields = png_text_chunks(bytes);
    }

    match decoder.exif_metadata() {
        Ok(Some(raw)) => match parse_exif(&raw) {
            Ok((exif, warnings)) => {
                metadata.exif = exif;
                metadata.warnings.extend(warnings);
            }
            Err(err) => metadata.warnings.push(format!("{err:#}")),
        },
        Ok(None) => {}
        Err(err) => metadata.warnings.push(err.to_string()),
    }

    Ok(metadata)
}

/// Collects uncompressed `tEXt` and `iTXt` chunks. A repeated keyword keeps
/// the last value. Non-PNG input yields an empty map.
pub fn png_text_chunks(bytes: &[u8]) -> IndexMap<String, String> {
    let mut chunks = IndexMap::new();
    let Some(mut rest) = bytes.strip_prefix(&PNG_SIGNATURE[..]) else {
        return chunks;
    };

    while rest.len() >= 8 {
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let kind = &rest[4..8];
        // data + CRC
        let Some(data) = rest.get(8..8 + len) else {
            break;
        };
        match kind {
            b"IEND" => break,
            b"tEXt" => parse_text_chunk(data, &mut chunks),
            b"iTXt" => parse_itxt_chunk(data, &mut chunks),
            _ => {}
        }
        rest = rest.get(8 + len + 4..).unwrap_or_default();
    }
    chunks
}

/// `keyword\0value`
fn parse_text_chunk(data: &[u8], chunks: &mut IndexMap<String, String>) {
    let Some(null_pos) = data.iter().position(|&b| b == 0) else {
        return;
    };
    let keyword = String::from_utf8_lossy(&data[..null_pos]).to_string();
    if keyword.is_empty() {
        return;
    }
    let value = String::from_utf8_lossy(&data[null_pos + 1..]).to_string();
    chunks.insert(keyword, value);
}

/// `keyword\0 flag method language\0 translated\0 text`; compressed text is skipped.
fn parse_itxt_chunk(data: &[u8], chunks: &mut IndexMap<String, String>) {
    let Some(keyword_end) = data.iter().position(|&b| b == 0) else {
        return;
    };
    let keyword = String::from_utf8_lossy(&data[..keyword_end]).to_string();
    if keyword.is_empty() {
        return;
    }
    let Some(&compressed) = data.get(keyword_end + 1) else {
        return;
    };
    let mut offset = keyword_end + 3;
    for _ in 0..2 {
        let Some(null_pos) = data.get(offset..).and_then(|tail| tail.iter().position(|&b| b == 0))
        else {
            return;
        };
        offset += null_pos + 1;
    }
    if compressed != 0 {
        return;
    }
    let text = data.get(offset..).unwrap_or_default();
    chunks.insert(keyword, String::from_utf8_lossy(text).to_string());
}
