//! Directory listing, seeded selection and thumbnails for a browsing UI.
//! None of this parses metadata.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;
const THUMBNAIL_JPEG_QUALITY: u8 = 70;

/// Image file names directly inside `dir`, sorted.
pub fn list_images(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        if !entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if !has_image_extension(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// With `randomize`, the same seed over the same sorted listing always
/// yields the same file. Otherwise `requested` is passed through.
pub fn select_image(
    files: &[String],
    requested: Option<&str>,
    seed: u64,
    randomize: bool,
) -> Option<String> {
    if randomize {
        if files.is_empty() {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let index = rng.gen_range(0..files.len());
        return files.get(index).cloned();
    }
    requested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// JPEG thumbnail whose longest side is at most `size`. Smaller images keep
/// their dimensions.
pub fn make_thumbnail(path: &Path, size: u32) -> Result<Vec<u8>> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    let bound = size.max(1);
    let image = if image.width() > bound || image.height() > bound {
        image.resize(bound, bound, FilterType::Triangle)
    } else {
        image
    };

    let rgb = image.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, THUMBNAIL_JPEG_QUALITY)
        .encode_image(&DynamicImage::ImageRgb8(rgb))
        .with_context(|| format!("failed to encode thumbnail for {}", path.display()))?;
    Ok(bytes)
}

/// Thumbnail bytes, or the original file when thumbnailing fails.
pub fn thumbnail_or_original(path: &Path, size: u32) -> Result<(Vec<u8>, &'static str)> {
    match make_thumbnail(path, size) {
        Ok(bytes) => Ok((bytes, "image/jpeg")),
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "thumbnail failed, serving original");
            let bytes =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            Ok((bytes, mime_for_path(path)))
        }
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use image::{Rgba, RgbaImage};

    use super::*;

    fn write_png(path: &Path, width: u32, height: u32) -> Result<()> {
        RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 128])).save(path)?;
        Ok(())
    }

    #[test]
    fn lists_only_images_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.PNG", "a.jpg", "c.webp", "notes.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"x")?;
        }
        fs::create_dir(dir.path().join("folder.png"))?;
        assert_eq!(list_images(dir.path())?, ["a.jpg", "b.PNG", "c.webp"]);
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = list_images(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().starts_with("Directory not found"));
    }

    #[test]
    fn seeded_selection_is_stable() {
        let files: Vec<String> = ["a.png", "b.png", "c.png", "d.png"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        let first = select_image(&files, None, 42, true);
        assert!(first.is_some());
        assert_eq!(first, select_image(&files, None, 42, true));
        assert!(files.contains(first.as_ref().unwrap()));
    }

    #[test]
    fn selection_without_randomize_passes_request_through() {
        let files = vec!["a.png".to_string()];
        assert_eq!(
            select_image(&files, Some("z.png"), 0, false).as_deref(),
            Some("z.png")
        );
        assert_eq!(select_image(&files, Some("  "), 0, false), None);
        assert_eq!(select_image(&[], None, 7, true), None);
    }

    #[test]
    fn thumbnail_bounds_longest_side() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("wide.png");
        write_png(&path, 400, 100)?;

        let bytes = make_thumbnail(&path, 200)?;
        let thumb = image::load_from_memory(&bytes)?;
        assert_eq!((thumb.width(), thumb.height()), (200, 50));
        Ok(())
    }

    #[test]
    fn thumbnail_never_upscales() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("small.png");
        write_png(&path, 30, 20)?;

        let thumb = image::load_from_memory(&make_thumbnail(&path, 256)?)?;
        assert_eq!((thumb.width(), thumb.height()), (30, 20));
        Ok(())
    }

    #[test]
    fn falls_back_to_original_bytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.webp");
        fs::write(&path, b"not an image")?;

        let (bytes, mime) = thumbnail_or_original(&path, 64)?;
        assert_eq!(bytes, b"not an image");
        assert_eq!(mime, "image/webp");
        Ok(())
    }
}
