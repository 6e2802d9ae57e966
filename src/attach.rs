use anyhow::{Context, Result};
use image::GenericImageView;
use std::path::Path;

/// A file staged for upload alongside the next prompt.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

// The relay only runs OCR on attached images; anything above this does not
// improve recognition and just slows the upload.
const MAX_WIDTH: u32 = 1600;
const MAX_HEIGHT: u32 = 1600;

/// Loads a file for attachment. Oversized images are downscaled and
/// re-encoded as PNG; anything that does not decode as an image is sent
/// through unchanged and left for the relay to deal with.
pub fn prepare(path: &Path) -> Result<Attachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(_) => {
            log::debug!("{} is not an image, attaching as-is", file_name);
            return Ok(Attachment { file_name, bytes });
        }
    };

    let (width, height) = img.dimensions();
    if width <= MAX_WIDTH && height <= MAX_HEIGHT {
        log::debug!("Attachment {}x{}, no resizing needed", width, height);
        return Ok(Attachment { file_name, bytes });
    }

    // Scale to fit while keeping the aspect ratio
    let width_ratio = MAX_WIDTH as f32 / width as f32;
    let height_ratio = MAX_HEIGHT as f32 / height as f32;
    let scale = width_ratio.min(height_ratio);
    // Extreme aspect ratios can truncate a dimension to zero
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);

    log::debug!(
        "Resizing attachment from {}x{} to {}x{}",
        width, height, new_width, new_height
    );

    let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
    let mut buffer = Vec::new();
    resized
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .context("Failed to encode resized attachment")?;

    let file_name = match file_name.rsplit_once('.') {
        Some((stem, _)) => format!("{}.png", stem),
        None => format!("{}.png", file_name),
    };

    Ok(Attachment { file_name, bytes: buffer })
}
