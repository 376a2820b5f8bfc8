//! Common utility functions shared across CLI commands.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use sensattend_core::ImageUpload;
use tracing::{debug, warn};

/// Guess an image content type from the file extension.
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("gif") => Some("image/gif"),
        Some("bmp") => Some("image/bmp"),
        Some("webp") => Some("image/webp"),
        Some("tif" | "tiff") => Some("image/tiff"),
        _ => None,
    }
}

/// Read an image file into an upload, keeping its name and guessed type.
pub fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read image");

    let mut image = ImageUpload::new(bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        image = image.with_file_name(name);
    }
    if let Some(content_type) = detect_content_type(path) {
        image = image.with_content_type(content_type);
    }
    Ok(image)
}

/// Ask a y/N question on stderr and read the answer from `input`.
///
/// Anything but `y` or `yes` (case-insensitive) is a no, including EOF.
pub fn confirm(prompt: &str, input: &mut impl BufRead) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush().context("Failed to write prompt")?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Like [`confirm`], but an unreadable answer is logged and counts as a no.
pub fn confirm_or_decline(prompt: &str, input: &mut impl BufRead) -> bool {
    confirm(prompt, input).unwrap_or_else(|e| {
        warn!(error = %e, "Could not read confirmation, treating as declined");
        false
    })
}
