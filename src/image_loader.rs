// Image loading module
// Turns image files and raw bytes into RGBA8 bitmaps

use crate::error::ViewerError;
use crate::source::ImageEntry;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Decoded image ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBitmap {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Raw RGBA pixel data (4 bytes per pixel, rows top to bottom)
    pub rgba_data: Vec<u8>,
}

impl DecodedBitmap {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Backend that turns encoded bytes into pixels
pub trait ImageDecoder {
    /// Whether the bytes look like a format this decoder understands
    fn can_decode(&self, data: &[u8]) -> bool;

    /// Decode the bytes into an RGBA8 bitmap
    fn decode(&self, data: &[u8]) -> Result<DecodedBitmap>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn can_decode(&self, data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedBitmap> {
        // Try to guess the format from the data
        let format = image::guess_format(data).context("Failed to detect image format")?;

        let cursor = Cursor::new(data);
        let img = image::load(cursor, format).context("Failed to decode image")?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(DecodedBitmap {
            width,
            height,
            rgba_data: rgba.into_raw(),
        })
    }
}

/// Loads image entries through a decoder
#[derive(Debug, Default)]
pub struct ImageLoader<D = ImageCrateDecoder> {
    decoder: D,
}

impl<D: ImageDecoder> ImageLoader<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder }
    }

    /// Read and decode the file behind an entry
    pub fn load(&self, entry: &ImageEntry) -> Result<DecodedBitmap, ViewerError> {
        let path = match entry {
            ImageEntry::File(path) => path,
            ImageEntry::InMemory => {
                return Err(ViewerError::LoadFailure {
                    path: "<stdin>".into(),
                    reason: "in-memory image cannot be reloaded".to_string(),
                })
            }
        };

        info!("Loading image: {}", path.display());
        let bitmap = self.load_file(path).map_err(|e| ViewerError::LoadFailure {
            path: path.clone(),
            reason: format!("{:#}", e),
        })?;

        check_not_empty(bitmap, &path.display().to_string())
    }

    /// Decode raw bytes that did not come from a file (piped input)
    pub fn load_stream(&self, data: &[u8]) -> Result<DecodedBitmap, ViewerError> {
        if !self.decoder.can_decode(data) {
            return Err(ViewerError::UndecodableStream);
        }
        let bitmap = self.decoder.decode(data).map_err(|e| {
            debug!("Stream decode failed: {:#}", e);
            ViewerError::UndecodableStream
        })?;

        check_not_empty(bitmap, "<stdin>")
    }

    fn load_file(&self, path: &Path) -> Result<DecodedBitmap> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        self.decoder.decode(&data)
    }
}

fn check_not_empty(bitmap: DecodedBitmap, name: &str) -> Result<DecodedBitmap, ViewerError> {
    if bitmap.is_empty() {
        return Err(ViewerError::EmptyImage(name.to_string()));
    }
    info!(
        "Image loaded: {} ({}x{} pixels)",
        name, bitmap.width, bitmap.height
    );
    Ok(bitmap)
}
