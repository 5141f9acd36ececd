// Error types shared by the viewer core

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while resolving, loading or uploading images
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The path is neither a file nor a directory
    #[error("Invalid path specified: {}", .0.display())]
    InvalidSource(PathBuf),

    /// The directory holds no file with a supported extension
    #[error("No images in directory: {}", .0.display())]
    NoImagesFound(PathBuf),

    /// Piped bytes are not a recognized image format
    #[error("Data received from stdin is not a recognized image format")]
    UndecodableStream,

    /// The file could not be read or decoded
    #[error("Failed to load image {}: {}", .path.display(), .reason)]
    LoadFailure { path: PathBuf, reason: String },

    /// Decoding produced a zero-sized image
    #[error("The image is empty after loading: {0}")]
    EmptyImage(String),

    /// The GPU rejected the texture upload
    #[error("Texture creation error: {0}")]
    TextureCreationFailure(String),
}
