// Image source resolution
// Turns a path or piped bytes into the set of images to browse

use crate::error::ViewerError;
use crate::image_loader::{DecodedBitmap, ImageDecoder, ImageLoader};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// File extensions recognized when listing a directory (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

/// One loadable image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEntry {
    File(PathBuf),
    /// Bitmap supplied directly (piped input); cannot be navigated away from
    InMemory,
}

impl ImageEntry {
    /// File name shown in the window title
    pub fn display_name(&self) -> String {
        match self {
            ImageEntry::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            ImageEntry::InMemory => "<stdin>".to_string(),
        }
    }
}

/// Where an image set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOrigin {
    Directory,
    SingleFile,
    Stream,
}

/// Ordered list of images, fixed once resolved
#[derive(Debug, Clone)]
pub struct ImageSet {
    entries: Vec<ImageEntry>,
    origin: SetOrigin,
}

impl ImageSet {
    pub fn from_directory(entries: Vec<ImageEntry>) -> Self {
        Self {
            entries,
            origin: SetOrigin::Directory,
        }
    }

    pub fn single_file(path: PathBuf) -> Self {
        Self {
            entries: vec![ImageEntry::File(path)],
            origin: SetOrigin::SingleFile,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            entries: vec![ImageEntry::InMemory],
            origin: SetOrigin::Stream,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&ImageEntry> {
        self.entries.get(index)
    }

    pub fn origin(&self) -> SetOrigin {
        self.origin
    }
}

/// A resolved image source
#[derive(Debug)]
pub enum ImageSource {
    /// Files to load on demand
    Files(ImageSet),
    /// A bitmap already decoded from piped input
    Stream(DecodedBitmap),
}

/// Check whether a path carries one of the supported image extensions
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// List the supported images directly inside `dir`, sorted by file name
pub fn scan_directory(dir: &Path) -> Result<ImageSet, ViewerError> {
    let read_dir = fs::read_dir(dir).map_err(|e| {
        warn!("Cannot read directory {}: {}", dir.display(), e);
        ViewerError::InvalidSource(dir.to_path_buf())
    })?;

    let mut paths: Vec<PathBuf> = read_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect();

    if paths.is_empty() {
        return Err(ViewerError::NoImagesFound(dir.to_path_buf()));
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Directory {} holds {} images", dir.display(), paths.len());

    Ok(ImageSet::from_directory(
        paths.into_iter().map(ImageEntry::File).collect(),
    ))
}

/// Resolve the user's input into an image source.
///
/// An existing path wins over piped bytes. When the path is absent or invalid the
/// piped bytes are decoded instead.
pub fn resolve<D: ImageDecoder>(
    path: Option<&Path>,
    stdin_data: Option<&[u8]>,
    loader: &ImageLoader<D>,
) -> Result<ImageSource, ViewerError> {
    if let Some(path) = path {
        if path.is_dir() {
            info!("Opening directory: {}", path.display());
            return scan_directory(path).map(ImageSource::Files);
        }
        if path.is_file() {
            info!("Opening file: {}", path.display());
            return Ok(ImageSource::Files(ImageSet::single_file(path.to_path_buf())));
        }
    }

    match stdin_data {
        Some(data) if !data.is_empty() => {
            info!("Decoding {} bytes from stdin", data.len());
            loader.load_stream(data).map(ImageSource::Stream)
        }
        _ => Err(ViewerError::InvalidSource(
            path.map(Path::to_path_buf).unwrap_or_default(),
        )),
    }
}
