// Navigation state machine
// Decides which image is shown and at what zoom

use crate::error::ViewerError;
use crate::image_loader::{DecodedBitmap, ImageDecoder, ImageLoader};
use crate::source::{ImageSet, ImageSource, SetOrigin};
use log::{debug, error, info};

/// Generic window title for single images
pub const APP_NAME: &str = "rspix";

/// Zoom multiplier per wheel step
pub const ZOOM_STEP: f32 = 1.1;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;

/// Receives freshly loaded bitmaps; implemented by the GPU texture owner
pub trait TextureSink {
    /// Replace whatever is currently displayed with `bitmap`
    fn replace_texture(&mut self, bitmap: DecodedBitmap) -> Result<(), ViewerError>;
}

/// Input events driving the navigator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    Advance,
    Retreat,
    ZoomIn,
    ZoomOut,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavState {
    /// Nothing loaded yet
    Empty,
    Showing { index: usize, zoom: f32 },
}

/// What the caller has to do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed
    Unchanged,
    /// Zoom changed, same image
    Redraw,
    /// A different image is now current
    ImageChanged,
    Quit,
}

#[derive(Debug)]
pub struct Navigator {
    images: ImageSet,
    state: NavState,
    quit: bool,
    /// The last upload failed and nothing is on screen
    blank: bool,
}

impl Navigator {
    pub fn new(images: ImageSet) -> Self {
        Self {
            images,
            state: NavState::Empty,
            quit: false,
            blank: false,
        }
    }

    /// Build a navigator for a resolved source and load its first image.
    ///
    /// Failing here is fatal for the session: there is nothing else to show.
    pub fn start<D: ImageDecoder>(
        source: ImageSource,
        loader: &ImageLoader<D>,
    ) -> Result<(Self, DecodedBitmap), ViewerError> {
        match source {
            ImageSource::Stream(bitmap) => {
                let mut navigator = Self::new(ImageSet::in_memory());
                navigator.state = NavState::Showing { index: 0, zoom: 1.0 };
                Ok((navigator, bitmap))
            }
            ImageSource::Files(images) => {
                let mut navigator = Self::new(images);
                let bitmap = navigator.load_index(0, loader)?;
                navigator.state = NavState::Showing { index: 0, zoom: 1.0 };
                Ok((navigator, bitmap))
            }
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn index(&self) -> Option<usize> {
        match self.state {
            NavState::Showing { index, .. } => Some(index),
            NavState::Empty => None,
        }
    }

    /// Current zoom factor (1.0 when nothing is shown)
    pub fn zoom(&self) -> f32 {
        match self.state {
            NavState::Showing { zoom, .. } => zoom,
            NavState::Empty => 1.0,
        }
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Terminate the session; later events are ignored
    pub fn quit(&mut self) {
        info!("Quit requested");
        self.quit = true;
    }

    /// Window title: file name and position when browsing a directory.
    ///
    /// Falls back to the app name while no texture is held.
    pub fn title(&self) -> String {
        match (self.images.origin(), self.state) {
            _ if self.blank => APP_NAME.to_string(),
            (SetOrigin::Directory, NavState::Showing { index, .. }) => {
                let name = self
                    .images
                    .get(index)
                    .map(|entry| entry.display_name())
                    .unwrap_or_default();
                format!("{} ({}/{})", name, index + 1, self.images.len())
            }
            _ => APP_NAME.to_string(),
        }
    }

    /// Apply one input event
    pub fn handle<D: ImageDecoder, S: TextureSink>(
        &mut self,
        event: NavEvent,
        loader: &ImageLoader<D>,
        sink: &mut S,
    ) -> Outcome {
        if self.quit {
            return Outcome::Quit;
        }

        match event {
            NavEvent::Quit => {
                self.quit();
                Outcome::Quit
            }
            NavEvent::ZoomIn => self.set_zoom(|zoom| zoom * ZOOM_STEP),
            NavEvent::ZoomOut => self.set_zoom(|zoom| zoom / ZOOM_STEP),
            NavEvent::Advance => match self.index() {
                Some(index) if index + 1 < self.images.len() => {
                    self.show(index + 1, loader, sink)
                }
                _ => Outcome::Unchanged,
            },
            NavEvent::Retreat => match self.index() {
                Some(index) if index > 0 => self.show(index - 1, loader, sink),
                _ => Outcome::Unchanged,
            },
        }
    }

    fn set_zoom(&mut self, step: impl FnOnce(f32) -> f32) -> Outcome {
        match &mut self.state {
            NavState::Showing { zoom, .. } => {
                let next = step(*zoom).clamp(MIN_ZOOM, MAX_ZOOM);
                if next == *zoom {
                    return Outcome::Unchanged;
                }
                *zoom = next;
                debug!("Zoom level: {:.3}", next);
                Outcome::Redraw
            }
            NavState::Empty => Outcome::Unchanged,
        }
    }

    /// Load `index` and hand it to the sink; on failure the current image stays
    fn show<D: ImageDecoder, S: TextureSink>(
        &mut self,
        index: usize,
        loader: &ImageLoader<D>,
        sink: &mut S,
    ) -> Outcome {
        let bitmap = match self.load_index(index, loader) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                error!("{}; keeping image {}", e, self.index().map_or(0, |i| i + 1));
                return Outcome::Unchanged;
            }
        };

        // The previous texture is gone once the sink has been called
        match sink.replace_texture(bitmap) {
            Ok(()) => {
                self.state = NavState::Showing { index, zoom: 1.0 };
                self.blank = false;
                Outcome::ImageChanged
            }
            Err(e) => {
                error!("{}; no image displayed", e);
                self.blank = true;
                Outcome::Unchanged
            }
        }
    }

    fn load_index<D: ImageDecoder>(
        &self,
        index: usize,
        loader: &ImageLoader<D>,
    ) -> Result<DecodedBitmap, ViewerError> {
        let entry = self.images.get(index).ok_or_else(|| ViewerError::LoadFailure {
            path: Default::default(),
            reason: format!("no image at position {}", index + 1),
        })?;
        loader.load(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::tests::StubDecoder;
    use crate::source::scan_directory;
    use std::fs;
    use tempfile::TempDir;

    /// Records uploads instead of touching a GPU
    #[derive(Default)]
    struct RecordingSink {
        uploads: Vec<(u32, u32)>,
        fail_next: bool,
    }

    impl TextureSink for RecordingSink {
        fn replace_texture(&mut self, bitmap: DecodedBitmap) -> Result<(), ViewerError> {
            if self.fail_next {
                self.fail_next = false;
                return Err(ViewerError::TextureCreationFailure("rejected".into()));
            }
            self.uploads.push((bitmap.width, bitmap.height));
            Ok(())
        }
    }

    fn fixture(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn start(dir: &TempDir) -> (Navigator, ImageLoader<StubDecoder>, RecordingSink) {
        let loader = ImageLoader::new(StubDecoder);
        let set = scan_directory(dir.path()).unwrap();
        let (navigator, first) =
            Navigator::start(ImageSource::Files(set), &loader).unwrap();
        let mut sink = RecordingSink::default();
        sink.replace_texture(first).unwrap();
        (navigator, loader, sink)
    }

    #[test]
    fn test_browse_directory() {
        let dir = fixture(&[
            ("a.png", "img:1x1"),
            ("b.jpg", "img:2x2"),
            ("c.txt", "img:9x9"),
            ("z.gif", "img:3x3"),
        ]);
        let (mut nav, loader, mut sink) = start(&dir);

        assert_eq!(nav.images().len(), 3);
        assert_eq!(nav.state(), NavState::Showing { index: 0, zoom: 1.0 });
        assert_eq!(nav.title(), "a.png (1/3)");

        // Retreat at the first entry is a no-op
        assert_eq!(nav.handle(NavEvent::Retreat, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.index(), Some(0));

        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::ImageChanged);
        assert_eq!(nav.index(), Some(1));
        assert_eq!(nav.title(), "b.jpg (2/3)");

        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::ImageChanged);
        // No wraparound at the last entry
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.index(), Some(2));

        assert_eq!(sink.uploads, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_zoom_stays_clamped() {
        let dir = fixture(&[("a.png", "img:4x4")]);
        let (mut nav, loader, mut sink) = start(&dir);

        for _ in 0..200 {
            nav.handle(NavEvent::ZoomIn, &loader, &mut sink);
            assert!(nav.zoom() <= MAX_ZOOM);
        }
        assert_eq!(nav.zoom(), MAX_ZOOM);
        assert_eq!(nav.handle(NavEvent::ZoomIn, &loader, &mut sink), Outcome::Unchanged);

        for _ in 0..200 {
            nav.handle(NavEvent::ZoomOut, &loader, &mut sink);
            assert!(nav.zoom() >= MIN_ZOOM);
        }
        assert_eq!(nav.zoom(), MIN_ZOOM);
        assert_eq!(nav.handle(NavEvent::ZoomOut, &loader, &mut sink), Outcome::Unchanged);

        // Zoom never reloads the image
        assert_eq!(sink.uploads.len(), 1);
    }

    #[test]
    fn test_zoom_step() {
        let dir = fixture(&[("a.png", "img:4x4")]);
        let (mut nav, loader, mut sink) = start(&dir);

        assert_eq!(nav.handle(NavEvent::ZoomIn, &loader, &mut sink), Outcome::Redraw);
        assert!((nav.zoom() - 1.1).abs() < 1e-6);
        nav.handle(NavEvent::ZoomOut, &loader, &mut sink);
        assert!((nav.zoom() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_navigation_resets_zoom() {
        let dir = fixture(&[("a.png", "img:1x1"), ("b.png", "img:2x2")]);
        let (mut nav, loader, mut sink) = start(&dir);

        for _ in 0..5 {
            nav.handle(NavEvent::ZoomIn, &loader, &mut sink);
        }
        assert!(nav.zoom() > 1.0);

        nav.handle(NavEvent::Advance, &loader, &mut sink);
        assert_eq!(nav.state(), NavState::Showing { index: 1, zoom: 1.0 });

        nav.handle(NavEvent::ZoomOut, &loader, &mut sink);
        nav.handle(NavEvent::Retreat, &loader, &mut sink);
        assert_eq!(nav.state(), NavState::Showing { index: 0, zoom: 1.0 });
    }

    #[test]
    fn test_load_failure_keeps_current_image() {
        let dir = fixture(&[("a.png", "img:1x1"), ("b.png", "corrupt")]);
        let (mut nav, loader, mut sink) = start(&dir);
        nav.handle(NavEvent::ZoomIn, &loader, &mut sink);
        let zoom = nav.zoom();

        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.state(), NavState::Showing { index: 0, zoom });
        assert_eq!(nav.title(), "a.png (1/2)");
        assert_eq!(sink.uploads, vec![(1, 1)]);
    }

    #[test]
    fn test_empty_neighbour_keeps_current_image() {
        let dir = fixture(&[("a.png", "img:1x1"), ("b.png", "img:0x0")]);
        let loader = ImageLoader::new(StubDecoder);
        assert!(matches!(
            loader.load(&crate::source::ImageEntry::File(dir.path().join("b.png"))),
            Err(ViewerError::EmptyImage(_))
        ));

        let (mut nav, loader, mut sink) = start(&dir);
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.index(), Some(0));
        assert_eq!(nav.title(), "a.png (1/2)");
        assert_eq!(sink.uploads, vec![(1, 1)]);
    }

    #[test]
    fn test_texture_failure_keeps_index() {
        let dir = fixture(&[("a.png", "img:1x1"), ("b.png", "img:2x2")]);
        let (mut nav, loader, mut sink) = start(&dir);

        sink.fail_next = true;
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.index(), Some(0));
        // Nothing is on screen, so the title no longer names a file
        assert_eq!(nav.title(), APP_NAME);

        // A later attempt can still succeed
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::ImageChanged);
        assert_eq!(nav.index(), Some(1));
        assert_eq!(nav.title(), "b.png (2/2)");
    }

    #[test]
    fn test_first_load_failure_is_fatal() {
        let dir = fixture(&[("a.png", "corrupt"), ("b.png", "img:1x1")]);
        let loader = ImageLoader::new(StubDecoder);
        let set = scan_directory(dir.path()).unwrap();

        assert!(matches!(
            Navigator::start(ImageSource::Files(set), &loader),
            Err(ViewerError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_stream_source() {
        let loader = ImageLoader::new(StubDecoder);
        let bitmap = loader.load_stream(b"img:5x3").unwrap();
        let (mut nav, first) = Navigator::start(ImageSource::Stream(bitmap), &loader).unwrap();
        let mut sink = RecordingSink::default();
        sink.replace_texture(first).unwrap();

        assert_eq!(nav.state(), NavState::Showing { index: 0, zoom: 1.0 });
        assert_eq!(nav.title(), APP_NAME);
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.handle(NavEvent::Retreat, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(sink.uploads, vec![(5, 3)]);
    }

    #[test]
    fn test_empty_state_ignores_input() {
        let loader = ImageLoader::new(StubDecoder);
        let mut nav = Navigator::new(ImageSet::in_memory());
        let mut sink = RecordingSink::default();

        assert_eq!(nav.handle(NavEvent::ZoomIn, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Unchanged);
        assert_eq!(nav.state(), NavState::Empty);
    }

    #[test]
    fn test_quit_is_terminal() {
        let dir = fixture(&[("a.png", "img:1x1"), ("b.png", "img:2x2")]);
        let (mut nav, loader, mut sink) = start(&dir);

        assert_eq!(nav.handle(NavEvent::Quit, &loader, &mut sink), Outcome::Quit);
        assert!(nav.should_quit());
        assert_eq!(nav.handle(NavEvent::Advance, &loader, &mut sink), Outcome::Quit);
        assert_eq!(nav.index(), Some(0));
    }
}
