// rspix - A minimal GPU image viewer for Wayland
// Shows one image at a time from a file, a directory or piped data

mod cli;
mod error;
mod image_loader;
mod navigation;
mod source;
mod texture;
mod viewport;
mod wayland;
mod wgpu_renderer;

use anyhow::Result;
use image_loader::{ImageCrateDecoder, ImageLoader};
use log::info;
use navigation::Navigator;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args()?;

    info!(
        "Starting rspix with path: {:?}, piped bytes: {}",
        args.path,
        args.stdin_data.as_ref().map_or(0, Vec::len)
    );

    let loader = ImageLoader::new(ImageCrateDecoder);

    // Resolve and load the first image before any window exists
    let source = source::resolve(args.path.as_deref(), args.stdin_data.as_deref(), &loader)?;
    let (navigator, first) = Navigator::start(source, &loader)?;

    info!(
        "{} image(s) to browse, showing {:?}",
        navigator.images().len(),
        navigator.state()
    );

    wayland::run(navigator, loader, first, args.window_size)
}
