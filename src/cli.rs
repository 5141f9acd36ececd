// Command line interface module
// Handles parsing of command line arguments and stdin input

use anyhow::{bail, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;

const USAGE_HINT: &str = "Usage: rspix <PATH>\n\
                          Or:    cat image.png | rspix";

/// rspix - A minimal GPU image viewer for Wayland
#[derive(Parser, Debug)]
#[command(name = "rspix")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to an image file or a directory of images (image data can also be piped to stdin)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Initial window width in pixels
    #[arg(long, default_value = "800", value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value = "600", value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,
}

/// Parsed arguments with the piped bytes, if any were needed
#[derive(Debug)]
pub struct ParsedArgs {
    pub path: Option<PathBuf>,
    pub stdin_data: Option<Vec<u8>>,
    pub window_size: (u32, u32),
}

/// Check if stdin has data available (is a pipe)
fn stdin_has_data() -> bool {
    !atty::is(atty::Stream::Stdin)
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Parse command line arguments and handle stdin input
pub fn parse_args() -> Result<ParsedArgs> {
    let args = Args::parse();

    // An existing path wins; stdin is only consulted as a fallback
    let path_exists = args.path.as_ref().map_or(false, |path| path.exists());
    let stdin_data = if !path_exists && stdin_has_data() {
        Some(read_stdin()?)
    } else {
        None
    };

    if args.path.is_none() {
        match &stdin_data {
            None => bail!(
                "No path specified and no image data piped to stdin.\n{}",
                USAGE_HINT
            ),
            Some(data) if data.is_empty() => {
                bail!("No data received from stdin.\n{}", USAGE_HINT)
            }
            Some(_) => {}
        }
    }

    Ok(ParsedArgs {
        path: args.path,
        stdin_data,
        window_size: (args.width, args.height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["rspix", "photos"]).unwrap();
        assert_eq!(args.path, Some(PathBuf::from("photos")));
        assert_eq!((args.width, args.height), (800, 600));
    }

    #[test]
    fn test_path_is_optional() {
        let args = Args::try_parse_from(["rspix", "--width", "1024", "--height", "768"]).unwrap();
        assert!(args.path.is_none());
        assert_eq!((args.width, args.height), (1024, 768));
    }

    #[test]
    fn test_zero_window_size_rejected() {
        assert!(Args::try_parse_from(["rspix", "--width", "0"]).is_err());
    }

    #[test]
    fn test_help_flag() {
        let err = Args::try_parse_from(["rspix", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
