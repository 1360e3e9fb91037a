use clap::Parser;
use std::path::PathBuf;

use crate::conversion::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "tx-converter",
    version,
    about = "Batch-convert texture folders to Arnold .tx files with maketx",
    long_about = "
TX Converter - parallel maketx driver

Walks a texture folder, decides which images need a fresh .tx, and runs one
single-threaded maketx per texture on a pool of (CPU cores - 1) workers.
Converted files are written next to their source as <name>.<ext>.tx.

Color handling is chosen from the file name:
• *height*, *disp*, *dsp*, *zdisp*, *displacement* → Raw input, 32-bit float
• *basecolor*, *albedo*, *diffuse*, *color*, *srgb* → sRGB input, half float
• anything else → Raw input, half float
All textures are converted to ACES - ACEScg using the OCIO config given with
--ocio, or $OCIO when no config is passed.

Example Usage:
  # Convert everything below a folder, remembering where maketx lives
  tx-converter ~/assets/textures --maketx /opt/arnold/bin/maketx --ocio ~/aces/config.ocio

  # Only top-level files whose name contains 'wood', with maketx output
  tx-converter ~/assets/textures --filter wood --no-recursive --verbose

  # Machine-readable progress for another front end
  tx-converter ~/assets/textures --json-progress"
)]
pub struct Args {
    /// Folder containing the textures to convert
    #[arg(value_name = "DIR")]
    pub root: PathBuf,

    /// Only convert files whose name contains this text (case-sensitive)
    #[arg(short = 'f', long = "filter", value_name = "TEXT")]
    pub filter: Option<String>,

    /// Only look at files directly inside DIR
    #[arg(long = "no-recursive")]
    pub no_recursive: bool,

    /// Pass -v to maketx, show its output and enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// OCIO config file (defaults to $OCIO)
    #[arg(long = "ocio", value_name = "FILE")]
    pub ocio: Option<PathBuf>,

    /// maketx executable; remembered for later runs
    #[arg(long = "maketx", value_name = "FILE")]
    pub maketx: Option<PathBuf>,

    /// Number of parallel maketx processes (0 = CPU cores - 1)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Emit progress as JSON lines on stdout instead of the interactive display
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Display a table with the outcome of every texture at the end
    #[arg(long = "report")]
    pub report: bool,

    /// Write the per-texture log to this file when the run ends
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Blank strings count as not given
    pub fn ocio_path(&self) -> Option<PathBuf> {
        self.ocio
            .as_ref()
            .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
            .cloned()
    }

    pub fn run_config(&self, converter: PathBuf) -> RunConfig {
        RunConfig {
            root: self.root.clone(),
            filter: self.filter.clone(),
            recursive: !self.no_recursive,
            verbose: self.verbose,
            color_config: self.ocio_path(),
            converter,
            workers: (self.jobs > 0).then_some(self.jobs),
        }
    }
}
