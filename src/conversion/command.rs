use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::classify::TextureClass;

/// Rendering space every texture is converted into
pub const WORKING_SPACE: &str = "ACES - ACEScg";
/// Input space for color (sRGB-encoded) textures
pub const SRGB_SPACE: &str = "Utility - sRGB - Texture";
/// Input space for data textures (roughness, normals, displacement...)
pub const RAW_SPACE: &str = "Utility - Raw";

/// Flags applied to every conversion regardless of texture type
const FIXED_FLAGS: [&str; 14] = [
    "--opaque-detect",
    "--constant-color-detect",
    "--monochrome-detect",
    "--fixnan",
    "box3",
    "-u",
    "--filter",
    "lanczos3",
    "--attrib",
    "tiff:half",
    "1",
    "--unpremult",
    "--oiio",
    "--colorconvert",
];

/// A fully resolved maketx invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaketxCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl MaketxCommand {
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        // Own process group, so a terminal Ctrl-C never interrupts a running conversion
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    /// Shell-like rendering used for logs; arguments with spaces are quoted
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|arg| {
                let arg = arg.to_string_lossy();
                if arg.contains(' ') {
                    format!("\"{}\"", arg)
                } else {
                    arg.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when `flag` is immediately followed by `value`
    pub fn has_pair(&self, flag: &str, value: &str) -> bool {
        self.args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }
}

/// Build the maketx argument list for one texture.
///
/// Pure: the same inputs always produce the same command. maketx itself runs
/// single-threaded; parallelism comes from running many instances at once.
pub fn build_maketx_command(
    source: &Path,
    color_config: Option<&Path>,
    verbose: bool,
    class: TextureClass,
    converter: &Path,
) -> MaketxCommand {
    let mut args: Vec<OsString> = vec![source.as_os_str().to_owned()];

    if let Some(ocio) = color_config {
        args.push("--colorconfig".into());
        args.push(ocio.as_os_str().to_owned());
    }

    // --colorconvert closes the fixed block; the color pair comes next
    args.extend(FIXED_FLAGS.iter().map(OsString::from));

    let input_space = if class.color_managed {
        SRGB_SPACE
    } else {
        RAW_SPACE
    };
    args.push(input_space.into());
    args.push(WORKING_SPACE.into());

    args.push("-d".into());
    args.push(if class.displacement { "float" } else { "half" }.into());

    if verbose {
        args.push("-v".into());
    }

    args.push("--threads".into());
    args.push("1".into());

    MaketxCommand {
        program: converter.to_path_buf(),
        args,
    }
}
