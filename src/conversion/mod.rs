pub mod batch;
pub mod classify;
pub mod command;
pub mod runner;
pub mod staleness;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

pub use batch::{BatchEvent, BatchHandle, BatchOrchestrator, BatchResult, BatchSummary};
pub use classify::{classify, TextureClass};
pub use command::{build_maketx_command, MaketxCommand};
pub use runner::{convert_one, CommandExecutor, ExecOutput, RunContext, SystemExecutor};
pub use staleness::needs_conversion;

/// Extension appended to a source texture to name its converted output
pub const TX_EXTENSION: &str = "tx";

/// Source formats picked up during enumeration (matched case-insensitively)
pub const VALID_EXTENSIONS: [&str; 10] = [
    "png", "jpg", "jpeg", "tif", "tiff", "exr", "dds", "tga", "bmp", "psd",
];

/// Environment variable consulted when no color config is given explicitly
pub const OCIO_ENV_VAR: &str = "OCIO";

/// One texture scheduled for conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureTask {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub class: TextureClass,
}

impl TextureTask {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let destination = tx_destination(&source);
        let class = source
            .file_name()
            .map(|name| classify(&name.to_string_lossy()))
            .unwrap_or_default();

        Self {
            source,
            destination,
            class,
        }
    }

    pub fn file_name(&self) -> String {
        crate::utils::display_name(&self.source)
    }
}

/// Returns true when the path already carries the `.tx` extension
pub fn is_tx_file(path: &Path) -> bool {
    crate::utils::get_file_extension(path).as_deref() == Some(TX_EXTENSION)
}

/// `foo.png` becomes `foo.png.tx`; a `.tx` file maps onto itself
pub fn tx_destination(source: &Path) -> PathBuf {
    if is_tx_file(source) {
        return source.to_path_buf();
    }
    let mut name = OsString::from(source.as_os_str());
    name.push(".");
    name.push(TX_EXTENSION);
    PathBuf::from(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyConverted,
    UpToDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Converted,
    Skipped(SkipReason),
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Converted => write!(f, "converted"),
            OutcomeKind::Skipped(SkipReason::AlreadyConverted) => write!(f, "skipped (tx)"),
            OutcomeKind::Skipped(SkipReason::UpToDate) => write!(f, "skipped (up-to-date)"),
            OutcomeKind::Failed => write!(f, "failed"),
        }
    }
}

/// Result of converting (or skipping) a single texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub source: PathBuf,
    pub kind: OutcomeKind,
    pub message: String,
    /// Treatment the texture was given (or would have been given) by maketx
    pub class: TextureClass,
}

impl ConversionOutcome {
    pub fn converted(source: &Path, message: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            kind: OutcomeKind::Converted,
            message: message.into(),
            class: TextureClass::default(),
        }
    }

    pub fn skipped(source: &Path, reason: SkipReason, message: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            kind: OutcomeKind::Skipped(reason),
            message: message.into(),
            class: TextureClass::default(),
        }
    }

    pub fn failed(source: &Path, message: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            kind: OutcomeKind::Failed,
            message: message.into(),
            class: TextureClass::default(),
        }
    }

    pub fn with_class(mut self, class: TextureClass) -> Self {
        self.class = class;
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Converted
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.kind, OutcomeKind::Skipped(_))
    }

    pub fn is_failure(&self) -> bool {
        self.kind == OutcomeKind::Failed
    }

    /// One-line log entry, prefixed with a status marker
    pub fn log_line(&self) -> String {
        let marker = match self.kind {
            OutcomeKind::Converted => "✓",
            OutcomeKind::Skipped(_) => "•",
            OutcomeKind::Failed => "✗",
        };
        format!(
            "{} {}: {}",
            marker,
            crate::utils::display_name(&self.source),
            self.message
        )
    }
}

/// Options for a single batch run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    /// Case-sensitive substring the file name must contain
    pub filter: Option<String>,
    pub recursive: bool,
    pub verbose: bool,
    /// Explicit color config; `$OCIO` is used when absent
    pub color_config: Option<PathBuf>,
    pub converter: PathBuf,
    /// Overrides the computed worker count
    pub workers: Option<usize>,
}

impl RunConfig {
    pub fn new(root: impl Into<PathBuf>, converter: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: None,
            recursive: true,
            verbose: false,
            color_config: None,
            converter: converter.into(),
            workers: None,
        }
    }

    /// The filter with surrounding whitespace removed, if anything is left
    pub fn effective_filter(&self) -> Option<&str> {
        self.filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_destination_appends_suffix() {
        assert_eq!(
            tx_destination(Path::new("/tex/wood_basecolor.png")),
            PathBuf::from("/tex/wood_basecolor.png.tx")
        );
        assert_eq!(
            tx_destination(Path::new("rock.height.exr")),
            PathBuf::from("rock.height.exr.tx")
        );
    }

    #[test]
    fn test_tx_destination_of_tx_is_itself() {
        assert_eq!(
            tx_destination(Path::new("/tex/wood.png.TX")),
            PathBuf::from("/tex/wood.png.TX")
        );
        assert!(is_tx_file(Path::new("a.tx")));
        assert!(!is_tx_file(Path::new("a.txt")));
    }

    #[test]
    fn test_texture_task_classifies_by_name() {
        let task = TextureTask::new("/tex/rock_height_albedo.exr");
        assert!(task.class.displacement);
        assert!(!task.class.color_managed);
        assert_eq!(task.destination, PathBuf::from("/tex/rock_height_albedo.exr.tx"));
        assert_eq!(task.file_name(), "rock_height_albedo.exr");
    }

    #[test]
    fn test_outcome_log_line_markers() {
        let src = Path::new("/tex/a.png");
        assert_eq!(ConversionOutcome::converted(src, "OK").log_line(), "✓ a.png: OK");
        assert_eq!(
            ConversionOutcome::skipped(src, SkipReason::UpToDate, "fresh").log_line(),
            "• a.png: fresh"
        );
        assert_eq!(ConversionOutcome::failed(src, "boom").log_line(), "✗ a.png: boom");
    }

    #[test]
    fn test_failure_mentioning_skip_is_still_a_failure() {
        let outcome = ConversionOutcome::failed(Path::new("a.png"), "maketx failed: skipping mip 3");
        assert!(outcome.is_failure());
        assert!(!outcome.is_skipped());
    }

    #[test]
    fn test_effective_filter_trims_blank() {
        let mut config = RunConfig::new("/tex", "/bin/maketx");
        assert_eq!(config.effective_filter(), None);
        config.filter = Some("   ".to_string());
        assert_eq!(config.effective_filter(), None);
        config.filter = Some(" wood ".to_string());
        assert_eq!(config.effective_filter(), Some("wood"));
    }
}
