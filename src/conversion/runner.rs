use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::debug;

use super::command::{build_maketx_command, MaketxCommand};
use super::staleness::needs_conversion;
use super::{is_tx_file, ConversionOutcome, SkipReason, TextureTask};
use crate::utils::display_name;

/// What came back from one converter process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs converter commands. Implementations are shared across worker threads.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &MaketxCommand, capture_stdout: bool) -> io::Result<ExecOutput>;
}

/// Spawns the real converter and waits for it to exit
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, command: &MaketxCommand, capture_stdout: bool) -> io::Result<ExecOutput> {
        let output = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .output()?;

        Ok(ExecOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Per-run settings every conversion needs
#[derive(Debug, Clone)]
pub struct RunContext {
    pub color_config: Option<PathBuf>,
    pub converter: PathBuf,
    pub verbose: bool,
}

/// Convert a single texture, never failing: every problem becomes an outcome.
pub fn convert_one<E>(task: &TextureTask, ctx: &RunContext, executor: &E) -> ConversionOutcome
where
    E: CommandExecutor + ?Sized,
{
    let outcome = if is_tx_file(&task.source) {
        ConversionOutcome::skipped(
            &task.source,
            SkipReason::AlreadyConverted,
            "Already a .tx; skipping.",
        )
    } else {
        match try_convert(task, ctx, executor) {
            Ok(outcome) => outcome,
            Err(e) => ConversionOutcome::failed(&task.source, format!("Unexpected error: {}", e)),
        }
    };
    outcome.with_class(task.class)
}

fn try_convert<E>(task: &TextureTask, ctx: &RunContext, executor: &E) -> io::Result<ConversionOutcome>
where
    E: CommandExecutor + ?Sized,
{
    if !needs_conversion(&task.source, &task.destination)? {
        return Ok(ConversionOutcome::skipped(
            &task.source,
            SkipReason::UpToDate,
            format!(
                "Up-to-date .tx exists: {}; skipping.",
                display_name(&task.destination)
            ),
        ));
    }

    let command = build_maketx_command(
        &task.source,
        ctx.color_config.as_deref(),
        ctx.verbose,
        task.class,
        &ctx.converter,
    );
    debug!(command = %command.display(), "running maketx");

    let output = executor.execute(&command, ctx.verbose)?;
    Ok(outcome_from_output(&task.source, output, ctx.verbose))
}

fn outcome_from_output(source: &Path, output: ExecOutput, verbose: bool) -> ConversionOutcome {
    if output.success {
        let stdout = output.stdout.trim();
        let message = if verbose && !stdout.is_empty() {
            stdout.to_string()
        } else {
            "OK".to_string()
        };
        ConversionOutcome::converted(source, message)
    } else {
        let stderr = output.stderr.trim();
        let detail = if stderr.is_empty() {
            "Unknown error"
        } else {
            stderr
        };
        ConversionOutcome::failed(source, format!("maketx failed: {}", detail))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::conversion::OutcomeKind;
    use filetime::{set_file_mtime, FileTime};
    use std::fs::File;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every command and answers with a canned result
    pub(crate) struct FakeExecutor {
        pub calls: Mutex<Vec<MaketxCommand>>,
        /// `capture_stdout` as passed to each call
        pub captures: Mutex<Vec<bool>>,
        pub reply: io::Result<ExecOutput>,
        pub delay: std::time::Duration,
        /// Sources whose path contains this fragment exit nonzero
        pub fail_when: Option<&'static str>,
    }

    impl FakeExecutor {
        pub fn succeeding() -> Self {
            Self::replying(Ok(ExecOutput {
                success: true,
                stdout: "  wrote mip levels\n".to_string(),
                stderr: String::new(),
            }))
        }

        pub fn replying(reply: io::Result<ExecOutput>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                captures: Mutex::new(Vec::new()),
                reply,
                delay: std::time::Duration::ZERO,
                fail_when: None,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl CommandExecutor for FakeExecutor {
        fn execute(&self, command: &MaketxCommand, capture_stdout: bool) -> io::Result<ExecOutput> {
            self.calls.lock().unwrap().push(command.clone());
            self.captures.lock().unwrap().push(capture_stdout);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if let Some(fragment) = self.fail_when {
                if command.args[0].to_string_lossy().contains(fragment) {
                    return Ok(ExecOutput {
                        success: false,
                        stdout: String::new(),
                        stderr: format!("cannot read {}", fragment),
                    });
                }
            }
            match &self.reply {
                Ok(out) => Ok(out.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn ctx(verbose: bool) -> RunContext {
        RunContext {
            color_config: Some(PathBuf::from("/aces/config.ocio")),
            converter: PathBuf::from("/opt/maketx"),
            verbose,
        }
    }

    fn texture(dir: &TempDir, name: &str, unix_secs: i64) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
        path
    }

    #[test]
    fn test_tx_source_is_skipped_without_running() {
        let exec = FakeExecutor::succeeding();
        let task = TextureTask::new("/tex/wood.png.tx");
        let outcome = convert_one(&task, &ctx(false), &exec);

        assert_eq!(outcome.kind, OutcomeKind::Skipped(SkipReason::AlreadyConverted));
        assert!(!outcome.is_success());
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn test_up_to_date_is_skipped_without_running() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "wood_basecolor.png", 1_000);
        texture(&dir, "wood_basecolor.png.tx", 2_000);

        let exec = FakeExecutor::succeeding();
        let outcome = convert_one(&TextureTask::new(&src), &ctx(false), &exec);

        assert_eq!(outcome.kind, OutcomeKind::Skipped(SkipReason::UpToDate));
        assert!(outcome.message.contains("wood_basecolor.png.tx"));
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn test_success_reports_ok_when_quiet() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "wood_basecolor.png", 1_000);

        let exec = FakeExecutor::succeeding();
        let outcome = convert_one(&TextureTask::new(&src), &ctx(false), &exec);

        assert!(outcome.is_success());
        assert_eq!(outcome.message, "OK");
        assert_eq!(*exec.captures.lock().unwrap(), vec![false]);
        let calls = exec.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].has_pair("Utility - sRGB - Texture", "ACES - ACEScg"));
    }

    #[test]
    fn test_success_reports_stdout_when_verbose() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "wood.png", 1_000);

        let exec = FakeExecutor::succeeding();
        let outcome = convert_one(&TextureTask::new(&src), &ctx(true), &exec);

        assert!(outcome.is_success());
        assert_eq!(outcome.message, "wrote mip levels");
        assert_eq!(*exec.captures.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_outcome_carries_task_class() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "rock_height.exr", 1_000);
        let task = TextureTask::new(&src);

        let outcome = convert_one(&task, &ctx(false), &FakeExecutor::succeeding());
        assert_eq!(outcome.class, task.class);
        assert!(outcome.class.displacement);

        let tx = TextureTask::new("/tex/wood_albedo.png.tx");
        let outcome = convert_one(&tx, &ctx(false), &FakeExecutor::succeeding());
        assert_eq!(outcome.class, tx.class);
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "wood.png", 1_000);

        let exec = FakeExecutor::replying(Ok(ExecOutput {
            success: false,
            stdout: String::new(),
            stderr: "could not open file\n".to_string(),
        }));
        let outcome = convert_one(&TextureTask::new(&src), &ctx(false), &exec);

        assert!(outcome.is_failure());
        assert_eq!(outcome.message, "maketx failed: could not open file");
    }

    #[test]
    fn test_nonzero_exit_without_stderr() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "wood.png", 1_000);

        let exec = FakeExecutor::replying(Ok(ExecOutput::default()));
        let outcome = convert_one(&TextureTask::new(&src), &ctx(false), &exec);

        assert!(outcome.is_failure());
        assert_eq!(outcome.message, "maketx failed: Unknown error");
    }

    #[test]
    fn test_spawn_error_becomes_failure() {
        let dir = TempDir::new().unwrap();
        let src = texture(&dir, "wood.png", 1_000);

        let exec = FakeExecutor::replying(Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no such converter",
        )));
        let outcome = convert_one(&TextureTask::new(&src), &ctx(false), &exec);

        assert!(outcome.is_failure());
        assert!(outcome.message.starts_with("Unexpected error:"));
        assert!(outcome.message.contains("no such converter"));
    }

    #[test]
    fn test_vanished_source_becomes_failure() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("gone.png");
        texture(&dir, "gone.png.tx", 2_000);

        let exec = FakeExecutor::succeeding();
        let outcome = convert_one(&TextureTask::new(&src), &ctx(false), &exec);

        assert!(outcome.is_failure());
        assert!(outcome.message.starts_with("Unexpected error:"));
        assert_eq!(exec.call_count(), 0);
    }

    #[cfg(unix)]
    fn shell(script: &str) -> MaketxCommand {
        MaketxCommand {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_drops_stdout_when_quiet() {
        let out = SystemExecutor
            .execute(&shell("echo out; echo err >&2; exit 3"), false)
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.stdout, "");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_captures_stdout_when_verbose() {
        let out = SystemExecutor
            .execute(&shell("echo out; echo err >&2; exit 3"), true)
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");

        let out = SystemExecutor.execute(&shell("exit 0"), true).unwrap();
        assert!(out.success);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_executor_isolates_process_group() {
        let out = SystemExecutor
            .execute(&shell("echo $$ $(cut -d' ' -f5 /proc/$$/stat)"), true)
            .unwrap();
        let child: Vec<&str> = out.stdout.split_whitespace().collect();
        assert_eq!(child.len(), 2, "unexpected output: {:?}", out.stdout);
        // Group leader of its own group
        assert_eq!(child[0], child[1]);

        let stat = std::fs::read_to_string("/proc/self/stat").unwrap();
        let own_pgid = stat
            .rsplit(')')
            .next()
            .unwrap()
            .split_whitespace()
            .nth(2)
            .unwrap();
        assert_ne!(child[1], own_pgid);
    }
}
