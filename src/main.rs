use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tx_converter::cli::Args;
use tx_converter::config_file::{remember_converter, JsonPreferenceStore, PreferenceStore};
use tx_converter::conversion::{
    BatchEvent, BatchOrchestrator, BatchResult, ConversionOutcome, OutcomeKind, SystemExecutor,
};
use tx_converter::json_output::{JsonEmitter, JsonMessage};
use tx_converter::report::ConversionReport;
use tx_converter::utils::{
    create_progress_bar, display_name, format_duration, warn_println,
};

const MAKETX_BINARY: &str = "maketx";

/// `RUST_LOG` wins over the verbosity flag when set
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "tx_converter=debug"
    } else {
        "tx_converter=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--maketx` wins and is remembered; then the saved path; then `PATH`.
///
/// An empty path is returned when nothing is found, which the batch reports
/// as a missing converter.
fn resolve_converter(args: &Args, store: Option<&dyn PreferenceStore>) -> PathBuf {
    if let Some(maketx) = &args.maketx {
        if let Some(store) = store {
            if let Err(e) = remember_converter(store, maketx) {
                warn!("could not remember maketx path: {:#}", e);
            }
        }
        return maketx.clone();
    }

    if let Some(store) = store {
        match store.load() {
            Ok(prefs) => {
                if let Some(saved) = prefs.maketx {
                    debug!(path = %saved.display(), "using remembered maketx");
                    return saved;
                }
            }
            Err(e) => warn!("could not load preferences, using defaults: {:#}", e),
        }
    }

    match which::which(MAKETX_BINARY) {
        Ok(found) => {
            debug!(path = %found.display(), "found maketx on PATH");
            found
        }
        Err(_) => PathBuf::new(),
    }
}

fn styled_outcome(outcome: &ConversionOutcome) -> String {
    let line = outcome.log_line();
    match outcome.kind {
        OutcomeKind::Converted => style(line).green().to_string(),
        OutcomeKind::Skipped(_) => style(line).dim().to_string(),
        OutcomeKind::Failed => style(line).red().to_string(),
    }
}

fn write_log(path: &Path, lines: &[String]) -> Result<()> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(path, contents).with_context(|| format!("Failed to write log file: {:?}", path))
}

fn print_summary(result: &BatchResult) {
    println!();
    let header = if result.cancelled {
        style("Cancelled - partial results:").bold().yellow()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);
    println!("  Converted: {}", style(result.succeeded).bold().green());
    if result.skipped > 0 {
        println!(
            "  Skipped (already up to date): {}",
            style(result.skipped).bold().yellow()
        );
    }
    if result.failed > 0 {
        println!("  Failed: {}", style(result.failed).bold().red());
    }
    if result.cancelled {
        println!(
            "  Not processed: {}",
            style(result.total - result.done).dim()
        );
    }

    println!();
    println!("{}", style("Performance:").bold().blue());
    println!(
        "  Total time: {} with {} worker(s)",
        style(format_duration(result.elapsed)).bold(),
        result.workers
    );
    if result.done > 0 {
        println!(
            "  Throughput: {}",
            style(format!("{:.1} textures/s", result.items_per_second())).dim()
        );
    }

    if result.failed > 0 {
        println!();
        println!("{}", style("Errors encountered:").bold().red());
        for (i, failure) in result.failures().enumerate() {
            println!(
                "  {}: {} - {}",
                style(format!("#{}", i + 1)).dim(),
                style(display_name(&failure.source))
                    .bold()
                    .red(),
                failure.message
            );
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let interactive = !args.json_progress;

    if interactive {
        println!("{}", style("TX Converter").bold().blue());
        println!("{}", style("Parallel maketx batch conversion").dim());
        println!();
    }

    let store = match JsonPreferenceStore::user_default() {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("preferences unavailable: {:#}", e);
            None
        }
    };
    let converter = resolve_converter(&args, store.as_ref().map(|s| s as &dyn PreferenceStore));
    let config = args.run_config(converter);

    let mut log_lines = vec![format!("=== Starting on {} ===", config.root.display())];

    let handle = BatchOrchestrator::new(SystemExecutor).spawn(config);

    let cancel = handle.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
        warn!("could not install Ctrl-C handler: {}", e);
    }

    let mut emitter = JsonEmitter::new();
    let mut progress: Option<ProgressBar> = None;

    for event in handle.events.iter() {
        if !interactive {
            emitter.handle(&event);
        }

        match &event {
            BatchEvent::Started { total, workers } => {
                let line = format!("Found {} texture(s). Using {} worker(s).", total, workers);
                if interactive {
                    println!("{}", style(&line).cyan());
                    let pb = create_progress_bar(*total as u64);
                    pb.set_message("Converting");
                    progress = Some(pb);
                }
                log_lines.push(line);
            }
            BatchEvent::Item(outcome) => {
                if let Some(pb) = &progress {
                    pb.println(styled_outcome(outcome));
                }
                log_lines.push(outcome.log_line());
            }
            BatchEvent::Progress { done, .. } => {
                if let Some(pb) = &progress {
                    pb.set_position(*done as u64);
                }
            }
            BatchEvent::Cancelling => {
                let line = "Cancellation requested. Stopping...";
                if let Some(pb) = &progress {
                    pb.println(style(line).yellow().to_string());
                }
                log_lines.push(line.to_string());
            }
            BatchEvent::Finished(summary) => {
                if let Some(pb) = progress.take() {
                    pb.finish_and_clear();
                }
                log_lines.push(format!(
                    "Done. Success:{} Fail:{}",
                    summary.succeeded, summary.failed
                ));
            }
        }
    }

    let outcome = handle.join();

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            log_lines.push(format!("FATAL: {}", e));
            if let Some(path) = &args.log_file {
                write_log(path, &log_lines)?;
            }
            if !interactive {
                JsonMessage::Fatal {
                    error: e.to_string(),
                }
                .emit();
            }
            return Err(e.into());
        }
    };

    if interactive {
        print_summary(&result);
        if args.report {
            ConversionReport::from_result(&result).print();
        }
    }

    if let Some(path) = &args.log_file {
        write_log(path, &log_lines)?;
        if interactive {
            println!();
            println!("Log saved to {}", style(path.display()).cyan());
        }
    }

    if result.cancelled && interactive {
        warn_println("Run was cancelled; remaining textures were not converted");
    }

    if result.failed > 0 {
        return Err(anyhow::anyhow!(
            "{} texture(s) failed to convert",
            result.failed
        ));
    }

    Ok(())
}
