use std::io::Write;
use std::path::Path;

use owo_colors::OwoColorize;
use papersum_core::{BatchReport, Phase, ProgressEvent};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Initial => "initial summary",
        Phase::Refine => "refining",
        Phase::Map => "page summaries",
        Phase::Reduce => "final summary",
    }
}

/// Short status for the progress bar message, if the event carries one.
pub fn progress_message(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::DocumentStarted { document, .. } => Some(format!("{document}: loading")),
        ProgressEvent::ChunksLoaded { document, chunks } => {
            Some(format!("{document}: {chunks} pages"))
        }
        ProgressEvent::Step {
            document,
            phase,
            completed,
            total,
        } => Some(format!(
            "{document}: {} ({completed}/{total})",
            phase_label(*phase)
        )),
        _ => None,
    }
}

/// A permanent line for events worth keeping in the scrollback.
pub fn progress_line(event: &ProgressEvent, color: ColorMode) -> Option<String> {
    let line = match event {
        ProgressEvent::DocumentCached {
            index,
            total,
            document,
        } => {
            let tag = "CACHED";
            let tag = if color.enabled() {
                tag.dimmed().to_string()
            } else {
                tag.to_string()
            };
            format!("[{}/{}] {} {}", index + 1, total, tag, document)
        }
        ProgressEvent::DocumentComplete {
            index,
            total,
            document,
            elapsed,
        } => {
            let tag = if color.enabled() {
                "DONE".green().to_string()
            } else {
                "DONE".to_string()
            };
            format!(
                "[{}/{}] {} {} ({:.1}s)",
                index + 1,
                total,
                tag,
                document,
                elapsed.as_secs_f64()
            )
        }
        ProgressEvent::DocumentFailed {
            index,
            total,
            document,
            message,
        } => {
            let tag = if color.enabled() {
                "FAILED".red().to_string()
            } else {
                "FAILED".to_string()
            };
            format!("[{}/{}] {} {}: {}", index + 1, total, tag, document, message)
        }
        _ => return None,
    };
    Some(line)
}

/// Print the end-of-run report.
pub fn print_report(
    w: &mut dyn Write,
    report: &BatchReport,
    output_dir: &Path,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "Summary".bold())?;
    } else {
        writeln!(w, "Summary")?;
    }
    writeln!(w, "  Generated: {}", report.generated)?;
    writeln!(w, "  Cached:    {}", report.cached)?;

    let failed = report.failures.len();
    if failed > 0 && color.enabled() {
        writeln!(w, "  Failed:    {}", failed.red())?;
    } else {
        writeln!(w, "  Failed:    {}", failed)?;
    }
    writeln!(w, "  Output:    {}", output_dir.display())?;

    if !report.failures.is_empty() {
        writeln!(w)?;
        for failure in &report.failures {
            if color.enabled() {
                writeln!(w, "  {} {}", failure.document.bold(), failure.error.dimmed())?;
            } else {
                writeln!(w, "  {} {}", failure.document, failure.error)?;
            }
        }
    }

    if report.cancelled {
        writeln!(w)?;
        let msg = "Cancelled: remaining documents were not summarized.";
        if color.enabled() {
            writeln!(w, "{}", msg.yellow())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    Ok(())
}
