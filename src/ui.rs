use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use anomaly_scan::ScanProgress;

/// Where stderr progress goes: spinners and bars on a terminal, plain
/// `==>` lines otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => Self::Plain,
            Some("pretty") => Self::Pretty,
            _ => Self::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    /// `disable_pretty` only affects `auto` (set when stdout is piped).
    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let pretty = is_tty
            && match UiMode::parse(ui_flag) {
                UiMode::Pretty => true,
                UiMode::Auto => !disable_pretty,
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    fn spinner(&self, template: &str, message: String) -> Option<ProgressBar> {
        if !self.pretty {
            eprintln!("==> {message}");
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message);
        Some(spinner)
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = self.spinner("{spinner} {msg}", format!("{name}…"));
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
        }
    }

    /// Percentage bar once a total is known, frame counter otherwise.
    pub fn scan_progress(&self, name: &str) -> ScanProgressBar {
        ScanProgressBar {
            bar: self.spinner("{spinner} {msg} {pos} frames", name.to_string()),
            has_length: false,
            last_reported: None,
            start: Instant::now(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct ScanProgressBar {
    bar: Option<ProgressBar>,
    has_length: bool,
    last_reported: Option<u8>,
    start: Instant,
}

impl ScanProgressBar {
    pub fn update(&mut self, progress: ScanProgress) {
        let Some(bar) = &self.bar else {
            // Plain mode: one line per 10% step, or per 100 frames.
            let step = match progress.percent() {
                Some(percent) => percent / 10,
                None => (progress.frames_processed / 100).min(u8::MAX as u64) as u8,
            };
            if self.last_reported != Some(step) {
                self.last_reported = Some(step);
                eprintln!("    {progress}");
            }
            return;
        };

        match progress.total_frames {
            Some(total) => {
                if !self.has_length {
                    self.has_length = true;
                    let style = ProgressStyle::with_template(
                        "{msg} [{bar:40}] {pos}/{len} ({percent}%) {elapsed}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                    bar.set_style(style.progress_chars("=> "));
                }
                bar.set_length(total);
                bar.set_position(progress.frames_processed.min(total));
            }
            None => bar.set_position(progress.frames_processed),
        }
    }

    pub fn finish(self, summary: &str) {
        let message = format!("{summary} ({})", format_duration(self.start.elapsed()));
        match &self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
