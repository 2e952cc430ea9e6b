//! Stderr progress for `detfeat`. Stdout carries only the JSON summaries.
//!
//! Each stage prints one completion line carrying its outcome, for example
//! `✔ Detect frames 120 frames, 341 detections, 2 skipped [3.41s]`.

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use detection_features::FrameOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    /// Spinners and bars when stderr is a terminal and stdout is not piped.
    Auto,
    /// `==>` lines only.
    Plain,
    /// Spinners and bars whenever stderr is a terminal.
    Pretty,
}

impl ProgressMode {
    fn parse(flag: &str) -> Self {
        match flag {
            "plain" => ProgressMode::Plain,
            "pretty" => ProgressMode::Pretty,
            _ => ProgressMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    animate: bool,
}

impl Ui {
    pub fn from_flag(flag: &str, stderr_is_tty: bool, stdout_is_tty: bool) -> Self {
        let animate = stderr_is_tty
            && match ProgressMode::parse(flag) {
                ProgressMode::Pretty => true,
                ProgressMode::Auto => stdout_is_tty,
                ProgressMode::Plain => false,
            };
        Self { animate }
    }

    pub fn stage(&self, name: &'static str) -> Stage {
        let spinner = if self.animate {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(name);
            spinner.enable_steady_tick(Duration::from_millis(120));
            Some(spinner)
        } else {
            eprintln!("==> {name}");
            None
        };
        Stage {
            name,
            outcome: None,
            started: Instant::now(),
            spinner,
        }
    }

    /// Counts frames as the pipeline reports them. Draws a bar only when animating.
    pub fn frames(&self, total: usize) -> FrameTally {
        let bar = self.animate.then(|| {
            let bar =
                ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} frames {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        });
        FrameTally {
            bar,
            frames: Cell::new(0),
            detections: Cell::new(0),
            skipped: Cell::new(0),
        }
    }
}

/// One CLI stage. Finishes with its outcome and elapsed time when dropped.
pub struct Stage {
    name: &'static str,
    outcome: Option<String>,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl Stage {
    pub fn outcome(&mut self, outcome: impl fmt::Display) {
        self.outcome = Some(outcome.to_string());
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let elapsed = Elapsed(self.started.elapsed());
        let line = match &self.outcome {
            Some(outcome) => format!("✔ {} {} [{}]", self.name, outcome, elapsed),
            None => format!("✔ {} [{}]", self.name, elapsed),
        };
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

pub struct FrameTally {
    bar: Option<ProgressBar>,
    frames: Cell<usize>,
    detections: Cell<usize>,
    skipped: Cell<usize>,
}

impl FrameTally {
    pub fn record(&self, frame_id: &str, outcome: &FrameOutcome) {
        self.frames.set(self.frames.get() + 1);
        match outcome {
            FrameOutcome::Written(lines) => self.detections.set(self.detections.get() + lines),
            FrameOutcome::Skipped(_) => self.skipped.set(self.skipped.get() + 1),
        }
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{frame_id}: {self}"));
            bar.inc(1);
        }
    }
}

impl fmt::Display for FrameTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} detections, {} skipped",
            self.frames.get(),
            self.detections.get(),
            self.skipped.get()
        )
    }
}

impl Drop for FrameTally {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

struct Elapsed(Duration);

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < Duration::from_secs(1) {
            write!(f, "{}ms", self.0.as_millis())
        } else {
            write!(f, "{:.2}s", self.0.as_secs_f64())
        }
    }
}
