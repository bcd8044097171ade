#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `parcel_fusion` binary.
//!
//! [`init_logger`] routes `log` output through `indicatif-log-bridge` so log
//! lines and progress bars share the terminal. [`BatchProgress`] renders
//! matcher batches behind the [`ProgressCallback`] contract, and
//! [`StageProgress`] walks through the named stages of a command.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use parcel_fusion_parallel::progress::ProgressCallback;

pub use indicatif::MultiProgress;

const SPINNER_TEMPLATE: &str = "{spinner:.yellow} {msg}";
const BATCH_TEMPLATE: &str = "  {msg} {wide_bar:.yellow/dim} {pos}/{len} batches {percent}% [{eta}]";
const STAGE_TEMPLATE: &str = "{prefix:.bold} {msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]";

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// Matcher batch progress.
///
/// Starts as a spinner because the batch count is only known once a source
/// is loaded and split; every [`ProgressCallback::set_total`] restarts the
/// bar for the next source.
pub struct BatchProgress {
    bar: ProgressBar,
    bar_style: ProgressStyle,
}

impl BatchProgress {
    /// Adds a batch bar labelled `message` to `multi`.
    #[must_use]
    pub fn new(multi: &MultiProgress, message: &str) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner));
        bar.set_message(message.to_string());

        Arc::new(Self {
            bar,
            bar_style: style(BATCH_TEMPLATE, ProgressStyle::default_bar).progress_chars("##-"),
        })
    }
}

impl ProgressCallback for BatchProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// A fixed list of named stages, advanced one at a time.
pub struct StageProgress {
    bar: ProgressBar,
    stages: &'static [&'static str],
    started: usize,
}

impl StageProgress {
    /// Adds a stage bar labelled `label` to `multi`. Nothing is started yet.
    #[must_use]
    pub fn new(multi: &MultiProgress, label: &str, stages: &'static [&'static str]) -> Self {
        let bar = multi.add(ProgressBar::new(stages.len() as u64));
        bar.set_style(style(STAGE_TEMPLATE, ProgressStyle::default_bar).progress_chars("##-"));
        bar.set_prefix(label.to_string());

        Self {
            bar,
            stages,
            started: 0,
        }
    }

    /// Completes the running stage, if any, and starts the next one.
    pub fn next_stage(&mut self) {
        if self.started > 0 && self.bar.position() < self.stages.len() as u64 {
            self.bar.inc(1);
        }
        if let Some(stage) = self.stages.get(self.started) {
            log::debug!("Stage {}/{}: {stage}", self.started + 1, self.stages.len());
            self.bar.set_message(*stage);
            self.started += 1;
        }
    }

    /// Stages completed so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.bar.position()
    }

    /// Completes every stage and leaves `summary` on the bar.
    pub fn finish(&self, summary: String) {
        self.bar.set_position(self.stages.len() as u64);
        self.bar.finish_with_message(summary);
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// Logs at `info` unless `RUST_LOG` says otherwise. Every progress bar must
/// be added to the returned [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed (tests).
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
