//! A single spinner shown while a build runs, with TTY detection so a
//! non-interactive invocation (CI logs, piped output) falls back to plain
//! status lines instead of carriage-return spinner frames.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

pub struct BuildSpinner {
    bar: Option<ProgressBar>,
    start: Instant,
}

impl BuildSpinner {
    /// Start reporting progress before the build id is known —
    /// `Engine::enqueue`'s future doesn't resolve, and so the id isn't
    /// available, until the build has already finished. TTY detection
    /// follows `indicatif`'s own `is_hidden()` check on the draw target, so
    /// this never needs a separate `atty` dependency.
    pub fn start_pending() -> Self {
        let bar = ProgressBar::new_spinner();
        if bar.is_hidden() {
            eprintln!("build submitted, waiting for it to complete");
            return Self { bar: None, start: Instant::now() };
        }

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} build {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("running");
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar: Some(bar), start: Instant::now() }
    }

    /// Stop reporting once `build_id` is known and the build has reached a
    /// terminal outcome; `succeeded` only changes the final line's wording.
    pub fn finish(self, build_id: u64, succeeded: bool) {
        let verdict = if succeeded { "succeeded" } else { "failed" };
        match self.bar {
            Some(bar) => {
                bar.finish_with_message(format!("{build_id} {verdict} in {:?}", self.start.elapsed()));
            }
            None => eprintln!("[{build_id}] build {verdict} in {:?}", self.start.elapsed()),
        }
    }
}
