use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

const TICK: Duration = Duration::from_millis(100);

/// Renders short human-readable status text.
///
/// May be called at a high rate.
pub trait DisplaySink: Send + Sync {
    fn set_text(&self, text: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDisplay;

impl DisplaySink for NoopDisplay {
    fn set_text(&self, _text: &str) {}
}

/// Writes every status text to the log at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn set_text(&self, text: &str) {
        info!("{}", text);
    }
}

/// Spinner line on stderr showing the latest status text.
///
/// Draws nothing when stderr is not a terminal.
pub struct TerminalStatusLine {
    bar: ProgressBar,
}

impl Default for TerminalStatusLine {
    fn default() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(TICK);
        Self::with_bar(bar)
    }
}

impl TerminalStatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(bar: ProgressBar) -> Self {
        TerminalStatusLine { bar }
    }

    /// Removes the status line.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl DisplaySink for TerminalStatusLine {
    fn set_text(&self, text: &str) {
        self.bar.set_message(text.to_owned());
    }
}
