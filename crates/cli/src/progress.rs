//! Terminal rendering of run output.

use indicatif::{ProgressBar, ProgressStyle};
use ytgrab_core::ProgressSnapshot;

const BAR_TEMPLATE: &str = "{bar:40.cyan/blue} {pos:>3}% {msg}";

/// Feeds fetch tool output lines into a progress bar.
///
/// Progress lines move the bar; every other line is printed above it.
#[derive(Clone)]
pub struct ProgressRenderer {
    bar: ProgressBar,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn render(&self, line: &str) {
        match ProgressSnapshot::parse(line).filter(|_| line.starts_with("[download]")) {
            Some(snapshot) => {
                self.bar.set_position((snapshot.fraction() * 100.0).round() as u64);
                self.bar.set_message(status_message(&snapshot));
            }
            None => self.bar.println(line),
        }
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn status_message(snapshot: &ProgressSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(total) = &snapshot.total {
        parts.push(format!("of {total}"));
    }
    if let Some(speed) = &snapshot.speed {
        parts.push(format!("at {speed}"));
    }
    if let Some(eta) = &snapshot.eta {
        parts.push(format!("ETA {eta}"));
    }
    parts.join(" ")
}
