//! Progress bars for the sequential passes over a trace.

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{msg}: {percent:>3}%|{wide_bar}| {pos}/{len} [{elapsed_precise}<{eta_precise}, {per_sec}]";

/// A tqdm-like bar drawn on stderr, or a hidden one when `enabled` is false.
pub fn progress_bar(len: u64, label: &'static str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len).with_message(label);
    if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
        bar.set_style(style);
    }
    bar
}
