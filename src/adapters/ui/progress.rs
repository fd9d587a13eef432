//! indicatif progress bars for probes and batch commits.

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.magenta} {msg} [{bar:40.magenta/cyan}] {pos}/{len} ({elapsed})";

pub fn bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
