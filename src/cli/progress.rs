//! Terminal progress bar for one file

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

use crate::cipher::ProgressSink;

const TEMPLATE: &str = "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {eta}";

/// `ProgressSink` drawing an indicatif bar on stderr
pub struct FileProgress {
    bar: ProgressBar,
}

impl FileProgress {
    pub fn new(file: &Path) -> Self {
        let style = ProgressStyle::with_template(TEMPLATE)
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_prefix(
            file.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        Self { bar }
    }
}

impl ProgressSink for FileProgress {
    fn start(&mut self, total: u64) {
        self.bar.set_length(total);
    }

    fn advance(&mut self, processed: u64, _total: u64) {
        self.bar.set_position(processed);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}
