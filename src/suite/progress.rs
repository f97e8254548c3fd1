//! Optional terminal progress bar for suite runs (`progress` feature).

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct SuiteProgress {
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

#[cfg(feature = "progress")]
impl SuiteProgress {
    pub(crate) fn new(len: usize) -> Self {
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    pub(crate) fn start(&self, test: &str) {
        self.bar.set_message(test.to_string());
    }

    pub(crate) fn advance(&self) {
        self.bar.inc(1);
    }

    pub(crate) fn abandon(&self) {
        self.bar.abandon();
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_with_message("suite complete");
    }
}

#[cfg(not(feature = "progress"))]
impl SuiteProgress {
    pub(crate) fn new(_len: usize) -> Self {
        Self {}
    }

    pub(crate) fn start(&self, _test: &str) {}

    pub(crate) fn advance(&self) {}

    pub(crate) fn abandon(&self) {}

    pub(crate) fn finish(&self) {}
}
