//! Stand-in renderer for tests
//!
//! [`FixtureConverter`] reads the "document" as text of the form
//! `<label>:<pages>` and writes a matching synthetic PDF, so tests can run the
//! whole pipeline without pandoc installed. A document whose text starts with
//! `corrupt` fails the way a real renderer would.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::convert::{check_input, Converter};
use crate::error::ConvertError;

#[derive(Debug, Default)]
pub struct FixtureConverter {
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FixtureConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every conversion
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Conversions started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of conversions observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Body of an upload the fixture renderer turns into `pages` labelled pages
pub fn document_body(label: &str, pages: u32) -> Vec<u8> {
    format!("{}:{}", label, pages).into_bytes()
}

/// Body the fixture renderer refuses to convert
pub fn corrupt_body() -> Vec<u8> {
    b"corrupt document".to_vec()
}

#[async_trait]
impl Converter for FixtureConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.render(input, output).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FixtureConverter {
    async fn render(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        check_input(input).await?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let text = String::from_utf8_lossy(&tokio::fs::read(input).await?).to_string();
        let parsed = text
            .split_once(':')
            .filter(|_| !text.starts_with("corrupt"))
            .and_then(|(label, pages)| Some((label.to_string(), pages.trim().parse::<u32>().ok()?)))
            .filter(|(_, pages)| *pages > 0);

        match parsed {
            Some((label, pages)) => {
                let pdf = docflow_pdf::fixtures::sample_document(pages, &label);
                tokio::fs::write(output, pdf).await?;
                Ok(())
            }
            None => Err(ConvertError::Failed {
                exit_code: Some(43),
                stderr: "Error producing PDF.".to_string(),
            }),
        }
    }
}
