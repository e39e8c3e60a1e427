use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::backend::CaptureBackend;
use super::types::{CaptureError, CaptureResult, ScreenshotRecord};
use super::utils::capture_timestamp;
use crate::aggregator::RunAggregator;

/// Captures screenshots into a run's screenshot directory and registers them
/// with the run.
#[derive(Debug, Clone)]
pub struct ScreenshotRecorder {
    dir: PathBuf,
    aggregator: Arc<RunAggregator>,
}

impl ScreenshotRecorder {
    /// `dir` must exist; see [`OutputLayout::init`](crate::layout::OutputLayout::init).
    pub fn new(dir: impl Into<PathBuf>, aggregator: Arc<RunAggregator>) -> Self {
        Self {
            dir: dir.into(),
            aggregator,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn aggregator(&self) -> &Arc<RunAggregator> {
        &self.aggregator
    }

    /// Capture, persist and record one screenshot.
    ///
    /// The sequence id is assigned only once the backend has produced an
    /// image, and the file write happens under the aggregator lock, so a
    /// failure at either point leaves no gap in the id sequence.
    pub fn capture<B>(
        &self,
        backend: &mut B,
        name: &str,
        full_page: bool,
        description: &str,
    ) -> CaptureResult<ScreenshotRecord>
    where
        B: CaptureBackend + ?Sized,
    {
        if name.trim().is_empty() {
            return Err(CaptureError::InvalidName);
        }

        let image = backend.capture(full_page)?;
        let timestamp = capture_timestamp();

        let record = self.aggregator.record_screenshot_with(|id| {
            let record = ScreenshotRecord::new(id, name, description, full_page, timestamp);
            let path = self.dir.join(&record.filename);
            fs::write(&path, &image.image_data)
                .map_err(|source| CaptureError::Write { path, source })?;
            Ok(record)
        })?;

        info!(
            source = backend.source_type(),
            file = %record.filename,
            "Screenshot {}: {} - {}",
            record.id,
            record.name,
            record.description
        );
        Ok(record)
    }
}
