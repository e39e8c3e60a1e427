// Core types for screenshot capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use super::utils::screenshot_filename;
use crate::record::LifecycleError;

/// Metadata for one persisted screenshot.
///
/// Records are created by the [`ScreenshotRecorder`](super::ScreenshotRecorder)
/// once the image is on disk and are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    /// Sequence id, 1-based and gapless within a run
    pub id: u32,

    /// Short name as given by the scenario (e.g. "demand-submitted")
    pub name: String,

    /// File name inside the screenshots directory (`{id:03}-{slug}.png`)
    pub filename: String,

    /// Free-text description, may be empty
    pub description: String,

    /// Time the capture primitive returned
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,

    /// Whether the whole scrollable page was captured instead of the viewport
    pub full_page: bool,
}

impl ScreenshotRecord {
    /// Build a record, deriving the file name from the id and name.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        description: impl Into<String>,
        full_page: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            filename: screenshot_filename(id, &name),
            name,
            description: description.into(),
            timestamp,
            full_page,
        }
    }
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Screenshot names are used as file slugs and may not be blank
    #[error("screenshot name must not be empty")]
    InvalidName,

    /// The capture primitive failed (page not ready, target closed, ...)
    #[error("capture failed: {0}")]
    Backend(String),

    /// The image could not be encoded
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// The image could not be written to the screenshots directory
    #[error("failed to write screenshot {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted record does not carry the id the run assigned
    #[error(transparent)]
    Sequence(#[from] LifecycleError),
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Encode(err.to_string())
    }
}

/// ISO-8601 timestamps with millisecond precision and a `Z` suffix.
pub(crate) mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
