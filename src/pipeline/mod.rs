//! Pipeline entry points for export operations.
//!
//! - `run_events_export`: Calendar instances to `events/<id>.json`
//! - `run_ministries_export`: Ministry pages to `ministries/<slug>.md`

pub mod events;
pub mod ministries;

use std::path::PathBuf;

pub use events::{EventExportSummary, event_window, run_events_export};
pub use ministries::{MinistryExportSummary, run_ministries_export};

/// Output roots for an export run.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub data_dir: PathBuf,
    pub assets_dir: PathBuf,
}

impl ExportPaths {
    pub fn new(data_dir: impl Into<PathBuf>, assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            assets_dir: assets_dir.into(),
        }
    }

    pub fn events_dir(&self) -> PathBuf {
        self.data_dir.join("events")
    }

    pub fn ministries_dir(&self) -> PathBuf {
        self.data_dir.join("ministries")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.assets_dir.join("images")
    }
}
