// src/models/mod.rs

//! Domain models for the exporter.
//!
//! Records decode from inlined JSON:API resources and serialize into the
//! shapes the static site reads.

mod config;
mod event;
mod group;
mod page;

// Re-export all public types
pub use config::{ApiConfig, Config, ExportConfig, MinistryMapping, RateLimitConfig};
pub use event::{
    CalendarInstance, Event, EventApprovalStatus, EventConnection, RegistrationEvent, Tag,
};
pub use group::{GroupTag, GroupTagGroup};
pub use page::{
    Block, ButtonAttributes, ButtonBlock, DividerBlock, GridAttributes, GridBlock, GridItem,
    ImageAttributes, ImageBlock, Page, SectionHeaderAttributes, SectionHeaderBlock,
    TextAttributes, TextBlock, VideoAttributes, VideoBlock,
};

use serde::{Deserialize, Deserializer};

/// Accept ids the API sends either as strings or as bare numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
