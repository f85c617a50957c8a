// src/services/ministry.rs

//! Ministry classification for calendar events and publishing pages.

use std::collections::BTreeMap;

use crate::models::{CalendarInstance, Config, MinistryMapping};

/// Tag group name that carries the ministry in both Calendar and Groups.
pub const MINISTRY_TAG_GROUP: &str = "Ministry";

/// A resolved ministry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ministry {
    pub slug: String,
    pub color: String,
}

/// Resolves ministries from tag maps and page slugs.
#[derive(Debug, Clone)]
pub struct MinistryClassifier {
    mappings: Vec<MinistryMapping>,
    fallback: Ministry,
}

impl MinistryClassifier {
    pub fn new(mappings: Vec<MinistryMapping>, default_slug: &str, default_color: &str) -> Self {
        Self {
            mappings,
            fallback: Ministry {
                slug: default_slug.to_string(),
                color: default_color.to_string(),
            },
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ministries.clone(),
            &config.export.default_ministry,
            &config.export.default_color,
        )
    }

    /// Resolve a ministry. A matching group tag beats a matching event tag;
    /// with neither, the default ministry is returned.
    pub fn classify(
        &self,
        group_tags: &BTreeMap<String, String>,
        event_tags: &BTreeMap<String, String>,
    ) -> Ministry {
        let by_group = group_tags.get(MINISTRY_TAG_GROUP).and_then(|value| {
            self.mappings
                .iter()
                .find(|m| m.group_tag_value.as_deref() == Some(value.as_str()))
        });

        let by_event = || {
            event_tags.get(MINISTRY_TAG_GROUP).and_then(|name| {
                self.mappings
                    .iter()
                    .find(|m| m.tag_name.as_deref() == Some(name.as_str()))
            })
        };

        match by_group.or_else(by_event) {
            Some(mapping) => Ministry {
                slug: mapping.slug.clone(),
                color: mapping.color.clone(),
            },
            None => self.fallback.clone(),
        }
    }

    /// Set `ministry` and `color` on an instance from its tag maps.
    pub fn apply(&self, instance: &mut CalendarInstance) {
        let ministry = self.classify(&instance.group_tags, &instance.event_tags);
        instance.ministry = ministry.slug;
        instance.color = ministry.color;
    }

    /// Site slug for a Church Center page slug, if the page is a ministry page.
    pub fn site_slug_for_page(&self, page_slug: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.page_slug.as_deref() == Some(page_slug))
            .map(|m| m.slug.as_str())
    }
}

/// Record `group -> value` in a tag map. The last write wins; overwriting a
/// different value is logged.
pub fn record_tag(tags: &mut BTreeMap<String, String>, owner: &str, group: &str, value: &str) {
    if let Some(previous) = tags.insert(group.to_string(), value.to_string()) {
        if previous != value {
            log::warn!(
                "{}: tag group '{}' has several values, '{}' replaces '{}'",
                owner,
                group,
                value,
                previous
            );
        }
    }
}
