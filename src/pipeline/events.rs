// src/pipeline/events.rs

//! Calendar events export.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;

use super::ExportPaths;
use crate::error::{AppError, Result};
use crate::jsonapi::paginate_as;
use crate::models::{CalendarInstance, Config, EventConnection, ExportConfig, GroupTag, GroupTagGroup};
use crate::services::client::{
    calendar_instances, event_connections, group_tags, registration_event, tag_groups,
};
use crate::services::images::EVENT_IMAGE_PREFIX;
use crate::services::{
    ImageDownloader, ImageStore, MinistryClassifier, PlanningCenterApi, event_image_name,
    record_tag,
};
use crate::storage::{StagedAssets, StagedDir};

/// Counts from one events export.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventExportSummary {
    pub instances: usize,
    pub images: usize,
    pub group_connections: usize,
    pub registrations: usize,
}

/// Calendar window `[now - lookbehind, now - lookbehind + lookbehind + lookahead]`.
pub fn event_window(
    now: DateTime<Utc>,
    export: &ExportConfig,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if export.lookbehind_weeks < 0 || export.lookahead_weeks < 0 {
        return Err(AppError::validation("event window weeks must not be negative"));
    }
    let out_of_range = || {
        AppError::validation(format!(
            "event window of -{}/+{} weeks is out of range",
            export.lookbehind_weeks, export.lookahead_weeks
        ))
    };

    let start = Duration::try_weeks(export.lookbehind_weeks)
        .and_then(|behind| now.checked_sub_signed(behind))
        .ok_or_else(out_of_range)?;
    let end = export
        .lookbehind_weeks
        .checked_add(export.lookahead_weeks)
        .and_then(Duration::try_weeks)
        .and_then(|span| start.checked_add_signed(span))
        .ok_or_else(out_of_range)?;
    Ok((start, end))
}

/// Export every published calendar instance in the window around `now`.
///
/// Writes `events/<id>.json` under the data directory and `events-*` images
/// under the assets directory, replacing the previous run's files.
pub async fn run_events_export(
    config: &Config,
    api: &dyn PlanningCenterApi,
    paths: &ExportPaths,
    now: DateTime<Utc>,
) -> Result<EventExportSummary> {
    let per_page = config.api.per_page;
    let (start, end) = event_window(now, &config.export)?;
    let events_out = StagedDir::create(paths.events_dir()).await?;
    let images_out = StagedAssets::create(paths.images_dir(), EVENT_IMAGE_PREFIX).await?;

    let tag_groups = load_tag_groups(api, per_page).await?;
    log::info!("Loaded {} group tag groups", tag_groups.len());

    let mut enricher = Enricher {
        api,
        per_page,
        tag_groups,
        classifier: MinistryClassifier::from_config(config),
        images: ImageDownloader::new(api, images_out.path()),
        image_url_prefix: config.export.image_url_prefix.trim_end_matches('/').to_string(),
        summary: EventExportSummary::default(),
    };

    log::info!("Fetching calendar instances from {} to {}", start, end);

    let collection = calendar_instances(api, start, end);
    let instances = paginate_as::<CalendarInstance, _>(&collection, per_page);
    futures::pin_mut!(instances);

    while let Some(instance) = instances.try_next().await? {
        log::info!(
            "{}: {} - {}",
            instance.visible_starts_at,
            instance.id,
            instance.event_name
        );

        let instance = enricher.enrich(instance).await?;
        events_out
            .write_json(&format!("{}.json", instance.id), &instance)
            .await?;
        enricher.summary.instances += 1;
    }

    let mut summary = enricher.summary;
    summary.images = enricher.images.downloaded();

    // Images first, so committed JSON never points at removed files.
    images_out.commit().await?;
    events_out.commit().await?;

    log::info!(
        "Exported {} events ({} images, {} group connections, {} registrations)",
        summary.instances,
        summary.images,
        summary.group_connections,
        summary.registrations
    );
    Ok(summary)
}

async fn load_tag_groups(
    api: &dyn PlanningCenterApi,
    per_page: usize,
) -> Result<HashMap<String, GroupTagGroup>> {
    let collection = tag_groups(api);
    let groups: Vec<GroupTagGroup> = paginate_as::<GroupTagGroup, _>(&collection, per_page)
        .try_collect()
        .await?;

    Ok(groups
        .into_iter()
        .inspect(|g| log::trace!("Tag group: {} - {}", g.id, g.name))
        .map(|g| (g.id.clone(), g))
        .collect())
}

/// Per-run state for enriching calendar instances.
struct Enricher<'a> {
    api: &'a dyn PlanningCenterApi,
    per_page: usize,
    tag_groups: HashMap<String, GroupTagGroup>,
    classifier: MinistryClassifier,
    images: ImageDownloader<'a>,
    image_url_prefix: String,
    summary: EventExportSummary,
}

impl Enricher<'_> {
    async fn enrich(&mut self, mut instance: CalendarInstance) -> Result<CalendarInstance> {
        let event_id = match instance.event.as_mut() {
            Some(event) => {
                if let Some(url) = event.image_url.clone() {
                    let file_name = self.images.store(&url, &event_image_name(&url)?).await?;
                    event.image_url = Some(format!("{}/{}", self.image_url_prefix, file_name));
                }
                Some(event.id.clone())
            }
            None => None,
        };

        if let Some(event_id) = event_id {
            let collection = event_connections(self.api, &event_id);
            let connections: Vec<EventConnection> =
                paginate_as::<EventConnection, _>(&collection, self.per_page)
                    .try_collect()
                    .await?;

            for connection in connections {
                match connection.connected_to_type.as_str() {
                    "group" => {
                        self.summary.group_connections += 1;
                        self.apply_group_tags(&mut instance, &connection.connected_to_id)
                            .await?;
                    }
                    "signup" => {
                        self.summary.registrations += 1;
                        let registration =
                            registration_event(self.api, &connection.connected_to_id).await?;
                        instance.registration = Some(registration);
                    }
                    other => log::trace!("Ignoring {} connection {}", other, connection.id),
                }
            }
        }

        for tag in &instance.tags {
            record_tag(&mut instance.event_tags, &instance.id, &tag.group, &tag.name);
        }

        self.classifier.apply(&mut instance);
        Ok(instance)
    }

    async fn apply_group_tags(&self, instance: &mut CalendarInstance, group_id: &str) -> Result<()> {
        let collection = group_tags(self.api, group_id);
        let tags: Vec<GroupTag> = paginate_as::<GroupTag, _>(&collection, self.per_page)
            .try_collect()
            .await?;

        for tag in tags {
            let group = self
                .tag_groups
                .get(&tag.tag_group_id)
                .ok_or_else(|| AppError::missing_lookup("Group tag group", &tag.tag_group_id))?;
            record_tag(&mut instance.group_tags, &instance.id, &group.name, &tag.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_window_spans_57_weeks() {
        let now = DateTime::parse_from_rfc3339("2025-03-02T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let (start, end) = event_window(now, &ExportConfig::default()).unwrap();

        assert_eq!(now - start, Duration::weeks(5));
        assert_eq!(end - start, Duration::weeks(57));
    }

    #[test]
    fn test_event_window_rejects_unrepresentable_spans() {
        let now = Utc::now();
        let huge = ExportConfig {
            lookahead_weeks: i64::MAX / 2,
            ..ExportConfig::default()
        };
        assert!(matches!(event_window(now, &huge), Err(AppError::Validation(_))));

        let inverted = ExportConfig {
            lookahead_weeks: -3,
            ..ExportConfig::default()
        };
        assert!(matches!(event_window(now, &inverted), Err(AppError::Validation(_))));
    }
}
