// src/pipeline/ministries.rs

//! Ministry pages export.

use std::collections::HashSet;

use futures::TryStreamExt;
use serde_json::Value;

use super::ExportPaths;
use crate::error::Result;
use crate::jsonapi::{describe, paginate};
use crate::models::{Config, Page};
use crate::services::client::published_pages;
use crate::services::images::MINISTRY_IMAGE_PREFIX;
use crate::services::{ImageDownloader, MinistryClassifier, PlanningCenterApi, RenderOptions, render_page};
use crate::storage::{StagedAssets, StagedDir};

/// Counts from one ministries export.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MinistryExportSummary {
    pub pages: usize,
    pub skipped: usize,
    /// Pages that replaced an earlier page with the same site slug
    pub overwritten: usize,
    pub images: usize,
}

/// Render every published ministry page to `ministries/<slug>.md`.
///
/// Pages whose slug has no ministry mapping are skipped before decoding.
/// When two pages map to the same ministry, the later one wins.
pub async fn run_ministries_export(
    config: &Config,
    api: &dyn PlanningCenterApi,
    paths: &ExportPaths,
) -> Result<MinistryExportSummary> {
    let per_page = config.api.per_page;
    let pages_out = StagedDir::create(paths.ministries_dir()).await?;
    let images_out = StagedAssets::create(paths.images_dir(), MINISTRY_IMAGE_PREFIX).await?;

    let classifier = MinistryClassifier::from_config(config);
    let options = RenderOptions::from_config(&config.export);
    let mut images = ImageDownloader::new(api, images_out.path());
    let mut summary = MinistryExportSummary::default();
    let mut written = HashSet::new();

    let collection = published_pages(api);
    let pages = paginate(&collection, per_page);
    futures::pin_mut!(pages);

    while let Some(resource) = pages.try_next().await? {
        let page_slug = resource
            .pointer("/attributes/slug")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(site_slug) = classifier.site_slug_for_page(page_slug).map(str::to_string) else {
            log::debug!("Skipping page {} ({})", describe(&resource), page_slug);
            summary.skipped += 1;
            continue;
        };

        let page = Page::from_resource(resource)?;
        log::info!("{}: {} - {}", page.slug, page.id, page.title);

        let rendered = render_page(&page, &site_slug, &mut images, &options).await?;
        if !written.insert(site_slug.clone()) {
            log::warn!(
                "Page {} ({}) replaces an earlier page for ministry '{}'",
                page.id,
                page.slug,
                site_slug
            );
            summary.overwritten += 1;
        }
        pages_out
            .write_bytes(&format!("{}.md", site_slug), rendered.to_markdown()?.as_bytes())
            .await?;
        summary.pages += 1;
    }

    summary.images = images.downloaded();

    images_out.commit().await?;
    pages_out.commit().await?;

    log::info!(
        "Exported {} ministry pages ({} skipped, {} images)",
        summary.pages,
        summary.skipped,
        summary.images
    );
    Ok(summary)
}
