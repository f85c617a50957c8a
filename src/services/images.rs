// src/services/images.rs

//! Image download and local naming.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use url::Url;

use super::client::PlanningCenterApi;
use crate::error::{AppError, Result};

/// File-name prefix for calendar event images.
pub const EVENT_IMAGE_PREFIX: &str = "events";
/// File-name prefix for ministry page images.
pub const MINISTRY_IMAGE_PREFIX: &str = "ministry";

/// Stores remote images locally.
#[async_trait]
pub trait ImageStore: Send {
    /// Fetch `url` and save it as `<name>.<ext>`, returning the file name.
    async fn store(&mut self, url: &str, name: &str) -> Result<String>;
}

/// Map an image `content-type` to a file extension.
pub fn extension_for(content_type: &str, url: &str) -> Result<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        _ => Err(AppError::UnsupportedImageType {
            content_type: content_type.to_string(),
            url: url.to_string(),
        }),
    }
}

/// Local base name (no extension) for an event image.
///
/// The URL path with `/` replaced by `-`, followed by the raw value of every
/// `key*` query parameter with `%` replaced by `-`; the final `.ext` of the
/// combined string is dropped.
pub fn event_image_name(image_url: &str) -> Result<String> {
    let url = Url::parse(image_url)?;
    let mut combined = url.path().replace('/', "-");

    if let Some(query) = url.query() {
        for param in query.split('&').filter(|p| p.starts_with("key")) {
            if let Some(value) = param.split('=').nth(1) {
                combined.push_str(&value.replace('%', "-"));
            }
        }
    }

    Ok(format!("{}-{}", EVENT_IMAGE_PREFIX, file_stem(&combined)))
}

/// Local base name for a ministry page image.
pub fn ministry_image_name(site_slug: &str, block_id: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{}-{}-{}-{}", MINISTRY_IMAGE_PREFIX, site_slug, block_id, i),
        None => format!("{}-{}-{}", MINISTRY_IMAGE_PREFIX, site_slug, block_id),
    }
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// Downloads images into a directory, once per URL.
pub struct ImageDownloader<'a> {
    api: &'a dyn PlanningCenterApi,
    dir: PathBuf,
    cache: HashMap<String, String>,
}

impl<'a> ImageDownloader<'a> {
    pub fn new(api: &'a dyn PlanningCenterApi, dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Number of distinct URLs downloaded.
    pub fn downloaded(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl ImageStore for ImageDownloader<'_> {
    async fn store(&mut self, url: &str, name: &str) -> Result<String> {
        if let Some(file_name) = self.cache.get(url) {
            return Ok(file_name.clone());
        }

        let image = self.api.fetch_image(url).await?;
        let ext = extension_for(&image.content_type, url)?;
        let file_name = format!("{}.{}", name, ext);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), &image.bytes).await?;
        log::debug!("Saved {} ({} bytes)", file_name, image.bytes.len());

        self.cache.insert(url.to_string(), file_name.clone());
        Ok(file_name)
    }
}
