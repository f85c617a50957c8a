//! Service layer for the exporter.
//!
//! This module contains the business logic for:
//! - API access (`PlanningCenterClient`) and its throttle (`RateLimiter`)
//! - Image naming and downloads (`ImageDownloader`)
//! - Ministry classification (`MinistryClassifier`)
//! - Page rendering (`render_page`)

pub mod client;
pub mod images;
pub mod ministry;
pub mod rate_limit;
pub mod render;

pub use client::{Collection, Credentials, ImageResponse, PlanningCenterApi, PlanningCenterClient};
pub use images::{ImageDownloader, ImageStore, event_image_name, extension_for, ministry_image_name};
pub use ministry::{Ministry, MinistryClassifier, record_tag};
pub use rate_limit::{RateLimiter, throttle_delay};
pub use render::{RenderOptions, RenderedPage, html_to_markdown, render_page};
