//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Upper bound for either side of the event window.
pub const MAX_WINDOW_WEEKS: i64 = 520;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings for the Planning Center API
    #[serde(default)]
    pub api: ApiConfig,

    /// Self-throttling against the API quota
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Export behavior
    #[serde(default)]
    pub export: ExportConfig,

    /// Ministry classification rules
    #[serde(default = "defaults::default_ministries")]
    pub ministries: Vec<MinistryMapping>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)?;
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.api.per_page == 0 || self.api.per_page > 100 {
            return Err(AppError::validation("api.per_page must be within 1..=100"));
        }
        let threshold = self.rate_limit.threshold();
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AppError::validation(
                "rate_limit quota, window and headroom must all be > 0",
            ));
        }
        for (key, weeks) in [
            ("export.lookbehind_weeks", self.export.lookbehind_weeks),
            ("export.lookahead_weeks", self.export.lookahead_weeks),
        ] {
            if !(0..=MAX_WINDOW_WEEKS).contains(&weeks) {
                return Err(AppError::validation(format!(
                    "{} must be within 0..={}",
                    key, MAX_WINDOW_WEEKS
                )));
            }
        }
        if self.ministries.is_empty() {
            return Err(AppError::validation("No ministries defined"));
        }

        let mut slugs = HashSet::new();
        for ministry in &self.ministries {
            if !slugs.insert(ministry.slug.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate ministry slug '{}'",
                    ministry.slug
                )));
            }
            if !ministry.color.starts_with('#') {
                return Err(AppError::validation(format!(
                    "Ministry '{}' color must be a hex value",
                    ministry.slug
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            export: ExportConfig::default(),
            ministries: defaults::default_ministries(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, without a trailing product path
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Page size for paginated collections (API maximum is 100)
    #[serde(default = "defaults::per_page")]
    pub per_page: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            per_page: defaults::per_page(),
        }
    }
}

/// API quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Calls allowed per quota window
    #[serde(default = "defaults::quota_calls")]
    pub quota_calls: u32,

    /// Length of the quota window in seconds
    #[serde(default = "defaults::quota_window")]
    pub quota_window_secs: f64,

    /// Fraction of the quota to actually use
    #[serde(default = "defaults::headroom")]
    pub headroom: f64,

    /// Pause after a 429 before retrying the same call
    #[serde(default = "defaults::cooldown")]
    pub cooldown_secs: u64,
}

impl RateLimitConfig {
    /// Sustained calls per second the limiter aims for.
    pub fn threshold(&self) -> f64 {
        if self.quota_window_secs <= 0.0 {
            return 0.0;
        }
        self.quota_calls as f64 / self.quota_window_secs * self.headroom
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            quota_calls: defaults::quota_calls(),
            quota_window_secs: defaults::quota_window(),
            headroom: defaults::headroom(),
            cooldown_secs: defaults::cooldown(),
        }
    }
}

/// Export behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Weeks before now at which the event window opens
    #[serde(default = "defaults::lookbehind_weeks")]
    pub lookbehind_weeks: i64,

    /// Weeks the event window stays open after "now"
    #[serde(default = "defaults::lookahead_weeks")]
    pub lookahead_weeks: i64,

    /// Ministry slug for events that match no rule
    #[serde(default = "defaults::default_ministry")]
    pub default_ministry: String,

    /// Color for events that match no rule
    #[serde(default = "defaults::default_color")]
    pub default_color: String,

    /// Fail a ministry page that has no cover image
    #[serde(default = "defaults::require_cover_image")]
    pub require_cover_image: bool,

    /// Prefix the site uses to reference downloaded images
    #[serde(default = "defaults::image_url_prefix")]
    pub image_url_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            lookbehind_weeks: defaults::lookbehind_weeks(),
            lookahead_weeks: defaults::lookahead_weeks(),
            default_ministry: defaults::default_ministry(),
            default_color: defaults::default_color(),
            require_cover_image: defaults::require_cover_image(),
            image_url_prefix: defaults::image_url_prefix(),
        }
    }
}

/// One ministry and every name it goes by in Planning Center.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MinistryMapping {
    /// Site slug (e.g., "youth")
    pub slug: String,

    /// Calendar display color
    pub color: String,

    /// Calendar tag name in the "Ministry" tag group
    #[serde(default)]
    pub tag_name: Option<String>,

    /// Groups tag value under the "Ministry" tag group
    #[serde(default)]
    pub group_tag_value: Option<String>,

    /// Church Center publishing page slug
    #[serde(default)]
    pub page_slug: Option<String>,
}

mod defaults {
    use super::MinistryMapping;

    // API defaults
    pub fn base_url() -> String {
        "https://api.planningcenteronline.com".into()
    }
    pub fn user_agent() -> String {
        "pco-export/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn per_page() -> usize {
        100
    }

    // Rate limit defaults
    pub fn quota_calls() -> u32 {
        100
    }
    pub fn quota_window() -> f64 {
        20.0
    }
    pub fn headroom() -> f64 {
        0.8
    }
    pub fn cooldown() -> u64 {
        5
    }

    // Export defaults
    pub fn lookbehind_weeks() -> i64 {
        5
    }
    pub fn lookahead_weeks() -> i64 {
        52
    }
    pub fn default_ministry() -> String {
        "default".into()
    }
    pub fn default_color() -> String {
        "#6ADCC8".into()
    }
    pub fn require_cover_image() -> bool {
        true
    }
    pub fn image_url_prefix() -> String {
        "~/assets/images".into()
    }

    fn ministry(
        slug: &str,
        color: &str,
        tag_name: &str,
        group_tag_value: &str,
        page_slug: &str,
    ) -> MinistryMapping {
        MinistryMapping {
            slug: slug.to_string(),
            color: color.to_string(),
            tag_name: Some(tag_name.to_string()),
            group_tag_value: Some(group_tag_value.to_string()),
            page_slug: Some(page_slug.to_string()),
        }
    }

    // Ministry defaults
    pub fn default_ministries() -> Vec<MinistryMapping> {
        vec![
            ministry(
                "children",
                "#F6E7BB",
                "Children's Ministry",
                "Childrens",
                "childrens-ministry",
            ),
            ministry(
                "counseling",
                "#C69CE8",
                "Counseling",
                "Counseling",
                "counseling-ministry",
            ),
            ministry(
                "home-group",
                "#E7DEFA",
                "Home Groups",
                "Home Groups",
                "home-groups-ministry",
            ),
            ministry("men", "#7EC7ED", "Men's Ministry", "Mens", "mens-ministry"),
            ministry(
                "seniors",
                "#CBEAFA",
                "Prime Timers (Seniors Ministry)",
                "Senior Adults",
                "senior-adults-ministry",
            ),
            ministry(
                "vbs",
                "#F9D266",
                "Vacation Bible School",
                "Vacation Bible School",
                "vbs-ministry",
            ),
            ministry(
                "women",
                "#F297CD",
                "Women's Ministry",
                "Womens",
                "womens-ministry",
            ),
            ministry(
                "youth",
                "#FCDCCA",
                "Rooted (Youth Ministry)",
                "Youth",
                "youth-group",
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_threshold_is_four_per_second() {
        let config = RateLimitConfig::default();
        assert!((config.threshold() - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn validate_rejects_oversized_pages() {
        let mut config = Config::default();
        config.api.per_page = 250;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_slugs() {
        let mut config = Config::default();
        let first = config.ministries[0].clone();
        config.ministries.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn validate_rejects_nan_headroom() {
        let config: Config = toml::from_str("[rate_limit]\nheadroom = nan").unwrap();
        assert!(config.rate_limit.headroom.is_nan());
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_window() {
        let mut config = Config::default();
        config.export.lookahead_weeks = i64::MAX / 2;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));

        let mut config = Config::default();
        config.export.lookahead_weeks = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.lookbehind_weeks = MAX_WINDOW_WEEKS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r##"
            [api]
            per_page = 25

            [[ministries]]
            slug = "youth"
            color = "#000000"
            tag_name = "Youth"
            "##,
        )
        .unwrap();

        assert_eq!(config.api.per_page, 25);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.ministries.len(), 1);
        assert_eq!(config.ministries[0].group_tag_value, None);
        assert_eq!(config.export.default_color, "#6ADCC8");
    }
}
