// src/services/client.rs

//! Planning Center API client.
//!
//! [`PlanningCenterApi`] is the seam the exporters talk to: one method for
//! JSON:API documents, one for raw image bytes. [`PlanningCenterClient`] is
//! the reqwest implementation; tests substitute an in-memory fake.
//!
//! Endpoint helpers at the bottom of this module build [`Collection`]s,
//! which plug any paginated endpoint into [`crate::jsonapi::paginate`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::rate_limit::RateLimiter;
use crate::error::{AppError, Result};
use crate::jsonapi::{Document, IncludedTable, PageFetcher, decode, inline};
use crate::models::{ApiConfig, RegistrationEvent};

/// Environment variable holding the personal access token id.
pub const CLIENT_ID_VAR: &str = "PLANNINGCENTER_CLIENT_ID";
/// Environment variable holding the personal access token secret.
pub const SECRET_VAR: &str = "PLANNINGCENTER_SECRET";

/// Basic Auth credentials for the API.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
        }
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::config(format!("{} is not set", name)))
        };
        Ok(Self::new(read(CLIENT_ID_VAR)?, read(SECRET_VAR)?))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret", &"***")
            .finish()
    }
}

/// A downloaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    /// Value of the `content-type` header, empty when absent
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Operations the exporters need from Planning Center.
#[async_trait]
pub trait PlanningCenterApi: Send + Sync {
    /// GET an API path (relative to the base URL) and parse the JSON:API body.
    async fn get_document(&self, path: &str, query: &[(String, String)]) -> Result<Document>;

    /// GET an absolute image URL.
    async fn fetch_image(&self, url: &str) -> Result<ImageResponse>;
}

/// reqwest-backed API client.
pub struct PlanningCenterClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    limiter: Arc<RateLimiter>,
}

impl PlanningCenterClient {
    /// Create a client. API calls share `limiter`; image downloads do not,
    /// since they are served from the CDN rather than the API.
    pub fn new(config: &ApiConfig, credentials: Credentials, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        // A trailing slash makes `join` append rather than replace the last segment.
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            http,
            base_url: Url::parse(&base)?,
            credentials,
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    async fn get_once(&self, url: &Url, query: &[(String, String)]) -> Result<Document> {
        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.secret))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let url = response.url().to_string();
        let bytes = response.bytes().await?;
        check_status(status.as_u16(), &url, &bytes)?;

        serde_json::from_slice(&bytes).map_err(|e| AppError::decode(url, e))
    }
}

#[async_trait]
impl PlanningCenterApi for PlanningCenterClient {
    async fn get_document(&self, path: &str, query: &[(String, String)]) -> Result<Document> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        log::debug!("GET {} {:?}", url, query);
        self.limiter.call(|| self.get_once(&url, query)).await
    }

    async fn fetch_image(&self, url: &str) -> Result<ImageResponse> {
        log::debug!("Downloading image {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await?;
        check_status(status, url, &bytes)?;

        Ok(ImageResponse {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// Map a response status onto the error taxonomy.
fn check_status(status: u16, url: &str, body: &[u8]) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        429 => Err(AppError::RateLimited {
            url: url.to_string(),
        }),
        _ => Err(AppError::Status {
            status,
            url: url.to_string(),
            body: String::from_utf8_lossy(body).chars().take(500).collect(),
        }),
    }
}

/// A paginated endpoint with its fixed query parameters.
pub struct Collection<'a> {
    api: &'a dyn PlanningCenterApi,
    path: String,
    query: Vec<(String, String)>,
}

impl<'a> Collection<'a> {
    pub fn new(api: &'a dyn PlanningCenterApi, path: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl PageFetcher for Collection<'_> {
    async fn fetch_page(&self, offset: usize, per_page: usize) -> Result<Document> {
        let mut query = self.query.clone();
        query.push(("offset".to_string(), offset.to_string()));
        query.push(("per_page".to_string(), per_page.to_string()));
        self.api.get_document(&self.path, &query).await
    }
}

// --- Endpoints ---

/// Published calendar instances whose times overlap `[start, end]`.
pub fn calendar_instances<'a>(
    api: &'a dyn PlanningCenterApi,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Collection<'a> {
    Collection::new(api, "calendar/v2/calendar_instances")
        .param("where[visible_in_church_center]", "published")
        .param("where[during][start]", start.to_rfc3339_opts(SecondsFormat::Millis, true))
        .param("where[during][end]", end.to_rfc3339_opts(SecondsFormat::Millis, true))
        .param(
            "fields[CalendarInstance]",
            "all_day_event,ends_at,event,event_featured,event_name,starts_at,status,tags,visible_ends_at,visible_starts_at",
        )
        .param(
            "fields[Event]",
            "name,featured,approval_status,registration_url,image_url,visible_in_church_center,description,summary,created_at,updated_at,percent_approved,percent_rejected",
        )
        .param("fields[Tag]", "name,color,tag_group")
        .param("fields[TagGroup]", "name,required")
        .param("filter", "public_times")
        .param("include", "event,tags.tag_group")
        .param("order", "starts_at,ends_at")
}

/// Connections from a calendar event into the Groups product.
pub fn event_connections<'a>(api: &'a dyn PlanningCenterApi, event_id: &str) -> Collection<'a> {
    Collection::new(api, format!("calendar/v2/events/{}/event_connections", event_id))
        .param("where[product_name]", "groups")
}

/// Tags attached to a group.
pub fn group_tags<'a>(api: &'a dyn PlanningCenterApi, group_id: &str) -> Collection<'a> {
    Collection::new(api, format!("groups/v2/groups/{}/tags", group_id))
}

/// Every group tag group.
pub fn tag_groups(api: &dyn PlanningCenterApi) -> Collection<'_> {
    Collection::new(api, "groups/v2/tag_groups")
}

/// Currently published Church Center pages.
pub fn published_pages(api: &dyn PlanningCenterApi) -> Collection<'_> {
    Collection::new(api, "publishing/v2/pages").param("filter", "current_published")
}

/// A single registrations event.
pub async fn registration_event(api: &dyn PlanningCenterApi, id: &str) -> Result<RegistrationEvent> {
    let path = format!("registrations/v2/events/{}", id);
    let Document { data, included, .. } = api.get_document(&path, &[]).await?;

    let table = IncludedTable::new(included);
    let resource = data
        .first()
        .ok_or_else(|| AppError::decode(path.clone(), "response contained no data"))?;
    decode(inline(resource, &table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    /// Records requests and answers every one with the same document.
    struct RecordingApi {
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
        document: serde_json::Value,
    }

    #[async_trait]
    impl PlanningCenterApi for RecordingApi {
        async fn get_document(&self, path: &str, query: &[(String, String)]) -> Result<Document> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), query.to_vec()));
            Ok(serde_json::from_value(self.document.clone())?)
        }

        async fn fetch_image(&self, url: &str) -> Result<ImageResponse> {
            Err(AppError::validation(format!("unexpected image fetch {}", url)))
        }
    }

    fn recording(document: serde_json::Value) -> RecordingApi {
        RecordingApi {
            requests: Mutex::new(Vec::new()),
            document,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(200, "u", b"").is_ok());
        assert!(check_status(429, "u", b"").unwrap_err().is_rate_limited());

        match check_status(404, "u", b"not found").unwrap_err() {
            AppError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let credentials = Credentials::new("id", "hunter2");
        let shown = format!("{:?}", credentials);
        assert!(shown.contains("id"));
        assert!(!shown.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_collection_appends_paging_params() {
        let api = recording(json!({ "data": [], "meta": { "count": 0, "total_count": 0 } }));
        let collection = published_pages(&api);

        collection.fetch_page(200, 100).await.unwrap();

        let requests = api.requests.lock().unwrap();
        let (path, query) = &requests[0];
        assert_eq!(path, "publishing/v2/pages");
        assert_eq!(
            query,
            &vec![
                ("filter".to_string(), "current_published".to_string()),
                ("offset".to_string(), "200".to_string()),
                ("per_page".to_string(), "100".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_calendar_window_params() {
        let api = recording(json!({ "data": [] }));
        let start = DateTime::parse_from_rfc3339("2025-01-26T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2026-02-22T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        calendar_instances(&api, start, end).fetch_page(0, 100).await.unwrap();

        let requests = api.requests.lock().unwrap();
        let query = &requests[0].1;
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("where[during][start]"), Some("2025-01-26T08:00:00.000Z"));
        assert_eq!(get("where[during][end]"), Some("2026-02-22T08:00:00.000Z"));
        assert_eq!(get("include"), Some("event,tags.tag_group"));
        assert_eq!(get("filter"), Some("public_times"));
    }

    #[tokio::test]
    async fn test_registration_event_decodes_single_resource() {
        let api = recording(json!({
            "data": {
                "id": "r1",
                "type": "Event",
                "attributes": { "visibility": "public", "open": true }
            }
        }));

        let registration = registration_event(&api, "r1").await.unwrap();
        assert_eq!(registration.id, "r1");
        assert!(registration.open);
        assert_eq!(api.requests.lock().unwrap()[0].0, "registrations/v2/events/r1");
    }

    #[tokio::test]
    async fn test_registration_event_without_data_fails() {
        let api = recording(json!({ "data": null }));
        let err = registration_event(&api, "r1").await.unwrap_err();
        assert!(matches!(err, AppError::Decode { .. }));
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let config = ApiConfig {
            base_url: "https://api.example.com/v1".to_string(),
            ..ApiConfig::default()
        };
        let client = PlanningCenterClient::new(
            &config,
            Credentials::new("id", "secret"),
            Arc::new(RateLimiter::new(4.0, Duration::from_secs(5))),
        )
        .unwrap();

        let joined = client.base_url.join("publishing/v2/pages").unwrap();
        assert_eq!(joined.as_str(), "https://api.example.com/v1/publishing/v2/pages");
    }
}
