//! Document fetching for the static page driver.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::DriverError;

/// Result of a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body as text.
    pub text: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// Content type from headers.
    pub content_type: Option<String>,
    /// Time taken to fetch in milliseconds.
    pub duration_ms: f64,
}

impl FetchResult {
    /// A successful HTML response.
    #[must_use]
    pub fn html(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            text: text.into(),
            final_url: url.into(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            duration_ms: 0.0,
        }
    }

    /// Whether the fetch was successful (2xx status).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Protocol for retrieving documents.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a URL and returns the result.
    ///
    /// Non-2xx responses are returned as results; transport failures are
    /// errors.
    async fn fetch(&self, url: &str) -> Result<FetchResult, DriverError>;
}

fn default_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    concat!("siteharvest/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0))
    }
}

/// HTTP fetcher backed by `reqwest`.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

#[cfg(feature = "http")]
impl ReqwestFetcher {
    /// Builds a client from `config`.
    pub fn new(config: FetchConfig) -> Result<Self, DriverError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| DriverError::Http(format!("invalid header name {key}: {err}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|err| DriverError::Http(format!("invalid header value for {key}: {err}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|err| DriverError::Http(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Gets the configuration.
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, DriverError> {
        let started = std::time::Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DriverError::Http(err.to_string()))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let text = response
            .text()
            .await
            .map_err(|err| DriverError::Http(err.to_string()))?;

        Ok(FetchResult {
            status_code,
            text,
            final_url,
            content_type,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

/// Serves documents from memory; unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the document served for `url`.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, DriverError> {
        Ok(match self.pages.get(url) {
            Some(html) => FetchResult::html(url, html.clone()),
            None => FetchResult {
                status_code: 404,
                text: String::new(),
                final_url: url.to_string(),
                content_type: None,
                duration_ms: 0.0,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_result_success_range() {
        let ok = FetchResult::html("https://example.com", "<html></html>");
        assert!(ok.is_success());

        let not_found = FetchResult {
            status_code: 404,
            ..ok
        };
        assert!(!not_found.is_success());
    }

    #[test]
    fn test_fetch_config_builder() {
        let config = FetchConfig::new()
            .with_timeout(5.0)
            .with_user_agent("bot/1.0")
            .with_header("Accept-Language", "en");

        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.user_agent, "bot/1.0");
        assert_eq!(config.headers.get("Accept-Language"), Some(&"en".to_string()));
        assert!(FetchConfig::default().user_agent.starts_with("siteharvest/"));
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with_page("https://a.test/", "<p>hi</p>");

        let hit = fetcher.fetch("https://a.test/").await.unwrap();
        assert_eq!(hit.status_code, 200);
        assert_eq!(hit.text, "<p>hi</p>");

        let miss = fetcher.fetch("https://a.test/missing").await.unwrap();
        assert_eq!(miss.status_code, 404);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_reqwest_fetcher_rejects_bad_header() {
        let config = FetchConfig::new().with_header("bad header", "x");
        assert!(matches!(ReqwestFetcher::new(config), Err(DriverError::Http(_))));
    }
}
