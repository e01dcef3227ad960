//! Chart document fetching.
//!
//! A [`Fetcher`] turns a source URL into the raw document text or a typed
//! [`FetchError`]. There is no retry at this layer; a failed fetch aborts
//! the crawl run for that chart and the next trigger tries again.
//!
//! # Schemes
//!
//! | Scheme | Behavior |
//! |--------|----------|
//! | `http`, `https` | GET with the configured timeout and User-Agent |
//! | `file` | Read a local document (offline runs, fixtures) |
//! | `builtin:sample` | The embedded three-song sample chart |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;

/// URL of the embedded sample document.
pub const BUILTIN_SAMPLE_URL: &str = "builtin:sample";

/// The sample chart used by the `test-chart` source.
pub const SAMPLE_CHART_HTML: &str = r#"<html>
<body>
    <div class="chart">
        <div class="song-item">
            <span class="rank">1</span>
            <span class="title">Pretender</span>
            <span class="artist">Official髭男dism</span>
        </div>
        <div class="song-item">
            <span class="rank">2</span>
            <span class="title">マリーゴールド</span>
            <span class="artist">あいみょん</span>
        </div>
        <div class="song-item">
            <span class="rank">3</span>
            <span class="title">猫 ～THE FIRST TAKE ver.～</span>
            <span class="artist">DISH//</span>
        </div>
    </div>
</body>
</html>
"#;

/// Why a document could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out fetching {0}")]
    Timeout(String),
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("empty document from {0}")]
    EmptyBody(String),
    #[error("unsupported source url: {0}")]
    UnsupportedScheme(String),
    #[error("failed to read {url}: {reason}")]
    Io { url: String, reason: String },
}

/// Retrieves raw chart documents.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

fn non_empty(url: &str, body: String) -> Result<String, FetchError> {
    if body.trim().is_empty() {
        Err(FetchError::EmptyBody(url.to_string()))
    } else {
        Ok(body)
    }
}

/// Production fetcher: HTTP(S) via `reqwest`, local files, and the
/// built-in sample.
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    /// Build the HTTP client once from `[fetch]` settings.
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;
        non_empty(url, body)
    }

    async fn fetch_file(&self, url: &str, parsed: &Url) -> Result<String, FetchError> {
        let path = parsed
            .to_file_path()
            .map_err(|_| FetchError::UnsupportedScheme(url.to_string()))?;
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::Io {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        non_empty(url, body)
    }
}

#[async_trait]
impl Fetcher for SourceFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if url == BUILTIN_SAMPLE_URL {
            return Ok(SAMPLE_CHART_HTML.to_string());
        }

        let parsed = Url::parse(url).map_err(|_| FetchError::UnsupportedScheme(url.to_string()))?;
        debug!(url, scheme = parsed.scheme(), "fetching chart document");
        match parsed.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => self.fetch_file(url, &parsed).await,
            _ => Err(FetchError::UnsupportedScheme(url.to_string())),
        }
    }
}

/// Serves fixed documents by URL. Unknown URLs fail with a network error.
#[derive(Default)]
pub struct StaticFetcher {
    documents: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match self.documents.get(url) {
            Some(body) => non_empty(url, body.clone()),
            None => Err(FetchError::Network {
                url: url.to_string(),
                reason: "no document registered".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(&FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn builtin_sample_is_served() {
        let body = fetcher().fetch(BUILTIN_SAMPLE_URL).await.unwrap();
        assert!(body.contains("song-item"));
    }

    #[tokio::test]
    async fn file_urls_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<html><body>chart</body></html>").unwrap();
        let url = Url::from_file_path(file.path()).unwrap().to_string();

        let body = fetcher().fetch(&url).await.unwrap();
        assert!(body.contains("chart"));
    }

    #[tokio::test]
    async fn empty_file_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let url = Url::from_file_path(file.path()).unwrap().to_string();

        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = fetcher()
            .fetch("file:///definitely/not/here/chart.html")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let err = fetcher().fetch("ftp://example.com/chart").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn static_fetcher_serves_registered_documents() {
        let f = StaticFetcher::new().with_document("https://charts.test/a", "<p>a</p>");
        assert_eq!(f.fetch("https://charts.test/a").await.unwrap(), "<p>a</p>");
        assert!(f.fetch("https://charts.test/b").await.is_err());
    }
}
