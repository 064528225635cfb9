//! Where raw season documents come from.

use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::FetchError;
use crate::models::RawDocument;

pub const DEFAULT_BASE_URL: &str = "https://barttorvik.com";

/// File name the feed publishes each season under.
pub fn season_file_name(season: i32) -> String {
    format!("{}_team_results.csv", season)
}

/// Retrieves the raw text of one season's feed.
pub trait RawSource: Send + Sync {
    fn fetch(&self, season: i32) -> impl Future<Output = Result<RawDocument, FetchError>> + Send;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

// ── HTTP ────────────────────────────────────────────────────────────────────

pub struct HttpSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn url_for(&self, season: i32) -> String {
        format!("{}/{}", self.base_url, season_file_name(season))
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Unreachable(err.to_string())
        }
    }
}

impl RawSource for HttpSource {
    async fn fetch(&self, season: i32) -> Result<RawDocument, FetchError> {
        let url = self.url_for(season);
        tracing::info!("Fetching season {} from {}", season, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Feed HTTP {} for season {}", status, season);
            return Err(FetchError::Status(status.as_u16()));
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        Ok(RawDocument::new(season, text))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

// ── Local files ─────────────────────────────────────────────────────────────

/// Reads a single file for every season, or `{season}_team_results.csv`
/// inside a directory.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn resolve(&self, season: i32) -> Result<PathBuf, FetchError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| FetchError::Io(format!("{}: {}", self.path.display(), e)))?;
        if metadata.is_dir() {
            Ok(self.path.join(season_file_name(season)))
        } else {
            Ok(self.path.clone())
        }
    }
}

impl RawSource for FileSource {
    async fn fetch(&self, season: i32) -> Result<RawDocument, FetchError> {
        let path = self.resolve(season).await?;
        tracing::info!("Reading season {} from {}", season, path.display());
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FetchError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(RawDocument::new(season, text))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ── In memory ───────────────────────────────────────────────────────────────

/// Serves canned documents; counts fetches so callers can observe caching.
#[derive(Default)]
pub struct StaticSource {
    documents: RwLock<HashMap<i32, String>>,
    failures: RwLock<HashMap<i32, FetchError>>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_season(season: i32, text: impl Into<String>) -> Self {
        let mut documents = HashMap::new();
        documents.insert(season, text.into());
        Self {
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    pub async fn set_season(&self, season: i32, text: impl Into<String>) {
        self.failures.write().await.remove(&season);
        self.documents.write().await.insert(season, text.into());
    }

    pub async fn fail_season(&self, season: i32, error: FetchError) {
        self.failures.write().await.insert(season, error);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RawSource for StaticSource {
    async fn fetch(&self, season: i32) -> Result<RawDocument, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.read().await.get(&season) {
            return Err(error.clone());
        }
        match self.documents.read().await.get(&season) {
            Some(text) => Ok(RawDocument::new(season, text.clone())),
            None => Err(FetchError::Status(404)),
        }
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

// ── Runtime choice ──────────────────────────────────────────────────────────

/// The source a running process was configured with.
pub enum FeedSource {
    Http(HttpSource),
    File(FileSource),
    Static(StaticSource),
}

impl RawSource for FeedSource {
    async fn fetch(&self, season: i32) -> Result<RawDocument, FetchError> {
        match self {
            FeedSource::Http(source) => source.fetch(season).await,
            FeedSource::File(source) => source.fetch(season).await,
            FeedSource::Static(source) => source.fetch(season).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            FeedSource::Http(source) => source.describe(),
            FeedSource::File(source) => source.describe(),
            FeedSource::Static(source) => source.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn spawn_feed() -> String {
        let app = Router::new()
            .route(
                "/2025_team_results.csv",
                get(|| async { "rank,team\n1,Houston\n" }),
            )
            .route(
                "/2019_team_results.csv",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cbb-scout-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_url_for_season() {
        let source = HttpSource::new("https://barttorvik.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            source.url_for(2024),
            "https://barttorvik.com/2024_team_results.csv"
        );
    }

    #[tokio::test]
    async fn test_http_fetch_and_status() {
        let base = spawn_feed().await;
        let source = HttpSource::new(&base, Duration::from_secs(5)).unwrap();

        let doc = source.fetch(2025).await.unwrap();
        assert_eq!(doc.season, 2025);
        assert!(doc.text.contains("Houston"));

        assert_eq!(source.fetch(2019).await.unwrap_err(), FetchError::Status(503));
        assert_eq!(source.fetch(2001).await.unwrap_err(), FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_http_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSource::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            source.fetch(2025).await,
            Err(FetchError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_file_source_single_file_and_directory() {
        let dir = scratch_dir("files");
        let file = dir.join(season_file_name(2024));
        std::fs::write(&file, "team\nDuke\n").unwrap();

        let single = FileSource::new(&file);
        assert!(single.fetch(1999).await.unwrap().text.contains("Duke"));

        let by_season = FileSource::new(&dir);
        assert_eq!(by_season.fetch(2024).await.unwrap().season, 2024);
        assert!(matches!(by_season.fetch(2023).await, Err(FetchError::Io(_))));

        let missing = FileSource::new(dir.join("nope"));
        assert!(matches!(missing.fetch(2024).await, Err(FetchError::Io(_))));
    }

    #[tokio::test]
    async fn test_static_source_counts_and_fails() {
        let source = StaticSource::with_season(2025, "team\nKansas\n");
        assert!(source.fetch(2025).await.is_ok());
        assert_eq!(source.fetch(2024).await.unwrap_err(), FetchError::Status(404));

        source
            .fail_season(2025, FetchError::Unreachable("offline".into()))
            .await;
        assert!(source.fetch(2025).await.is_err());

        source.set_season(2025, "team\nGonzaga\n").await;
        assert!(source.fetch(2025).await.unwrap().text.contains("Gonzaga"));
        assert_eq!(source.fetch_count(), 4);
    }
}
