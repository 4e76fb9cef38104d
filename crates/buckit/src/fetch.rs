//! Payload retrieval over HTTP.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use snafu::prelude::*;

use buckit_core::emit;
use buckit_core::metrics::events::PayloadFetched;

use crate::error::{BodySnafu, ClientSnafu, FetchError, RequestSnafu, StatusSnafu};

/// Retrieves the bytes behind a payload URL. Single attempt, no retry.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// `reqwest`-backed fetcher with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("buckit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientSnafu)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let start = Instant::now();
        let result = fetch_once(&self.client, url).await;
        emit!(PayloadFetched {
            duration: start.elapsed(),
        });
        result
    }
}

async fn fetch_once(client: &reqwest::Client, url: &str) -> Result<Bytes, FetchError> {
    let response = client.get(url).send().await.context(RequestSnafu { url })?;

    let status = response.status();
    ensure!(
        status.is_success(),
        StatusSnafu {
            url,
            status: status.as_u16()
        }
    );

    response.bytes().await.context(BodySnafu { url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let base = serve(Router::new().route("/payload", get(|| async { "tarball-bytes" }))).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let bytes = fetcher.fetch(&format!("{base}/payload")).await.unwrap();
        assert_eq!(bytes.as_ref(), b"tarball-bytes");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let base = serve(Router::new().route(
            "/gone",
            get(|| async { (StatusCode::NOT_FOUND, "nope") }),
        ))
        .await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch(&format!("{base}/gone")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;
        let fetcher = HttpFetcher::new(Duration::from_millis(100)).unwrap();

        let err = fetcher.fetch(&format!("{base}/slow")).await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch(&format!("http://{addr}/x")).await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }
}
