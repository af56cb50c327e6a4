// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Direct HTTP download of matrix files, outside the browser.
//!
//! The body is streamed chunk by chunk to disk. There is no retry, and
//! no request timeout unless one is configured.

use crate::error::HarvestError;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// HTTP client for matrix downloads.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Create a downloader; `timeout` of `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Result<Self, HarvestError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("xena-harvest/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|source| HarvestError::Download {
            url: String::new(),
            source,
        })?;
        Ok(Self { client })
    }

    /// GET `url` and write the full body to `destination`, replacing any
    /// existing file. Returns the number of bytes written.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64, HarvestError> {
        let wrap = |source| HarvestError::Download {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(wrap)?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(wrap)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!("wrote {written} bytes from {url} to {}", destination.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/matrix.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("matrix.gz");
        let downloader = Downloader::new(None).unwrap();
        let n = downloader
            .download(&format!("{}/data/matrix.gz", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(n, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1u8, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_download_overwrites_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("matrix.gz");
        std::fs::write(&dest, b"old contents that are longer").unwrap();

        Downloader::new(None)
            .unwrap()
            .download(&server.uri(), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_error_status_is_download_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.gz");
        let err = Downloader::new(Some(Duration::from_secs(5)))
            .unwrap()
            .download(&format!("{}/missing.gz", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Download { ref url, .. } if url.ends_with("/missing.gz")));
        assert!(!err.is_recoverable());
        assert!(!dest.exists());
    }
}
