//! URL fetch abstraction
//!
//! Artwork sources are plain URLs: provider CDNs over http(s), or `file:`
//! URLs when the user picks a local image. Both come back as one byte stream
//! so the acquisition protocol never cares where bytes originate. A missing
//! or denied source is a recoverable [`FetchError::NotFound`], not a crash.

use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

use crate::error::TaskError;

/// Byte stream handed back by [`UrlFetcher::open`].
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Errors opening a source URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 404/denied/missing file - a handled condition.
    #[error("error accessing url: {0}")]
    NotFound(String),

    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("i/o failure")]
    Io(#[from] io::Error),
}

impl From<FetchError> for TaskError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(what) => TaskError::NotFound(what),
            FetchError::Io(err) => TaskError::Io(err),
            other => TaskError::Unexpected(anyhow::Error::new(other)),
        }
    }
}

/// Opens source URLs as byte streams.
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn open(&self, url: &Url) -> Result<ByteStream, FetchError>;
}

/// Production fetcher: reqwest for http(s), tokio::fs for `file:` URLs.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn open(&self, url: &Url) -> Result<ByteStream, FetchError> {
        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| FetchError::NotFound(url.to_string()))?;
                match tokio::fs::File::open(&path).await {
                    Ok(file) => Ok(Box::pin(file)),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {
                        Err(FetchError::NotFound(path.display().to_string()))
                    }
                    Err(err) => Err(FetchError::Io(err)),
                }
            }
            "http" | "https" => {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::NotFound(format!("{url}: {status}")));
                }
                let stream = response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(io::Error::other));
                Ok(Box::pin(StreamReader::new(stream)))
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}
