//! Transport abstraction for update traffic.
//!
//! The session talks to these traits only; production uses
//! [`HttpTransport`] over reqwest, tests script a fake. Keeping the
//! seam here means the state machine is exercised without a network.

use async_trait::async_trait;
use ota_common::{OtaConfig, OtaError};
use std::time::Duration;
use tracing::debug;

/// An open firmware download: a known total size plus a stream of
/// chunks, each bounded by whatever the transport reads per call.
#[async_trait]
pub trait FirmwareStream: Send {
    /// Total image size reported by the server.
    fn content_length(&self) -> u64;

    /// Next chunk of body bytes. `Ok(None)` means the connection
    /// closed; an error means the transport failed mid-stream.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, OtaError>;
}

/// The update server, as the session sees it.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// GET the latest-version descriptor. The returned payload is the
    /// raw body; the caller trims and bounds it.
    async fn fetch_latest_version(&self, url: &str) -> Result<String, OtaError>;

    /// GET the firmware image, returning an open stream. Fails when
    /// the server answers with a non-success status or omits the
    /// content length.
    async fn open_firmware_stream(&self, url: &str)
        -> Result<Box<dyn FirmwareStream>, OtaError>;
}

/// Production transport on reqwest with rustls.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &OtaConfig) -> Self {
        Self::with_timeout(config.request_timeout())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(format!("otad/{}", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl UpdateTransport for HttpTransport {
    async fn fetch_latest_version(&self, url: &str) -> Result<String, OtaError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OtaError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OtaError::CheckFailed {
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| OtaError::Transport(e.to_string()))
    }

    async fn open_firmware_stream(
        &self,
        url: &str,
    ) -> Result<Box<dyn FirmwareStream>, OtaError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| OtaError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OtaError::FetchFailed {
                status: status.as_u16(),
            });
        }

        let content_length = resp
            .content_length()
            .ok_or(OtaError::MissingContentLength)?;

        Ok(Box::new(HttpStream {
            response: resp,
            content_length,
        }))
    }
}

struct HttpStream {
    response: reqwest::Response,
    content_length: u64,
}

#[async_trait]
impl FirmwareStream for HttpStream {
    fn content_length(&self) -> u64 {
        self.content_length
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, OtaError> {
        self.response
            .chunk()
            .await
            .map(|opt| opt.map(|bytes| bytes.to_vec()))
            .map_err(|e| OtaError::Transport(e.to_string()))
    }
}
