//! HTTP implementation of the [`PageFetcher`] capability.

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::Client;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use tracing::{debug, instrument};

use docscloner_shared::{DocsClonerError, PageFetcher, Result, RunConfig};

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 10;

/// First two bytes of every gzip stream.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fetches URLs over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with an explicit User-Agent and overall request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| DocsClonerError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Build a fetcher from the run's User-Agent and timeout settings.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        Self::new(&config.user_agent, config.timeout)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT_ENCODING, "gzip")
            .send()
            .await
            .map_err(|e| DocsClonerError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocsClonerError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let gzip_encoded = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        let body = response
            .bytes()
            .await
            .map_err(|e| DocsClonerError::Network(format!("{url}: failed to read body: {e}")))?;

        if gzip_encoded || has_gz_suffix(url) {
            return maybe_gunzip(url, &body);
        }

        debug!(bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}

/// `true` when the URL path (ignoring query and fragment) ends in `.gz`.
fn has_gz_suffix(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".gz")
}

/// Decompress `body` if it is a gzip stream. Servers and proxies sometimes
/// decode transparently, so a body without the magic bytes is passed through.
fn maybe_gunzip(url: &str, body: &[u8]) -> Result<Vec<u8>> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(body.to_vec());
    }

    let mut decoded = Vec::with_capacity(body.len() * 4);
    GzDecoder::new(body)
        .read_to_end(&mut decoded)
        .map_err(|e| DocsClonerError::Network(format!("{url}: failed to decompress gzip: {e}")))?;

    debug!(compressed = body.len(), decoded = decoded.len(), "gunzipped response");
    Ok(decoded)
}
