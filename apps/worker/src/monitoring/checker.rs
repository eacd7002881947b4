use std::time::Duration;

use reqwest::redirect::Policy;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::types::{Check, Outcome};
use crate::error::ProbeError;

/// Performs one probe of a check and reports its terminal outcome
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe `check` once. Never retries and never fails: transport errors
    /// and timeouts are folded into the returned [`Outcome`].
    async fn probe(&self, check: &Check) -> Outcome;
}

/// HTTP/HTTPS prober
///
/// One client is shared by every probe so connections are pooled. The
/// per-check timeout is enforced around the whole request.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("upcheck-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    /// Send the request and return the response status.
    ///
    /// The response body is dropped unread.
    async fn send(&self, check: &Check) -> Result<u16, ProbeError> {
        let raw = check.url();
        let url = Url::parse(&raw)
            .map_err(|e| ProbeError::InvalidUrl { url: raw.clone(), reason: e.to_string() })?;

        if url.host_str().is_none() {
            return Err(ProbeError::InvalidUrl { url: raw, reason: "missing host".into() });
        }

        let request = self.client.request(check.method.into(), url).send();

        // Whichever of response, error or deadline comes first decides the
        // outcome; the losing futures are dropped.
        match timeout(Duration::from_secs(check.timeout_seconds), request).await {
            Ok(Ok(response)) => Ok(response.status().as_u16()),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, check: &Check) -> Outcome {
        match self.send(check).await {
            Ok(status) => {
                debug!(check_id = %check.id, status, "probe received response");
                Outcome::response(status)
            }
            Err(e) => {
                debug!(check_id = %check.id, error = %e, "probe failed");
                Outcome::transport_error(e.to_string())
            }
        }
    }
}
