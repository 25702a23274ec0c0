use std::io::Read;

use url::Url;

use crate::error::{Error, Result};
use crate::metric_list::{parse_metric_list, MetricCounts};
use crate::sample::MetricSample;
use crate::tunnel::{Tunnel, TunnelGuard};

const METRICS_LIST_PATH: &str = "metrics-list";
const METRICS_SAMPLES_PATH: &str = "metrics-samples";

/// A HTTP client for the receiver-mock API.
///
/// The client holds no state besides its base URL and the agent requests
/// are sent with, so it can be cloned and shared between threads freely.
#[derive(Debug, Clone)]
pub struct ReceiverMockClient {
    base_url: Url,
    agent: ureq::Agent,
}

impl ReceiverMockClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_agent(base_url, ureq::Agent::new())
    }

    /// Creates a client sending its requests through `agent`. This is the way
    /// to use a custom TLS configuration or request timeouts.
    pub fn with_agent(mut base_url: Url, agent: ureq::Agent) -> Self {
        // endpoint paths are resolved relative to the base, which only keeps
        // the last path segment when it ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { base_url, agent }
    }

    pub fn from_address(address: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(address)?))
    }

    /// Creates a client for a receiver-mock reachable through `tunnel`.
    ///
    /// Returns the client and a guard owning the tunnel. The tunnel is torn
    /// down when the guard is closed or dropped, so keep the guard alive for
    /// as long as the client is used.
    pub fn with_tunnel<T: Tunnel>(tunnel: T) -> Result<(Self, TunnelGuard<T>)> {
        let guard = TunnelGuard::new(tunnel);
        let base_url = Url::parse(&format!("http://{}/", guard.endpoint()))?;
        log::info!("Using receiver-mock at {} through a tunnel", base_url);
        Ok((Self::new(base_url), guard))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches how many times each metric was received, from `/metrics-list`.
    pub fn get_metric_counts(&self) -> Result<MetricCounts> {
        let url = self.base_url.join(METRICS_LIST_PATH)?;
        let response = self.get(&url)?;
        // into_string() caps bodies at 10 MB, receiver-mock lists can be larger
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|source| Error::Body {
                url: url.to_string(),
                source,
            })?;
        let counts = parse_metric_list(&body).inspect_err(|e| {
            log::warn!("Could not parse metrics list from {}: {}", url, e);
        })?;
        log::debug!("Received counts for {} metrics from {}", counts.len(), url);
        Ok(counts)
    }

    /// Fetches the samples matching `filters` from `/metrics-samples`.
    ///
    /// Every filter pair is sent as a query parameter. Repeated keys are all
    /// sent. Samples are returned in the order receiver-mock sent them; use
    /// [`crate::sort_by_time_desc`] to order them by time.
    pub fn get_metrics_samples<I, K, V>(&self, filters: I) -> Result<Vec<MetricSample>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.base_url.join(METRICS_SAMPLES_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in filters {
                query.append_pair(key.as_ref(), value.as_ref());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self.get(&url)?;
        let samples: Vec<MetricSample> =
            serde_json::from_reader(response.into_reader()).inspect_err(|e| {
                log::warn!("Could not decode metrics samples from {}: {}", url, e);
            })?;
        log::debug!("Received {} metrics samples from {}", samples.len(), url);
        Ok(samples)
    }

    fn get(&self, url: &Url) -> Result<ureq::Response> {
        log::debug!("GET {}", url);
        let response = match self.agent.request_url("GET", url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                log::warn!("Request to receiver-mock at {} failed: {}", url, transport);
                return Err(Error::Transport {
                    url: url.to_string(),
                    source: Box::new(transport),
                });
            }
        };

        if response.status() != 200 {
            log::warn!(
                "receiver-mock responded with status {} to {}",
                response.status(),
                url
            );
            return Err(Error::UnexpectedStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}
