use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tiny_http::{Header, Request, Response, Server};
use url::Url;

use crate::error::{Error, Result};
use crate::sample::MetricSample;

/// Filter key matching the metric name instead of a label.
pub const METRIC_NAME_FILTER: &str = "__name__";

#[derive(Debug, Default)]
struct State {
    metric_counts_body: String,
    samples: Vec<MetricSample>,
    samples_body: Option<String>,
    fail_with_status: Option<u16>,
    requests: Vec<String>,
}

/// A receiver-mock serving `/metrics-list` and `/metrics-samples` from
/// memory. Listens on a random port on localhost until dropped.
pub struct ReceiverMockForTesting {
    pub port: u16,
    url: Url,
    server: Arc<Server>,
    state: Arc<Mutex<State>>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiverMockForTesting {
    pub fn start() -> Result<Self> {
        let server = Server::http("127.0.0.1:0").map_err(|e| Error::Io(io::Error::other(e)))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| Error::Io(io::Error::other("receiver-mock is not listening on IP")))?;
        let url = Url::parse(&format!("http://127.0.0.1:{}/", port))?;
        let server = Arc::new(server);
        let state = Arc::new(Mutex::new(State::default()));

        let handle = thread::Builder::new()
            .name("receiver-mock-for-testing".into())
            .spawn({
                let server = server.clone();
                let state = state.clone();
                move || {
                    for request in server.incoming_requests() {
                        handle_request(&state, request);
                    }
                }
            })?;

        log::debug!("receiver-mock for testing listening on 127.0.0.1:{}", port);
        Ok(Self {
            port,
            url,
            server,
            state,
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sets the raw body returned by `/metrics-list`.
    pub fn set_metric_counts_body(&self, body: impl Into<String>) {
        self.state().metric_counts_body = body.into();
    }

    /// Sets the samples returned by `/metrics-samples`.
    pub fn set_samples(&self, samples: Vec<MetricSample>) {
        self.state().samples = samples;
    }

    /// Serves `body` verbatim from `/metrics-samples` instead of the samples,
    /// or goes back to the samples when `None`.
    pub fn set_samples_body(&self, body: Option<String>) {
        self.state().samples_body = body;
    }

    /// Makes every endpoint respond with `status`, or restores normal
    /// responses when `None`.
    pub fn fail_with_status(&self, status: Option<u16>) {
        self.state().fail_with_status = status;
    }

    /// The path and query of every request received so far.
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ReceiverMockForTesting {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("receiver-mock for testing server thread panicked");
            }
        }
    }
}

fn handle_request(state: &Mutex<State>, request: Request) {
    let raw_url = request.url().to_string();
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.requests.push(raw_url.clone());

    if let Some(status) = state.fail_with_status {
        respond(request, status, "receiver-mock failure requested by test", None);
        return;
    }

    let url = match Url::parse("http://127.0.0.1/").and_then(|base| base.join(&raw_url)) {
        Ok(url) => url,
        Err(e) => {
            respond(request, 400, &format!("invalid request url: {}", e), None);
            return;
        }
    };

    match url.path() {
        "/metrics-list" => {
            let body = state.metric_counts_body.clone();
            respond(request, 200, &body, None);
        }
        "/metrics-samples" => {
            if let Some(body) = state.samples_body.clone() {
                respond(request, 200, &body, Some("application/json"));
                return;
            }
            let filters: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            let matching: Vec<&MetricSample> = state
                .samples
                .iter()
                .filter(|sample| matches_filters(sample, &filters))
                .collect();
            match serde_json::to_string(&matching) {
                Ok(body) => respond(request, 200, &body, Some("application/json")),
                Err(e) => respond(request, 500, &format!("internal server error: {}", e), None),
            }
        }
        _ => respond(request, 404, "Not found", None),
    }
}

fn matches_filters(sample: &MetricSample, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(key, value)| {
        if key == METRIC_NAME_FILTER {
            sample.metric == *value
        } else {
            sample.label(key) == Some(value.as_str())
        }
    })
}

fn respond(request: Request, status: u16, body: &str, content_type: Option<&str>) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Some(content_type) = content_type {
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
            response.add_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        log::warn!("receiver-mock for testing could not respond: {}", e);
    }
}
