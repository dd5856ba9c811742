//! JSON-over-HTTP client shared by the scan driver and the remote cache

use crate::rpc::wire::ErrorBody;
use crate::rpc::{CustomHeaders, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use ureq::tls::TlsConfig;
use ureq::Agent;

/// HTTP status the server uses to signal a temporary outage
const STATUS_UNAVAILABLE: u16 = 503;

/// Scan responses for large images can be big; the ureq default is 10 MB
const MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

/// Connection settings for a remote endpoint
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Overall per-request timeout
    pub timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Blocking `ureq` agent driven from async code via `spawn_blocking`
#[derive(Clone)]
pub struct HttpClient {
    agent: Agent,
    base_url: String,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, options: &TransportOptions) -> Self {
        if options.insecure {
            warn!("TLS certificate verification is disabled for the remote server");
        }

        let tls = TlsConfig::builder()
            .disable_verification(options.insecure)
            .build();
        let config = Agent::config_builder()
            .tls_config(tls)
            .http_status_as_error(false)
            .timeout_global(Some(options.timeout))
            .build();

        Self {
            agent: Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to `path` and decode the JSON response
    pub async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        headers: &CustomHeaders,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned + Send + 'static,
    {
        let payload = serde_json::to_string(body).map_err(|e| RpcError::Encode(e.to_string()))?;
        let url = format!("{}{}", self.base_url, path);
        let agent = self.agent.clone();
        let headers = headers.clone();

        debug!("POST {}", url);
        tokio::task::spawn_blocking(move || send_blocking(&agent, &url, &headers, &payload))
            .await
            .map_err(|e| RpcError::Transport(format!("request task failed: {}", e)))?
    }
}

fn send_blocking<Resp: DeserializeOwned>(
    agent: &Agent,
    url: &str,
    headers: &CustomHeaders,
    payload: &str,
) -> Result<Resp, RpcError> {
    let mut request = agent
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json");
    for (name, value) in headers.iter() {
        request = request.header(name, value);
    }

    let mut response = request.send(payload).map_err(send_error)?;

    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_RESPONSE_BYTES)
        .read_to_string()
        .map_err(|e| RpcError::Transport(format!("reading response body: {}", e)))?;

    classify(status, &body)
}

/// Split send failures into network trouble worth retrying and request
/// problems no retry can fix
fn send_error(err: ureq::Error) -> RpcError {
    match err {
        ureq::Error::BadUri(_)
        | ureq::Error::Http(_)
        | ureq::Error::Tls(_)
        | ureq::Error::RequireHttpsOnly(_)
        | ureq::Error::InvalidProxyUrl => RpcError::Request(err.to_string()),
        // rustls reports handshake and certificate failures as InvalidData
        ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::InvalidData => {
            RpcError::Request(err.to_string())
        }
        _ => RpcError::Transport(err.to_string()),
    }
}

/// Map an HTTP status and body to a decoded response or an [`RpcError`]
fn classify<Resp: DeserializeOwned>(status: u16, body: &str) -> Result<Resp, RpcError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body).map_err(|e| RpcError::Decode(e.to_string()));
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .filter(|e| !e.msg.is_empty())
        .map(|e| format!("{} ({})", e.msg, e.code))
        .unwrap_or_else(|| body.trim().to_string());

    if status == STATUS_UNAVAILABLE {
        return Err(RpcError::Transport(format!(
            "server unavailable (HTTP {}): {}",
            status, message
        )));
    }

    Err(RpcError::Application { status, message })
}
