//! Reachability probes.

use std::future::Future;
use std::time::Duration;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::endpoint::Endpoint;

/// Why a probe did not pass.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("endpoint has no test listener bound")]
    Unbound,

    #[error("building probe client failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("probe target answered {0}")]
    Status(StatusCode),
}

/// A single reachability check against one endpoint.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, endpoint: &Endpoint) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// Probes by fetching a URL through the endpoint's local SOCKS test listener.
#[derive(Debug, Clone)]
pub struct SocksProbe {
    target: Url,
    timeout: Duration,
}

impl SocksProbe {
    pub fn new(target: Url, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

impl Probe for SocksProbe {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
        let port = endpoint.check_port().ok_or(ProbeError::Unbound)?;

        // socks5h: the name is resolved on the far side of the endpoint
        let proxy = reqwest::Proxy::all(format!("socks5h://127.0.0.1:{}", port))
            .map_err(ProbeError::Client)?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(ProbeError::Client)?;

        let response = client
            .get(self.target.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::Request(e)
                }
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::Status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use tokio::net::TcpListener;

    fn endpoint() -> Endpoint {
        let d = format!("ss://{}#A", URL_SAFE_NO_PAD.encode("aes-256-gcm:pw@1.2.3.4:8388"));
        Endpoint::parse(&d).unwrap()
    }

    #[tokio::test]
    async fn test_unbound_endpoint_fails_fast() {
        let probe = SocksProbe::new("http://example.invalid/".parse().unwrap(), Duration::from_secs(1));
        assert!(matches!(probe.probe(&endpoint()).await, Err(ProbeError::Unbound)));
    }

    #[tokio::test]
    async fn test_closed_listener_is_a_failure() {
        // grab a free port, then release it so nothing is listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = SocksProbe::new("http://example.invalid/".parse().unwrap(), Duration::from_secs(2));
        let result = probe.probe(&endpoint().with_check_port(port)).await;
        assert!(matches!(result, Err(ProbeError::Request(_)) | Err(ProbeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_silent_listener_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let probe = SocksProbe::new("http://example.invalid/".parse().unwrap(), Duration::from_millis(300));
        let result = probe.probe(&endpoint().with_check_port(port)).await;
        assert!(matches!(result, Err(ProbeError::Timeout(_)) | Err(ProbeError::Request(_))));
    }
}
