//! Shared utilities for integration tests.
#![allow(dead_code)]

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use engine_supervisor::engine::EngineConfig;

/// Bootstrap config with user entries that must survive an override and
/// stale endpoint entries that must not.
pub const BASE_CONFIG: &str = r#"{
    "log": {"loglevel": "warning"},
    "inbounds": [
        {"port": 1080, "listen": "0.0.0.0", "protocol": "socks", "tag": "socks-in",
         "settings": {"auth": "noauth", "udp": true}},
        {"port": 20001, "listen": "127.0.0.1", "protocol": "socks", "tag": "test-in-old"}
    ],
    "outbounds": [
        {"protocol": "vmess", "tag": "old",
         "settings": {"vnext": [{"address": "198.51.100.1", "port": 443,
                                 "users": [{"id": "00000000-0000-0000-0000-000000000000", "alterId": 0}]}]}},
        {"protocol": "freedom", "tag": "direct"},
        {"protocol": "blackhole", "tag": "decline"}
    ],
    "routing": {
        "domainStrategy": "IPIfNonMatch",
        "rules": [
            {"type": "field", "inboundTag": ["test-in-old"], "outboundTag": "old"},
            {"type": "field", "ip": ["geoip:private"], "outboundTag": "direct"},
            {"type": "field", "inboundTag": ["socks-in"], "balancerTag": "proxy"}
        ],
        "balancers": [{"tag": "proxy", "selector": ["old"]}]
    }
}"#;

pub fn base_config() -> EngineConfig {
    EngineConfig::from_slice(BASE_CONFIG.as_bytes()).unwrap()
}

/// Shadowsocks descriptor for `host:8388` labelled `tag`.
pub fn ss_descriptor(host: &str, tag: &str) -> String {
    format!(
        "ss://{}#{}",
        URL_SAFE_NO_PAD.encode(format!("aes-256-gcm:secret@{}:8388", host)),
        tag
    )
}

/// VMess-over-websocket descriptor labelled `tag`.
pub fn vmess_descriptor(host: &str, tag: &str) -> String {
    let share = serde_json::json!({
        "v": "2",
        "ps": tag,
        "add": host,
        "port": "443",
        "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
        "aid": "0",
        "net": "ws",
        "type": "none",
        "host": host,
        "path": "/ray",
        "tls": "tls"
    });
    format!("vmess://{}", STANDARD.encode(share.to_string()))
}

/// Subscription body: newline-joined descriptors, base64 encoded.
pub fn subscription_blob(descriptors: &[String]) -> String {
    STANDARD.encode(descriptors.join("\n"))
}

pub fn read_engine_config(path: &std::path::Path) -> EngineConfig {
    EngineConfig::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

pub fn selector(config: &EngineConfig) -> Vec<String> {
    config.first_balancer().unwrap().selector.clone()
}

/// Start a programmable mock HTTP server on an ephemeral port.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut request = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => request.extend_from_slice(&buf[..n]),
                            }
                        }

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Mock subscription feed whose body can be swapped between requests.
#[allow(dead_code)]
pub struct MockFeed {
    pub addr: SocketAddr,
    body: Arc<std::sync::Mutex<(u16, String)>>,
}

#[allow(dead_code)]
impl MockFeed {
    pub async fn start(status: u16, body: String) -> Self {
        let body = Arc::new(std::sync::Mutex::new((status, body)));
        let shared = Arc::clone(&body);
        let addr = start_programmable_backend(move || {
            let response = shared.lock().unwrap().clone();
            async move { response }
        })
        .await;
        Self { addr, body }
    }

    pub fn set(&self, status: u16, body: String) {
        *self.body.lock().unwrap() = (status, body);
    }

    pub fn url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}/sub", self.addr)).unwrap()
    }
}
