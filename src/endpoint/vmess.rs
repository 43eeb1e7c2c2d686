//! VMess descriptors: `vmess://base64(json)`.
//!
//! The JSON object follows the widely used v2rayN share layout: `ps` label,
//! `add`/`port` server, `id`/`aid` user, `scy` security, `net` transport,
//! `type`/`host`/`path` camouflage hints and `tls`/`sni`.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::str::FromStr;

use crate::endpoint::parser::decode_lenient;
use crate::endpoint::{Endpoint, ParseError, Protocol};
use crate::engine::model::{
    HeaderObfuscation, HeaderRequest, HttpSettings, KcpSettings, Mux, Outbound, OutboundSettings,
    QuicSettings, StreamSettings, TcpSettings, TlsSettings, User, VNext, WsSettings,
};

pub(crate) const SCHEME: &str = "vmess";

const TCP_HEADER_TYPES: &[&str] = &["none", "http"];
const KCP_HEADER_TYPES: &[&str] = &["none", "srtp", "utp", "wechat-video", "dtls", "wireguard"];

/// Share links encode numbers either as JSON numbers or as strings.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        Value::Number(n) => n.to_string().parse().map_err(de::Error::custom),
        Value::String(s) if s.trim().is_empty() => Ok(T::default()),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected a number, got {}", other))),
    }
}

#[derive(Debug, Deserialize)]
struct Share {
    #[serde(default)]
    ps: String,
    #[serde(default)]
    add: String,
    #[serde(deserialize_with = "lenient_number")]
    port: u16,
    #[serde(default)]
    id: String,
    #[serde(default, deserialize_with = "lenient_number")]
    aid: u32,
    #[serde(default)]
    scy: String,
    #[serde(default)]
    net: String,
    #[serde(rename = "type", default)]
    fake_type: String,
    #[serde(default)]
    host: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    tls: String,
    #[serde(default)]
    sni: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VMess {
    pub address: String,
    pub port: u16,
    pub id: String,
    pub alter_id: u32,
    pub security: String,
    pub network: String,
    pub fake_type: String,
    pub fake_host: String,
    pub path: String,
    pub tls: String,
    pub sni: String,
}

impl VMess {
    /// Decode the part of a descriptor after `vmess://`.
    pub(crate) fn parse(descriptor: &str, body: &str) -> Result<Endpoint, ParseError> {
        let decoded = decode_lenient(body)?;
        let share: Share = serde_json::from_slice(&decoded)?;

        let tag = if share.ps.is_empty() {
            format!("{}-{}", share.add, share.port)
        } else {
            share.ps
        };
        let vmess = Self {
            address: share.add,
            port: share.port,
            id: share.id,
            alter_id: share.aid,
            security: share.scy,
            network: share.net,
            fake_type: share.fake_type,
            fake_host: share.host,
            path: share.path,
            tls: share.tls,
            sni: share.sni,
        };

        Ok(Endpoint::new(tag, descriptor.to_string(), Protocol::VMess(vmess)))
    }

    pub(crate) fn outbound(&self, tag: &str) -> Outbound {
        let security = if self.security.is_empty() {
            "auto".to_string()
        } else {
            self.security.clone()
        };

        Outbound {
            send_through: Some("0.0.0.0".to_string()),
            protocol: "vmess".to_string(),
            settings: Some(OutboundSettings {
                servers: Vec::new(),
                vnext: vec![VNext {
                    address: self.address.clone(),
                    port: self.port,
                    users: vec![User {
                        id: self.id.clone(),
                        alter_id: self.alter_id,
                        security: Some(security),
                        level: 0,
                        extra: Map::new(),
                    }],
                    extra: Map::new(),
                }],
                extra: Map::new(),
            }),
            tag: tag.to_string(),
            stream_settings: Some(self.stream_settings()),
            proxy_settings: None,
            mux: Some(Mux {
                enabled: false,
                concurrency: Some(8),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    fn stream_settings(&self) -> StreamSettings {
        let mut tcp = TcpSettings {
            accept_proxy_protocol: false,
            header: Some(HeaderObfuscation::none()),
            ..TcpSettings::default()
        };
        let mut kcp = KcpSettings {
            mtu: Some(1350),
            tti: Some(20),
            uplink_capacity: Some(5),
            downlink_capacity: Some(20),
            congestion: false,
            read_buffer_size: Some(1),
            write_buffer_size: Some(1),
            header: Some(HeaderObfuscation::none()),
            ..KcpSettings::default()
        };
        let mut ws = WsSettings::default();
        let mut http = HttpSettings::default();

        match self.network.as_str() {
            "tcp" if TCP_HEADER_TYPES.contains(&self.fake_type.as_str()) => {
                let mut header = HeaderObfuscation {
                    header_type: self.fake_type.clone(),
                    ..HeaderObfuscation::default()
                };
                if self.fake_type == "http" && !self.fake_host.is_empty() {
                    let mut headers = Map::new();
                    headers.insert("Host".to_string(), split_list(&self.fake_host).into());
                    header.request = Some(HeaderRequest {
                        headers,
                        ..HeaderRequest::default()
                    });
                }
                tcp.header = Some(header);
            }
            "kcp" if KCP_HEADER_TYPES.contains(&self.fake_type.as_str()) => {
                kcp.header = Some(HeaderObfuscation {
                    header_type: self.fake_type.clone(),
                    ..HeaderObfuscation::default()
                });
            }
            "ws" => {
                // older links pack `path;host` into the host field
                let (path, host) = match self.fake_host.split_once(';') {
                    Some((path, host)) => (path.to_string(), host.to_string()),
                    None => (self.path.clone(), self.fake_host.clone()),
                };
                ws.path = path;
                if !host.is_empty() {
                    ws.headers.insert("Host".to_string(), Value::String(host));
                }
            }
            "http" => match self.fake_host.split_once(';') {
                Some((path, hosts)) => {
                    http.path = path.to_string();
                    http.host = split_list(hosts);
                }
                None => {
                    http.path = self.path.clone();
                    if !self.fake_host.is_empty() {
                        http.host = split_list(&self.fake_host);
                    }
                }
            },
            _ => {}
        }

        let mut tls = TlsSettings {
            server_name: Some("server.cc".to_string()),
            alpn: vec!["http/1.1".to_string()],
            allow_insecure: false,
            ..TlsSettings::default()
        };
        let security = if self.tls == "tls" {
            let server_name = if self.sni.is_empty() { &self.address } else { &self.sni };
            tls.server_name = Some(server_name.clone());
            "tls"
        } else {
            "none"
        };

        StreamSettings {
            network: (!self.network.is_empty()).then(|| self.network.clone()),
            security: Some(security.to_string()),
            tls_settings: Some(tls),
            tcp_settings: Some(tcp),
            kcp_settings: Some(kcp),
            ws_settings: Some(ws),
            http_settings: Some(http),
            quic_settings: Some(QuicSettings {
                security: Some("none".to_string()),
                header: Some(HeaderObfuscation::none()),
                ..QuicSettings::default()
            }),
            extra: Map::new(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;
    use serde_json::json;

    fn descriptor(share: serde_json::Value) -> String {
        format!("vmess://{}", STANDARD.encode(share.to_string()))
    }

    fn outbound_json(share: serde_json::Value) -> serde_json::Value {
        let ep = Endpoint::parse(&descriptor(share)).unwrap();
        serde_json::to_value(ep.outbound_spec()).unwrap()
    }

    #[test]
    fn test_parse_fields() {
        let d = descriptor(json!({
            "v": "2", "ps": "JP", "add": "jp.example.com", "port": 443,
            "id": "uuid-1", "aid": "64", "scy": "aes-128-gcm", "net": "tcp", "type": "none", "tls": ""
        }));
        let ep = Endpoint::parse(&d).unwrap();
        assert_eq!(ep.tag(), "JP");
        assert_eq!(ep.canonical_form(), d);
        match ep.protocol() {
            Protocol::VMess(v) => {
                assert_eq!(v.address, "jp.example.com");
                assert_eq!(v.port, 443);
                assert_eq!(v.alter_id, 64);
                assert_eq!(v.security, "aes-128-gcm");
            }
            other => panic!("unexpected protocol {:?}", other),
        }
    }

    #[test]
    fn test_tag_falls_back_to_address_port() {
        let ep = Endpoint::parse(&descriptor(json!({"add": "1.2.3.4", "port": "10086", "id": "u"}))).unwrap();
        assert_eq!(ep.tag(), "1.2.3.4-10086");
    }

    #[test]
    fn test_url_safe_unpadded_payload() {
        let json = json!({"ps": "x", "add": "a.b", "port": 1, "id": "u"}).to_string();
        let d = format!("vmess://{}", URL_SAFE_NO_PAD.encode(json));
        assert_eq!(Endpoint::parse(&d).unwrap().tag(), "x");
    }

    #[test]
    fn test_malformed_json() {
        let d = format!("vmess://{}", STANDARD.encode("{\"ps\": \"x\", "));
        assert!(matches!(Endpoint::parse(&d).unwrap_err(), ParseError::Json(_)));

        let d = descriptor(json!({"ps": "no-port", "add": "a"}));
        assert!(matches!(Endpoint::parse(&d).unwrap_err(), ParseError::Json(_)));

        let d = descriptor(json!({"add": "a", "port": "not-a-number"}));
        assert!(matches!(Endpoint::parse(&d).unwrap_err(), ParseError::Json(_)));
    }

    #[test]
    fn test_bad_base64() {
        assert!(matches!(Endpoint::parse("vmess://***").unwrap_err(), ParseError::Decode(_)));
    }

    #[test]
    fn test_outbound_defaults() {
        let out = outbound_json(json!({"ps": "A", "add": "a.example", "port": 443, "id": "u", "aid": 0}));
        assert_eq!(out["protocol"], "vmess");
        assert_eq!(out["tag"], "A");
        assert_eq!(out["settings"]["vnext"][0]["address"], "a.example");
        assert_eq!(out["settings"]["vnext"][0]["port"], 443);
        assert_eq!(out["settings"]["vnext"][0]["users"][0]["security"], "auto");
        assert_eq!(out["settings"]["vnext"][0]["users"][0]["alterId"], 0);
        assert_eq!(out["streamSettings"]["security"], "none");
        assert!(out["streamSettings"].get("network").is_none());
        assert_eq!(out["mux"]["concurrency"], 8);
    }

    #[test]
    fn test_tcp_http_camouflage() {
        let out = outbound_json(json!({
            "ps": "A", "add": "a", "port": 80, "id": "u",
            "net": "tcp", "type": "http", "host": "x.com, y.com"
        }));
        let header = &out["streamSettings"]["tcpSettings"]["header"];
        assert_eq!(out["streamSettings"]["network"], "tcp");
        assert_eq!(header["type"], "http");
        assert_eq!(header["request"]["headers"]["Host"], json!(["x.com", "y.com"]));
    }

    #[test]
    fn test_tcp_unknown_header_type_is_ignored() {
        let out = outbound_json(json!({"add": "a", "port": 80, "net": "tcp", "type": "srtp"}));
        assert_eq!(out["streamSettings"]["tcpSettings"]["header"]["type"], "none");
    }

    #[test]
    fn test_kcp_header() {
        let out = outbound_json(json!({"add": "a", "port": 80, "net": "kcp", "type": "wechat-video"}));
        assert_eq!(out["streamSettings"]["kcpSettings"]["header"]["type"], "wechat-video");
        assert_eq!(out["streamSettings"]["kcpSettings"]["mtu"], 1350);

        let out = outbound_json(json!({"add": "a", "port": 80, "net": "kcp", "type": "bogus"}));
        assert_eq!(out["streamSettings"]["kcpSettings"]["header"]["type"], "none");
    }

    #[test]
    fn test_ws_path_and_host() {
        let out = outbound_json(json!({"add": "a", "port": 80, "net": "ws", "host": "cdn.example", "path": "/ray"}));
        assert_eq!(out["streamSettings"]["wsSettings"]["path"], "/ray");
        assert_eq!(out["streamSettings"]["wsSettings"]["headers"]["Host"], "cdn.example");

        let out = outbound_json(json!({"add": "a", "port": 80, "net": "ws", "host": "/legacy;old.example"}));
        assert_eq!(out["streamSettings"]["wsSettings"]["path"], "/legacy");
        assert_eq!(out["streamSettings"]["wsSettings"]["headers"]["Host"], "old.example");
    }

    #[test]
    fn test_http_hosts() {
        let out = outbound_json(json!({"add": "a", "port": 80, "net": "http", "host": "h1,h2", "path": "/p"}));
        assert_eq!(out["streamSettings"]["httpSettings"]["path"], "/p");
        assert_eq!(out["streamSettings"]["httpSettings"]["host"], json!(["h1", "h2"]));

        let out = outbound_json(json!({"add": "a", "port": 80, "net": "http", "host": "/q;h3"}));
        assert_eq!(out["streamSettings"]["httpSettings"]["path"], "/q");
        assert_eq!(out["streamSettings"]["httpSettings"]["host"], json!(["h3"]));
    }

    #[test]
    fn test_tls_server_name() {
        let out = outbound_json(json!({"add": "a.example", "port": 443, "tls": "tls"}));
        assert_eq!(out["streamSettings"]["security"], "tls");
        assert_eq!(out["streamSettings"]["tlsSettings"]["serverName"], "a.example");

        let out = outbound_json(json!({"add": "1.2.3.4", "port": 443, "tls": "tls", "sni": "front.example"}));
        assert_eq!(out["streamSettings"]["tlsSettings"]["serverName"], "front.example");
    }
}
