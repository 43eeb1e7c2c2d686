//! Shadowsocks descriptors in the legacy `ss://base64(method:password@host:port)#tag` form.

use regex::Regex;
use serde_json::Map;
use std::sync::OnceLock;

use crate::endpoint::parser::decode_lenient;
use crate::endpoint::{Endpoint, ParseError, Protocol};
use crate::engine::model::{Mux, Outbound, OutboundSettings, ServerEntry, StreamSettings};

pub(crate) const SCHEME: &str = "ss";

fn legacy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<method>[^:]+):(?P<password>.+)@(?P<host>.+):(?P<port>\d+)$")
            .expect("legacy shadowsocks pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shadowsocks {
    pub method: String,
    pub password: String,
    pub address: String,
    pub port: u16,
}

impl Shadowsocks {
    /// Decode the part of a descriptor after `ss://`.
    pub(crate) fn parse(descriptor: &str, body: &str) -> Result<Endpoint, ParseError> {
        let (payload, fragment) = body.split_once('#').unwrap_or((body, ""));

        let decoded = match decode_lenient(payload) {
            Ok(decoded) => decoded,
            // SIP002 puts userinfo in base64 and host:port in clear text
            Err(_) if payload.contains('@') => {
                return Err(ParseError::UnsupportedFormat(format!(
                    "SIP002 shadowsocks descriptor is not supported: {}",
                    descriptor
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let text = String::from_utf8(decoded).map_err(|_| ParseError::Utf8)?;

        let caps = legacy_pattern().captures(text.trim()).ok_or_else(|| {
            ParseError::UnsupportedFormat(format!(
                "not a legacy shadowsocks descriptor: {}",
                descriptor
            ))
        })?;
        let port: u16 = caps["port"]
            .parse()
            .map_err(|_| ParseError::InvalidPort(caps["port"].to_string()))?;

        let ss = Self {
            method: caps["method"].to_string(),
            password: caps["password"].to_string(),
            address: caps["host"].to_string(),
            port,
        };
        let tag = if fragment.is_empty() {
            format!("{}-{}", ss.address, ss.port)
        } else {
            fragment.to_string()
        };

        Ok(Endpoint::new(tag, descriptor.to_string(), Protocol::Shadowsocks(ss)))
    }

    pub(crate) fn outbound(&self, tag: &str) -> Outbound {
        Outbound {
            send_through: Some("0.0.0.0".to_string()),
            protocol: "shadowsocks".to_string(),
            settings: Some(OutboundSettings {
                servers: vec![ServerEntry {
                    address: self.address.clone(),
                    port: self.port,
                    method: Some(self.method.clone()),
                    password: Some(self.password.clone()),
                    ..ServerEntry::default()
                }],
                vnext: Vec::new(),
                extra: Map::new(),
            }),
            tag: tag.to_string(),
            stream_settings: Some(StreamSettings::default()),
            proxy_settings: None,
            mux: Some(Mux::default()),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;

    #[test]
    fn test_parse_legacy_with_tag() {
        let descriptor = format!("ss://{}#HK-01", URL_SAFE_NO_PAD.encode("aes-256-gcm:s3cr3t@hk.example.com:8388"));
        let ep = Endpoint::parse(&descriptor).unwrap();

        assert_eq!(ep.tag(), "HK-01");
        assert_eq!(ep.canonical_form(), descriptor);
        match ep.protocol() {
            Protocol::Shadowsocks(ss) => {
                assert_eq!(ss.method, "aes-256-gcm");
                assert_eq!(ss.password, "s3cr3t");
                assert_eq!(ss.address, "hk.example.com");
                assert_eq!(ss.port, 8388);
            }
            other => panic!("unexpected protocol {:?}", other),
        }
    }

    #[test]
    fn test_parse_padded_standard_encoding() {
        let descriptor = format!("ss://{}", STANDARD.encode("rc4-md5:pass@10.0.0.1:443"));
        let ep = Endpoint::parse(&descriptor).unwrap();
        assert_eq!(ep.tag(), "10.0.0.1-443");
    }

    #[test]
    fn test_password_may_contain_colon_and_at() {
        let descriptor = format!("ss://{}#x", URL_SAFE_NO_PAD.encode("aes-128-gcm:p:a@ss@1.1.1.1:80"));
        let ep = Endpoint::parse(&descriptor).unwrap();
        match ep.protocol() {
            Protocol::Shadowsocks(ss) => {
                assert_eq!(ss.password, "p:a@ss");
                assert_eq!(ss.address, "1.1.1.1");
            }
            other => panic!("unexpected protocol {:?}", other),
        }
    }

    #[test]
    fn test_sip002_is_unsupported() {
        let descriptor = format!("ss://{}@1.2.3.4:8388#tag", URL_SAFE_NO_PAD.encode("aes-256-gcm:pw"));
        let err = Endpoint::parse(&descriptor).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)), "{:?}", err);
    }

    #[test]
    fn test_payload_without_credentials_is_unsupported() {
        let descriptor = format!("ss://{}", URL_SAFE_NO_PAD.encode("just-some-text"));
        let err = Endpoint::parse(&descriptor).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_port_out_of_range() {
        let descriptor = format!("ss://{}", URL_SAFE_NO_PAD.encode("aes-256-gcm:pw@1.2.3.4:70000"));
        let err = Endpoint::parse(&descriptor).unwrap_err();
        assert!(matches!(err, ParseError::InvalidPort(_)));
    }

    #[test]
    fn test_outbound_spec() {
        let descriptor = format!("ss://{}#A", URL_SAFE_NO_PAD.encode("aes-256-gcm:pw@1.2.3.4:8388"));
        let outbound = Endpoint::parse(&descriptor).unwrap().outbound_spec();
        let json = serde_json::to_value(&outbound).unwrap();

        assert_eq!(json["protocol"], "shadowsocks");
        assert_eq!(json["tag"], "A");
        assert_eq!(json["sendThrough"], "0.0.0.0");
        assert_eq!(json["settings"]["servers"][0]["address"], "1.2.3.4");
        assert_eq!(json["settings"]["servers"][0]["port"], 8388);
        assert_eq!(json["settings"]["servers"][0]["method"], "aes-256-gcm");
        assert_eq!(json["settings"]["servers"][0]["password"], "pw");
        assert_eq!(json["mux"]["enabled"], false);
    }
}
