//! Upstream endpoints decoded from subscription descriptors.
//!
//! # Data Flow
//! ```text
//! subscription blob (base64, newline separated)
//!     → parser.rs (decode blob, split lines, dispatch on scheme)
//!     → shadowsocks.rs / vmess.rs (scheme-specific decoding)
//!     → Endpoint (immutable apart from its check port)
//!     → outbound_spec() → engine Outbound fragment
//! ```
//!
//! # Design Decisions
//! - Identity for change detection is the descriptor string, not the tag
//! - A bad line is skipped with a warning; only an empty result fails the batch
//! - New protocols extend `Protocol` and the scheme dispatch in parser.rs

pub mod parser;
pub mod shadowsocks;
pub mod vmess;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::engine::model::Outbound;

pub use parser::{decode_batch, BatchError};
pub use shadowsocks::Shadowsocks;
pub use vmess::VMess;

/// Errors raised while decoding a single descriptor.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported descriptor scheme: {0}")]
    UnsupportedScheme(String),

    #[error("unsupported descriptor format: {0}")]
    UnsupportedFormat(String),

    #[error("decoding descriptor payload failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("decoding descriptor json failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("descriptor payload is not valid utf-8")]
    Utf8,

    #[error("invalid port in descriptor: {0}")]
    InvalidPort(String),
}

/// Protocol-specific connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Shadowsocks(Shadowsocks),
    VMess(VMess),
}

/// One upstream proxy target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    tag: String,
    canonical: String,
    check_port: Option<u16>,
    protocol: Protocol,
}

impl Endpoint {
    pub(crate) fn new(tag: String, canonical: String, protocol: Protocol) -> Self {
        Self {
            tag,
            canonical,
            check_port: None,
            protocol,
        }
    }

    /// Decode a descriptor such as `ss://...` or `vmess://...`.
    pub fn parse(descriptor: &str) -> Result<Self, ParseError> {
        parser::parse_descriptor(descriptor)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The descriptor this endpoint was decoded from.
    pub fn canonical_form(&self) -> &str {
        &self.canonical
    }

    /// Local port of the endpoint's test listener, once synthesized.
    pub fn check_port(&self) -> Option<u16> {
        self.check_port
    }

    /// Bind the test listener port assigned by a synthesis pass.
    pub fn with_check_port(mut self, port: u16) -> Self {
        self.check_port = Some(port);
        self
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// The engine outbound that routes through this endpoint.
    pub fn outbound_spec(&self) -> Outbound {
        match &self.protocol {
            Protocol::Shadowsocks(ss) => ss.outbound(&self.tag),
            Protocol::VMess(vmess) => vmess.outbound(&self.tag),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.protocol {
            Protocol::Shadowsocks(ss) => write!(f, "{} (ss {}:{})", self.tag, ss.address, ss.port),
            Protocol::VMess(vmess) => {
                write!(f, "{} (vmess {}:{})", self.tag, vmess.address, vmess.port)
            }
        }
    }
}

/// Descriptor strings of `endpoints`, in order. This is the change-detection key.
pub fn canonical_forms(endpoints: &[Endpoint]) -> Vec<&str> {
    endpoints.iter().map(Endpoint::canonical_form).collect()
}

/// Tags of `endpoints`, in order.
pub fn tags(endpoints: &[Endpoint]) -> Vec<String> {
    endpoints.iter().map(|ep| ep.tag.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn ss(payload: &str, tag: &str) -> String {
        format!("ss://{}#{}", URL_SAFE_NO_PAD.encode(payload), tag)
    }

    #[test]
    fn test_check_port_binding() {
        let ep = Endpoint::parse(&ss("aes-256-gcm:pw@1.2.3.4:8388", "A")).unwrap();
        assert_eq!(ep.check_port(), None);
        let bound = ep.clone().with_check_port(20001);
        assert_eq!(bound.check_port(), Some(20001));
        assert_eq!(bound.canonical_form(), ep.canonical_form());
    }

    #[test]
    fn test_tag_collision_is_not_identity() {
        let a = Endpoint::parse(&ss("aes-256-gcm:pw@1.2.3.4:8388", "same")).unwrap();
        let b = Endpoint::parse(&ss("aes-256-gcm:pw@5.6.7.8:8388", "same")).unwrap();
        assert_eq!(a.tag(), b.tag());
        assert_ne!(canonical_forms(&[a]), canonical_forms(&[b]));
    }

    #[test]
    fn test_tags_and_display() {
        let a = Endpoint::parse(&ss("aes-256-gcm:pw@1.2.3.4:8388", "A")).unwrap();
        let b = Endpoint::parse(&ss("chacha20:pw@host.example:443", "")).unwrap();
        assert_eq!(tags(&[a.clone(), b]), vec!["A".to_string(), "host.example-443".to_string()]);
        assert_eq!(a.to_string(), "A (ss 1.2.3.4:8388)");
    }
}
