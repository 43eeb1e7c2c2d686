//! Config synthesis: merging endpoints into an engine configuration.
//!
//! # Data Flow
//! ```text
//! Subscription refresh:
//!     base config + fetched endpoints
//!     → override_endpoints (test inbound, outbound, rule, selector per endpoint;
//!       passthrough inbounds/outbounds/rules carried over from base)
//!     → Synthesis { config, endpoints with check ports bound }
//!
//! Health re-check:
//!     serving config + healthy endpoints
//!     → balance (selector only)
//! ```
//!
//! # Design Decisions
//! - Both operations work on a deep copy; the caller's config is never touched
//! - Only the first balancer is managed; a config without one cannot be synthesized
//! - Balancing onto zero endpoints is an error, never an empty selector

use thiserror::Error;

use crate::endpoint::{self, Endpoint};
use crate::engine::model::{
    EngineConfig, Inbound, InboundSettings, ModelError, Outbound, Rule, Sniffing,
};

/// Port after which test listener ports are allocated (first one is +1).
pub const TEST_PORT_BASE: u16 = 20000;

/// Tag prefix of per-endpoint test inbounds.
pub const TEST_INBOUND_PREFIX: &str = "test-in-";

/// Rule targets that are not endpoint-derived and survive an override.
pub const PASSTHROUGH_RULE_TARGETS: &[&str] = &["direct", "dns", "decline"];

/// Outbound protocols that are not endpoint-derived and survive an override.
pub const PASSTHROUGH_OUTBOUND_PROTOCOLS: &[&str] = &["dns", "freedom", "blackhole"];

/// Errors raised while synthesizing a configuration.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("copying base config failed: {0}")]
    Clone(#[from] ModelError),

    #[error("config declares no routing balancer")]
    MissingBalancer,

    #[error("cannot balance on an empty endpoint set")]
    EmptyEndpointSet,

    #[error("no test listener port left for {count} endpoints")]
    PortExhausted { count: usize },
}

/// Result of a full override.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub config: EngineConfig,
    /// Input endpoints, in order, each with its check port bound.
    pub endpoints: Vec<Endpoint>,
}

/// Tag of the test inbound that probes `endpoint_tag`.
pub fn test_inbound_tag(endpoint_tag: &str) -> String {
    format!("{}{}", TEST_INBOUND_PREFIX, endpoint_tag)
}

fn test_inbound(tag: &str, port: u16) -> Inbound {
    Inbound {
        listen: Some("127.0.0.1".to_string()),
        port: Some(port.into()),
        protocol: "socks".to_string(),
        settings: Some(InboundSettings {
            auth: Some("noauth".to_string()),
            ip: Some("127.0.0.1".to_string()),
            ..InboundSettings::default()
        }),
        tag: test_inbound_tag(tag),
        sniffing: Some(Sniffing {
            enabled: true,
            dest_override: vec!["http".to_string(), "tls".to_string()],
            ..Sniffing::default()
        }),
        ..Inbound::default()
    }
}

fn test_rule(tag: &str) -> Rule {
    Rule {
        rule_type: Some("field".to_string()),
        inbound_tag: vec![test_inbound_tag(tag)],
        outbound_tag: Some(tag.to_string()),
        ..Rule::default()
    }
}

fn is_passthrough_rule(rule: &Rule) -> bool {
    let to_passthrough = rule
        .outbound_tag
        .as_deref()
        .is_some_and(|target| PASSTHROUGH_RULE_TARGETS.contains(&target));
    let to_balancer = rule.balancer_tag.as_deref().is_some_and(|b| !b.is_empty());
    to_passthrough || to_balancer
}

fn is_passthrough_outbound(outbound: &Outbound) -> bool {
    PASSTHROUGH_OUTBOUND_PROTOCOLS.contains(&outbound.protocol.as_str())
}

/// Rebuild the endpoint-derived parts of `base` from `endpoints`.
///
/// Endpoint-derived entries come first, in input order, followed by what is
/// carried over from `base`: user inbounds (not `test-in-*`), rules targeting
/// a passthrough outbound or a balancer, and passthrough-protocol outbounds.
pub fn override_endpoints(
    base: &EngineConfig,
    endpoints: &[Endpoint],
) -> Result<Synthesis, SynthesisError> {
    let mut config = base.deep_clone()?;
    if config.first_balancer().is_none() {
        return Err(SynthesisError::MissingBalancer);
    }

    let mut inbounds = Vec::with_capacity(endpoints.len() + config.inbounds.len());
    let mut outbounds = Vec::with_capacity(endpoints.len() + PASSTHROUGH_OUTBOUND_PROTOCOLS.len());
    let mut rules = Vec::with_capacity(endpoints.len());
    let mut bound = Vec::with_capacity(endpoints.len());

    for (offset, ep) in endpoints.iter().enumerate() {
        let port = u16::try_from(offset + 1)
            .ok()
            .and_then(|n| TEST_PORT_BASE.checked_add(n))
            .ok_or(SynthesisError::PortExhausted {
                count: endpoints.len(),
            })?;
        let ep = ep.clone().with_check_port(port);

        inbounds.push(test_inbound(ep.tag(), port));
        outbounds.push(ep.outbound_spec());
        rules.push(test_rule(ep.tag()));
        bound.push(ep);
    }

    inbounds.extend(
        std::mem::take(&mut config.inbounds)
            .into_iter()
            .filter(|inbound| !inbound.tag.starts_with(TEST_INBOUND_PREFIX)),
    );
    outbounds.extend(
        std::mem::take(&mut config.outbounds)
            .into_iter()
            .filter(is_passthrough_outbound),
    );

    // first_balancer() above guarantees routing is present
    let routing = config.routing.get_or_insert_with(Default::default);
    rules.extend(
        std::mem::take(&mut routing.rules)
            .into_iter()
            .filter(is_passthrough_rule),
    );
    routing.rules = rules;
    if let Some(balancer) = routing.balancers.first_mut() {
        balancer.selector = endpoint::tags(&bound);
    }

    config.inbounds = inbounds;
    config.outbounds = outbounds;

    Ok(Synthesis {
        config,
        endpoints: bound,
    })
}

/// Point the managed balancer at `endpoints` and change nothing else.
pub fn balance(base: &EngineConfig, endpoints: &[Endpoint]) -> Result<EngineConfig, SynthesisError> {
    if endpoints.is_empty() {
        return Err(SynthesisError::EmptyEndpointSet);
    }

    let mut config = base.deep_clone()?;
    let balancer = config
        .first_balancer_mut()
        .ok_or(SynthesisError::MissingBalancer)?;
    balancer.selector = endpoint::tags(endpoints);

    Ok(config)
}
