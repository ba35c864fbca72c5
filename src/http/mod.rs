//! Thin HTTP surface: decode JSON, extract the observed source IP, route to
//! the Dispenser or read-only Ledger/ChainClient queries, shape responses.
//! Stats and info handlers call Ledger + ChainClient directly and never go
//! through the Dispenser.

pub mod dto;
pub mod handlers;

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use axum::routing::{get, post};
use axum::Router;
use ipnet::IpNet;
use tower_http::cors::{Any, CorsLayer};

use crate::chain::ChainClient;
use crate::config::FaucetConfig;
use crate::dispenser::Dispenser;
use crate::ledger::Ledger;

#[derive(Clone)]
pub struct AppState {
    pub dispenser: Arc<Dispenser>,
    pub ledger: Arc<dyn Ledger>,
    pub chain: Arc<dyn ChainClient>,
    pub config: FaucetConfig,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/faucet/info", get(handlers::info))
        .route("/api/v1/faucet/request", post(handlers::request))
        .route("/api/v1/faucet/recent", get(handlers::recent))
        .route("/api/v1/faucet/stats", get(handlers::stats))
        .layer(cors)
        .with_state(state)
}

/// Only honors `X-Forwarded-For` when the immediate TCP peer is in the
/// configured trusted-proxy CIDRs — otherwise the rate limiter's IP cap is
/// trivially spoofable.
pub fn resolve_client_ip(peer: IpAddr, headers: &HeaderMap, trusted: &[IpNet]) -> String {
    let peer_is_trusted = trusted.iter().any(|net| net.contains(&peer));
    if peer_is_trusted {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_string();
            }
        }
    }
    peer.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_xff(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn untrusted_peer_is_never_overridden_by_xff() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let headers = headers_with_xff("1.2.3.4");
        let trusted: Vec<IpNet> = vec!["10.0.0.0/8".parse().unwrap()];

        assert_eq!(resolve_client_ip(peer, &headers, &trusted), "203.0.113.9");
    }

    #[test]
    fn trusted_peer_honors_xff() {
        let peer: IpAddr = "10.0.0.5".parse().unwrap();
        let headers = headers_with_xff("1.2.3.4, 10.0.0.5");
        let trusted: Vec<IpNet> = vec!["10.0.0.0/8".parse().unwrap()];

        assert_eq!(resolve_client_ip(peer, &headers, &trusted), "1.2.3.4");
    }

    #[test]
    fn trusted_peer_with_no_xff_falls_back_to_peer() {
        let peer: IpAddr = "10.0.0.5".parse().unwrap();
        let headers = HeaderMap::new();
        let trusted: Vec<IpNet> = vec!["10.0.0.0/8".parse().unwrap()];

        assert_eq!(resolve_client_ip(peer, &headers, &trusted), "10.0.0.5");
    }
}
