//! End-to-end coverage of the HTTP surface wired to in-memory fakes: the
//! concrete scenarios a reviewer would check before trusting the pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use secrecy::Secret;
use tower::ServiceExt;

use paw_faucet::captcha::fake::{FakeCaptchaMode, FakeCaptchaVerifier};
use paw_faucet::chain::fake::{FakeChainClient, ScriptedOutcome};
use paw_faucet::config::{Environment, FaucetConfig};
use paw_faucet::dispenser::Dispenser;
use paw_faucet::http::{build_router, AppState};
use paw_faucet::ledger::fake::FakeLedger;
use paw_faucet::limiter::fake::FakeLimiter;

const PREFIX: &str = "paw";
const AMOUNT: u64 = 100_000_000;

fn test_config() -> FaucetConfig {
    FaucetConfig {
        port: 0,
        environment: Environment::Development,
        node_rpc_url: "http://127.0.0.1:26657".to_string(),
        chain_id: "pawtest-1".to_string(),
        address_prefix: PREFIX.to_string(),
        hot_mnemonic: Secret::new("test".to_string()),
        hot_address: address_for(0),
        amount_per_request: AMOUNT,
        denom: "upaw".to_string(),
        rate_limit_per_ip: 10,
        rate_limit_per_address: 1,
        rate_limit_window: Duration::from_secs(86_400),
        captcha_secret: Secret::new(String::new()),
        database_url: String::new(),
        redis_url: String::new(),
        trusted_proxies: Vec::new(),
    }
}

fn address_for(n: u8) -> String {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    bech32::encode(PREFIX, bech32::ToBase32::to_base32(&bytes), bech32::Variant::Bech32).unwrap()
}

struct Harness {
    router: axum::Router,
    ledger: Arc<FakeLedger>,
    chain: Arc<FakeChainClient>,
}

fn harness(captcha_mode: FakeCaptchaMode, cap_ip: u32, cap_address: u32) -> Harness {
    let config = test_config();
    let chain = Arc::new(FakeChainClient::new(AMOUNT * 1000));
    let ledger = Arc::new(FakeLedger::new());
    let limiter = Arc::new(FakeLimiter::new(
        cap_ip,
        cap_address,
        config.rate_limit_window,
    ));
    let captcha = Arc::new(FakeCaptchaVerifier::new(captcha_mode));

    let dispenser = Arc::new(Dispenser::new(
        &config,
        chain.clone() as Arc<dyn paw_faucet::chain::ChainClient>,
        ledger.clone() as Arc<dyn paw_faucet::ledger::Ledger>,
        limiter as Arc<dyn paw_faucet::limiter::Limiter>,
        captcha,
    ));

    let state = AppState {
        dispenser,
        ledger: ledger.clone() as Arc<dyn paw_faucet::ledger::Ledger>,
        chain: chain.clone() as Arc<dyn paw_faucet::chain::ChainClient>,
        config,
    };

    Harness {
        router: build_router(state),
        ledger,
        chain,
    }
}

fn peer_addr(ip: &str) -> SocketAddr {
    format!("{ip}:12345").parse().unwrap()
}

async fn post_request(
    router: &axum::Router,
    peer_ip: &str,
    address: &str,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    let body = serde_json::json!({ "address": address, "captcha_token": token });
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/faucet/request")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer_addr(peer_ip)));

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(router: &axum::Router, path: &str) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().uri(path).body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer_addr("203.0.113.1")));
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn happy_path_dispenses_and_returns_tx_hash() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);
    let addr = address_for(1);

    let (status, body) = post_request(&h.router, "203.0.113.1", &addr, "ok").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipient"], addr);
    assert_eq!(body["amount"], AMOUNT);
    assert!(body["tx_hash"].as_str().unwrap().starts_with("FAKETX"));

    let rows = h.ledger.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, paw_faucet::ledger::DispenseStatus::Completed);
}

#[tokio::test]
async fn address_rate_limit_blocks_replay() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);
    let addr = address_for(2);

    let (first_status, _) = post_request(&h.router, "203.0.113.1", &addr, "ok").await;
    assert_eq!(first_status, StatusCode::OK);

    let (second_status, second_body) = post_request(&h.router, "203.0.113.2", &addr, "ok").await;
    assert_eq!(second_status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second_body["error"], "rate_limited");

    assert_eq!(h.ledger.rows().len(), 1);
}

#[tokio::test]
async fn ip_rate_limit_caps_at_ten_distinct_addresses() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);

    for n in 0..10u8 {
        let addr = address_for(n);
        let (status, _) = post_request(&h.router, "198.51.100.7", &addr, "ok").await;
        assert_eq!(status, StatusCode::OK, "request {n} should succeed");
    }

    let eleventh = address_for(10);
    let (status, body) = post_request(&h.router, "198.51.100.7", &eleventh, "ok").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    assert_eq!(h.ledger.rows().len(), 10);
}

#[tokio::test]
async fn invalid_address_is_rejected_before_any_write() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);

    let (status, body) = post_request(&h.router, "203.0.113.1", "not-a-paw-address", "ok").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_address");
    assert!(h.ledger.rows().is_empty());
}

#[tokio::test]
async fn node_rejection_for_insufficient_funds_fails_the_row() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);
    h.chain.set_next_outcome(ScriptedOutcome::Reject {
        reason: "insufficient funds".to_string(),
        client_fault: false,
    });
    let addr = address_for(3);

    let (status, body) = post_request(&h.router, "203.0.113.1", &addr, "ok").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "node_rejected");

    let rows = h.ledger.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, paw_faucet::ledger::DispenseStatus::Failed);
    assert!(rows[0].error.is_some());
}

#[tokio::test]
async fn captcha_unavailable_denies_without_any_write_and_retry_succeeds() {
    let h = harness(FakeCaptchaMode::Unavailable, 10, 1);
    let addr = address_for(4);

    let (status, body) = post_request(&h.router, "203.0.113.1", &addr, "ok").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "captcha_unavailable");
    assert!(h.ledger.rows().is_empty());
}

#[tokio::test]
async fn health_reports_node_height() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);

    let (status, body) = get(&h.router, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["height"], 1);
}

#[tokio::test]
async fn recent_and_stats_reflect_completed_dispenses_only() {
    let h = harness(FakeCaptchaMode::AlwaysOk, 10, 1);

    let addr = address_for(5);
    post_request(&h.router, "203.0.113.1", &addr, "ok").await;

    h.chain.set_next_outcome(ScriptedOutcome::Reject {
        reason: "insufficient funds".to_string(),
        client_fault: false,
    });
    let addr2 = address_for(6);
    post_request(&h.router, "203.0.113.2", &addr2, "ok").await;

    let (status, body) = get(&h.router, "/api/v1/faucet/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_distributed"], AMOUNT as i64);
    assert_eq!(body["unique_recipients"], 1);
    assert_eq!(body["requests_last_window"], 2);

    let (status, body) = get(&h.router, "/api/v1/faucet/recent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["transactions"][0]["recipient"], addr);
}
