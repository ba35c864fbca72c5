use std::net::SocketAddr;
use std::sync::Arc;

use paw_faucet::captcha::HttpCaptchaVerifier;
use paw_faucet::chain::{ChainClient, TendermintChainClient};
use paw_faucet::config::FaucetConfig;
use paw_faucet::dispenser::Dispenser;
use paw_faucet::http::{build_router, AppState};
use paw_faucet::ledger::PgLedger;
use paw_faucet::limiter::RedisLimiter;
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = FaucetConfig::from_env()?;
    log::info!(
        "starting paw-faucet: chain_id={} denom={} amount_per_request={} port={}",
        config.chain_id,
        config.denom,
        config.amount_per_request,
        config.port
    );

    let ledger = PgLedger::connect(&config.database_url).await?;
    ledger.run_migrations().await?;
    let ledger: Arc<dyn paw_faucet::ledger::Ledger> = Arc::new(ledger);

    let limiter = RedisLimiter::connect(
        &config.redis_url,
        config.rate_limit_per_ip,
        config.rate_limit_per_address,
        config.rate_limit_window,
    )
    .await?;
    let limiter: Arc<dyn paw_faucet::limiter::Limiter> = Arc::new(limiter);

    let chain = TendermintChainClient::new(
        &config.node_rpc_url,
        config.hot_mnemonic.expose_secret(),
        config.hot_address.clone(),
        config.denom.clone(),
        config.chain_id.clone(),
    )?;
    let chain: Arc<dyn ChainClient> = Arc::new(chain);

    // Fail fast on a misconfigured or unreachable node rather than accepting
    // traffic the chain client can't actually serve.
    let height = chain.height().await?;
    log::info!("chain node reachable, height={height}");

    let captcha = HttpCaptchaVerifier::new(
        config.captcha_secret.clone(),
        config.environment.is_production(),
    );
    let captcha: Arc<dyn paw_faucet::captcha::CaptchaVerifier> = Arc::new(captcha);

    let dispenser = Arc::new(Dispenser::new(
        &config,
        chain.clone(),
        ledger.clone(),
        limiter,
        captcha,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState {
        dispenser,
        ledger,
        chain,
        config,
    };
    let app = build_router(state);

    log::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutdown signal received, draining in-flight requests");
}
