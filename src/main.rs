use certifier::chain::{abi, CertificateRegistry, ContractClient};
use certifier::config::Config;
use certifier::ledger::Ledger;
use certifier::observability::{metrics::Metrics, Logger};
use certifier::server::{self, AppState};
use certifier::service::CertificateService;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::sleep;

const PROBE_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Load Config
    let config = Config::from_env()?;

    // 2. Initialize Logger
    let logger = Logger::new(config.instance_id.clone());
    logger.info("Certifier starting up", Some(&json!({
        "rpc_url": config.rpc_url,
        "http_bind": config.http_bind,
        "contract_address": config.contract_address,
        "account_address": config.account_address,
    })));
    if std::env::var("REGISTER_PASSWORD").is_err() {
        logger.warn("REGISTER_PASSWORD not set, using the built-in default", None);
    }

    if let Some(abi_path) = &config.contract_abi_path {
        let text = tokio::fs::read_to_string(abi_path)
            .await
            .map_err(|e| format!("failed to read {}: {}", abi_path, e))?;
        abi::check_abi(&text)?;
        logger.info("Contract ABI checked", Some(&json!({"path": abi_path})));
    }

    // 3. Build chain client and flows
    let metrics = Arc::new(Metrics::new());
    let client = Arc::new(ContractClient::from_config(&config, (*metrics).clone())?);
    let registry: Arc<dyn CertificateRegistry> = client;
    let service = Arc::new(CertificateService::new(
        registry.clone(),
        Ledger::open(&config.issuers_path),
        PathBuf::from(&config.upload_dir),
        config.register_password.clone(),
        metrics.clone(),
        logger.clone(),
    ));

    // 4. Start HTTP server; POSTs answer 503 until the node is reachable
    let readiness = Arc::new(AtomicBool::new(false));
    let state = AppState {
        service,
        metrics: metrics.clone(),
        readiness: readiness.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_upload_bytes: config.max_upload_bytes,
    };
    let listener = TcpListener::bind(&config.http_bind).await?;
    logger.info(&format!("HTTP server listening on {}", config.http_bind), None);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server_shutdown = shutdown_tx.subscribe();
    let server_logger = logger.clone();
    let server_task = tokio::spawn(async move {
        let shutdown = async move {
            let _ = server_shutdown.changed().await;
        };
        if let Err(e) = server::start_server(listener, state, shutdown).await {
            server_logger.error(&format!("HTTP server crashed: {}", e), None);
            std::process::exit(1);
        }
    });

    // 5. Probe the node with exponential backoff, then keep checking it
    let probe_logger = logger.clone();
    let probe_metrics = metrics.clone();
    let probe_readiness = readiness.clone();
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            let wait = match registry.probe().await {
                Ok(status) => {
                    if !probe_readiness.swap(true, Ordering::SeqCst) {
                        probe_logger.info("Connected to blockchain node", Some(&json!({
                            "chain_id": status.chain_id,
                            "block_number": status.block_number,
                        })));
                    }
                    probe_metrics.rpc_connected.set(1);
                    attempt = 0;
                    PROBE_INTERVAL
                }
                Err(e) => {
                    probe_readiness.store(false, Ordering::SeqCst);
                    probe_metrics.rpc_connected.set(0);
                    let backoff_ms = std::cmp::min(30_000, (500_u64).saturating_mul(2_u64.saturating_pow(attempt)));
                    probe_logger.error("Blockchain node unreachable, will retry", Some(&json!({
                        "error": e.message(),
                        "attempt": attempt,
                        "backoff_ms": backoff_ms,
                    })));
                    attempt = attempt.saturating_add(1);
                    Duration::from_millis(backoff_ms)
                }
            };
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = sleep(wait) => {}
            }
        }
    });

    // Keep main alive
    tokio::signal::ctrl_c().await?;
    readiness.store(false, Ordering::SeqCst);
    let _ = shutdown_tx.send(true);
    let _ = server_task.await;
    logger.info("Certifier shutdown", None);

    Ok(())
}
