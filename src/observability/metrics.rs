use prometheus::{
    Encoder, Histogram, IntCounter, IntGauge, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    pub rpc_requests_total: IntCounter,
    pub rpc_errors_total: IntCounter,
    pub rpc_connected: IntGauge,
    pub register_requests_total: IntCounter,
    pub register_success_total: IntCounter,
    pub register_rejected_total: IntCounter,
    pub register_duplicate_total: IntCounter,
    pub verify_requests_total: IntCounter,
    pub verify_found_total: IntCounter,
    pub verify_not_found_total: IntCounter,
    pub uploads_in_progress: IntGauge,
    pub tx_confirmation_seconds: Histogram,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let rpc_requests_total = IntCounter::new("rpc_requests_total", "JSON-RPC requests sent to the node").unwrap();
        let rpc_errors_total = IntCounter::new("rpc_errors_total", "JSON-RPC requests that failed after retries").unwrap();
        let rpc_connected = IntGauge::new("rpc_connected", "Node reachable gauge 1/0").unwrap();
        let register_requests_total = IntCounter::new("register_requests_total", "Registration submissions").unwrap();
        let register_success_total = IntCounter::new("register_success_total", "Certificates registered on chain").unwrap();
        let register_rejected_total = IntCounter::new("register_rejected_total", "Registrations rejected by password check").unwrap();
        let register_duplicate_total = IntCounter::new("register_duplicate_total", "Registrations of already known certificates").unwrap();
        let verify_requests_total = IntCounter::new("verify_requests_total", "Verification submissions").unwrap();
        let verify_found_total = IntCounter::new("verify_found_total", "Verifications that found a registration").unwrap();
        let verify_not_found_total = IntCounter::new("verify_not_found_total", "Verifications without a registration").unwrap();
        let uploads_in_progress = IntGauge::new("uploads_in_progress", "Uploads currently being processed").unwrap();
        let tx_confirmation_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new("tx_confirmation_seconds", "Time from broadcast to receipt in seconds")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0])
        ).unwrap();

        registry.register(Box::new(rpc_requests_total.clone())).unwrap();
        registry.register(Box::new(rpc_errors_total.clone())).unwrap();
        registry.register(Box::new(rpc_connected.clone())).unwrap();
        registry.register(Box::new(register_requests_total.clone())).unwrap();
        registry.register(Box::new(register_success_total.clone())).unwrap();
        registry.register(Box::new(register_rejected_total.clone())).unwrap();
        registry.register(Box::new(register_duplicate_total.clone())).unwrap();
        registry.register(Box::new(verify_requests_total.clone())).unwrap();
        registry.register(Box::new(verify_found_total.clone())).unwrap();
        registry.register(Box::new(verify_not_found_total.clone())).unwrap();
        registry.register(Box::new(uploads_in_progress.clone())).unwrap();
        registry.register(Box::new(tx_confirmation_seconds.clone())).unwrap();

        Self {
            registry,
            rpc_requests_total,
            rpc_errors_total,
            rpc_connected,
            register_requests_total,
            register_success_total,
            register_rejected_total,
            register_duplicate_total,
            verify_requests_total,
            verify_found_total,
            verify_not_found_total,
            uploads_in_progress,
            tx_confirmation_seconds,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or(());
        buffer
    }
}
