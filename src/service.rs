use crate::chain::CertificateRegistry;
use crate::error::AppError;
use crate::hashing::CertificateHash;
use crate::ledger::{IssuanceRecord, Ledger};
use crate::observability::{metrics::Metrics, Logger};
use crate::uploads::{self, Upload};
use chrono::{Local, TimeZone};
use prometheus::IntGauge;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Denied,
    AlreadyRegistered { hash: CertificateHash },
    Registered { tx_hash: String, id: u64, hash: CertificateHash },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub hash: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

pub fn format_unix<Tz: TimeZone>(secs: u64, tz: &Tz) -> Option<String>
where
    Tz::Offset: fmt::Display,
{
    if secs == 0 {
        return None;
    }
    let secs = i64::try_from(secs).ok()?;
    tz.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Counts an upload as in progress until dropped.
struct InFlight<'a>(&'a IntGauge);

impl<'a> InFlight<'a> {
    fn start(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// The issuer registration and public verification flows.
pub struct CertificateService {
    registry: Arc<dyn CertificateRegistry>,
    ledger: Ledger,
    upload_dir: PathBuf,
    register_password: String,
    metrics: Arc<Metrics>,
    logger: Logger,
    // Covers check, send and audit so one file cannot be registered twice concurrently.
    registration: Mutex<()>,
}

impl CertificateService {
    pub fn new(
        registry: Arc<dyn CertificateRegistry>,
        ledger: Ledger,
        upload_dir: PathBuf,
        register_password: String,
        metrics: Arc<Metrics>,
        logger: Logger,
    ) -> Self {
        Self {
            registry,
            ledger,
            upload_dir,
            register_password,
            metrics,
            logger,
            registration: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<dyn CertificateRegistry> {
        &self.registry
    }

    fn password_matches(&self, password: &str) -> bool {
        password.as_bytes().ct_eq(self.register_password.as_bytes()).into()
    }

    pub async fn register(&self, password: &str, upload: Option<Upload>) -> Result<RegisterOutcome, AppError> {
        self.metrics.register_requests_total.inc();
        if !self.password_matches(password) {
            self.metrics.register_rejected_total.inc();
            self.logger.warn("Registration rejected: invalid password", None);
            return Ok(RegisterOutcome::Denied);
        }
        let upload = upload.ok_or_else(|| AppError::BadRequest("no certificate file uploaded".to_string()))?;

        let _in_flight = InFlight::start(&self.metrics.uploads_in_progress);
        self.register_upload(upload).await
    }

    async fn register_upload(&self, upload: Upload) -> Result<RegisterOutcome, AppError> {
        let hash = CertificateHash::of(&upload.bytes);
        uploads::store(&self.upload_dir, &upload).await.map_err(AppError::Storage)?;

        let _guard = self.registration.lock().await;
        let existing = self.registry.verify(&hash).await?;
        if existing.exists {
            self.metrics.register_duplicate_total.inc();
            self.logger.info("Certificate already registered", Some(&json!({
                "hash": hash.to_hex(),
                "id": existing.id,
            })));
            return Ok(RegisterOutcome::AlreadyRegistered { hash });
        }

        let receipt = self.registry.register(&hash).await.map_err(|e| {
            self.logger.error("Registration transaction failed", Some(&json!({
                "hash": hash.to_hex(),
                "error": e.message(),
                "kind": if e.is_transient() { "transient" } else { "permanent" },
            })));
            AppError::Chain(e)
        })?;
        let id = self.registry.certificate_count().await?;

        let record = IssuanceRecord {
            id,
            hash: hash.to_hex(),
            issuer: self.registry.issuer().to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };
        if let Err(e) = self.ledger.append(record).await {
            // The certificate is on chain at this point; report success anyway.
            self.logger.error("Failed to append audit record", Some(&json!({
                "hash": hash.to_hex(),
                "tx_hash": receipt.tx_hash,
                "error": e,
            })));
        }

        self.metrics.register_success_total.inc();
        self.logger.info("Certificate registered", Some(&json!({
            "hash": hash.to_hex(),
            "id": id,
            "tx_hash": receipt.tx_hash,
            "block_number": receipt.block_number,
            "gas_used": receipt.gas_used,
        })));
        Ok(RegisterOutcome::Registered { tx_hash: receipt.tx_hash, id, hash })
    }

    pub async fn verify(&self, upload: Option<Upload>) -> Result<Verification, AppError> {
        let upload = upload.ok_or_else(|| AppError::BadRequest("no certificate file uploaded".to_string()))?;
        let _in_flight = InFlight::start(&self.metrics.uploads_in_progress);
        let hash = CertificateHash::of(&upload.bytes);
        uploads::store(&self.upload_dir, &upload).await.map_err(AppError::Storage)?;
        self.verify_hash(&hash).await
    }

    pub async fn verify_hash(&self, hash: &CertificateHash) -> Result<Verification, AppError> {
        self.metrics.verify_requests_total.inc();
        let cert = self.registry.verify(hash).await?;
        if cert.exists {
            self.metrics.verify_found_total.inc();
            Ok(Verification {
                hash: hash.to_hex(),
                exists: true,
                id: Some(cert.id),
                issuer: Some(cert.issuer.to_string()),
                timestamp: format_unix(cert.timestamp, &Local),
            })
        } else {
            self.metrics.verify_not_found_total.inc();
            Ok(Verification {
                hash: hash.to_hex(),
                exists: false,
                id: None,
                issuer: None,
                timestamp: None,
            })
        }
    }
}
