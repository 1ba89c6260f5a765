pub mod pii;
pub mod metrics;

use chrono::Utc;
use serde_json::{json, Value};
use self::pii::mask_pii;

#[derive(Clone)]
pub struct Logger {
    instance_id: String,
}

impl Logger {
    pub fn new(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn info(&self, msg: &str, context: Option<&Value>) {
        let entry = self.build_entry("INFO", msg, context);
        println!("{}", serde_json::to_string(&entry).unwrap_or_default());
    }

    pub fn warn(&self, msg: &str, context: Option<&Value>) {
        let entry = self.build_entry("WARN", msg, context);
        eprintln!("{}", serde_json::to_string(&entry).unwrap_or_default());
    }

    pub fn error(&self, msg: &str, context: Option<&Value>) {
        let entry = self.build_entry("ERROR", msg, context);
        eprintln!("{}", serde_json::to_string(&entry).unwrap_or_default());
    }

    fn build_entry(&self, level: &str, msg: &str, context: Option<&Value>) -> Value {
        let now = Utc::now().to_rfc3339();
        let safe_msg = mask_pii(msg);

        let mut base = json!({
            "ts": now,
            "level": level,
            "msg": safe_msg,
            "instance_id": self.instance_id,
        });

        if let Some(ctx) = context {
            if let Some(base_obj) = base.as_object_mut() {
                if let Some(ctx_obj) = ctx.as_object() {
                    for (k, v) in ctx_obj {
                        let safe_v = if let Some(s) = v.as_str() {
                            json!(mask_pii(s))
                        } else {
                            v.clone()
                        };
                        base_obj.insert(k.clone(), safe_v);
                    }
                }
            }
        }

        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_structure() {
        let logger = Logger::new("certifier-test".to_string());
        let context = json!({"tx_hash": "0xabc", "issuer_email": "admin@example.com", "attempt": 2});

        let entry = logger.build_entry("INFO", "Register attempt password=letmein", Some(&context));

        assert_eq!(entry["level"], "INFO");
        assert_eq!(entry["instance_id"], "certifier-test");
        assert!(entry["ts"].is_string());
        assert_eq!(entry["msg"], "Register attempt password=***");
        assert_eq!(entry["tx_hash"], "0xabc");
        assert_eq!(entry["issuer_email"], "***@***.***");
        assert_eq!(entry["attempt"], 2);
    }

    #[test]
    fn test_warn_entry_masks_context() {
        let logger = Logger::new("certifier-test".to_string());
        let context = json!({"detail": "private_key: 0x4646"});

        let entry = logger.build_entry("WARN", "REGISTER_PASSWORD not set", Some(&context));

        assert_eq!(entry["level"], "WARN");
        assert_eq!(entry["msg"], "REGISTER_PASSWORD not set");
        assert_eq!(entry["detail"], "private_key=***");
    }
}
