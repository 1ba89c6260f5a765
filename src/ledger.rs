use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One confirmed registration, as kept in the local audit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    pub id: u64,
    pub hash: String,
    pub issuer: String,
    pub timestamp: String,
}

/// Append-only JSON array of [`IssuanceRecord`]s on disk.
pub struct Ledger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: IssuanceRecord) -> Result<(), String> {
        let _guard = self.lock.lock().await;
        let mut records = read_all(&self.path).await?;
        records.push(record);
        write_all(&self.path, &records).await
    }

    pub async fn records(&self) -> Result<Vec<IssuanceRecord>, String> {
        let _guard = self.lock.lock().await;
        read_all(&self.path).await
    }
}

async fn read_all(path: &Path) -> Result<Vec<IssuanceRecord>, String> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => Ok(Vec::new()),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| format!("{} is not a JSON array of records: {}", path.display(), e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(format!("failed to read {}: {}", path.display(), e)),
    }
}

async fn write_all(path: &Path, records: &[IssuanceRecord]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records
        .serialize(&mut ser)
        .map_err(|e| format!("failed to encode records: {}", e))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &buf)
        .await
        .map_err(|e| format!("failed to write {}: {}", tmp.display(), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| format!("failed to replace {}: {}", path.display(), e))
}
