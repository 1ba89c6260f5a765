use std::path::{Component, Path, PathBuf};

/// A file received from the `certificate` form field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Reduces a client supplied filename to a single safe path component.
pub fn sanitize_filename(name: &str) -> Result<String, String> {
    // Browsers on Windows may send the full client path.
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        return Err(format!("invalid upload filename {:?}", name));
    }
    let mut components = Path::new(last).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(last.to_string()),
        _ => Err(format!("invalid upload filename {:?}", name)),
    }
}

/// Writes the upload under `dir`, creating it when needed.
pub async fn store(dir: &Path, upload: &Upload) -> Result<PathBuf, String> {
    let name = sanitize_filename(&upload.filename)?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("failed to create {}: {}", dir.display(), e))?;
    let path = dir.join(name);
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
    Ok(path)
}
