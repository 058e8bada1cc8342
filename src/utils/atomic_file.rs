use std::path::Path;

use serde::Serialize;

use crate::error::GatewayError;

/// Serializes `value` and writes it to `path` via a sibling temp file plus
/// rename, so a reader never observes a partially-written document and a
/// crash mid-write never corrupts the existing file.
pub async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), GatewayError> {
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = path.with_extension(format!(
        "{}.tmp-{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json"),
        uuid::Uuid::new_v4()
    ));
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
