//! Atomic JSON persistence: write to a sibling `.tmp` file, then rename
//! over the target so a reader never observes a partial document.

use std::path::Path;

use serde::Serialize;

use crate::core::error::{BridgeError, Result};

/// Serialize `value` with two-space indentation and a trailing newline,
/// and persist it to `path` via temp-file-then-rename.
pub async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| BridgeError::InvalidDocument(e.to_string()))?;
    buf.push(b'\n');

    let tmp_path = sibling_tmp(path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&tmp_path, &buf).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Load a JSON document into a raw [`serde_json::Value`], for callers that
/// must tolerate flexible-typed fields before normalisation.
pub async fn read_value(path: &Path) -> Result<Option<serde_json::Value>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| BridgeError::InvalidDocument(format!("{}: {e}", path.display())))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BridgeError::Io(e)),
    }
}

fn sibling_tmp(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
