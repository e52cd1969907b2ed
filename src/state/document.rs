//! JSON document files backing the stores

use serde::{de::DeserializeOwned, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ClubError, Result};

/// Load a document, or return `None` if the file does not exist yet
pub async fn load_document<T: DeserializeOwned>(path: &str) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ClubError::StateParse {
                path: path.to_string(),
                source: e,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ClubError::StateLoad {
            path: path.to_string(),
            source: e,
        }),
    }
}

/// Save a document atomically (write to a temp file, then rename)
pub async fn save_document<T: Serialize>(path: &str, document: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(document)?;

    let temp_path = format!("{}.tmp", path);
    tokio::fs::write(&temp_path, &content)
        .await
        .map_err(|e| ClubError::StateSave {
            path: path.to_string(),
            source: e,
        })?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| ClubError::StateSave {
            path: path.to_string(),
            source: e,
        })?;

    Ok(())
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
pub fn temp_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("club-{}-{}.json", name, uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}
