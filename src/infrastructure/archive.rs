use crate::error::CacheError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// 已完成 Run 的归档：`<runs_dir>/<run_id>.json`
pub struct RunArchive {
    dir: PathBuf,
}

impl RunArchive {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub async fn save(&self, run_id: &str, document: &Value) -> Result<PathBuf, CacheError> {
        let path = self.dir.join(format!("{}.json", run_id));
        let write_failed = |source: std::io::Error| CacheError::WriteFailed {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_failed)?;
        let content = serde_json::to_string_pretty(document)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(write_failed)?;

        info!("💾 [运行 {}] 已归档: {}", run_id, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let archive = RunArchive::new(dir.path().join("runs"));
        let path = archive
            .save("20260101_120000_abcdef12", &json!({"metadata": {"run_id": "x"}}))
            .await
            .unwrap();
        assert!(path.ends_with("20260101_120000_abcdef12.json"));
        let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(saved["metadata"]["run_id"], "x");
    }
}
