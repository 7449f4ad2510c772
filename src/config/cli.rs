use crate::domain::ports::Storage;
use crate::utils::error::{AnalysisError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Filesystem-backed storage; keys are `/`-separated paths below `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path of `key` below the base directory. Keys that are absolute or
    /// climb out with `..` are refused.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let confined = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined || key.contains('\\') {
            return Err(AnalysisError::storage(format!(
                "Key {:?} points outside {}",
                key, self.base_path
            )));
        }
        Ok(Path::new(&self.base_path).join(relative))
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.path_for(path)?;
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.path_for(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let base = Path::new(&self.base_path);
        if !base.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        collect_files(base, &mut files)?;

        let mut keys: Vec<String> = files
            .iter()
            .filter_map(|p| p.strip_prefix(base).ok())
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_and_list() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap().to_string());

        storage.write_file("patient-records/p1/Jane_Smith.xml", b"<patient/>").await.unwrap();
        storage.write_file("patient-records/John_Doe.xml", b"<patient/>").await.unwrap();
        storage.write_file("analysis-reports/x.json", b"{}").await.unwrap();

        let keys = storage.list_keys("patient-records/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "patient-records/John_Doe.xml".to_string(),
                "patient-records/p1/Jane_Smith.xml".to_string()
            ]
        );
        assert_eq!(storage.list_keys("").await.unwrap().len(), 3);
        assert_eq!(
            storage.read_file("patient-records/John_Doe.xml").await.unwrap(),
            b"<patient/>"
        );
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let storage = LocalStorage::new("/nonexistent/med-records".to_string());
        assert!(storage.list_keys("").await.unwrap().is_empty());
        assert!(storage.read_file("a.xml").await.is_err());
    }

    #[tokio::test]
    async fn test_keys_cannot_leave_base_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let storage = LocalStorage::new(out.to_str().unwrap().to_string());

        for key in [
            "analysis-reports/patient-/../../../escaped/report.json",
            "../escaped.json",
            "/tmp/escaped.json",
            "a\\..\\..\\escaped.json",
        ] {
            let err = storage.write_file(key, b"{}").await.unwrap_err();
            assert!(matches!(err, AnalysisError::Storage { .. }), "{key}");
        }
        assert!(storage.read_file("../out/x").await.is_err());
        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().join("escaped.json").exists());

        storage.write_file("./reports/ok.json", b"{}").await.unwrap();
        assert!(out.join("reports/ok.json").exists());
    }
}
