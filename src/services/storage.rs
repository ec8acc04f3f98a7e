use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;

pub fn ensure_upload_dir(dir: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create upload directory {}", dir))
}

/// Write uploaded bytes under `dir` with a storage-assigned name of the
/// form `excel-<millis>-<random><ext>`. Returns the assigned file name and
/// the full path.
pub fn store_upload_file(
    dir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<(String, PathBuf)> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let file_name = format!(
        "excel-{}-{}{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension
    );

    let path = Path::new(dir).join(&file_name);
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok((file_name, path))
}

/// Remove a stored upload file. A file that is already gone is fine.
pub fn remove_upload_file(path: &str) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        let (file_name, path) = store_upload_file(dir_str, "report.XLSX", b"workbook").unwrap();

        assert!(file_name.starts_with("excel-"));
        assert!(file_name.ends_with(".xlsx"));
        assert_eq!(fs::read(&path).unwrap(), b"workbook");

        remove_upload_file(path.to_str().unwrap()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("excel-0-0.xlsx");

        assert!(remove_upload_file(missing.to_str().unwrap()).is_ok());
    }
}
