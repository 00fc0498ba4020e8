use crate::error::{LakeError, LakeResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Copy one source file into the landing directory, keeping its file name
pub fn upload_to_landing(source: &Path, landing_dir: &Path) -> LakeResult<PathBuf> {
    if !source.is_file() {
        tracing::error!(source = %source.display(), "Source file does not exist");
        return Err(LakeError::SourceNotFound(source.display().to_string()));
    }
    let file_name = source
        .file_name()
        .ok_or_else(|| LakeError::SourceNotFound(source.display().to_string()))?;

    fs::create_dir_all(landing_dir)?;
    let destination = landing_dir.join(file_name);
    fs::copy(source, &destination)?;

    tracing::info!(destination = %destination.display(), "File copied to landing folder");
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upload_creates_landing_dir() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("customer_loan_info_1.csv");
        fs::write(&source, "customer_id\n1\n").unwrap();
        let landing = dir.path().join("lake").join("landing");

        let copied = upload_to_landing(&source, &landing).unwrap();
        assert_eq!(copied, landing.join("customer_loan_info_1.csv"));
        assert_eq!(fs::read_to_string(copied).unwrap(), "customer_id\n1\n");
    }

    #[test]
    fn test_upload_missing_source() {
        let dir = TempDir::new().unwrap();
        let result = upload_to_landing(&dir.path().join("nope.csv"), dir.path());
        assert!(matches!(result, Err(LakeError::SourceNotFound(_))));
    }
}
