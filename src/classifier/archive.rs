//! Backups of the model file before it is overwritten
//!
//! `<dir>/model.json` is copied to `<dir>/old/models/model.json.old.<N>`
//! with the smallest free `N`, starting at 1.

use std::path::{Path, PathBuf};

const OLD_DIR_NAME: &str = "old";
const OLD_MODELS_DIR_NAME: &str = "models";

/// Copy an existing model file into the archive directory.
/// Returns `None` when there is nothing to archive.
pub fn archive_existing(model_path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !model_path.is_file() {
        return Ok(None);
    }
    let Some(file_name) = model_path.file_name() else {
        return Ok(None);
    };

    let archive_dir = model_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(OLD_DIR_NAME)
        .join(OLD_MODELS_DIR_NAME);
    std::fs::create_dir_all(&archive_dir)?;

    let base = file_name.to_string_lossy();
    let target = (1..)
        .map(|index| archive_dir.join(format!("{}.old.{}", base, index)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| archive_dir.join(format!("{}.old", base)));

    std::fs::copy(model_path, &target)?;
    tracing::debug!("Archived {} to {}", model_path.display(), target.display());
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nothing_to_archive() {
        let dir = TempDir::new().unwrap();
        let result = archive_existing(&dir.path().join("model.json")).unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join("old").exists());
    }

    #[test]
    fn test_numbers_increase() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model.json");

        std::fs::write(&model, "first").unwrap();
        let a = archive_existing(&model).unwrap().unwrap();
        std::fs::write(&model, "second").unwrap();
        let b = archive_existing(&model).unwrap().unwrap();

        let archive_dir = dir.path().join("old").join("models");
        assert_eq!(a, archive_dir.join("model.json.old.1"));
        assert_eq!(b, archive_dir.join("model.json.old.2"));
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "second");
        // the original stays in place
        assert_eq!(std::fs::read_to_string(&model).unwrap(), "second");
    }
}
