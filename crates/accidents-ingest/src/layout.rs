//! Ingestion root validation and CSV discovery
//!
//! Nothing is dropped or written before [`validate_layout`] has accepted the
//! root, so a misplaced path never costs the previous load.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::models::RecordType;

/// A validated ingestion root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subdirectory holding the files of `record_type`
    pub fn dir(&self, record_type: RecordType) -> PathBuf {
        self.root.join(record_type.dir_name())
    }
}

/// Check that `root` holds exactly the four record-type directories.
///
/// Entries whose name starts with `.` are ignored.
pub async fn validate_layout(root: &Path) -> IngestResult<Layout> {
    let mut names = BTreeSet::new();
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(|e| IngestError::io(root, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| IngestError::io(root, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.insert(name);
        }
    }

    let expected: BTreeSet<String> = RecordType::ALL
        .iter()
        .map(|t| t.dir_name().to_string())
        .collect();

    if names != expected {
        return Err(IngestError::Layout {
            root: root.to_path_buf(),
            found: names.into_iter().collect(),
        });
    }

    for name in &names {
        let path = root.join(name);
        // lstat: a symlink to a directory is rejected too
        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| IngestError::io(&path, e))?;
        if !metadata.is_dir() {
            return Err(IngestError::NotADirectory { path });
        }
    }

    debug!(root = %root.display(), "Ingestion layout validated");

    Ok(Layout {
        root: root.to_path_buf(),
    })
}

/// Regular files in `dir` whose name ends with `.csv` (case-sensitive), sorted by name
pub async fn list_csv_files(dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| IngestError::io(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| IngestError::io(dir, e))?
    {
        let path = entry.path();
        let is_csv = entry.file_name().to_string_lossy().ends_with(".csv");
        if !is_csv {
            continue;
        }

        let metadata = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| IngestError::io(&path, e))?;
        if metadata.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root_with(dirs: &[&str]) -> TempDir {
        let root = tempfile::tempdir().unwrap();
        for dir in dirs {
            std::fs::create_dir(root.path().join(dir)).unwrap();
        }
        root
    }

    const ALL_DIRS: [&str; 4] = ["0_caracteristiques", "1_lieux", "2_vehicules", "3_usagers"];

    #[tokio::test]
    async fn test_valid_layout_ignores_hidden_entries() {
        let root = root_with(&ALL_DIRS);
        std::fs::write(root.path().join(".DS_Store"), b"").unwrap();
        std::fs::create_dir(root.path().join(".git")).unwrap();

        let layout = validate_layout(root.path()).await.unwrap();
        assert_eq!(
            layout.dir(RecordType::Vehicles),
            root.path().join("2_vehicules")
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_layout_error() {
        let root = root_with(&ALL_DIRS[..3]);

        let err = validate_layout(root.path()).await.unwrap_err();
        match err {
            IngestError::Layout { found, .. } => assert_eq!(found.len(), 3),
            other => panic!("expected layout error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extra_entry_is_layout_error() {
        let root = root_with(&ALL_DIRS);
        std::fs::create_dir(root.path().join("4_extra")).unwrap();

        let err = validate_layout(root.path()).await.unwrap_err();
        assert!(matches!(err, IngestError::Layout { .. }));
    }

    #[tokio::test]
    async fn test_file_in_place_of_directory() {
        let root = root_with(&ALL_DIRS[..3]);
        let file = root.path().join("3_usagers");
        std::fs::write(&file, b"not a dir").unwrap();

        let err = validate_layout(root.path()).await.unwrap_err();
        match err {
            IngestError::NotADirectory { path } => assert_eq!(path, file),
            other => panic!("expected not-a-directory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");

        let err = validate_layout(&missing).await.unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[tokio::test]
    async fn test_list_csv_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), b"").unwrap();
        std::fs::write(dir.path().join("a.csv"), b"").unwrap();
        std::fs::write(dir.path().join("upper.CSV"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("dir.csv")).unwrap();

        let files = list_csv_files(dir.path()).await.unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.csv"), dir.path().join("b.csv")]
        );
    }
}
