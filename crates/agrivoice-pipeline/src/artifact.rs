//! Transient audio files and their lifecycle.
//!
//! Recordings live in the uploads directory only while they are being
//! transcribed. Synthesized answers are created in the responses directory,
//! removed if synthesis fails, and otherwise kept until the retention sweep
//! finds them.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::{Builder, TempPath};

/// Random characters appended to every artifact name.
const NAME_RANDOM_CHARS: usize = 8;

/// Owner of the uploads and responses directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    uploads_dir: PathBuf,
    responses_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, responses_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            responses_dir: responses_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn responses_dir(&self) -> &Path {
        &self.responses_dir
    }

    /// Creates both directories if they are missing.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        std::fs::create_dir_all(&self.responses_dir)
    }

    /// Writes a recording to a fresh `input_<timestamp>_<random>.wav` file.
    pub async fn persist_input(&self, audio: Vec<u8>) -> io::Result<InputArtifact> {
        let dir = self.uploads_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut file = unique_file(&dir, "input", ".wav")?;
            file.write_all(&audio)?;
            file.flush()?;
            Ok(InputArtifact {
                path: file.into_temp_path(),
            })
        })
        .await
        .map_err(|e| io::Error::other(format!("task join error: {}", e)))?
    }

    /// Reserves a fresh `response_<timestamp>_<random>.mp3` file.
    pub fn create_output(&self) -> io::Result<OutputArtifact> {
        let file = unique_file(&self.responses_dir, "response", ".mp3")?;
        Ok(OutputArtifact {
            path: file.into_temp_path(),
        })
    }

    /// Deletes artifacts whose age exceeds `retention`. Returns how many went.
    pub fn sweep(&self, retention: Duration) -> io::Result<usize> {
        self.sweep_at(retention, SystemTime::now())
    }

    /// [`sweep`](Self::sweep) against an explicit clock.
    pub fn sweep_at(&self, retention: Duration, now: SystemTime) -> io::Result<usize> {
        let mut removed = 0;
        for dir in [&self.uploads_dir, &self.responses_dir] {
            if !dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    // Removed by someone else since read_dir listed it.
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e),
                };
                if !metadata.is_file() {
                    continue;
                }
                let age = now
                    .duration_since(metadata.modified()?)
                    .unwrap_or(Duration::ZERO);
                if age <= retention {
                    continue;
                }
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "failed to remove expired artifact"
                        );
                    }
                }
            }
        }
        Ok(removed)
    }
}

fn unique_file(dir: &Path, kind: &str, suffix: &str) -> io::Result<tempfile::NamedTempFile> {
    let prefix = format!("{}_{}_", kind, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    Builder::new()
        .prefix(&prefix)
        .suffix(suffix)
        .rand_bytes(NAME_RANDOM_CHARS)
        .tempfile_in(dir)
}

/// An uploaded recording. Deleted when dropped.
#[derive(Debug)]
pub struct InputArtifact {
    path: TempPath,
}

impl InputArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the recording now. Failures are logged and otherwise ignored.
    pub fn discard(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            tracing::debug!(path = %shown, error = %e, "failed to remove input audio");
        }
    }
}

/// A synthesized answer. Deleted when dropped unless persisted.
#[derive(Debug)]
pub struct OutputArtifact {
    path: TempPath,
}

impl OutputArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keeps the file on disk and hands its path to the retention sweep.
    pub fn persist(self) -> io::Result<PathBuf> {
        self.path.keep().map_err(|e| e.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn store(root: &Path) -> ArtifactStore {
        let store = ArtifactStore::new(root.join("uploads"), root.join("responses"));
        store.ensure_dirs().unwrap();
        store
    }

    fn file_names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn input_artifact_is_named_and_removed_on_discard() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let input = store.persist_input(b"RIFF".to_vec()).await.unwrap();
        let name = input.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("input_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(std::fs::read(input.path()).unwrap(), b"RIFF");

        input.discard();
        assert!(file_names(store.uploads_dir()).is_empty());
    }

    #[tokio::test]
    async fn input_artifact_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        {
            let _input = store.persist_input(vec![1, 2, 3]).await.unwrap();
            assert_eq!(file_names(store.uploads_dir()).len(), 1);
        }
        assert!(file_names(store.uploads_dir()).is_empty());
    }

    #[tokio::test]
    async fn concurrent_inputs_get_distinct_names() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let a = store.persist_input(vec![1]).await.unwrap();
        let b = store.persist_input(vec![2]).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn output_artifact_survives_only_when_persisted() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let dropped = store.create_output().unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());

        let kept = store.create_output().unwrap();
        let kept_path = kept.persist().unwrap();
        assert!(kept_path.exists());
        let name = kept_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("response_") && name.ends_with(".mp3"));
    }

    #[test]
    fn sweep_removes_only_expired_files_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let retention = Duration::from_secs(3600);

        File::create(store.uploads_dir().join("old_input.wav")).unwrap();
        File::create(store.responses_dir().join("old_response.mp3")).unwrap();
        std::fs::create_dir(store.responses_dir().join("nested")).unwrap();

        // Two hours from now both files are past retention.
        let later = SystemTime::now() + Duration::from_secs(7200);
        File::create(store.responses_dir().join("fresh.mp3"))
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_eq!(store.sweep_at(retention, later).unwrap(), 2);
        assert_eq!(file_names(store.uploads_dir()), Vec::<String>::new());
        let mut remaining = file_names(store.responses_dir());
        remaining.sort();
        assert_eq!(remaining, vec!["fresh.mp3", "nested"]);

        assert_eq!(store.sweep_at(retention, later).unwrap(), 0);
    }

    #[test]
    fn sweep_keeps_files_inside_retention() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        File::create(store.uploads_dir().join("recent.wav")).unwrap();

        assert_eq!(store.sweep(Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(file_names(store.uploads_dir()).len(), 1);
    }

    #[test]
    fn sweep_tolerates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(root.path().join("nope"), root.path().join("nada"));
        assert_eq!(store.sweep(Duration::ZERO).unwrap(), 0);
    }
}
