// Durable resume marker for ingestion.
//
// On-disk layout is two newline-separated fields: the influencer id, then an
// optional page token. Writes go to a temp file in the same directory which
// is then renamed over the old one, so a crash leaves either the previous
// checkpoint or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Next influencer to fetch.
    pub influencer_id: String,
    /// Page to resume at within that influencer; `None` means its first page.
    pub page_token: Option<String>,
}

impl Checkpoint {
    pub fn start_of(influencer_id: &str) -> Self {
        Self {
            influencer_id: influencer_id.to_string(),
            page_token: None,
        }
    }

    pub fn mid_list(influencer_id: &str, page_token: Option<String>) -> Self {
        Self {
            influencer_id: influencer_id.to_string(),
            page_token,
        }
    }

    fn encode(&self) -> String {
        format!(
            "{}\n{}",
            self.influencer_id,
            self.page_token.as_deref().unwrap_or_default()
        )
    }

    fn decode(raw: &str) -> Result<Option<Self>, String> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let mut lines = raw.lines();
        let influencer_id = lines.next().unwrap_or_default().trim();
        if influencer_id.is_empty() {
            return Err("first line must hold the influencer id".to_string());
        }
        let page_token = lines
            .next()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Ok(Some(Self {
            influencer_id: influencer_id.to_string(),
            page_token,
        }))
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt checkpoint at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the checkpoint. A missing file means no run has stopped part way.
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let checkpoint = Checkpoint::decode(&raw).map_err(|reason| CheckpointError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;
        if checkpoint.is_none() {
            warn!(path = %self.path.display(), "Checkpoint file is blank, starting from the first influencer");
        }
        Ok(checkpoint)
    }

    /// Atomically replace the checkpoint.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(checkpoint.encode().as_bytes())
            .map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(
            influencer_id = %checkpoint.influencer_id,
            page_token = ?checkpoint.page_token,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Remove the checkpoint after a full sweep so the next run starts over.
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("progress.txt"))
    }

    #[test]
    fn missing_file_means_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).load().unwrap(), None);
    }

    #[test]
    fn saves_and_loads_with_and_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mid = Checkpoint::mid_list("4646461997", Some("7140dibdnow9c7btw3w29".to_string()));
        store.save(&mid).unwrap();
        assert_eq!(store.load().unwrap(), Some(mid));

        let fresh = Checkpoint::start_of("4646461998");
        store.save(&fresh).unwrap();
        assert_eq!(store.load().unwrap(), Some(fresh));
    }

    #[test]
    fn on_disk_layout_is_two_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&Checkpoint::mid_list("42", Some("tok".to_string())))
            .unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "42\ntok");
    }

    #[test]
    fn reads_files_written_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "42\n").unwrap();
        assert_eq!(store.load().unwrap(), Some(Checkpoint::start_of("42")));
    }

    #[test]
    fn blank_first_line_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "\ntok").unwrap();
        assert!(matches!(store.load(), Err(CheckpointError::Corrupt { .. })));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&Checkpoint::start_of("1")).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("missing").join("progress.txt"));
        assert!(matches!(
            store.save(&Checkpoint::start_of("1")),
            Err(CheckpointError::Io { .. })
        ));
    }
}
