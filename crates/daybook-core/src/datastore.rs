use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::app::Session;

const SESSION_FILE: &str = "session.json";

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let session_path = data_dir.join(SESSION_FILE);

        info!(
            data_dir = %data_dir.display(),
            session = %session_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            session_path,
        })
    }

    /// `None` when no session has been saved yet.
    #[tracing::instrument(skip(self))]
    pub fn load_session(&self) -> anyhow::Result<Option<Session>> {
        if !self.session_path.exists() {
            debug!(file = %self.session_path.display(), "no saved session");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let session: Session = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))?;
        debug!(
            selected = %session.selected_date,
            tasks = session.history.total_tasks(),
            undo = session.stacks.undo_depth(),
            redo = session.stacks.redo_depth(),
            "loaded session"
        );
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session))]
    pub fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(session).context("failed serializing session")?;
        write_atomic(&self.session_path, serialized.as_bytes())
            .context("failed to save session.json")?;
        debug!(
            file = %self.session_path.display(),
            bytes = serialized.len(),
            "saved session"
        );
        Ok(())
    }
}

/// Writes through a temp file in the target directory, then renames over
/// `path`.
#[tracing::instrument(skip(path, contents))]
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
