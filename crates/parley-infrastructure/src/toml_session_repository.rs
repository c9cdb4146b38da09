//! TOML-based SessionRepository implementation

use crate::dto::SessionDto;
use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use parley_core::session::{Session, SessionRepository};
use parley_core::{ParleyError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A repository storing each session as `<sessions_dir>/<session_id>.toml`.
///
/// Sessions are persisted through [`SessionDto`] so the file layout stays
/// independent from the domain model.
pub struct TomlSessionRepository {
    sessions_dir: PathBuf,
}

impl TomlSessionRepository {
    /// Creates a repository rooted at `sessions_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(sessions_dir: impl AsRef<Path>) -> Result<Self> {
        let sessions_dir = sessions_dir.as_ref().to_path_buf();
        fs::create_dir_all(&sessions_dir).map_err(|e| {
            ParleyError::io(format!(
                "Failed to create sessions directory {}: {}",
                sessions_dir.display(),
                e
            ))
        })?;

        Ok(Self { sessions_dir })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Resolves the file of a session. Ids that could leave the sessions
    /// directory are rejected.
    fn session_file(&self, session_id: &str) -> Result<AtomicTomlFile<SessionDto>> {
        let invalid = session_id.is_empty()
            || session_id == "."
            || session_id == ".."
            || session_id.contains(['/', '\\', '\0']);
        if invalid {
            return Err(ParleyError::invalid_state(format!(
                "Invalid session id {:?}",
                session_id
            )));
        }
        Ok(AtomicTomlFile::new(
            self.sessions_dir.join(format!("{}.toml", session_id)),
        ))
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        match self.session_file(session_id)?.load()? {
            Some(dto) => Ok(Some(Session::try_from(dto)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let dto = SessionDto::try_from(session)?;
        self.session_file(&session.id)?.save(&dto)?;
        tracing::debug!(
            "[TomlSessionRepository] Saved session {} ({} messages)",
            session.id,
            session.messages.len()
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.session_file(session_id)?.remove()
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();

        for entry in fs::read_dir(&self.sessions_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }

            let file = AtomicTomlFile::<SessionDto>::new(path.clone());
            match file.load() {
                Ok(Some(dto)) => sessions.push(Session::try_from(dto)?),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "[TomlSessionRepository] Skipping unreadable session file {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}
