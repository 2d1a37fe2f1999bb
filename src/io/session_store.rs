use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::io::config_io::config_dir;
use crate::model::user::{Credential, User};

/// The persisted sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Credential,
    pub user: User,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not write session to {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not remove session file {path}: {source}")]
    RemoveError { path: PathBuf, source: io::Error },
    #[error("could not serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub fn session_path() -> PathBuf {
    config_dir().join("session.json")
}

/// Holds the credential and user; persists them when backed by a file.
#[derive(Debug, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
    session: Option<Session>,
}

impl SessionStore {
    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the session at `path`. A missing file means signed out; an
    /// unreadable one is backed up as `.bak` and treated the same.
    pub fn open(path: PathBuf) -> Self {
        let session = read_session(&path);
        SessionStore {
            path: Some(path),
            session,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.session.as_ref().map(|s| &s.token)
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Replace the session. The in-memory value is only updated once the
    /// write succeeded.
    pub fn set(&mut self, token: Credential, user: User) -> Result<(), SessionError> {
        let session = Session {
            token,
            user,
            saved_at: Utc::now(),
        };
        if let Some(path) = &self.path {
            let content = serde_json::to_vec_pretty(&session)?;
            atomic_write(path, &content).map_err(|e| SessionError::WriteError {
                path: path.clone(),
                source: e,
            })?;
            debug!(path = %path.display(), "session saved");
        }
        self.session = Some(session);
        Ok(())
    }

    /// Forget the session in memory and on disk.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.session = None;
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "session removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SessionError::RemoveError {
                        path: path.clone(),
                        source: e,
                    });
                }
            }
        }
        Ok(())
    }
}

fn read_session(path: &Path) -> Option<Session> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read session file");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(e) => {
            let bak = path.with_extension("json.bak");
            let _ = fs::rename(path, &bak);
            warn!(
                path = %path.display(),
                backup = %bak.display(),
                error = %e,
                "could not parse session file; signed out"
            );
            None
        }
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
/// The temp file is created owner-only, so the token never sits in a
/// world-readable file.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
