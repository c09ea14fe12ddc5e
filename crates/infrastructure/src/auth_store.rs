use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shared::{AppError, Session};
use tracing::{debug, warn};

/// ログインセッションの保持先
///
/// ファイルパスを持つ場合は保存・削除のたびにファイルへ反映する。
#[derive(Debug, Clone, Default)]
pub struct AuthStore {
    session: Option<Session>,
    path: Option<PathBuf>,
}

impl AuthStore {
    /// 永続化しないストア
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// ファイルからセッションを読み込む。ファイルが無い・壊れている場合は未ログイン扱い
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let session = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read session file {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            session,
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_valid)
    }

    /// 有効なセッションだけを返す
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_valid())
    }

    pub fn save(&mut self, session: Session) -> Result<(), AppError> {
        if let Some(path) = &self.path {
            let raw = serde_json::to_string_pretty(&session)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            fs::write(path, raw).map_err(|e| {
                AppError::Internal(format!(
                    "Failed to write session file {}: {e}",
                    path.display()
                ))
            })?;
            debug!(path = %path.display(), "Saved session");
        }
        self.session = Some(session);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), AppError> {
        self.session = None;
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed session file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::Internal(format!(
                        "Failed to remove session file {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        Ok(())
    }
}
