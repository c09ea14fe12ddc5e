use shared::AppError;
use thiserror::Error;

/// 画面に表示するエラー（メッセージはそのままユーザーに見せる）
#[derive(Debug, Clone, Error)]
pub enum UiError {
    #[error("Login failed: {0}")]
    Login(AppError),

    #[error("Error loading tasks: {0}")]
    LoadTasks(AppError),

    #[error("Error creating task: {0}")]
    CreateTask(AppError),

    #[error("Error deleting task: {0}")]
    DeleteTask(AppError),

    #[error("Error updating tasks: {0}")]
    UpdateTasks(AppError),

    #[error("Please log in to update tasks")]
    NotLoggedIn,

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Session storage error: {0}")]
    Storage(AppError),
}
