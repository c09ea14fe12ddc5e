use crate::errors::DomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// タスクID（ストレージ側で採番される不透明な識別子）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// 文字列からタスクIDを作成
    pub fn from_string(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidTaskId(
                "Task ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザーID（認証済みユーザーのレコードID）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// 文字列からユーザーIDを作成
    pub fn from_string(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidUserId(
                "User ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// タスクのステータス
///
/// 既知の3値以外もそのまま保持する。集計時はどのバケットにも入らない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Other(String),
}

impl TaskStatus {
    /// 集計対象の3ステータス（作成順もこの順）
    pub const BUCKETS: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Todo => "to-do",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Other(raw) => raw,
        }
    }

    /// 画面表示用のラベル
    pub fn label(&self) -> &str {
        match self {
            TaskStatus::Todo => "To-Do",
            TaskStatus::InProgress => "In-Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Other(raw) => raw,
        }
    }

    pub fn is_bucket(&self) -> bool {
        !matches!(self, TaskStatus::Other(_))
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        // 完全一致のみ。大文字小文字や前後の空白は区別する
        match raw.as_str() {
            "to-do" => TaskStatus::Todo,
            "in-progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        TaskStatus::from(raw.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// タスクコレクションのレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: String,
    pub user_id: UserId,
}

impl Task {
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// 一覧表示用の1行
    pub fn summary_line(&self) -> String {
        format!("{} - {}", self.title, self.status)
    }
}

pub const DEFAULT_PRIORITY: &str = "low";
pub const DEFAULT_CATEGORY: &str = "Work";
pub const PLACEHOLDER_DESCRIPTION: &str = "Task description";

/// タスク作成リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub user_id: UserId,
    pub status: TaskStatus,
    pub priority: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl NewTask {
    /// 手動追加のタスクを作成（to-do / low / Work）
    pub fn manual(title: impl Into<String>, owner: UserId) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::InvalidTitle(
                "Title cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            title,
            user_id: owner,
            status: TaskStatus::Todo,
            priority: DEFAULT_PRIORITY.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            description: None,
            due_date: None,
        })
    }

    /// ダッシュボードの一括生成で使うプレースホルダータスク
    ///
    /// `ordinal` はバケット内で1から数える。
    pub fn placeholder(status: TaskStatus, ordinal: u32, owner: UserId, today: NaiveDate) -> Self {
        Self {
            title: format!("Task {ordinal} ({})", status.label()),
            user_id: owner,
            status,
            priority: DEFAULT_PRIORITY.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            description: Some(PLACEHOLDER_DESCRIPTION.to_string()),
            due_date: Some(today.format("%Y-%m-%d").to_string()),
        }
    }
}
