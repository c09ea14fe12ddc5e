use crate::realtime::{Subscription, SubscriptionTopic};
use async_trait::async_trait;
use domain::{NewTask, Task, TaskId, UserId};
use shared::{AppError, Session};

/// タスク一覧の取得条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// 指定時はこのユーザーのタスクだけを返す
    pub owner: Option<UserId>,
    /// 指定時は1ページ分だけ取得する
    pub limit: Option<u32>,
}

impl ListQuery {
    /// コレクション全件
    pub fn all() -> Self {
        Self::default()
    }

    pub fn owned_by(owner: &UserId) -> Self {
        Self {
            owner: Some(owner.clone()),
            limit: None,
        }
    }

    /// コレクションの存在確認用（1件だけ）
    pub fn probe() -> Self {
        Self {
            owner: None,
            limit: Some(1),
        }
    }

    /// PocketBase のフィルタ式
    pub fn filter_expression(&self) -> Option<String> {
        self.owner.as_ref().map(owner_filter)
    }
}

/// `user_id = "<id>"` 形式のフィルタ式を作る
pub fn owner_filter(owner: &UserId) -> String {
    let escaped = owner.as_str().replace('\\', "\\\\").replace('"', "\\\"");
    format!("user_id = \"{escaped}\"")
}

/// タスクコレクションへのアクセス
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// リモートサービスの死活確認
    async fn health(&self) -> Result<(), AppError>;

    async fn list_tasks(
        &self,
        session: Option<&Session>,
        query: &ListQuery,
    ) -> Result<Vec<Task>, AppError>;

    async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, AppError>;

    async fn delete_task(&self, session: &Session, id: &TaskId) -> Result<(), AppError>;
}

/// ユーザー認証
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn auth_with_password(&self, email: &str, password: &str) -> Result<Session, AppError>;
}

/// コレクションの変更通知
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        session: &Session,
        topic: &SubscriptionTopic,
    ) -> Result<Subscription, AppError>;
}

/// フロントエンドが必要とするリモートサービスの機能一式
pub trait Backend: TaskRepository + AuthProvider + ChangeFeed {}

impl<T> Backend for T where T: TaskRepository + AuthProvider + ChangeFeed {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_filter() {
        let owner = UserId::from_string("abc123").unwrap();
        assert_eq!(owner_filter(&owner), r#"user_id = "abc123""#);
        assert_eq!(
            ListQuery::owned_by(&owner).filter_expression().as_deref(),
            Some(r#"user_id = "abc123""#)
        );
    }

    #[test]
    fn test_owner_filter_escapes_quotes() {
        let owner = UserId::from_string(r#"x" || user_id != "y"#).unwrap();
        assert_eq!(
            owner_filter(&owner),
            r#"user_id = "x\" || user_id != \"y""#
        );
    }

    #[test]
    fn test_probe_and_all() {
        assert_eq!(ListQuery::probe().limit, Some(1));
        assert_eq!(ListQuery::all().filter_expression(), None);
    }
}
