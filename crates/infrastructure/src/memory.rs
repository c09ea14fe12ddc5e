//! プロセス内で完結するリモートサービスの代替実装（テスト・動作確認用）

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use domain::{NewTask, Task, TaskId, UserId};
use jsonwebtoken::{encode, EncodingKey, Header};
use shared::{AppError, AuthRecord, Claims, Session};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::realtime::{RecordAction, RecordEvent, Subscription, SubscriptionTopic};
use crate::repositories::{AuthProvider, ChangeFeed, ListQuery, TaskRepository};

const TOKEN_SECRET: &[u8] = b"in-memory-backend";
const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Default)]
struct State {
    tasks: Vec<Task>,
    users: Vec<(AuthRecord, String)>,
}

/// 呼び出し回数（テストでの検証用）
#[derive(Debug, Default)]
pub struct CallCounters {
    pub health: AtomicUsize,
    pub list: AtomicUsize,
    pub create: AtomicUsize,
    pub delete: AtomicUsize,
    pub subscribe: AtomicUsize,
}

pub struct InMemoryBackend {
    collection: String,
    state: Mutex<State>,
    events: broadcast::Sender<RecordEvent>,
    healthy: AtomicBool,
    create_budget: Mutex<Option<usize>>,
    list_budget: Mutex<Option<usize>>,
    calls: CallCounters,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            collection: shared::DEFAULT_TASKS_COLLECTION.to_string(),
            state: Mutex::new(State::default()),
            events,
            healthy: AtomicBool::new(true),
            create_budget: Mutex::new(None),
            list_budget: Mutex::new(None),
            calls: CallCounters::default(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn calls(&self) -> &CallCounters {
        &self.calls
    }

    /// ヘルスチェックの結果を切り替える
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// 作成を `count` 件だけ成功させ、以降は失敗させる
    pub fn fail_creates_after(&self, count: usize) {
        *lock(&self.create_budget) = Some(count);
    }

    /// 一覧取得を `count` 回だけ成功させ、以降は失敗させる
    pub fn fail_lists_after(&self, count: usize) {
        *lock(&self.list_budget) = Some(count);
    }

    pub fn register_user(&self, email: &str, password: &str) -> AuthRecord {
        let record = AuthRecord {
            id: new_user_id(),
            email: email.to_string(),
        };
        lock(&self.state)
            .users
            .push((record.clone(), password.to_string()));
        record
    }

    /// 指定の有効期間でトークンを発行する（負の値なら期限切れ）
    pub fn issue_session(&self, record: AuthRecord, ttl: Duration) -> Session {
        let claims = Claims {
            id: Some(record.id.as_str().to_string()),
            exp: (Utc::now() + ttl).timestamp(),
            token_type: Some("auth".to_string()),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(TOKEN_SECRET))
            .unwrap_or_default();
        Session::new(token, record)
    }

    /// 認証なしでタスクを直接追加する
    pub fn insert(&self, task: Task) {
        lock(&self.state).tasks.push(task.clone());
        self.publish(RecordAction::Create, &task);
    }

    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.state).tasks.clone()
    }

    fn publish(&self, action: RecordAction, task: &Task) {
        let record = match serde_json::to_value(task) {
            Ok(record) => record,
            Err(_) => return,
        };
        // 購読者がいなければ送信エラーになるが問題ない
        let _ = self.events.send(RecordEvent { action, record });
    }

    fn require_valid(session: &Session) -> Result<(), AppError> {
        if session.is_valid() {
            Ok(())
        } else {
            Err(AppError::Authentication(
                "The request requires valid record authorization token.".to_string(),
            ))
        }
    }

    fn ensure_healthy(&self) -> Result<(), AppError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable(
                "PocketBase server not running or unreachable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryBackend {
    async fn health(&self) -> Result<(), AppError> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        self.ensure_healthy()
    }

    async fn list_tasks(
        &self,
        _session: Option<&Session>,
        query: &ListQuery,
    ) -> Result<Vec<Task>, AppError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        self.ensure_healthy()?;
        spend(&self.list_budget, "Something went wrong while processing your request.")?;

        let state = lock(&self.state);
        let matching = state
            .tasks
            .iter()
            .filter(|t| query.owner.as_ref().map_or(true, |owner| t.is_owned_by(owner)))
            .cloned();
        let tasks = match query.limit {
            Some(limit) => matching.take(limit as usize).collect(),
            None => matching.collect(),
        };
        Ok(tasks)
    }

    async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, AppError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.ensure_healthy()?;
        Self::require_valid(session)?;

        spend(&self.create_budget, "Failed to create record.")?;

        let created = Task {
            id: TaskId::from_string(ulid::Ulid::new().to_string().to_lowercase())?,
            title: task.title.clone(),
            status: task.status.clone(),
            priority: task.priority.clone(),
            category: task.category.clone(),
            description: task.description.clone().unwrap_or_default(),
            due_date: task.due_date.clone().unwrap_or_default(),
            user_id: task.user_id.clone(),
        };
        lock(&self.state).tasks.push(created.clone());
        self.publish(RecordAction::Create, &created);
        debug!(task_id = %created.id, "Created task in memory");
        Ok(created)
    }

    async fn delete_task(&self, session: &Session, id: &TaskId) -> Result<(), AppError> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.ensure_healthy()?;
        Self::require_valid(session)?;

        let removed = {
            let mut state = lock(&self.state);
            let position = state
                .tasks
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| {
                    AppError::NotFound("The requested resource wasn't found.".to_string())
                })?;
            state.tasks.remove(position)
        };
        self.publish(RecordAction::Delete, &removed);
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for InMemoryBackend {
    async fn auth_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.ensure_healthy()?;
        let record = lock(&self.state)
            .users
            .iter()
            .find(|(record, secret)| record.email == email && secret == password)
            .map(|(record, _)| record.clone())
            .ok_or_else(|| AppError::Authentication("Failed to authenticate.".to_string()))?;

        Ok(self.issue_session(record, Duration::days(SESSION_TTL_DAYS)))
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn subscribe(
        &self,
        session: &Session,
        topic: &SubscriptionTopic,
    ) -> Result<Subscription, AppError> {
        self.calls.subscribe.fetch_add(1, Ordering::SeqCst);
        self.ensure_healthy()?;
        Self::require_valid(session)?;

        let mut source = self.events.subscribe();
        let (tx, rx) = mpsc::channel(64);
        let owner = topic.owner.clone();
        let task = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if !event.is_visible_to(owner.as_ref()) {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(Subscription::new(topic.wire_name(), rx, task))
    }
}

fn new_user_id() -> UserId {
    UserId::from_string(ulid::Ulid::new().to_string().to_lowercase())
        .unwrap_or_else(|_| unreachable!("ulid is never empty"))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 残り回数を1つ消費する。使い切っていればサーバーエラー
fn spend(budget: &Mutex<Option<usize>>, message: &str) -> Result<(), AppError> {
    let mut budget = lock(budget);
    if let Some(remaining) = budget.as_mut() {
        if *remaining == 0 {
            return Err(AppError::ExternalService {
                status: 500,
                message: message.to_string(),
            });
        }
        *remaining -= 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TaskStatus;

    fn backend_with_user() -> (InMemoryBackend, Session) {
        let backend = InMemoryBackend::new();
        let record = backend.register_user("test@example.com", "secret123");
        let session = backend.issue_session(record, Duration::hours(1));
        (backend, session)
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let (backend, session) = backend_with_user();
        let owner = session.user_id().clone();

        let created = backend
            .create_task(&session, &NewTask::manual("洗濯", owner.clone()).unwrap())
            .await
            .unwrap();
        assert_eq!(created.status, TaskStatus::Todo);

        let tasks = backend
            .list_tasks(Some(&session), &ListQuery::owned_by(&owner))
            .await
            .unwrap();
        assert_eq!(tasks, vec![created.clone()]);

        backend.delete_task(&session, &created.id).await.unwrap();
        assert!(backend.tasks().is_empty());

        let missing = backend.delete_task(&session, &created.id).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let (backend, session) = backend_with_user();
        let other = backend.register_user("other@example.com", "pw");
        let other_session = backend.issue_session(other.clone(), Duration::hours(1));

        backend
            .create_task(&session, &NewTask::manual("mine", session.user_id().clone()).unwrap())
            .await
            .unwrap();
        backend
            .create_task(&other_session, &NewTask::manual("theirs", other.id.clone()).unwrap())
            .await
            .unwrap();

        let mine = backend
            .list_tasks(Some(&session), &ListQuery::owned_by(session.user_id()))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "mine");

        let all = backend.list_tasks(None, &ListQuery::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(backend.list_tasks(None, &ListQuery::probe()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_with_password() {
        let backend = InMemoryBackend::new();
        backend.register_user("test@example.com", "secret123");

        let session = backend
            .auth_with_password("test@example.com", "secret123")
            .await
            .unwrap();
        assert!(session.is_valid());

        let failed = backend.auth_with_password("test@example.com", "wrong").await;
        assert!(matches!(failed, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_expired_session_cannot_create() {
        let backend = InMemoryBackend::new();
        let record = backend.register_user("test@example.com", "pw");
        let expired = backend.issue_session(record.clone(), Duration::minutes(-5));

        let result = backend
            .create_task(&expired, &NewTask::manual("x", record.id).unwrap())
            .await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_create_budget() {
        let (backend, session) = backend_with_user();
        backend.fail_creates_after(1);
        let task = NewTask::manual("x", session.user_id().clone()).unwrap();

        assert!(backend.create_task(&session, &task).await.is_ok());
        assert!(backend.create_task(&session, &task).await.is_err());
        assert_eq!(backend.tasks().len(), 1);
        assert_eq!(backend.calls().create.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_budget() {
        let (backend, session) = backend_with_user();
        backend.fail_lists_after(1);

        assert!(backend.list_tasks(Some(&session), &ListQuery::all()).await.is_ok());
        let result = backend.list_tasks(Some(&session), &ListQuery::all()).await;
        assert!(matches!(result, Err(AppError::ExternalService { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_subscription_receives_only_own_events() {
        let (backend, session) = backend_with_user();
        let other = backend.register_user("other@example.com", "pw");
        let other_session = backend.issue_session(other.clone(), Duration::hours(1));

        let topic = SubscriptionTopic::collection("tasks").owned_by(session.user_id());
        let mut subscription = backend.subscribe(&session, &topic).await.unwrap();

        backend
            .create_task(&other_session, &NewTask::manual("theirs", other.id).unwrap())
            .await
            .unwrap();
        let mine = backend
            .create_task(&session, &NewTask::manual("mine", session.user_id().clone()).unwrap())
            .await
            .unwrap();

        let event = subscription.recv().await.unwrap();
        assert_eq!(event.action, RecordAction::Create);
        assert_eq!(event.record_id(), Some(mine.id.as_str()));
        assert!(subscription.drain().is_empty());

        subscription.unsubscribe().await;
    }

    #[tokio::test]
    async fn test_unhealthy_backend() {
        let backend = InMemoryBackend::new();
        backend.set_healthy(false);
        let error = backend.health().await.unwrap_err();
        assert!(error.is_unreachable());
    }
}
