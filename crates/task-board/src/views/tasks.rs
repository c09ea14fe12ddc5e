use std::sync::Arc;

use domain::{NewTask, Task, TaskId};
use infrastructure::{Backend, ListQuery, RecordEvent, Subscription, TaskRepository};
use shared::{AppError, Session};
use tracing::{debug, info};

use crate::context::AppContext;
use crate::error::UiError;

/// ログインユーザーのタスク一覧画面
pub struct TaskListView {
    backend: Arc<dyn Backend>,
    session: Session,
    tasks: Vec<Task>,
    subscription: Option<Subscription>,
}

impl TaskListView {
    /// 一覧を取得し、変更通知の購読を始める
    pub async fn mount(ctx: &AppContext) -> Result<Self, UiError> {
        let session = ctx.session().cloned().ok_or(UiError::NotLoggedIn)?;
        let mut view = Self {
            backend: Arc::clone(&ctx.backend),
            session,
            tasks: Vec::new(),
            subscription: None,
        };
        view.refresh().await?;
        view.subscription =
            super::subscribe_owned(&view.backend, &view.session, &ctx.tasks_collection).await;
        Ok(view)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub async fn refresh(&mut self) -> Result<(), UiError> {
        let query = ListQuery::owned_by(self.session.user_id());
        self.tasks = self
            .backend
            .list_tasks(Some(&self.session), &query)
            .await
            .map_err(UiError::LoadTasks)?;
        debug!(count = self.tasks.len(), "Loaded tasks");
        Ok(())
    }

    /// 既定値（to-do / low / Work）でタスクを作成する
    ///
    /// 一覧への反映は変更通知経由で行う。
    pub async fn create_task(&mut self, title: &str) -> Result<Task, UiError> {
        let task = NewTask::manual(title, self.session.user_id().clone())
            .map_err(|e| UiError::CreateTask(AppError::from(e)))?;
        let created = self
            .backend
            .create_task(&self.session, &task)
            .await
            .map_err(UiError::CreateTask)?;
        info!(task_id = %created.id, "Task created");
        Ok(created)
    }

    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), UiError> {
        self.backend
            .delete_task(&self.session, id)
            .await
            .map_err(UiError::DeleteTask)?;
        info!(task_id = %id, "Task deleted");
        Ok(())
    }

    /// 次の変更通知を待ち、一覧を取り直す。購読していない・切断された場合は `None`
    pub async fn next_change(&mut self) -> Option<Result<RecordEvent, UiError>> {
        let event = self.subscription.as_mut()?.recv().await?;
        debug!(action = ?event.action, record_id = ?event.record_id(), "Task change received");
        Some(self.refresh().await.map(|_| event))
    }

    /// 表示用の行（`{title} - {status}`）
    pub fn lines(&self) -> Vec<String> {
        self.tasks.iter().map(Task::summary_line).collect()
    }

    /// 購読を解除して画面を閉じる
    pub async fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
    }
}
