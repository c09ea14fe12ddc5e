use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use domain::{count_by_status, parse_count, StatsSnapshot, TaskStatus};
use infrastructure::{Backend, ListQuery, RecordEvent, Subscription, TaskRepository};
use shared::{AppError, Session};
use tracing::{debug, info, warn};

use crate::chart::PieChart;
use crate::context::AppContext;
use crate::error::UiError;

pub const UPDATE_SUCCESS_MESSAGE: &str = "Tasks updated successfully!";
const UNREACHABLE_HINT: &str = "PocketBase server may not be running or reachable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardMode {
    Viewing,
    Editing,
}

/// 件数入力欄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Todo,
    InProgress,
    Done,
}

impl StatField {
    /// 入力欄の名前（`todo` / `inProgress` / `done`）から
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "todo" => Some(StatField::Todo),
            "inProgress" => Some(StatField::InProgress),
            "done" => Some(StatField::Done),
            _ => None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            StatField::Todo => TaskStatus::Todo,
            StatField::InProgress => TaskStatus::InProgress,
            StatField::Done => TaskStatus::Done,
        }
    }
}

/// 一括作成の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdate {
    pub created: u64,
    pub stats: StatsSnapshot,
}

impl BulkUpdate {
    pub fn message(&self) -> &'static str {
        UPDATE_SUCCESS_MESSAGE
    }
}

/// ステータス別件数のダッシュボード
///
/// 表示中（Viewing）は取得した件数を、編集中（Editing）は入力値を保持する。
/// 送信すると入力値の件数だけプレースホルダのタスクを作成する。
pub struct DashboardView {
    backend: Arc<dyn Backend>,
    session: Session,
    collection: String,
    stats: StatsSnapshot,
    mode: DashboardMode,
    notice: Option<String>,
    subscription: Option<Subscription>,
}

impl DashboardView {
    pub async fn mount(ctx: &AppContext) -> Result<Self, UiError> {
        let session = ctx.session().cloned().ok_or(UiError::NotLoggedIn)?;
        let mut view = Self {
            backend: Arc::clone(&ctx.backend),
            session,
            collection: ctx.tasks_collection.clone(),
            stats: StatsSnapshot::default(),
            mode: DashboardMode::Viewing,
            notice: None,
            subscription: None,
        };
        view.refresh().await;
        view.subscription =
            super::subscribe_owned(&view.backend, &view.session, &view.collection).await;
        Ok(view)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats
    }

    pub fn mode(&self) -> DashboardMode {
        self.mode
    }

    /// 直近の取得失敗に関する補足（接続できない場合のみ）
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn chart(&self) -> PieChart {
        PieChart::from_stats(&self.stats)
    }

    /// ログインユーザーのタスクを取り直して件数を再計算する
    ///
    /// 取得に失敗した場合は件数を0に戻し、エラーは画面に出さない。
    pub async fn refresh(&mut self) {
        let query = ListQuery::owned_by(self.session.user_id());
        match self.backend.list_tasks(Some(&self.session), &query).await {
            Ok(tasks) => {
                self.stats = count_by_status(&tasks);
                self.notice = None;
                debug!(stats = ?self.stats, "Loaded task stats");
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "Failed to fetch task stats");
                self.stats = StatsSnapshot::default();
                self.notice = e.is_unreachable().then(|| UNREACHABLE_HINT.to_string());
            }
        }
        self.mode = DashboardMode::Viewing;
    }

    /// 入力値を反映して編集中にする。数値以外は0、負数は0に丸める
    pub fn set_input(&mut self, field: StatField, raw: &str) {
        self.stats.set(&field.status(), parse_count(raw));
        self.mode = DashboardMode::Editing;
    }

    /// 入力値の件数だけタスクを作成し、件数を取り直す
    ///
    /// 途中で失敗した場合は残りを作成せず、作成済みのものも戻さない。
    /// 失敗時は編集中のまま入力値を保持する。作成後の取り直しに失敗しても
    /// 成功として返し、件数は0に戻る。
    pub async fn submit(&mut self) -> Result<BulkUpdate, UiError> {
        self.submit_on(Utc::now().date_naive()).await
    }

    pub async fn submit_on(&mut self, today: NaiveDate) -> Result<BulkUpdate, UiError> {
        if !self.session.is_valid() {
            return Err(UiError::NotLoggedIn);
        }
        self.apply_bulk(today).await.map_err(|e| {
            warn!(error = %e, code = e.code(), "Bulk task update failed");
            UiError::UpdateTasks(e)
        })
    }

    async fn apply_bulk(&mut self, today: NaiveDate) -> Result<BulkUpdate, AppError> {
        self.backend.health().await?;

        match self
            .backend
            .list_tasks(Some(&self.session), &ListQuery::probe())
            .await
        {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::NotFound(format!(
                    "Collection {} not found",
                    self.collection
                )))
            }
            Err(e) => return Err(e),
        }

        let planned = self.stats.total();
        let mut created: u64 = 0;
        for task in self.stats.placeholder_tasks(self.session.user_id(), today) {
            if let Err(e) = self.backend.create_task(&self.session, &task).await {
                warn!(created, remaining = planned - created, "Stopped bulk create");
                return Err(e);
            }
            created += 1;
        }
        info!(created, "Tasks updated");

        // 作成がすべて成功した時点で成功扱い。取り直しの失敗は表示時と同じく0に戻す
        self.refresh().await;
        Ok(BulkUpdate {
            created,
            stats: self.stats,
        })
    }

    /// 次の変更通知を待ち、件数を取り直す。購読していない・切断された場合は `None`
    pub async fn next_change(&mut self) -> Option<RecordEvent> {
        let event = self.subscription.as_mut()?.recv().await?;
        debug!(action = ?event.action, record_id = ?event.record_id(), "Task change received");
        self.refresh().await;
        Some(event)
    }

    pub async fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe().await;
        }
    }
}
