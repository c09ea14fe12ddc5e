use crate::task::{NewTask, Task, TaskStatus, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// ステータス別のタスク件数（永続化しない派生値）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub todo: u32,
    pub in_progress: u32,
    pub done: u32,
}

impl StatsSnapshot {
    pub fn new(todo: u32, in_progress: u32, done: u32) -> Self {
        Self {
            todo,
            in_progress,
            done,
        }
    }

    /// 3バケットの合計（各バケットが `u32::MAX` でも溢れない）
    pub fn total(&self) -> u64 {
        u64::from(self.todo) + u64::from(self.in_progress) + u64::from(self.done)
    }

    /// バケットの件数。既知ステータス以外は `None`
    pub fn get(&self, status: &TaskStatus) -> Option<u32> {
        match status {
            TaskStatus::Todo => Some(self.todo),
            TaskStatus::InProgress => Some(self.in_progress),
            TaskStatus::Done => Some(self.done),
            TaskStatus::Other(_) => None,
        }
    }

    /// バケットの件数を上書きする。既知ステータス以外は何もしない
    pub fn set(&mut self, status: &TaskStatus, count: u32) {
        match status {
            TaskStatus::Todo => self.todo = count,
            TaskStatus::InProgress => self.in_progress = count,
            TaskStatus::Done => self.done = count,
            TaskStatus::Other(_) => {}
        }
    }

    /// 件数分のプレースホルダータスクを作成順に返す
    ///
    /// 順序は to-do → in-progress → done、タイトルの番号はバケットごとに1から。
    /// 1件ずつ生成するので件数が大きくても事前に確保しない。
    pub fn placeholder_tasks(
        &self,
        owner: &UserId,
        today: NaiveDate,
    ) -> impl Iterator<Item = NewTask> {
        let stats = *self;
        let owner = owner.clone();
        TaskStatus::BUCKETS.into_iter().flat_map(move |status| {
            let count = stats.get(&status).unwrap_or(0);
            let owner = owner.clone();
            (1..=count).map(move |ordinal| {
                NewTask::placeholder(status.clone(), ordinal, owner.clone(), today)
            })
        })
    }
}

/// タスク一覧をステータスで3つのバケットに集計する
///
/// 既知の3ステータスに完全一致しないタスクはどのバケットにも数えない。
pub fn count_by_status<'a, I>(tasks: I) -> StatsSnapshot
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .fold(StatsSnapshot::default(), |mut stats, task| {
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Done => stats.done += 1,
                TaskStatus::Other(_) => {}
            }
            stats
        })
}

/// 数値入力欄の値を件数に変換する
///
/// 先頭の整数部分だけを読む（`"3abc"` は 3）。数値でなければ 0、負数は 0 に丸める。
pub fn parse_count(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];

    if negative || digits.is_empty() {
        return 0;
    }

    digits.parse::<u32>().unwrap_or(u32::MAX)
}
