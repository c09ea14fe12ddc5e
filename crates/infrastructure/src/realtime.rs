use domain::UserId;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::repositories::owner_filter;

/// 変更通知の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
}

/// コレクションの変更通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent {
    pub action: RecordAction,
    pub record: Value,
}

impl RecordEvent {
    pub fn record_id(&self) -> Option<&str> {
        self.record.get("id").and_then(Value::as_str)
    }

    pub fn owner(&self) -> Option<&str> {
        self.record.get("user_id").and_then(Value::as_str)
    }

    /// 購読者宛ての通知かどうか。所有者が読めない通知は通す
    pub fn is_visible_to(&self, user: Option<&UserId>) -> bool {
        match (user, self.owner()) {
            (Some(user), Some(owner)) => owner == user.as_str(),
            _ => true,
        }
    }
}

/// 購読トピック（`<collection>/<record>`、所有者で絞り込み可能）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTopic {
    pub collection: String,
    pub record: String,
    pub owner: Option<UserId>,
}

impl SubscriptionTopic {
    /// コレクション全体の変更
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            record: "*".to_string(),
            owner: None,
        }
    }

    /// サーバー側で所有者フィルタをかける
    pub fn owned_by(mut self, owner: &UserId) -> Self {
        self.owner = Some(owner.clone());
        self
    }

    /// PocketBase に送る購読キー
    pub fn wire_name(&self) -> String {
        let base = format!("{}/{}", self.collection, self.record);
        match &self.owner {
            Some(owner) => {
                let options = json!({ "query": { "filter": owner_filter(owner) } });
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("options", &options.to_string())
                    .finish();
                format!("{base}?{query}")
            }
            None => base,
        }
    }
}

/// 購読中の変更通知ストリーム
///
/// drop すると受信タスクを止める。サーバー側の購読解除まで行うには `unsubscribe` を使う。
pub struct Subscription {
    topic: String,
    events: mpsc::Receiver<RecordEvent>,
    task: Option<JoinHandle<()>>,
    on_unsubscribe: Option<BoxFuture<'static, ()>>,
}

impl Subscription {
    pub fn new(topic: String, events: mpsc::Receiver<RecordEvent>, task: JoinHandle<()>) -> Self {
        Self {
            topic,
            events,
            task: Some(task),
            on_unsubscribe: None,
        }
    }

    /// 購読解除時にサーバーへ送る処理を登録
    pub fn with_unsubscribe(mut self, on_unsubscribe: BoxFuture<'static, ()>) -> Self {
        self.on_unsubscribe = Some(on_unsubscribe);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 次の通知を待つ。接続が切れたら `None`
    pub async fn recv(&mut self) -> Option<RecordEvent> {
        self.events.recv().await
    }

    /// 受信済みの通知をすべて取り出す
    pub fn drain(&mut self) -> Vec<RecordEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe.await;
        }
        debug!(topic = %self.topic, "Unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Server-Sent Events の1フレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub id: Option<String>,
    pub data: String,
}

/// バイト列を SSE フレームに分解する
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    id: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 受信したチャンクを追加し、完成したフレームを返す
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "id" => self.id = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            id,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_parses_connect_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"id:abc\nevent:PB_CONNECT\ndata:{\"clientId\":\"abc\"}\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "PB_CONNECT");
        assert_eq!(frames[0].id.as_deref(), Some("abc"));
        assert_eq!(frames[0].data, r#"{"clientId":"abc"}"#);
    }

    #[test]
    fn test_decoder_handles_split_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"event: tasks/*\r\nda").is_empty());
        assert!(decoder.push(b"ta: {\"action\":\"create\"}\r\n").is_empty());
        let frames = decoder.push(b"\r\n: keep-alive comment\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tasks/*");
        assert_eq!(frames[0].data, r#"{"action":"create"}"#);
    }

    #[test]
    fn test_decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: a\ndata: b\n\ndata: c\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[1].data, "c");
    }

    #[test]
    fn test_decoder_keeps_multibyte_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: 買い物\n\n".as_bytes();
        let (head, tail) = bytes.split_at(8);

        assert!(decoder.push(head).is_empty());
        let frames = decoder.push(tail);
        assert_eq!(frames[0].data, "買い物");
    }

    #[test]
    fn test_topic_wire_name() {
        let topic = SubscriptionTopic::collection("tasks");
        assert_eq!(topic.wire_name(), "tasks/*");

        let owner = UserId::from_string("user123").unwrap();
        let scoped = SubscriptionTopic::collection("tasks").owned_by(&owner);
        let wire = scoped.wire_name();
        assert!(wire.starts_with("tasks/*?options="));

        let encoded = wire.split_once('?').unwrap().1;
        let (key, value) = url::form_urlencoded::parse(encoded.as_bytes())
            .next()
            .unwrap();
        assert_eq!(key, "options");
        let options: Value = serde_json::from_str(&value).unwrap();
        assert_eq!(options["query"]["filter"], r#"user_id = "user123""#);
    }

    #[test]
    fn test_event_visibility() {
        let owner = UserId::from_string("user123").unwrap();
        let mine = RecordEvent {
            action: RecordAction::Create,
            record: json!({"id": "t1", "user_id": "user123"}),
        };
        let theirs = RecordEvent {
            action: RecordAction::Delete,
            record: json!({"id": "t2", "user_id": "someone"}),
        };

        assert!(mine.is_visible_to(Some(&owner)));
        assert!(!theirs.is_visible_to(Some(&owner)));
        assert!(theirs.is_visible_to(None));
        assert_eq!(theirs.record_id(), Some("t2"));
    }

    #[test]
    fn test_record_event_deserialize() {
        let event: RecordEvent =
            serde_json::from_str(r#"{"action":"update","record":{"id":"x"}}"#).unwrap();
        assert_eq!(event.action, RecordAction::Update);
    }
}
