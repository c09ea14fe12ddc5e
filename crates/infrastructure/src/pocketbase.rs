use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use domain::{NewTask, Task, TaskId};
use futures::{FutureExt, Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use shared::{AppError, AuthRecord, Config, Session};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::realtime::{RecordEvent, SseDecoder, SseFrame, Subscription, SubscriptionTopic};
use crate::repositories::{AuthProvider, ChangeFeed, ListQuery, TaskRepository};

/// getFullList 相当の1ページあたり件数
const FULL_LIST_PAGE_SIZE: u32 = 500;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 64;

/// PocketBase REST API クライアント
#[derive(Debug, Clone)]
pub struct PocketBaseClient {
    http: Client,
    base_url: String,
    tasks_collection: String,
    users_collection: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    record: AuthRecord,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectPayload {
    client_id: String,
}

impl PocketBaseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tasks_collection: shared::DEFAULT_TASKS_COLLECTION.to_string(),
            users_collection: shared::DEFAULT_USERS_COLLECTION.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.pocketbase_url.clone())
            .with_collections(&config.tasks_collection, &config.users_collection)
    }

    pub fn with_collections(mut self, tasks: &str, users: &str) -> Self {
        self.tasks_collection = tasks.to_string();
        self.users_collection = users.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tasks_collection(&self) -> &str {
        &self.tasks_collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn records_url(&self) -> String {
        self.url(&format!("/api/collections/{}/records", self.tasks_collection))
    }

    async fn fetch_page(
        &self,
        session: Option<&Session>,
        filter: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Task>, AppError> {
        let mut params = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("skipTotal", "1".to_string()),
        ];
        if let Some(filter) = filter {
            params.push(("filter", filter.to_string()));
        }

        let request = authorize(self.http.get(self.records_url()).query(&params), session);
        let page: ListPage<Task> = read_json(send(request).await?).await?;
        Ok(page.items)
    }
}

#[async_trait]
impl TaskRepository for PocketBaseClient {
    async fn health(&self) -> Result<(), AppError> {
        let response = send(self.http.get(self.url("/api/health"))).await?;
        if !response.status().is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "PocketBase server not reachable (status {})",
                response.status().as_u16()
            )));
        }
        Ok(())
    }

    async fn list_tasks(
        &self,
        session: Option<&Session>,
        query: &ListQuery,
    ) -> Result<Vec<Task>, AppError> {
        let filter = query.filter_expression();

        if let Some(limit) = query.limit {
            return self.fetch_page(session, filter.as_deref(), 1, limit.max(1)).await;
        }

        let mut tasks = Vec::new();
        let mut page = 1;
        loop {
            let items = self
                .fetch_page(session, filter.as_deref(), page, FULL_LIST_PAGE_SIZE)
                .await?;
            let last = (items.len() as u32) < FULL_LIST_PAGE_SIZE;
            tasks.extend(items);
            if last {
                break;
            }
            page += 1;
        }

        debug!(
            collection = %self.tasks_collection,
            filter = ?filter,
            count = tasks.len(),
            "Fetched task list"
        );
        Ok(tasks)
    }

    async fn create_task(&self, session: &Session, task: &NewTask) -> Result<Task, AppError> {
        let request = authorize(self.http.post(self.records_url()).json(task), Some(session));
        let created: Task = read_json(send(request).await?).await?;
        debug!(task_id = %created.id, status = %created.status, "Created task");
        Ok(created)
    }

    async fn delete_task(&self, session: &Session, id: &TaskId) -> Result<(), AppError> {
        let url = format!("{}/{}", self.records_url(), id.as_str());
        let response = send(authorize(self.http.delete(url), Some(session))).await?;
        check_status(response).await?;
        debug!(task_id = %id, "Deleted task");
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for PocketBaseClient {
    async fn auth_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let url = self.url(&format!(
            "/api/collections/{}/auth-with-password",
            self.users_collection
        ));
        let request = self
            .http
            .post(url)
            .json(&json!({ "identity": email, "password": password }));

        let auth: AuthResponse = match read_json(send(request).await?).await {
            Ok(auth) => auth,
            // PocketBase は認証失敗を 400 で返す
            Err(AppError::Validation(message)) => return Err(AppError::Authentication(message)),
            Err(e) => return Err(e),
        };

        info!(user_id = %auth.record.id, "Authenticated with password");
        Ok(Session::new(auth.token, auth.record))
    }
}

#[async_trait]
impl ChangeFeed for PocketBaseClient {
    async fn subscribe(
        &self,
        session: &Session,
        topic: &SubscriptionTopic,
    ) -> Result<Subscription, AppError> {
        let response = send(
            self.http
                .get(self.url("/api/realtime"))
                .header(ACCEPT, "text/event-stream"),
        )
        .await?;
        let response = check_status(response).await?;

        let mut stream = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let mut pending: VecDeque<SseFrame> = VecDeque::new();

        let client_id = tokio::time::timeout(
            CONNECT_TIMEOUT,
            wait_for_connect(&mut stream, &mut decoder, &mut pending),
        )
        .await
        .map_err(|_| AppError::Timeout("Waiting for PB_CONNECT".to_string()))??;

        let wire_name = topic.wire_name();
        let body = json!({ "clientId": client_id, "subscriptions": [wire_name] });
        let request = authorize(self.http.post(self.url("/api/realtime")).json(&body), Some(session));
        check_status(send(request).await?).await?;

        info!(topic = %wire_name, client_id = %client_id, "Subscribed to realtime topic");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let owner = topic.owner.clone();
        let task = tokio::spawn(async move {
            loop {
                for frame in pending.drain(..) {
                    if frame.event == "PB_CONNECT" {
                        continue;
                    }
                    let event: RecordEvent = match serde_json::from_str(&frame.data) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(event = %frame.event, error = %e, "Ignoring malformed realtime message");
                            continue;
                        }
                    };
                    if !event.is_visible_to(owner.as_ref()) {
                        continue;
                    }
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }

                match stream.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        warn!(error = %e, "Realtime connection failed");
                        return;
                    }
                    None => {
                        debug!("Realtime connection closed");
                        return;
                    }
                }
            }
        });

        let http = self.http.clone();
        let url = self.url("/api/realtime");
        let token = session.token.clone();
        let unsubscribe = async move {
            let body = json!({ "clientId": client_id, "subscriptions": [] });
            let result = http
                .post(url)
                .header(AUTHORIZATION, token)
                .json(&body)
                .send()
                .await;
            if let Err(e) = result {
                debug!(error = %e, "Failed to clear realtime subscriptions");
            }
        }
        .boxed();

        Ok(Subscription::new(wire_name, rx, task).with_unsubscribe(unsubscribe))
    }
}

/// 最初の PB_CONNECT からクライアントIDを読む。後続のフレームは `pending` に残す
async fn wait_for_connect<S, B>(
    stream: &mut S,
    decoder: &mut SseDecoder,
    pending: &mut VecDeque<SseFrame>,
) -> Result<String, AppError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    loop {
        while let Some(frame) = pending.pop_front() {
            if frame.event == "PB_CONNECT" {
                let payload: ConnectPayload = serde_json::from_str(&frame.data)?;
                return Ok(payload.client_id);
            }
        }
        match stream.next().await {
            Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
            Some(Err(e)) => return Err(map_transport(e)),
            None => {
                return Err(AppError::ServiceUnavailable(
                    "Realtime connection closed before PB_CONNECT".to_string(),
                ))
            }
        }
    }
}

fn authorize(request: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
    match session {
        Some(session) => request.header(AUTHORIZATION, session.token.as_str()),
        None => request,
    }
}

async fn send(request: RequestBuilder) -> Result<Response, AppError> {
    request.send().await.map_err(map_transport)
}

fn map_transport(error: reqwest::Error) -> AppError {
    if error.is_connect() {
        AppError::ServiceUnavailable(format!(
            "PocketBase server not running or unreachable: {error}"
        ))
    } else if error.is_timeout() {
        AppError::Timeout(error.to_string())
    } else {
        AppError::Network(error.to_string())
    }
}

/// 2xx 以外をエラーに変換する。本文に PocketBase のメッセージがあればそれを使う
async fn check_status(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .map(|body| body.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    Err(AppError::from_status(status.as_u16(), message))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await.map_err(map_transport)?;
    Ok(serde_json::from_slice(&bytes)?)
}
