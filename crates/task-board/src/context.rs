use std::sync::Arc;

use infrastructure::{AuthStore, Backend};
use shared::Session;

/// 画面間で共有する状態（リモートサービスとログインセッション）
pub struct AppContext {
    pub backend: Arc<dyn Backend>,
    pub auth: AuthStore,
    pub tasks_collection: String,
}

impl AppContext {
    pub fn new(backend: Arc<dyn Backend>, auth: AuthStore, tasks_collection: impl Into<String>) -> Self {
        Self {
            backend,
            auth,
            tasks_collection: tasks_collection.into(),
        }
    }

    /// 有効なセッション
    pub fn session(&self) -> Option<&Session> {
        self.auth.session()
    }
}
