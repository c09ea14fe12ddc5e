use infrastructure::AuthProvider;
use tracing::info;

use crate::context::AppContext;
use crate::error::UiError;
use crate::routes::Route;

/// ログイン画面
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginView {
    pub email: String,
    pub password: String,
    /// ログイン済みなら「Go to Dashboard」リンクを出す
    pub show_dashboard_link: bool,
}

impl LoginView {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            show_dashboard_link: ctx.auth.is_valid(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = email.into();
        self.password = password.into();
        self
    }

    /// 認証してセッションを保存し、遷移先を返す
    pub async fn submit(&self, ctx: &mut AppContext) -> Result<Route, UiError> {
        let session = ctx
            .backend
            .auth_with_password(&self.email, &self.password)
            .await
            .map_err(UiError::Login)?;

        info!(user_id = %session.user_id(), "Logged in");
        ctx.auth.save(session).map_err(UiError::Storage)?;
        Ok(Route::Dashboard)
    }
}
