use std::fmt;

use tracing::info;

use crate::context::AppContext;
use crate::error::UiError;
use crate::routes::{guard, Navigation, Route};
use crate::views::{DashboardView, LoginView, TaskListView};

/// 表示中の画面
pub enum Screen {
    Login(LoginView),
    Tasks(TaskListView),
    Dashboard(DashboardView),
}

impl Screen {
    pub fn route(&self) -> Route {
        match self {
            Screen::Login(_) => Route::Login,
            Screen::Tasks(_) => Route::Tasks,
            Screen::Dashboard(_) => Route::Dashboard,
        }
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Screen").field(&self.route()).finish()
    }
}

/// 画面遷移の起点
///
/// 保護された画面はセッションを確認してから表示する。振り替え時は遷移先の画面を
/// 作る前に判断するので、データ取得は発生しない。
pub struct App {
    ctx: AppContext,
    location: Route,
}

impl App {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            location: Route::Root,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AppContext {
        &mut self.ctx
    }

    /// 現在の URL パス
    pub fn location(&self) -> Route {
        self.location
    }

    pub async fn navigate(&mut self, path: &str) -> Result<Screen, UiError> {
        let route = Route::from_path(path).ok_or_else(|| UiError::UnknownRoute(path.to_string()))?;
        self.go(route).await
    }

    pub async fn go(&mut self, route: Route) -> Result<Screen, UiError> {
        let target = match guard(route, &self.ctx.auth) {
            Navigation::Render(target) => target,
            Navigation::Redirect(target) => {
                info!(from = route.path(), to = target.path(), "Redirecting unauthenticated user");
                target
            }
        };
        self.location = target;

        match target {
            Route::Root | Route::Login => Ok(Screen::Login(LoginView::new(&self.ctx))),
            Route::Tasks => Ok(Screen::Tasks(TaskListView::mount(&self.ctx).await?)),
            Route::Dashboard => Ok(Screen::Dashboard(DashboardView::mount(&self.ctx).await?)),
        }
    }

    /// ログインしてダッシュボードへ
    pub async fn login(&mut self, email: &str, password: &str) -> Result<Screen, UiError> {
        let form = LoginView::new(&self.ctx).with_credentials(email, password);
        let next = form.submit(&mut self.ctx).await?;
        self.go(next).await
    }

    /// セッションを破棄してログイン画面へ
    pub async fn logout(&mut self) -> Result<Screen, UiError> {
        self.ctx.auth.clear().map_err(UiError::Storage)?;
        info!("Logged out");
        self.go(Route::Login).await
    }
}
