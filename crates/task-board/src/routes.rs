use infrastructure::AuthStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    Dashboard,
    Tasks,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Tasks => "/tasks",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Route::Root),
            "/login" => Some(Route::Login),
            "/dashboard" => Some(Route::Dashboard),
            "/tasks" => Some(Route::Tasks),
            _ => None,
        }
    }

    /// ログインが必要な画面か
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard | Route::Tasks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

/// 保護された画面へのアクセスを、セッションが無効ならログイン画面へ振り替える
pub fn guard(route: Route, auth: &AuthStore) -> Navigation {
    if route.is_protected() && !auth.is_valid() {
        Navigation::Redirect(Route::Login)
    } else {
        Navigation::Render(route)
    }
}
