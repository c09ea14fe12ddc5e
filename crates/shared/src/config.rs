use crate::errors::AppError;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_POCKETBASE_URL: &str = "http://127.0.0.1:8090";
pub const DEFAULT_TASKS_COLLECTION: &str = "tasks";
pub const DEFAULT_USERS_COLLECTION: &str = "users";
pub const DEFAULT_API_PORT: u16 = 5000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5175";
pub const DEFAULT_SESSION_FILE: &str = ".taskboard-session.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// PocketBase のベースURL
    pub pocketbase_url: String,
    pub tasks_collection: String,
    pub users_collection: String,
    pub environment: String,
    /// 統計APIの待ち受けポート
    pub api_port: u16,
    /// 統計APIへのアクセスを許可するフロントエンドのオリジン
    pub cors_origin: String,
    /// セッショントークンの保存先
    pub session_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pocketbase_url: DEFAULT_POCKETBASE_URL.to_string(),
            tasks_collection: DEFAULT_TASKS_COLLECTION.to_string(),
            users_collection: DEFAULT_USERS_COLLECTION.to_string(),
            environment: "dev".to_string(),
            api_port: DEFAULT_API_PORT,
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意の参照関数から設定を読み込む（未設定はデフォルト値）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_port = match read("API_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AppError::Configuration(format!("API_PORT must be a port number, got {raw:?}"))
            })?,
            None => defaults.api_port,
        };

        let pocketbase_url = read("POCKETBASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.pocketbase_url);
        if !(pocketbase_url.starts_with("http://") || pocketbase_url.starts_with("https://")) {
            return Err(AppError::Configuration(format!(
                "POCKETBASE_URL must be an http(s) URL, got {pocketbase_url:?}"
            )));
        }

        Ok(Config {
            pocketbase_url,
            tasks_collection: read("TASKS_COLLECTION").unwrap_or(defaults.tasks_collection),
            users_collection: read("USERS_COLLECTION").unwrap_or(defaults.users_collection),
            environment: read("ENVIRONMENT").unwrap_or(defaults.environment),
            api_port,
            cors_origin: read("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            session_file: read("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
        })
    }
}
