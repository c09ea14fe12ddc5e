use thiserror::Error;

/// アプリケーション全体で使用されるエラー型
#[derive(Debug, Clone, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("{0}")]
    Domain(#[from] domain::DomainError),

    // 認証・認可エラー
    #[error("Failed to authenticate: {0}")]
    Authentication(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Invalid auth token: {0}")]
    InvalidToken(String),

    #[error("Session expired or missing")]
    SessionExpired,

    // リモートサービスのエラー
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error("External service error ({status}): {message}")]
    ExternalService { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    // シリアライズ・設定・内部エラー
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// クライアントエラー（4xx相当）
    Client,
    /// サーバーエラー（5xx相当）
    Server,
    /// 接続不可などの一時的なエラー
    Transient,
}

impl AppError {
    /// ログ出力用のエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(_) => "DOMAIN_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::InvalidToken(_) => "INVALID_TOKEN",
            AppError::SessionExpired => "SESSION_EXPIRED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Deserialization(_) => "DESERIALIZATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Domain(_)
            | AppError::Authentication(_)
            | AppError::Authorization(_)
            | AppError::InvalidToken(_)
            | AppError::SessionExpired
            | AppError::NotFound(_)
            | AppError::Validation(_) => ErrorCategory::Client,
            AppError::ServiceUnavailable(_) | AppError::Timeout(_) | AppError::Network(_) => {
                ErrorCategory::Transient
            }
            AppError::ExternalService { status, .. } if (400..500).contains(status) => {
                ErrorCategory::Client
            }
            _ => ErrorCategory::Server,
        }
    }

    /// リモートサービスに到達できなかったかどうか
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            AppError::ServiceUnavailable(_) | AppError::Timeout(_) | AppError::Network(_)
        )
    }

    /// リモートサービスのHTTPステータスからエラーを作成
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => AppError::Validation(message),
            401 => AppError::Authentication(message),
            403 => AppError::Authorization(message),
            404 => AppError::NotFound(message),
            502..=504 => AppError::ServiceUnavailable(message),
            _ => AppError::ExternalService { status, message },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(AppError::from_status(400, "bad"), AppError::Validation(_)));
        assert!(matches!(
            AppError::from_status(401, "no"),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            AppError::from_status(403, "no"),
            AppError::Authorization(_)
        ));
        assert!(matches!(AppError::from_status(404, "x"), AppError::NotFound(_)));
        assert!(matches!(
            AppError::from_status(503, "down"),
            AppError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            AppError::from_status(500, "boom"),
            AppError::ExternalService { status: 500, .. }
        ));
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AppError::NotFound("task".to_string()).category(),
            ErrorCategory::Client
        );
        assert_eq!(
            AppError::Network("refused".to_string()).category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            AppError::ExternalService {
                status: 422,
                message: "x".to_string()
            }
            .category(),
            ErrorCategory::Client
        );
        assert_eq!(
            AppError::Internal("x".to_string()).category(),
            ErrorCategory::Server
        );
    }

    #[test]
    fn test_unreachable_detection() {
        assert!(AppError::Network("connection refused".to_string()).is_unreachable());
        assert!(AppError::ServiceUnavailable("down".to_string()).is_unreachable());
        assert!(!AppError::Authentication("bad password".to_string()).is_unreachable());
    }

    #[test]
    fn test_domain_error_message_passes_through() {
        let error: AppError =
            domain::DomainError::InvalidTitle("Title cannot be empty".to_string()).into();
        assert_eq!(error.to_string(), "Invalid task title: Title cannot be empty");
        assert_eq!(error.code(), "DOMAIN_ERROR");
    }
}
