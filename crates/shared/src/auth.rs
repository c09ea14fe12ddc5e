use crate::errors::AppError;
use chrono::{DateTime, TimeZone, Utc};
use domain::UserId;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// 認証トークンのクレーム（署名は PocketBase 側で検証されるので読むだけ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub id: Option<String>,
    pub exp: i64,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
}

/// 認証済みユーザーのレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
}

/// ログインセッション（トークン + ユーザー）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub record: AuthRecord,
}

impl Session {
    pub fn new(token: impl Into<String>, record: AuthRecord) -> Self {
        Self {
            token: token.into(),
            record,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.record.id
    }

    /// トークンの有効期限。読めないトークンは `None`
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let claims = decode_claims(&self.token).ok()?;
        Utc.timestamp_opt(claims.exp, 0).single()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// トークンが空でなく、期限が `now` より後なら有効
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        self.expires_at().is_some_and(|exp| exp > now)
    }
}

/// JWT のペイロードを署名検証なしで読み出す
pub fn decode_claims(token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_expiring_at(exp: DateTime<Utc>) -> String {
        let claims = Claims {
            id: Some("user123".to_string()),
            exp: exp.timestamp(),
            token_type: Some("auth".to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"pocketbase-secret"),
        )
        .unwrap()
    }

    fn record() -> AuthRecord {
        AuthRecord {
            id: UserId::from_string("user123").unwrap(),
            email: "test@example.com".to_string(),
        }
    }

    #[test]
    fn test_session_valid_before_expiry() {
        let session = Session::new(token_expiring_at(Utc::now() + Duration::hours(1)), record());
        assert!(session.is_valid());
        assert_eq!(session.user_id().as_str(), "user123");
    }

    #[test]
    fn test_session_invalid_after_expiry() {
        let session = Session::new(token_expiring_at(Utc::now() - Duration::minutes(1)), record());
        assert!(!session.is_valid());
    }

    #[test]
    fn test_session_invalid_with_garbage_token() {
        assert!(!Session::new("not-a-jwt", record()).is_valid());
        assert!(!Session::new("", record()).is_valid());
    }

    #[test]
    fn test_decode_claims() {
        let exp = Utc::now() + Duration::days(7);
        let claims = decode_claims(&token_expiring_at(exp)).unwrap();
        assert_eq!(claims.exp, exp.timestamp());
        assert_eq!(claims.id.as_deref(), Some("user123"));
        assert!(matches!(
            decode_claims("a.b.c"),
            Err(AppError::InvalidToken(_))
        ));
    }
}
