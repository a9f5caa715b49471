use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, web};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::DbPool;
use crate::db;
use crate::db::models::User;
use crate::error::ApiError;

/// Access tier. Stored as text in the `users.role` column and carried
/// verbatim inside token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "medical-staff")]
    MedicalStaff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::MedicalStaff => "medical-staff",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "student" => Some(Role::Student),
            "medical-staff" => Some(Role::MedicalStaff),
            _ => None,
        }
    }
}

/// Decoded, signature-verified token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Roll number of the authenticated user.
    pub sub: String,
    pub role: Role,
    pub name: String,
    pub iat: usize,
    pub exp: usize,
}

/// Mints and validates the signed, time-bounded identity tokens. Tokens are
/// stateless: there is no server-side revocation, logout happens on the
/// client by discarding the token.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        TokenIssuer {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    pub fn issue(&self, roll_no: &str, role: Role, name: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: roll_no.to_string(),
            role,
            name: name.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + chrono::Duration::hours(self.ttl_hours)).timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(ApiError::internal)
    }

    /// Validates signature and expiry. Expiry is reported distinctly so the
    /// client can prompt for re-login instead of treating the token as junk.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::TokenMalformed,
            })
    }
}

/// Looks up the user by `(roll_no, role)` and verifies the password against
/// the stored bcrypt hash. An absent user and a wrong password both collapse
/// into `InvalidCredentials` so the response cannot be used to enumerate
/// roll numbers.
pub async fn authenticate(
    pool: &DbPool,
    issuer: &TokenIssuer,
    roll_no: &str,
    password: &str,
    role: Role,
) -> Result<(User, String), ApiError> {
    let pool = pool.clone();
    let lookup_roll = roll_no.to_string();
    let user = web::block(move || -> Result<Option<User>, ApiError> {
        let mut conn = pool.get().map_err(ApiError::internal)?;
        db::find_user(&mut conn, &lookup_roll, role.as_str()).map_err(ApiError::from)
    })
    .await??;

    let Some(user) = user else {
        return Err(ApiError::InvalidCredentials);
    };

    // bcrypt is deliberately slow, keep it off the async workers.
    let hash = user.password_hash.clone();
    let candidate = password.to_string();
    let valid = web::block(move || bcrypt::verify(candidate, &hash))
        .await?
        .map_err(ApiError::internal)?;

    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issuer.issue(&user.roll_no, role, &user.name)?;
    tracing::info!(roll_no = %user.roll_no, role = role.as_str(), "login succeeded");
    Ok((user, token))
}

fn claims_from_request(req: &HttpRequest) -> Result<Claims, ApiError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("token issuer not configured")))?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingToken)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::MissingToken)?;

    issuer.verify(token)
}

// Claims are re-verified from the bearer token on every request; nothing is
// cached across requests, so an expired token fails the next call it makes.
impl FromRequest for Claims {
    type Error = ApiError;
    type Future = Ready<Result<Claims, ApiError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("medical-staff"), Some(Role::MedicalStaff));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::Student.as_str(), "student");
        assert_eq!(Role::MedicalStaff.as_str(), "medical-staff");
    }

    #[test]
    fn issued_token_decodes_to_same_claims() {
        let issuer = TokenIssuer::new("unit-test-secret", 24);
        let token = issuer.issue("22UCS123", Role::Student, "Alice Johnson").unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "22UCS123");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.name, "Alice Johnson");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let issuer = TokenIssuer::new("unit-test-secret", 24);
        let now = Utc::now().timestamp() as usize;
        let stale = Claims {
            sub: "22UCS123".to_string(),
            role: Role::Student,
            name: "Alice Johnson".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();

        match issuer.verify(&token) {
            Err(ApiError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }

    #[test]
    fn tampered_token_is_malformed() {
        let issuer = TokenIssuer::new("unit-test-secret", 24);
        let token = issuer.issue("22UCS123", Role::Student, "Alice Johnson").unwrap();
        let tampered = format!("{}x", token);

        match issuer.verify(&tampered) {
            Err(ApiError::TokenMalformed) => {}
            other => panic!("expected TokenMalformed, got {other:?}"),
        }

        match issuer.verify("not-a-token") {
            Err(ApiError::TokenMalformed) => {}
            other => panic!("expected TokenMalformed, got {other:?}"),
        }
    }

    #[test]
    fn wrong_secret_does_not_verify() {
        let issuer = TokenIssuer::new("unit-test-secret", 24);
        let other = TokenIssuer::new("different-secret", 24);
        let token = issuer.issue("medstaff", Role::MedicalStaff, "Dr. Panwar").unwrap();

        assert!(matches!(other.verify(&token), Err(ApiError::TokenMalformed)));
    }

    #[test]
    fn bcrypt_verify_accepts_only_matching_password() {
        // Low cost keeps the test fast; runtime hashing uses DEFAULT_COST.
        let hash = bcrypt::hash("test123", 4).unwrap();
        assert!(bcrypt::verify("test123", &hash).unwrap());
        assert!(!bcrypt::verify("test124", &hash).unwrap());
    }
}
