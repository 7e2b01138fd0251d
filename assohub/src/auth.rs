use std::future::Future;
use std::pin::Pin;

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use anyhow::anyhow;
use common::{ServiceError, User};
use ed25519_compact::{KeyPair, PublicKey, SecretKey};
use jwt_compact::{AlgorithmExt, Claims, Header, TimeOptions, Token, UntrustedToken, alg::Ed25519};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Custom claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i64,
    pub username: String,
}

/// Issues and verifies Ed25519-signed access tokens.
///
/// The key pair lives only in memory, so tokens do not survive a restart.
pub struct TokenAuthority {
    signing_key: SecretKey,
    verifying_key: PublicKey,
    ttl: chrono::Duration,
    time_options: TimeOptions,
}

impl TokenAuthority {
    pub fn generate(ttl: chrono::Duration) -> Self {
        let KeyPair { pk, sk } = KeyPair::generate();
        Self {
            signing_key: sk,
            verifying_key: pk,
            ttl,
            time_options: TimeOptions::default(),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let claims = Claims::new(SessionClaims {
            sub: user.id,
            username: user.username.clone(),
        })
        .set_duration_and_issuance(&self.time_options, self.ttl);

        Ed25519
            .token(&Header::empty(), &claims, &self.signing_key)
            .map_err(|e| anyhow!("Failed to sign access token: {e}"))
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let untrusted =
            UntrustedToken::new(token).map_err(|e| anyhow!("Malformed access token: {e}"))?;
        let token: Token<SessionClaims> = Ed25519
            .validator::<SessionClaims>(&self.verifying_key)
            .validate(&untrusted)
            .map_err(|e| anyhow!("Invalid access token: {e}"))?;
        token
            .claims()
            .validate_expiration(&self.time_options)
            .map_err(|e| anyhow!("Expired access token: {e}"))?;
        Ok(token.claims().custom.clone())
    }
}

/// Any authenticated user, resolved from the `Authorization: Bearer` header.
pub struct AuthUser(pub User);

/// An authenticated platform superuser.
pub struct AdminUser(pub User);

type ExtractFuture<T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>>>>;

impl FromRequest for AuthUser {
    type Error = ServiceError;
    type Future = ExtractFuture<Self>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { authenticate(&req).await.map(AuthUser) })
    }
}

impl FromRequest for AdminUser {
    type Error = ServiceError;
    type Future = ExtractFuture<Self>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let user = authenticate(&req).await?;
            if !user.is_superuser {
                log::warn!("User {} denied access to {}", user.username, req.path());
                return Err(ServiceError::Forbidden("You are not an Admin".to_string()));
            }
            Ok(AdminUser(user))
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Result<&str, ServiceError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Malformed authorization header".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ServiceError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}

async fn authenticate(req: &HttpRequest) -> Result<User, ServiceError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ServiceError::Internal(anyhow!("Application state is not configured")))?;

    let claims = state.tokens.verify(bearer_token(req)?).map_err(|e| {
        log::warn!("Rejected access token: {:#}", e);
        ServiceError::Unauthorized("Invalid or expired token".to_string())
    })?;

    state
        .db
        .get_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.org"),
            password_hash: String::new(),
            is_superuser: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let authority = TokenAuthority::generate(chrono::Duration::minutes(5));
        let token = authority.issue(&user(7)).unwrap();
        let claims = authority.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "user7");
    }

    #[test]
    fn token_from_another_authority_is_rejected() {
        let issuer = TokenAuthority::generate(chrono::Duration::minutes(5));
        let other = TokenAuthority::generate(chrono::Duration::minutes(5));
        let token = issuer.issue(&user(1)).unwrap();
        assert!(other.verify(&token).is_err());
        assert!(issuer.verify("not-a-token").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Beyond the default one minute of clock leeway.
        let authority = TokenAuthority::generate(chrono::Duration::minutes(-5));
        let token = authority.issue(&user(1)).unwrap();
        assert!(authority.verify(&token).is_err());
    }
}
