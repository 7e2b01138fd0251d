use actix_web::{HttpResponse, get, post, web};
use common::{ServiceError, User};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[post("/auth/register")]
pub async fn register(
    data: web::Json<RegisterData>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let user = User::new(&data.username, &data.email, &data.password, false)
        .map_err(|e| ServiceError::BadRequest(e.to_string()))?;

    if app_state.db.user_exists(&user.username, &user.email).await? {
        return Err(ServiceError::Conflict(
            "Username or email is already registered".to_string(),
        ));
    }

    let saved = app_state.db.save_user(&user).await?;
    log::info!("Registered user {} (id={})", saved.username, saved.id);
    Ok(HttpResponse::Created().json(saved))
}

#[post("/auth/login")]
pub async fn login(
    login_data: web::Json<LoginData>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let invalid = || ServiceError::Unauthorized("Invalid username or password".to_string());

    let Some(user) = app_state.db.get_user(&login_data.username).await? else {
        log::warn!("Failed to get User with username: {}", login_data.username);
        return Err(invalid());
    };

    if let Err(err) = user.verify_password(&login_data.password) {
        log::warn!(
            "Invalid password for user {}: {:?}",
            login_data.username,
            err
        );
        return Err(invalid());
    }

    let access_token = app_state.tokens.issue(&user)?;
    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: app_state.tokens.ttl_seconds(),
    }))
}

#[get("/auth/me")]
pub async fn me(AuthUser(user): AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(user)
}
