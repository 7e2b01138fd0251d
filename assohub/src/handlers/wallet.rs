use actix_web::{HttpResponse, get, post, web};
use common::{CreditRequest, ServiceError, TopUpRequest};
use serde::Deserialize;

use crate::auth::{AdminUser, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[get("/wallet")]
pub async fn get_wallet(
    AuthUser(user): AuthUser,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let overview = app_state.wallets.get_wallet(user.id).await?;
    Ok(HttpResponse::Ok().json(overview))
}

#[get("/wallet/transactions")]
pub async fn get_wallet_transactions(
    AuthUser(user): AuthUser,
    query: web::Query<PageQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let transactions = app_state
        .wallets
        .list_transactions(user.id, query.limit, query.offset)
        .await?;
    Ok(HttpResponse::Ok().json(transactions))
}

#[post("/wallet/top-up")]
pub async fn request_top_up(
    AuthUser(user): AuthUser,
    request: web::Json<TopUpRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let transaction = app_state
        .wallets
        .request_top_up(user.id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(transaction))
}

#[get("/wallet/admin/pending")]
pub async fn list_pending_transactions(
    _admin: AdminUser,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let pending = app_state.wallets.list_pending().await?;
    Ok(HttpResponse::Ok().json(pending))
}

#[post("/wallet/admin/credit")]
pub async fn admin_credit(
    AdminUser(admin): AdminUser,
    request: web::Json<CreditRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    log::info!(
        "Admin {} credits user {} with {}",
        admin.username,
        request.user_id,
        request.amount
    );
    let transaction = app_state.wallets.admin_credit(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(transaction))
}

#[post("/wallet/admin/transactions/{id}/validate")]
pub async fn validate_transaction(
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let transaction_id = path.into_inner();
    log::info!("Admin {} validates transaction {}", admin.username, transaction_id);
    let transaction = app_state
        .wallets
        .validate_transaction(transaction_id)
        .await?;
    Ok(HttpResponse::Ok().json(transaction))
}

#[post("/wallet/admin/transactions/{id}/reject")]
pub async fn reject_transaction(
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let transaction_id = path.into_inner();
    log::info!("Admin {} rejects transaction {}", admin.username, transaction_id);
    let transaction = app_state.wallets.reject_transaction(transaction_id).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

#[get("/wallet/admin/audit")]
pub async fn audit_wallets(
    _admin: AdminUser,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let mismatches = app_state.wallets.audit().await?;
    Ok(HttpResponse::Ok().json(mismatches))
}
