use actix_web::{HttpResponse, get, post, web};
use chrono::Local;
use common::{ExternalPaymentRequest, NewCampaign, ServiceError};
use serde::Serialize;

use crate::auth::{AdminUser, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct OverdueResult {
    updated: u64,
}

#[post("/finance/associations/{id}/campaigns")]
pub async fn create_campaign(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    campaign: web::Json<NewCampaign>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let created = app_state
        .finance
        .create_campaign(&user, path.into_inner(), campaign.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(created))
}

#[get("/finance/associations/{id}/campaigns")]
pub async fn list_campaigns(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let campaigns = app_state
        .finance
        .list_campaigns(&user, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(campaigns))
}

#[get("/finance/associations/{id}/summary")]
pub async fn finance_summary(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let summary = app_state.finance.summary(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/finance/campaigns/{id}/fees")]
pub async fn list_campaign_fees(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let fees = app_state
        .finance
        .list_campaign_fees(&user, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(fees))
}

#[get("/finance/fees")]
pub async fn list_my_fees(
    AuthUser(user): AuthUser,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let fees = app_state.finance.list_user_fees(user.id).await?;
    Ok(HttpResponse::Ok().json(fees))
}

#[post("/finance/fees/{id}/pay-wallet")]
pub async fn pay_fee_with_wallet(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let payment = app_state
        .finance
        .pay_fee_with_wallet(user.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(payment))
}

#[post("/finance/fees/{id}/declare-payment")]
pub async fn declare_external_payment(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    request: web::Json<ExternalPaymentRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let fee = app_state
        .finance
        .declare_external_payment(user.id, path.into_inner(), &request.reference)
        .await?;
    Ok(HttpResponse::Ok().json(fee))
}

#[post("/finance/fees/{id}/validate")]
pub async fn validate_fee_payment(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let fee = app_state
        .finance
        .validate_fee_payment(&user, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(fee))
}

#[post("/finance/fees/mark-overdue")]
pub async fn mark_overdue_fees(
    _admin: AdminUser,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let today = Local::now().date_naive();
    let updated = app_state.finance.mark_overdue(today).await?;
    Ok(HttpResponse::Ok().json(OverdueResult { updated }))
}
