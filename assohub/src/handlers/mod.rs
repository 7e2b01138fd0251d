mod associations;
mod auth;
mod finance;
mod wallet;

use actix_web::{HttpResponse, Responder, get, web};
use common::ServiceError;
pub use associations::*;
pub use auth::*;
pub use finance::*;
pub use wallet::*;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Welcome to Assohub!")
}

/// Registers every route of the API.
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Extractor failures use the same JSON error body as the handlers.
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ServiceError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ServiceError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ServiceError::BadRequest(err.to_string()).into()
    }))
    .service(index)
    .service(register)
    .service(login)
    .service(me)
    .service(get_wallet)
    .service(get_wallet_transactions)
    .service(request_top_up)
    .service(list_pending_transactions)
    .service(admin_credit)
    .service(validate_transaction)
    .service(reject_transaction)
    .service(audit_wallets)
    .service(create_association)
    .service(list_associations)
    .service(get_association)
    .service(list_members)
    .service(add_member)
    .service(create_campaign)
    .service(list_campaigns)
    .service(finance_summary)
    .service(list_campaign_fees)
    .service(list_my_fees)
    .service(pay_fee_with_wallet)
    .service(declare_external_payment)
    .service(validate_fee_payment)
    .service(mark_overdue_fees);
}
