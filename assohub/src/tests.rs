use actix_web::{
    App,
    dev::{Service, ServiceResponse},
    http::{StatusCode, header},
    test, web,
};
use common::{Database, User};
use serde_json::{Value, json};

use crate::auth::TokenAuthority;
use crate::handlers;
use crate::state::AppState;

const PASSWORD: &str = "Secret123";

async fn app_state() -> web::Data<AppState> {
    let db = Database::in_memory().await.unwrap();
    let admin = User::new("root_admin", "root@assohub.org", PASSWORD, true).unwrap();
    db.save_user(&admin).await.unwrap();
    let tokens = TokenAuthority::generate(chrono::Duration::minutes(10));
    web::Data::new(AppState::new(db, tokens))
}

async fn register_and_login<S>(app: &S, username: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "username": username,
            "email": format!("{username}@example.org"),
            "password": PASSWORD,
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    login(app, username).await
}

async fn login<S>(app: &S, username: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "username": username, "password": PASSWORD }))
        .to_request();
    let body: Value = test::call_and_read_body_json(app, req).await;
    body["access_token"].as_str().unwrap().to_string()
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

#[actix_web::test]
async fn register_login_and_me() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let token = register_and_login(&app, "alice").await;

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["username"], "alice");
    assert!(me.get("password_hash").is_none());

    let req = test::TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "username": "alice", "password": "Wrong1234" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn duplicate_registration_conflicts() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    register_and_login(&app, "bob").await;
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "username": "bob",
            "email": "other@example.org",
            "password": PASSWORD,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn protected_routes_require_token() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/wallet").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/wallet")
        .insert_header(bearer("garbage"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["statusCode"], 401);
}

#[actix_web::test]
async fn admin_routes_reject_regular_users() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let token = register_and_login(&app, "carol").await;
    let req = test::TestRequest::get()
        .uri("/wallet/admin/pending")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn zero_top_up_is_rejected() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let token = register_and_login(&app, "dave").await;
    let req = test::TestRequest::post()
        .uri("/wallet/top-up")
        .insert_header(bearer(&token))
        .set_json(json!({ "amount": "0" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["statusCode"], 400);
    assert!(body["message"].as_str().is_some());
}

#[actix_web::test]
async fn top_up_is_credited_after_admin_validation() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let token = register_and_login(&app, "erin").await;
    let admin_token = login(&app, "root_admin").await;

    let req = test::TestRequest::post()
        .uri("/wallet/top-up")
        .insert_header(bearer(&token))
        .set_json(json!({ "amount": "25.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let pending: Value = test::read_body_json(resp).await;
    assert_eq!(pending["status"], "PENDING");
    assert_eq!(pending["type"], "DEPOSIT");

    let req = test::TestRequest::get()
        .uri("/wallet")
        .insert_header(bearer(&token))
        .to_request();
    let wallet: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(wallet["balance"], "0.00");

    let req = test::TestRequest::post()
        .uri(&format!(
            "/wallet/admin/transactions/{}/validate",
            pending["id"]
        ))
        .insert_header(bearer(&admin_token))
        .to_request();
    let validated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(validated["status"], "COMPLETED");

    let req = test::TestRequest::get()
        .uri("/wallet")
        .insert_header(bearer(&token))
        .to_request();
    let wallet: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(wallet["balance"], "25.00");

    let req = test::TestRequest::post()
        .uri(&format!(
            "/wallet/admin/transactions/{}/reject",
            pending["id"]
        ))
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/wallet/admin/audit")
        .insert_header(bearer(&admin_token))
        .to_request();
    let mismatches: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mismatches, json!([]));
}

#[actix_web::test]
async fn member_pays_campaign_fee_from_wallet() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let treasurer = register_and_login(&app, "frank").await;
    let member = register_and_login(&app, "grace").await;
    let admin_token = login(&app, "root_admin").await;

    let req = test::TestRequest::post()
        .uri("/associations")
        .insert_header(bearer(&treasurer))
        .set_json(json!({ "name": "Rowing Club" }))
        .to_request();
    let association: Value = test::call_and_read_body_json(&app, req).await;
    let association_id = association["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/associations/{association_id}/members"))
        .insert_header(bearer(&treasurer))
        .set_json(json!({ "username": "grace", "role": "MEMBER" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri(&format!("/finance/associations/{association_id}/campaigns"))
        .insert_header(bearer(&treasurer))
        .set_json(json!({ "title": "Season 2026", "amount": "40.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let campaign: Value = test::read_body_json(resp).await;
    assert_eq!(campaign["fees"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/finance/fees")
        .insert_header(bearer(&member))
        .to_request();
    let fees: Value = test::call_and_read_body_json(&app, req).await;
    let fee_id = fees[0]["id"].as_i64().unwrap();

    // Empty wallet cannot cover the fee.
    let req = test::TestRequest::post()
        .uri(&format!("/finance/fees/{fee_id}/pay-wallet"))
        .insert_header(bearer(&member))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/auth/me")
        .insert_header(bearer(&member))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/wallet/admin/credit")
        .insert_header(bearer(&admin_token))
        .set_json(json!({ "user_id": me["id"], "amount": "50.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri(&format!("/finance/fees/{fee_id}/pay-wallet"))
        .insert_header(bearer(&member))
        .to_request();
    let payment: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(payment["fee"]["status"], "PAID");
    assert_eq!(payment["fee"]["payment_method"], "WALLET");
    assert_eq!(payment["transaction"]["amount"], "-40.00");

    let req = test::TestRequest::get()
        .uri("/wallet")
        .insert_header(bearer(&member))
        .to_request();
    let wallet: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(wallet["balance"], "10.00");

    let req = test::TestRequest::get()
        .uri(&format!("/finance/associations/{association_id}/summary"))
        .insert_header(bearer(&treasurer))
        .to_request();
    let summary: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary["collected"], "40.00");
    assert_eq!(summary["outstanding"], "40.00");
}

#[actix_web::test]
async fn malformed_input_gets_json_error_body() {
    let state = app_state().await;
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure),
    )
    .await;

    let token = register_and_login(&app, "henry").await;
    let admin_token = login(&app, "root_admin").await;

    let req = test::TestRequest::post()
        .uri("/wallet/top-up")
        .insert_header(bearer(&token))
        .set_json(json!({ "amount": "1.005" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["statusCode"], 400);
    assert!(body["message"].as_str().unwrap().contains("1.005"));

    let req = test::TestRequest::get()
        .uri("/wallet/transactions?limit=many")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["statusCode"], 400);

    let req = test::TestRequest::post()
        .uri("/wallet/admin/transactions/abc/validate")
        .insert_header(bearer(&admin_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["statusCode"], 400);
}
