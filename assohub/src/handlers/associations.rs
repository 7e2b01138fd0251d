use actix_web::{HttpResponse, get, post, web};
use common::{Role, ServiceError};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAssociationData {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberData {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

#[post("/associations")]
pub async fn create_association(
    AuthUser(user): AuthUser,
    data: web::Json<CreateAssociationData>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let data = data.into_inner();
    let association = app_state
        .associations
        .create(&user, &data.name, data.description)
        .await?;
    Ok(HttpResponse::Created().json(association))
}

#[get("/associations")]
pub async fn list_associations(
    AuthUser(user): AuthUser,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let associations = app_state.associations.list_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(associations))
}

#[get("/associations/{id}")]
pub async fn get_association(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let association = app_state
        .associations
        .get(&user, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(association))
}

#[get("/associations/{id}/members")]
pub async fn list_members(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let members = app_state
        .associations
        .list_members(&user, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(members))
}

#[post("/associations/{id}/members")]
pub async fn add_member(
    AuthUser(user): AuthUser,
    path: web::Path<i64>,
    data: web::Json<AddMemberData>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    let member = app_state
        .associations
        .add_member(&user, path.into_inner(), &data.username, data.role)
        .await?;
    Ok(HttpResponse::Created().json(member))
}
