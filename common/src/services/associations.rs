use std::path::Path;

use anyhow::Context;
use tokio_stream::StreamExt;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::helpers::non_blank;
use crate::schema::{
    Association, ImportReport, Member, MemberRecord, Role, User, UserAssociation,
};

#[derive(Clone)]
pub struct AssociationService {
    db: Database,
}

impl AssociationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates an association and makes `actor` its first admin.
    pub async fn create(
        &self,
        actor: &User,
        name: &str,
        description: Option<String>,
    ) -> ServiceResult<Association> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::BadRequest(
                "Association name must not be empty".to_string(),
            ));
        }
        if self.db.get_association_by_name(name).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "An association named '{}' already exists",
                name
            )));
        }

        let mut tx = self.db.begin().await?;
        let association = sqlx::query_as::<_, Association>(
            "INSERT INTO associations (name, description) VALUES (?, ?) RETURNING *",
        )
        .bind(name)
        .bind(non_blank(description))
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO memberships (association_id, user_id, role) VALUES (?, ?, ?)")
            .bind(association.id)
            .bind(actor.id)
            .bind(Role::Admin)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!(
            "Association {} '{}' created by {}",
            association.id,
            association.name,
            actor.username
        );
        Ok(association)
    }

    pub async fn list_for_user(&self, user_id: i64) -> ServiceResult<Vec<UserAssociation>> {
        Ok(self.db.get_user_associations(user_id).await?)
    }

    pub async fn get(&self, actor: &User, association_id: i64) -> ServiceResult<Association> {
        authorize(&self.db, actor, association_id, Role::ANY).await
    }

    pub async fn list_members(
        &self,
        actor: &User,
        association_id: i64,
    ) -> ServiceResult<Vec<Member>> {
        authorize(&self.db, actor, association_id, Role::ANY).await?;
        Ok(self.db.get_members(association_id).await?)
    }

    pub async fn add_member(
        &self,
        actor: &User,
        association_id: i64,
        username: &str,
        role: Role,
    ) -> ServiceResult<Member> {
        authorize(&self.db, actor, association_id, &[Role::Admin]).await?;

        let user = self
            .db
            .get_user(username.trim())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User '{}' not found", username)))?;
        if self.db.get_member_role(association_id, user.id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "User '{}' is already a member",
                user.username
            )));
        }

        self.db.add_member(association_id, user.id, role).await?;
        log::info!(
            "User {} joined association {} as {}",
            user.username,
            association_id,
            role
        );

        self.db
            .get_members(association_id)
            .await?
            .into_iter()
            .find(|m| m.user_id == user.id)
            .ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!(
                    "Membership of user {} vanished after insert",
                    user.id
                ))
            })
    }

    /// Adds members listed in a `username,role` CSV file. Unknown users,
    /// invalid roles and existing members are skipped.
    pub async fn import_members<P: AsRef<Path>>(
        &self,
        association_id: i64,
        path: P,
    ) -> ServiceResult<ImportReport> {
        if self.db.get_association(association_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Association {} not found",
                association_id
            )));
        }

        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read `{}`", path.display()))?;
        let mut rdr = csv_async::AsyncReaderBuilder::new()
            .has_headers(true)
            .create_deserializer(content.as_bytes());
        let mut records = rdr.deserialize::<MemberRecord>();

        let mut report = ImportReport::default();
        while let Some(record) = records.next().await {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Error deserializing member record: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };
            let role = match record.role.parse::<Role>() {
                Ok(role) => role,
                Err(e) => {
                    log::warn!("Skipping {}: {}", record.username, e);
                    report.skipped += 1;
                    continue;
                }
            };
            let Some(user) = self.db.get_user(record.username.trim()).await? else {
                log::warn!("Skipping unknown user {}", record.username);
                report.skipped += 1;
                continue;
            };
            if self.db.get_member_role(association_id, user.id).await?.is_some() {
                log::debug!("User {} is already a member", user.username);
                report.skipped += 1;
                continue;
            }
            self.db.add_member(association_id, user.id, role).await?;
            report.added += 1;
        }

        log::info!(
            "Imported members into association {}: added={} skipped={}",
            association_id,
            report.added,
            report.skipped
        );
        Ok(report)
    }
}

/// Checks that `actor` holds one of `allowed` in the association.
/// Superusers pass every check.
pub(crate) async fn authorize(
    db: &Database,
    actor: &User,
    association_id: i64,
    allowed: &[Role],
) -> ServiceResult<Association> {
    let association = db.get_association(association_id).await?.ok_or_else(|| {
        ServiceError::NotFound(format!("Association {} not found", association_id))
    })?;
    if actor.is_superuser {
        return Ok(association);
    }

    match db.get_member_role(association_id, actor.id).await? {
        Some(role) if allowed.contains(&role) => Ok(association),
        Some(role) => Err(ServiceError::Forbidden(format!(
            "Role {} is not allowed to perform this action",
            role
        ))),
        None => Err(ServiceError::Forbidden(
            "You are not a member of this association".to_string(),
        )),
    }
}
