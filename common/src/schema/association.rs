use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, de};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Association {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Role a user holds inside one association. Parsed case-insensitively
/// from JSON and CSV alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Treasurer,
    Member,
}

impl Role {
    /// Roles allowed to manage campaigns and validate payments.
    pub const FINANCE: &'static [Role] = &[Role::Admin, Role::Treasurer];
    pub const ANY: &'static [Role] = &[Role::Admin, Role::Treasurer, Role::Member];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Treasurer => "treasurer",
            Role::Member => "member",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "treasurer" => Ok(Role::Treasurer),
            "member" => Ok(Role::Member),
            other => Err(anyhow::anyhow!(
                "Unknown role '{}'. Expected admin, treasurer or member.",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Association as seen by one of its members.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserAssociation {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub role: Role,
    pub joined_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Member {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub joined_at: Option<NaiveDateTime>,
}

/// One row of a member roster CSV (`username,role`).
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRecord {
    pub username: String,
    pub role: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
}
