use anyhow::{anyhow, bail};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::NaiveDateTime;
use fancy_regex::Regex;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

type Pattern = Result<Regex, String>;

fn compile(pattern: &str) -> Pattern {
    Regex::new(pattern).map_err(|e| e.to_string())
}

static USERNAME: Lazy<Pattern> = Lazy::new(|| compile(r"^[A-Za-z0-9_]{3,32}$"));
static EMAIL: Lazy<Pattern> = Lazy::new(|| compile(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"));
// Lookaheads need fancy-regex.
static PASSWORD: Lazy<Pattern> = Lazy::new(|| compile(r"^(?=.*[a-z])(?=.*[A-Z])(?=.*\d).{8,}$"));

/// Account of a person using the platform. Superusers administer every
/// wallet, while association roles live in `memberships`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl User {
    /// Validates registration input and hashes the password. `id` and the
    /// timestamps are filled in by the database on insert.
    pub fn new(
        username: &str,
        email: &str,
        password: &str,
        is_superuser: bool,
    ) -> anyhow::Result<Self> {
        let username = username.trim();
        let email = email.trim().to_lowercase();

        ensure_matches(
            &USERNAME,
            username,
            "Username must be 3 to 32 letters, digits or underscores.",
        )?;
        ensure_matches(&EMAIL, &email, "Invalid email address.")?;
        ensure_matches(
            &PASSWORD,
            password,
            "Password needs at least 8 characters with a lower case letter, an upper case letter and a digit.",
        )?;

        Ok(User {
            id: 0,
            username: username.to_string(),
            email,
            password_hash: hash_password(password)?,
            is_superuser,
            created_at: None,
            updated_at: None,
        })
    }

    pub fn verify_password(&self, password: &str) -> anyhow::Result<()> {
        let stored = PasswordHash::new(&self.password_hash)
            .map_err(|e| anyhow!("Stored password hash of {} is unreadable: {e}", self.username))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored)
            .map_err(|_| anyhow!("Wrong password for {}", self.username))
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn ensure_matches(pattern: &Pattern, value: &str, message: &str) -> anyhow::Result<()> {
    let re = pattern
        .as_ref()
        .map_err(|e| anyhow!("Credential pattern failed to compile: {e}"))?;
    let matched = re
        .is_match(value)
        .map_err(|e| anyhow!("Credential check failed: {e}"))?;
    if !matched {
        bail!("{message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_weak_credentials() {
        assert!(User::new("ab", "ab@example.org", "Passw0rd", false).is_err());
        assert!(User::new("alice", "not-an-email", "Passw0rd", false).is_err());
        assert!(User::new("alice", "alice@example.org", "password", false).is_err());
        assert!(User::new("alice", "alice@example.org", "Pass0", false).is_err());
        assert!(User::new(&"a".repeat(33), "long@example.org", "Passw0rd", false).is_err());
    }

    #[test]
    fn trims_username_and_normalises_email() {
        let user = User::new("  bob_42 ", " Bob@Example.ORG ", "Passw0rd", false).unwrap();
        assert_eq!(user.username, "bob_42");
        assert_eq!(user.email, "bob@example.org");
        assert_eq!(user.id, 0);
    }

    #[test]
    fn hashes_and_verifies_password() {
        let user = User::new("alice", "Alice@Example.org", "Passw0rd", false).unwrap();
        assert_ne!(user.password_hash, "Passw0rd");
        assert_eq!(user.email, "alice@example.org");
        assert!(user.verify_password("Passw0rd").is_ok());
        assert!(user.verify_password("Passw0rd!").is_err());
    }

    #[test]
    fn serialized_user_omits_password_hash() {
        let user = User::new("alice", "alice@example.org", "Passw0rd", true).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["is_superuser"], true);
    }
}
