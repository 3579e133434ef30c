use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use rand_core::OsRng;

use crate::config::AdminCredentials;

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub email: String,
}

/// Checks login credentials. Swappable for an external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means the credentials were wrong.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Identity>, String>;
}

/// The single administrator configured through the environment.
///
/// Holds only an Argon2id hash. Without a configured email and password every
/// login is refused.
pub struct ConfiguredAdmin {
    credentials: Option<(String, String)>,
}

impl ConfiguredAdmin {
    pub fn from_config(admin: &AdminCredentials) -> Result<Self, String> {
        let email = admin.email.as_deref().map(normalize_email);
        let credentials = match (email, &admin.password_hash, &admin.password) {
            (Some(email), Some(hash), _) => {
                PasswordHash::new(hash).map_err(|e| format!("Invalid CMS_PASSWORD_HASH: {e}"))?;
                Some((email, hash.clone()))
            }
            (Some(email), None, Some(plain)) => Some((email, hash_password(plain)?)),
            _ => {
                tracing::warn!(
                    "CMS_EMAIL and CMS_PASSWORD (or CMS_PASSWORD_HASH) are not both set; login is disabled"
                );
                None
            }
        };
        Ok(Self { credentials })
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl IdentityProvider for ConfiguredAdmin {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Identity>, String> {
        let Some((expected_email, hash)) = &self.credentials else {
            return Ok(None);
        };

        // Always verify the password so a wrong email costs the same as a wrong password.
        let candidate = password.to_owned();
        let hash = hash.clone();
        let password_ok = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| format!("Password verification task failed: {e}"))??;

        let email_ok = normalize_email(email) == *expected_email;
        Ok((email_ok && password_ok).then(|| Identity {
            email: email.trim().to_string(),
        }))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2id, 19MB memory, 2 iterations, parallelism 1.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params::new(19 * 1024, 2, 1, None).map_err(|e| format!("Invalid params: {e}"))?;

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Hashing failed: {e}"))
}

fn verify_password(candidate: &str, hash: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(hash).map_err(|e| format!("Invalid hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}
