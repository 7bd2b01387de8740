use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Argon2id with the crate defaults; returns a PHC string (`$argon2id$...`).
pub fn hash_password_sync(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// A stored hash that fails to parse never verifies.
pub fn verify_password_sync(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// Both directions run on the blocking pool.

pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password_sync(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("verification task failed: {e}")))
}

pub fn check_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_phc_argon2id() {
        let hash = hash_password_sync("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_roundtrip_and_wrong_password() {
        let hash = hash_password_sync("correct horse").unwrap();
        assert!(verify_password_sync("correct horse", &hash));
        assert!(!verify_password_sync("battery staple", &hash));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let a = hash_password_sync("same-password").unwrap();
        let b = hash_password_sync("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password_sync("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_strength_rejects_short_passwords() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("longenough").is_ok());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hash = hash_password("async-secret".to_string()).await.unwrap();
        assert!(verify_password("async-secret".to_string(), hash)
            .await
            .unwrap());
    }
}
