use crate::error::AppError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| AppError::Internal(e.to_string()))?;

    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Generates a password-reset token. The plain token is emailed to the user;
/// only its SHA-256 digest is persisted.
pub fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    to_hex(&bytes)
}

/// Digest of a reset token as stored in `users.password_reset_token`.
pub fn hash_reset_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    to_hex(&digest)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn reset_tokens_are_unique_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn reset_token_digest_is_stable() {
        let token = "deadbeef";
        assert_eq!(hash_reset_token(token), hash_reset_token(token));
        assert_ne!(hash_reset_token(token), token);
        assert_eq!(hash_reset_token(token).len(), 64);
    }
}
