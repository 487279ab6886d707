use crate::error::AppError;
use bcrypt::{hash, verify, DEFAULT_COST};
use validator::ValidationError;

/// bcrypt only reads this many bytes of the secret.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Validator for password fields. The limit counts bytes, not characters.
pub fn validate_password_bytes(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        let mut err = ValidationError::new("password_too_long");
        err.message = Some("Password must be at most 72 bytes long".into());
        return Err(err);
    }
    Ok(())
}

/// bcrypt hashing with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::ValidationError(
                "Password must be at most 72 bytes long".into(),
            ));
        }
        hash(password, self.cost)
            .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
    }

    /// `false` on mismatch, on a digest bcrypt cannot parse, and on a password longer
    /// than bcrypt reads.
    pub fn verify(&self, password: &str, hashed_password: &str) -> bool {
        if password.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        match verify(password, hashed_password) {
            Ok(matches) => matches,
            Err(e) => {
                log::warn!("Password verification against malformed digest: {}", e);
                false
            }
        }
    }
}
