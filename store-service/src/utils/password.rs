use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

pub const PASSWORD_POLICY_MESSAGE: &str = "Must be between 6 and 16 characters long. \
Must include at least one uppercase letter (A-Z). \
Must include at least one lowercase letter (a-z). \
Must include at least one number (0-9). \
Must include at least one special character (e.g., !@#$%^&*)";

/// Plain-text password. Debug output is redacted so it never lands in logs.
#[derive(Clone)]
pub struct Password(String);

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 6-16 characters with at least one lowercase, uppercase, digit and
    /// non-alphanumeric ASCII character (underscore counts as a symbol).
    pub fn meets_policy(&self) -> bool {
        let len = self.0.chars().count();
        if !(6..=16).contains(&len) {
            return false;
        }

        let mut lower = false;
        let mut upper = false;
        let mut digit = false;
        let mut symbol = false;
        for c in self.0.chars() {
            if c.is_ascii_lowercase() {
                lower = true;
            } else if c.is_ascii_uppercase() {
                upper = true;
            } else if c.is_ascii_digit() {
                digit = true;
            } else {
                symbol = true;
            }
        }

        lower && upper && digit && symbol
    }

    /// Argon2id with a fresh random salt embedded in the PHC string.
    pub fn hash(&self) -> Result<PasswordHashString, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString(hash))
    }

    /// Constant-time check against a stored PHC string. A malformed hash never matches.
    pub fn matches(&self, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(self.0.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Alphanumeric code mailed for password resets.
pub fn generate_verification_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
