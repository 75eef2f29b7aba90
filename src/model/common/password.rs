use argon2::Config;
use rand::Rng;

/// Minimum length of any admin or citizen password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &Config::default())
}

/// Check a plaintext password against a stored hash.
/// A malformed stored hash never verifies.
pub fn verify_password(hash: &str, password: impl AsRef<[u8]>) -> bool {
    argon2::verify_encoded(hash, password.as_ref()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "battery staple"));
        assert!(!verify_password("not a hash", "correct horse"));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }
}
