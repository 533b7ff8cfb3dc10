// Linkauth — Password hashing
//
// Argon2id with a fresh random salt per hash, stored as a PHC string so
// the algorithm and parameters travel with the hash.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use zeroize::Zeroizing;

use super::StoreError;

/// Length of the random salt in bytes.
const SALT_LEN: usize = 16;

fn generate_salt() -> Result<SaltString, StoreError> {
    let mut bytes = Zeroizing::new([0u8; SALT_LEN]);
    rand::rng().fill_bytes(&mut *bytes);
    SaltString::encode_b64(&*bytes).map_err(|e| StoreError::Hashing(e.to_string()))
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = generate_salt()?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StoreError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
/// A stored value that does not parse as a PHC string never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password is not a valid hash");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// A hash with minimal Argon2 cost, so tests that verify passwords on
/// every request stay fast. Verification reads the cost from the PHC string.
#[cfg(test)]
pub(crate) fn cheap_hash(password: &str) -> String {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
        .expect("minimal argon2 params are valid");
    let salt = generate_salt().expect("salt");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .expect("hashing with minimal params")
        .to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
