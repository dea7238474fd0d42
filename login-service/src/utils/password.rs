use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, Params,
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Verified against when a username does not exist, so the unknown-user path
/// spends the same Argon2 work as a wrong password. Parameters must match
/// `Argon2::default()`.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$N+Zht8w66QRsJXt4C/8oeA$hgZyfGkaPZhKFIapc/wioNxrouUBfZ+8zV5Yu0y9Nk4";

/// Plaintext password as received from a client. Never printed.
pub struct Password(SecretString);

impl Password {
    pub fn new(password: String) -> Self {
        Self(SecretString::new(password))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// PHC-format password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHashString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHashString([REDACTED])")
    }
}

/// The fixed hash used for unknown usernames.
pub fn dummy_hash() -> PasswordHashString {
    PasswordHashString::new(DUMMY_HASH.to_string())
}

/// Hash a password using Argon2id
///
/// Salt is generated from the OS RNG and embedded in the PHC string.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.expose().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash.
///
/// The Argon2 output is recomputed with the stored algorithm, version,
/// parameters and salt, then compared with the stored output in constant
/// time. `Ok(false)` means mismatch; `Err` means the stored hash is unusable.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<bool, anyhow::Error> {
    let parsed = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    let expected = parsed
        .hash
        .ok_or_else(|| anyhow::anyhow!("Password hash has no output"))?;
    let salt = parsed
        .salt
        .ok_or_else(|| anyhow::anyhow!("Password hash has no salt"))?;
    let params = Params::try_from(&parsed)
        .map_err(|e| anyhow::anyhow!("Invalid password hash parameters: {}", e))?;

    let computed = Argon2::default()
        .hash_password_customized(
            password.expose().as_bytes(),
            Some(parsed.algorithm),
            parsed.version,
            params,
            salt,
        )
        .map_err(|e| anyhow::anyhow!("Failed to recompute password hash: {}", e))?;
    let actual = computed
        .hash
        .ok_or_else(|| anyhow::anyhow!("Recomputed hash has no output"))?;

    Ok(constant_time_eq(expected.as_bytes(), actual.as_bytes()))
}

/// Compare two byte strings without an early exit on the first difference.
/// Lengths are not secret here; both sides come from the same parameters.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
