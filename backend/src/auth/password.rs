use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const DEFAULT_ITERATIONS: u32 = 100_000;
pub const MIN_PASSWORD_LENGTH: usize = 8;
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const ALGORITHM: &str = "pbkdf2_sha256";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password minimal {MIN_PASSWORD_LENGTH} karakter.")]
    TooShort,
    #[error("Password tidak boleh hanya berisi angka.")]
    EntirelyNumeric,
    #[error("Malformed password hash")]
    MalformedHash,
}

/// PBKDF2-SHA256 hashes encoded as `pbkdf2_sha256$<iterations>$<salt>$<hash>`.
/// The iteration count travels with the hash, so raising it only affects new hashes.
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);
        let digest = derive(password, &salt, self.iterations);
        format!(
            "{}${}${}${}",
            ALGORITHM,
            self.iterations,
            hex::encode(salt),
            hex::encode(digest)
        )
    }

    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, PasswordError> {
        let parts: Vec<&str> = encoded.split('$').collect();
        let [algorithm, iterations, salt, expected] = parts.as_slice() else {
            return Err(PasswordError::MalformedHash);
        };
        if *algorithm != ALGORITHM {
            return Err(PasswordError::MalformedHash);
        }
        let iterations: u32 = iterations
            .parse()
            .map_err(|_| PasswordError::MalformedHash)?;
        let salt = hex::decode(salt).map_err(|_| PasswordError::MalformedHash)?;
        let expected = hex::decode(expected).map_err(|_| PasswordError::MalformedHash)?;

        let digest = derive(password, &salt, iterations);
        Ok(digest.as_slice().ct_eq(expected.as_slice()).into())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(PasswordError::EntirelyNumeric);
    }
    Ok(())
}
