use anyhow::{Result, anyhow};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};

/// One-way password digest. The stored digest must be self-describing enough
/// for `verify` to check a candidate against it.
pub trait PasswordDigest: Send + Sync {
    fn digest(&self, password: &str) -> Result<String>;

    /// `Ok(false)` for a wrong password; `Err` only when the stored digest is
    /// unusable or the hasher itself fails.
    fn verify(&self, password: &str, digest: &str) -> Result<bool>;
}

/// Argon2id digests in PHC string format.
#[derive(Debug, Clone, Default)]
pub struct Argon2Digest {
    params: Params,
}

impl Argon2Digest {
    /// Custom cost parameters (memory in KiB, iterations, lanes).
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))?;
        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordDigest for Argon2Digest {
    fn digest(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, digest: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(digest).map_err(|e| anyhow!("Corrupt password digest: {}", e))?;

        // Cost parameters come from the digest, not from `self`.
        match self.hasher().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Digest {
        Argon2Digest::with_cost(8, 1, 1).unwrap()
    }

    #[test]
    fn digest_verify() {
        let hasher = cheap();
        let digest = hasher.digest("hunter22").unwrap();
        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("hunter22", &digest).unwrap());
        assert!(!hasher.verify("hunter23", &digest).unwrap());
    }

    #[test]
    fn digests_are_salted() {
        let hasher = cheap();
        assert_ne!(hasher.digest("pw").unwrap(), hasher.digest("pw").unwrap());
    }

    #[test]
    fn corrupt_digest_is_an_error() {
        assert!(cheap().verify("pw", "not-a-phc-string").is_err());
    }

    #[test]
    fn bad_cost_is_rejected() {
        assert!(Argon2Digest::with_cost(1, 0, 0).is_err());
    }

    #[test]
    fn default_uses_argon2_default_cost() {
        let digest = Argon2Digest::default().digest("pw").unwrap();
        let expected = format!(
            "m={},t={},p={}",
            Params::DEFAULT_M_COST,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST
        );
        assert!(digest.starts_with("$argon2id$"), "{}", digest);
        assert!(digest.contains(&expected), "{}", digest);
        assert!(Argon2Digest::default().verify("pw", &digest).unwrap());
    }
}
