use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::PasswordConfig;

/// Salted Argon2id hashing with a configurable work factor.
///
/// Both operations are CPU-bound; async callers should run them on
/// `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(
            cfg.memory_kib,
            cfg.iterations,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Fails closed: a malformed hash verifies as `false`. The parameters
    /// embedded in `hash` are used, so hashes made under an older work factor
    /// stay valid. The comparison itself is constant-time inside argon2.
    pub fn verify(&self, hash: &str, plain: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordConfig {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
        })
        .unwrap()
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let h = hasher();
        for password in ["Secur3P@ssw0rd!", "secret1", "", "пароль with spaces"] {
            let hash = h.hash(password).expect("hashing should succeed");
            assert!(h.verify(&hash, password), "{password:?}");
        }
    }

    #[test]
    fn hash_is_salted() {
        let h = hasher();
        let a = h.hash("same").unwrap();
        let b = h.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let h = hasher();
        let hash = h.hash("correct-horse-battery-staple").unwrap();
        assert!(!h.verify(&hash, "wrong-password"));
        assert!(!h.verify(&hash, "correct-horse-battery-staplE"));
    }

    #[test]
    fn verify_rejects_mutated_hash() {
        let h = hasher();
        let hash = h.hash("secret1").unwrap();
        // flip the last character of the digest
        let mut mutated = hash.clone();
        let last = mutated.pop().unwrap();
        mutated.push(if last == 'A' { 'B' } else { 'A' });
        assert!(!h.verify(&mutated, "secret1"));
    }

    #[test]
    fn verify_fails_closed_on_malformed_hash() {
        let h = hasher();
        assert!(!h.verify("not-a-valid-hash", "anything"));
        assert!(!h.verify("", "anything"));
    }

    #[test]
    fn hash_made_with_other_work_factor_still_verifies() {
        let strong = PasswordHasher::new(&PasswordConfig {
            memory_kib: Params::MIN_M_COST * 2,
            iterations: 2,
        })
        .unwrap();
        let hash = strong.hash("secret1").unwrap();
        assert!(hasher().verify(&hash, "secret1"));
    }

    #[test]
    fn rejects_invalid_params() {
        let err = PasswordHasher::new(&PasswordConfig {
            memory_kib: 0,
            iterations: 0,
        })
        .unwrap_err();
        assert!(err.to_string().contains("argon2"));
    }
}
