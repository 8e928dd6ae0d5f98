use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};
use rand::{rngs::OsRng, Rng, RngCore};
use std::collections::HashSet;

use crate::error::{AppError, Result};

/// Number of digits in a student PIN.
pub const PIN_LENGTH: usize = 6;
/// Size of the PIN space (`000000`..=`999999`).
const PIN_SPACE: u32 = 1_000_000;
/// Draws allowed per student before giving up on finding an unused PIN.
pub const PIN_RETRY_BUDGET: usize = 100;

/// Argon2id hasher for share PINs.
///
/// PIN entropy (20 bits) is the limiting factor, so the cost parameters are far
/// lighter than a password hash would use.
#[derive(Debug, Clone, Copy)]
pub struct PinHasher {
    memory_kib: u32,
    iterations: u32,
}

impl PinHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Self {
        Self {
            memory_kib,
            iterations,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = ParamsBuilder::new()
            .m_cost(self.memory_kib)
            .t_cost(self.iterations)
            .p_cost(1)
            .build()
            .map_err(|e| AppError::Encryption(format!("Argon2 params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hashes a PIN into a PHC string (parameters travel with the hash).
    pub fn hash(&self, pin: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut salt_bytes);

        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AppError::Encryption(format!("Salt encoding error: {}", e)))?;

        let hash = self
            .argon2()?
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| AppError::Encryption(format!("Argon2 hash error: {}", e)))?
            .to_string();

        Ok(hash)
    }

    /// Checks a PIN against a stored hash. Malformed hashes never match.
    pub fn verify(&self, pin: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(pin.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Returns true for exactly six ASCII digits. Leading zeros are significant.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Draws a random zero-padded 6-digit PIN.
pub fn generate_pin() -> String {
    let n: u32 = OsRng.gen_range(0..PIN_SPACE);
    format!("{:0width$}", n, width = PIN_LENGTH)
}

/// Draws `count` pairwise-distinct PINs.
///
/// Each PIN gets at most [`PIN_RETRY_BUDGET`] draws; running out fails with
/// [`AppError::PinSpaceExhausted`].
pub fn generate_unique_pins(count: usize) -> Result<Vec<String>> {
    generate_unique_pins_with(count, PIN_RETRY_BUDGET, generate_pin)
}

fn generate_unique_pins_with(
    count: usize,
    budget: usize,
    mut draw: impl FnMut() -> String,
) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(count);
    let mut pins = Vec::with_capacity(count);

    for _ in 0..count {
        let mut attempts = 0;
        loop {
            if attempts == budget {
                tracing::error!("❌ No unused PIN after {} attempts", budget);
                return Err(AppError::PinSpaceExhausted);
            }
            attempts += 1;

            let pin = draw();
            if seen.insert(pin.clone()) {
                pins.push(pin);
                break;
            }
            tracing::debug!("PIN collision, drawing again");
        }
    }

    Ok(pins)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PinHasher {
        PinHasher::new(1024, 1)
    }

    #[test]
    fn generated_pins_are_six_digits() {
        for _ in 0..200 {
            let pin = generate_pin();
            assert!(is_valid_pin(&pin), "{}", pin);
        }
    }

    #[test]
    fn pin_format_checks() {
        assert!(is_valid_pin("000123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin("1234567"));
        assert!(!is_valid_pin("12a456"));
        assert!(!is_valid_pin(" 12345"));
        assert!(!is_valid_pin("１２３４５６"));
    }

    #[test]
    fn unique_pins_are_pairwise_distinct() {
        let pins = generate_unique_pins(500).unwrap();
        let distinct: HashSet<_> = pins.iter().collect();
        assert_eq!(distinct.len(), 500);
    }

    #[test]
    fn collisions_are_retried() {
        let mut script = vec!["111111", "111111", "111111", "222222"].into_iter();
        let pins = generate_unique_pins_with(2, 5, || script.next().unwrap().to_string()).unwrap();
        assert_eq!(pins, vec!["111111", "222222"]);
    }

    #[test]
    fn exhausted_budget_fails() {
        let result = generate_unique_pins_with(2, 3, || "424242".to_string());
        assert!(matches!(result, Err(AppError::PinSpaceExhausted)));
    }

    #[test]
    fn hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("012345").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("012345", &hash));
        assert!(!hasher.verify("12345", &hash));
        assert!(!hasher.verify("012346", &hash));
        assert!(!hasher.verify("012345", "not-a-phc-string"));
    }
}
