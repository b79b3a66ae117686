//! Administrator password generation

use crate::error::CredentialError;
use crate::provider::CredentialGenerator;
use dbflow_config::CredentialPolicy;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Default password length
pub const DEFAULT_LENGTH: usize = 27;

/// Random alphanumeric passwords from the thread-local RNG
#[derive(Debug, Clone)]
pub struct RandomPassword {
    length: usize,
}

impl Default for RandomPassword {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
        }
    }
}

impl RandomPassword {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn from_policy(policy: &CredentialPolicy) -> Self {
        Self::new(policy.length)
    }
}

impl CredentialGenerator for RandomPassword {
    fn generate(&self) -> Result<String, CredentialError> {
        if self.length == 0 {
            return Err(CredentialError::InvalidPolicy(
                "password length must be positive".to_string(),
            ));
        }

        let password = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_length() {
        let password = RandomPassword::default().generate().unwrap();
        assert_eq!(password.len(), DEFAULT_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_is_fresh_each_time() {
        let generator = RandomPassword::new(32);
        assert_ne!(generator.generate().unwrap(), generator.generate().unwrap());
    }

    #[test]
    fn test_zero_length_rejected() {
        let generator = RandomPassword::from_policy(&CredentialPolicy { length: 0 });
        assert!(matches!(
            generator.generate(),
            Err(CredentialError::InvalidPolicy(_))
        ));
    }
}
