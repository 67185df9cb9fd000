//! Password policy and strength estimation
//!
//! Wallet creation and password changes are gated by a [`PasswordPolicy`]
//! (minimum length plus character-class diversity). A coarse entropy
//! classification is also exposed so callers can warn about passwords
//! that pass the policy but are still guessable.

use thiserror::Error;

/// Common weak passwords and wallet-adjacent words.
const COMMON_PASSWORDS: &[&str] = &[
    "password", "123456", "12345678", "qwerty", "abc123", "letmein", "trustno1", "iloveyou",
    "password1", "123456789", "bitcoin", "satoshi", "ethereum", "hodl", "seed", "wallet", "crypto",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("password is too short: {actual} characters (minimum {required})")]
    TooShort { actual: usize, required: usize },
    #[error("password needs at least {required} character classes (letters, digits, symbols), found {actual}")]
    TooFewClasses { actual: usize, required: usize },
    #[error("password is a commonly used password")]
    CommonPassword,
}

/// Minimum requirements for wallet passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// Distinct classes required among: lowercase, uppercase, digit, symbol.
    pub min_classes: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_classes: 2,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        let len = password.chars().count();
        if len < self.min_length {
            return Err(PolicyViolation::TooShort {
                actual: len,
                required: self.min_length,
            });
        }

        let classes = character_classes(password);
        if classes < self.min_classes {
            return Err(PolicyViolation::TooFewClasses {
                actual: classes,
                required: self.min_classes,
            });
        }

        let lower = password.to_lowercase();
        if COMMON_PASSWORDS.iter().any(|&cp| lower == cp) {
            return Err(PolicyViolation::CommonPassword);
        }

        Ok(())
    }
}

/// Coarse strength classification for UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    /// < 28 bits — trivially crackable
    Dangerous,
    /// 28–59 bits — vulnerable to targeted attack
    Weak,
    /// 60–127 bits — resistant to well-funded attackers
    Strong,
    /// ≥ 128 bits — beyond brute-force
    Excellent,
}

/// Estimate password entropy in bits from character-class analysis.
pub fn estimate_entropy(password: &str) -> f64 {
    if password.is_empty() {
        return 0.0;
    }

    let mut charset: f64 = 0.0;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        charset += 26.0;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        charset += 26.0;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        charset += 10.0;
    }
    if password
        .chars()
        .any(|c| c.is_ascii_punctuation() || c == ' ')
    {
        charset += 33.0;
    }
    if password.chars().any(|c| !c.is_ascii()) {
        charset += 100.0; // conservative estimate for common Unicode
    }
    charset = charset.max(1.0);

    let mut entropy = password.chars().count() as f64 * charset.log2();

    let lower = password.to_lowercase();
    if COMMON_PASSWORDS.iter().any(|&cp| lower.contains(cp)) {
        entropy *= 0.5;
    }

    entropy
}

pub fn classify(password: &str) -> PasswordStrength {
    let bits = estimate_entropy(password);
    if bits < 28.0 {
        PasswordStrength::Dangerous
    } else if bits < 60.0 {
        PasswordStrength::Weak
    } else if bits < 128.0 {
        PasswordStrength::Strong
    } else {
        PasswordStrength::Excellent
    }
}

fn character_classes(password: &str) -> usize {
    let mut classes = 0;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        classes += 1;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        classes += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        classes += 1;
    }
    if password
        .chars()
        .any(|c| c.is_ascii_punctuation() || c == ' ' || !c.is_ascii())
    {
        classes += 1;
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_short() {
        let policy = PasswordPolicy::default();
        assert!(matches!(
            policy.validate("aB3"),
            Err(PolicyViolation::TooShort { actual: 3, .. })
        ));
    }

    #[test]
    fn test_policy_rejects_single_class() {
        let policy = PasswordPolicy::default();
        assert!(matches!(
            policy.validate("abcdefghij"),
            Err(PolicyViolation::TooFewClasses { actual: 1, .. })
        ));
        assert!(matches!(
            policy.validate("1234567890"),
            Err(PolicyViolation::TooFewClasses { .. })
        ));
    }

    #[test]
    fn test_policy_rejects_common() {
        let policy = PasswordPolicy::default();
        assert_eq!(
            policy.validate("password1"),
            Err(PolicyViolation::CommonPassword)
        );
    }

    #[test]
    fn test_policy_accepts_reasonable() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("correct horse 42").is_ok());
        assert!(policy.validate("Tr0ub4dor&3").is_ok());
    }

    #[test]
    fn test_classification_ordering() {
        assert!(classify("abc") < classify("correct horse battery staple"));
        assert_eq!(classify(""), PasswordStrength::Dangerous);
        assert!(classify("correct horse battery staple") >= PasswordStrength::Strong);
    }

    #[test]
    fn test_common_password_penalized() {
        assert!(estimate_entropy("bitcoin2024!") < estimate_entropy("ziltoid2024!"));
    }
}
