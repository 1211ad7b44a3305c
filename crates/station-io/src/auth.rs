//! Operator authorization for inbound commands.
//!
//! Commands can mutate plant state, so when a shared secret is
//! configured every command must carry an HMAC-SHA256 token naming the
//! operator who issued it.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired (age {age_secs}s, max {max_secs}s)")]
    TokenExpired { age_secs: u64, max_secs: u64 },

    #[error("malformed token")]
    InvalidFormat,

    #[error("token signature mismatch")]
    InvalidSignature,

    #[error("token decode failed: {0}")]
    DecodeError(String),
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Shared HMAC secret; empty means commands are open.
    pub secret: Vec<u8>,
    pub max_age_secs: u64,
    pub enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: Vec::new(),
            max_age_secs: 300,
            enabled: false,
        }
    }
}

/// Claims recovered from a valid token.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub issued_at: u64,
    pub operator: String,
    pub age_secs: u64,
}

/// Validates operator tokens of the form
/// `base64(timestamp_secs:operator:hmac(timestamp_secs:operator))`.
pub struct TokenValidator {
    secret: Vec<u8>,
    max_age_secs: u64,
}

impl TokenValidator {
    pub fn new(secret: Vec<u8>, max_age_secs: u64) -> Self {
        Self {
            secret,
            max_age_secs,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.secret.clone(), config.max_age_secs)
    }

    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        use base64::Engine;
        let engine = base64::engine::general_purpose::STANDARD;

        let decoded = engine
            .decode(token)
            .map_err(|e| AuthError::DecodeError(e.to_string()))?;

        // timestamp : operator : signature. The signature may itself
        // contain colon bytes, so only the first two are separators.
        let first = decoded
            .iter()
            .position(|&b| b == b':')
            .ok_or(AuthError::InvalidFormat)?;
        let second = decoded[first + 1..]
            .iter()
            .position(|&b| b == b':')
            .map(|p| first + 1 + p)
            .ok_or(AuthError::InvalidFormat)?;

        let signed_part = &decoded[..second];
        let timestamp_bytes = &decoded[..first];
        let operator_bytes = &decoded[first + 1..second];
        let signature = &decoded[second + 1..];

        let timestamp_str =
            std::str::from_utf8(timestamp_bytes).map_err(|_| AuthError::InvalidFormat)?;
        let issued_at: u64 = timestamp_str.parse().map_err(|_| AuthError::InvalidFormat)?;
        let operator = std::str::from_utf8(operator_bytes)
            .map_err(|_| AuthError::InvalidFormat)?
            .to_string();
        if operator.is_empty() {
            return Err(AuthError::InvalidFormat);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let age_secs = now.saturating_sub(issued_at);
        if age_secs > self.max_age_secs {
            return Err(AuthError::TokenExpired {
                age_secs,
                max_secs: self.max_age_secs,
            });
        }

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(signed_part);
        mac.verify_slice(signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        Ok(TokenClaims {
            issued_at,
            operator,
            age_secs,
        })
    }

    /// Mint a token for the given operator; used by tests and the
    /// companion console tooling.
    pub fn generate_token(&self, operator: &str) -> String {
        use base64::Engine;
        let engine = base64::engine::general_purpose::STANDARD;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let signed_part = format!("{}:{}", now, operator);
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(signed_part.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut token_data = signed_part.into_bytes();
        token_data.push(b':');
        token_data.extend_from_slice(&signature);

        engine.encode(&token_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> Vec<u8> {
        b"station-test-secret".to_vec()
    }

    #[test]
    fn valid_token_yields_operator_claims() {
        let validator = TokenValidator::new(secret(), 300);
        let token = validator.generate_token("ops-console");
        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.operator, "ops-console");
        assert!(claims.age_secs < 5);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let validator = TokenValidator::new(secret(), 300);
        let forger = TokenValidator::new(b"other-secret".to_vec(), 300);
        let token = forger.generate_token("ops-console");
        assert!(matches!(
            validator.validate(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn stale_token_is_rejected() {
        let minter = TokenValidator::new(secret(), 300);
        let token = minter.generate_token("ops-console");

        let strict = TokenValidator::new(secret(), 0);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(matches!(
            strict.validate(&token),
            Err(AuthError::TokenExpired { .. })
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        use base64::Engine;
        let validator = TokenValidator::new(secret(), 300);

        assert!(matches!(
            validator.validate("%%% not base64 %%%"),
            Err(AuthError::DecodeError(_))
        ));

        let engine = base64::engine::general_purpose::STANDARD;
        let one_colon = engine.encode(b"1700000000:no-signature-separator");
        assert!(matches!(
            validator.validate(&one_colon),
            Err(AuthError::InvalidFormat)
        ));

        let empty_operator = engine.encode(b"1700000000::sig");
        assert!(matches!(
            validator.validate(&empty_operator),
            Err(AuthError::InvalidFormat)
        ));
    }
}
