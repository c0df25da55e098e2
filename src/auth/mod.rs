//! Identity verification seam
//!
//! Accounts live in an external service that issues JWTs; this worker only
//! ever needs "verify the token, get the user id". Token issuance stays
//! with the account service.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RustyRooksError};

/// Claims this worker cares about; anything else in the token is ignored
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    /// Expiration time (UTC timestamp)
    pub exp: usize,
}

/// Verify-only JWT handling (HS256)
pub struct TokenManager {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Validate a token and return the user id it was issued to
    pub fn verify(&self, token: &str) -> Result<String> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| RustyRooksError::AuthError(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn make_token(secret: &str, sub: &str, expires_in_secs: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + expires_in_secs).max(0) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_user_id() {
        let manager = TokenManager::new("unit-test-secret");
        let token = make_token("unit-test-secret", "user-42", 3600);
        assert_eq!(manager.verify(&token).unwrap(), "user-42");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let manager = TokenManager::new("unit-test-secret");
        let token = make_token("other-secret", "user-42", 3600);
        assert!(matches!(
            manager.verify(&token),
            Err(RustyRooksError::AuthError(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let manager = TokenManager::new("unit-test-secret");
        let token = make_token("unit-test-secret", "user-42", -3600);
        assert!(manager.verify(&token).is_err());
    }
}
