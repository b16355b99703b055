//! Default `TokenVerifier`: HMAC-signed JWTs.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::verifier::{AuthError, TokenVerifier, VerifiedIdentity};

/// Minimal claim set per §6.2: `{openId, exp}` at minimum.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "openId")]
    open_id: String,
    exp: u64,
}

pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using an insecure development default");
            "dev-secret-change-in-production".to_string()
        });
        Self::new(secret)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let key = DecodingKey::from_secret(self.secret.as_ref());
        // Expiry is checked explicitly below so the distinct `Expired`
        // variant can be reported instead of collapsing it into `Invalid`.
        let mut validation = Validation::default();
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &key, &validation).map_err(|_| AuthError::Invalid)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if data.claims.exp <= now {
            return Err(AuthError::Expired);
        }

        Ok(VerifiedIdentity {
            open_id: data.claims.open_id,
            exp: data.claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_with_exp(secret: &str, open_id: &str, exp: u64) -> String {
        let claims = Claims {
            open_id: open_id.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }

    #[test]
    fn verifies_a_valid_unexpired_token() {
        let verifier = JwtVerifier::new("secret");
        let future = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        let token = token_with_exp("secret", "user-1", future);

        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.open_id, "user-1");
    }

    #[test]
    fn rejects_an_expired_token() {
        let verifier = JwtVerifier::new("secret");
        let token = token_with_exp("secret", "user-1", 1);

        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn rejects_a_token_signed_with_the_wrong_secret() {
        let verifier = JwtVerifier::new("secret");
        let future = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        let token = token_with_exp("wrong-secret", "user-1", future);

        let err = verifier.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::Invalid));
    }
}
