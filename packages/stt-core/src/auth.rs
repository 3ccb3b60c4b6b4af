//! Optional HS256 JWT authentication (§4.9).
//!
//! Authentication is disabled unless [`crate::config::AuthConfig::secret`] is
//! set. When enabled, a session must present a valid token either as a
//! `token` query parameter on the upgrade request or as the first JSON
//! message on the socket (`{"type":"auth","token":"..."}`); anything else
//! closes the connection with [`crate::error::SttError::Unauthorized`].

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::SttError;

/// Claims carried by the authentication token. Only expiry is enforced;
/// the subject is informational.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
}

/// Verifies an HS256 token against the configured shared secret.
pub fn verify(token: &str, secret: &str) -> Result<Claims, SttError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|err| SttError::Unauthorized(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: &'static str,
        exp: u64,
    }

    fn sign(secret: &str, exp: u64) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &TestClaims { sub: "tester", exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let token = sign("top-secret", u64::MAX / 2);
        let claims = verify(&token, "top-secret").unwrap();
        assert_eq!(claims.sub.as_deref(), Some("tester"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign("top-secret", u64::MAX / 2);
        assert!(verify(&token, "wrong-secret").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign("top-secret", 1);
        assert!(verify(&token, "top-secret").is_err());
    }
}
