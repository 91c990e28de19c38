use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    /// Unique token id, used for revocation on logout.
    pub jti: String,
}

pub fn create_token(jwt_secret: &str, ttl_hours: u64, username: &str) -> anyhow::Result<(String, u64)> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let expires_at = now + ttl_hours * 3600;

    let claims = Claims {
        sub: username.to_string(),
        exp: usize::try_from(expires_at)?,
        jti: uuid::Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;

    Ok((token, expires_at))
}

pub fn verify_token(jwt_secret: &str, token: &str) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn token_round_trips() {
        let (token, expires_at) = create_token(SECRET, 1, "writer").unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, "writer");
        assert_eq!(claims.exp as u64, expires_at);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = create_token(SECRET, 1, "writer").unwrap();
        assert!(verify_token("another-secret-another-secret-xx", &token).is_err());
    }

    #[test]
    fn each_token_gets_its_own_id() {
        let (a, _) = create_token(SECRET, 1, "writer").unwrap();
        let (b, _) = create_token(SECRET, 1, "writer").unwrap();
        let a = verify_token(SECRET, &a).unwrap();
        let b = verify_token(SECRET, &b).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
