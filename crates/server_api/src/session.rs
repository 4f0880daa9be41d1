//! Identity tokens handed out by the provisioning side and checked on every
//! request. The token only carries the account id; there is no credential
//! exchange here.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::AccountId;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

pub fn mint_token(cfg: &SessionConfig, account_id: &AccountId) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub: account_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

pub fn verify_token(cfg: &SessionConfig, token: &str) -> Result<AccountId, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )?;
    Ok(AccountId(data.claims.sub))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ttl_seconds: i64) -> SessionConfig {
        SessionConfig {
            secret: "test-secret".into(),
            ttl_seconds,
        }
    }

    #[test]
    fn minted_token_round_trips_account_id() {
        let cfg = config(60);
        let account_id = AccountId::generate();
        let token = mint_token(&cfg, &account_id).expect("mint");
        assert_eq!(verify_token(&cfg, &token).expect("verify"), account_id);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = mint_token(&config(60), &AccountId::generate()).expect("mint");
        let other = SessionConfig {
            secret: "other-secret".into(),
            ttl_seconds: 60,
        };
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = config(-120);
        let token = mint_token(&cfg, &AccountId::generate()).expect("mint");
        assert!(verify_token(&cfg, &token).is_err());
    }
}
