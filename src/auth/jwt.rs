//! Bearer token validation against an external identity provider
//!
//! Tokens are minted elsewhere (the identity provider owns sign-in); this
//! side only checks the HS256 signature, issuer, and audience, then maps
//! the claims onto a [`CurrentUser`].

use anyhow::{Context, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::config::JwtConfig;

#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn from_config(config: &JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<CurrentUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .context("bearer token failed validation")?;
        Ok(data.claims.into_user())
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl Claims {
    /// Display name preference: explicit `name` claim, then the email
    /// local-part, then the bare subject.
    fn into_user(self) -> CurrentUser {
        let display_name = self
            .name
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.sub.clone());

        CurrentUser {
            user_id: self.sub,
            display_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            issuer: "https://id.example.com".to_string(),
            audience: "newsdesk".to_string(),
        }
    }

    fn sign(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(test_config().secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn valid_token_round_trips() {
        let validator = JwtValidator::from_config(&test_config());
        let token = sign(json!({
            "sub": "user-42",
            "name": "Ada",
            "iss": "https://id.example.com",
            "aud": "newsdesk",
            "exp": far_future(),
        }));

        let user = validator.validate(&token).unwrap();
        assert_eq!(user.user_id, "user-42");
        assert_eq!(user.display_name, "Ada");
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let validator = JwtValidator::from_config(&test_config());
        let token = sign(json!({
            "sub": "user-42",
            "iss": "https://elsewhere.example.com",
            "aud": "newsdesk",
            "exp": far_future(),
        }));

        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let validator = JwtValidator::from_config(&test_config());
        let token = encode(
            &Header::default(),
            &json!({
                "sub": "user-42",
                "iss": "https://id.example.com",
                "aud": "newsdesk",
                "exp": far_future(),
            }),
            &EncodingKey::from_secret(b"other-secret"),
        )
        .unwrap();

        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        let user = Claims {
            sub: "user-7".to_string(),
            name: None,
            email: Some("grace@example.com".to_string()),
        }
        .into_user();
        assert_eq!(user.display_name, "grace");

        let bare = Claims {
            sub: "user-8".to_string(),
            name: None,
            email: None,
        }
        .into_user();
        assert_eq!(bare.display_name, "user-8");
    }
}
