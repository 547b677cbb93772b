//! Bearer credentials minted after a successful login.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quill_protocol::{AuthTokens, UserData};
use serde::{Deserialize, Serialize};

use crate::clock::delta;
use crate::config::CredentialConfig;
use crate::error::{QuillError, Result};

/// Claims of a minted credential. Consumers treat the token as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaims {
	pub sub: String,
	pub provider: String,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub profile_url: Option<String>,
	#[serde(default)]
	pub subdomain: Option<String>,
	#[serde(default)]
	pub auth_tokens: Option<AuthTokens>,
	pub iat: i64,
	pub exp: i64,
}

pub struct CredentialIssuer {
	provider: String,
	encoding: EncodingKey,
	decoding: DecodingKey,
	ttl: std::time::Duration,
}

impl CredentialIssuer {
	pub fn new(provider: impl Into<String>, config: &CredentialConfig) -> Self {
		Self {
			provider: provider.into(),
			encoding: EncodingKey::from_secret(config.secret.as_bytes()),
			decoding: DecodingKey::from_secret(config.secret.as_bytes()),
			ttl: config.ttl,
		}
	}

	pub fn mint(&self, session_id: &str, user: &UserData, now: DateTime<Utc>) -> Result<String> {
		let claims = CredentialClaims {
			sub: session_id.to_string(),
			provider: self.provider.clone(),
			email: user.email.clone(),
			name: user.name.clone(),
			profile_url: user.profile_url.clone(),
			subdomain: user.subdomain.clone(),
			auth_tokens: user.auth_tokens.clone(),
			iat: now.timestamp(),
			exp: (now + delta(self.ttl)).timestamp(),
		};
		Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
	}

	/// Checks the signature and expiry against `now`.
	pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<CredentialClaims> {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.validate_exp = false;
		let claims = jsonwebtoken::decode::<CredentialClaims>(token, &self.decoding, &validation)?.claims;
		if claims.exp <= now.timestamp() {
			return Err(QuillError::InvalidInput("credential expired".into()));
		}
		Ok(claims)
	}
}
