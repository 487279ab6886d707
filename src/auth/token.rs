use std::fmt;
use std::fs;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;

/// Which half of the token pair a token is. Carried in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// The application claims a token is issued for.
/// Registered claims (`iat`, `exp`, `iss`, `aud`, `jti`) are stamped by [`TokenCodec::encode`].
#[derive(Debug, Clone, Serialize)]
pub struct TokenSubject {
    pub sub: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A verified claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject of the token, the user's id.
    pub sub: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiration, seconds since epoch.
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    /// Unique token id.
    pub jti: String,
}

/// Signs and verifies JWTs with an asymmetric key pair.
///
/// Built once at startup and shared; holds no mutable state.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

fn load_keys(
    algorithm: Algorithm,
    private_pem: &[u8],
    public_pem: &[u8],
) -> Result<(EncodingKey, DecodingKey), jsonwebtoken::errors::Error> {
    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Ok((
            EncodingKey::from_rsa_pem(private_pem)?,
            DecodingKey::from_rsa_pem(public_pem)?,
        )),
        Algorithm::ES256 | Algorithm::ES384 => Ok((
            EncodingKey::from_ec_pem(private_pem)?,
            DecodingKey::from_ec_pem(public_pem)?,
        )),
        Algorithm::EdDSA => Ok((
            EncodingKey::from_ed_pem(private_pem)?,
            DecodingKey::from_ed_pem(public_pem)?,
        )),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(jsonwebtoken::errors::ErrorKind::InvalidAlgorithm.into())
        }
    }
}

impl TokenCodec {
    /// Builds a codec from PEM-encoded key material.
    ///
    /// Only asymmetric algorithms are accepted.
    pub fn new(
        algorithm: Algorithm,
        private_pem: &[u8],
        public_pem: &[u8],
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, AppError> {
        let (encoding_key, decoding_key) =
            load_keys(algorithm, private_pem, public_pem).map_err(|e| {
                AppError::InternalServerError(format!(
                    "Failed to load {:?} signing keys: {}",
                    algorithm, e
                ))
            })?;

        let issuer = issuer.into();
        let audience = audience.into();

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            issuer,
            audience,
            validation,
        })
    }

    /// Reads the key files named in `config`. Called once at startup.
    pub fn from_config(config: &JwtConfig) -> Result<Self, AppError> {
        let read = |path: &std::path::Path| {
            fs::read(path).map_err(|e| {
                AppError::InternalServerError(format!(
                    "Failed to read key file {}: {}",
                    path.display(),
                    e
                ))
            })
        };
        let private_pem = read(&config.private_key_path)?;
        let public_pem = read(&config.public_key_path)?;

        Ok(Self::new(
            config.algorithm,
            &private_pem,
            &public_pem,
            config.issuer.clone(),
            config.audience.clone(),
        )?
        .with_leeway(config.leeway_secs))
    }

    /// Tolerance, in seconds, applied to the expiry check.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.validation.leeway = leeway_secs;
        self
    }

    /// Signs `claims` merged with `iat`, `exp`, `iss`, `aud` and a fresh `jti`.
    ///
    /// `claims` must serialize to a JSON object. Registered claims of the same name
    /// supplied by the caller are overwritten.
    pub fn encode<T: Serialize>(
        &self,
        claims: &T,
        lifetime: chrono::Duration,
    ) -> Result<String, AppError> {
        let mut payload: Map<String, Value> = match serde_json::to_value(claims) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(AppError::InternalServerError(format!(
                    "Token claims must be a JSON object, got {}",
                    other
                )))
            }
            Err(e) => {
                return Err(AppError::InternalServerError(format!(
                    "Failed to serialize token claims: {}",
                    e
                )))
            }
        };

        let now = Utc::now();
        payload.insert("iat".into(), json!(now.timestamp()));
        payload.insert("exp".into(), json!((now + lifetime).timestamp()));
        payload.insert("iss".into(), json!(self.issuer));
        payload.insert("aud".into(), json!(self.audience));
        payload.insert("jti".into(), json!(Uuid::new_v4().to_string()));

        encode(&Header::new(self.algorithm), &payload, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies signature, expiry, issuer and audience, then deserializes the claims.
    /// Every failure is `AppError::InvalidToken`.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, AppError> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AppError::from)
    }

    pub fn issue(
        &self,
        subject: &TokenSubject,
        lifetime: chrono::Duration,
    ) -> Result<String, AppError> {
        self.encode(subject, lifetime)
    }

    /// Decodes a token and insists on its `type` claim.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let claims: Claims = self.decode(token)?;
        if claims.token_type != expected {
            return Err(AppError::InvalidToken(format!(
                "expected {} token, got {}",
                expected, claims.token_type
            )));
        }
        Ok(claims)
    }
}
