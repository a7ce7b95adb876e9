//! Service-account credentials for the Android Publisher API.
//!
//! A service-account key is read from an environment variable, turned into a
//! signed JWT assertion scoped to the publisher API, and exchanged at the
//! key's token endpoint for a short-lived bearer token.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::*;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use crate::error::{PublishError, Result};

/// Token endpoint used when the key does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SERVICE_ACCOUNT_TYPE: &str = "service_account";
/// Lifetime requested for the signed assertion. Google caps this at an hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Deserialize)]
struct RawServiceAccountKey {
    #[serde(rename = "type")]
    key_type: Option<String>,
    project_id: Option<String>,
    private_key_id: Option<String>,
    private_key: Option<String>,
    client_email: Option<String>,
    token_uri: Option<String>,
}

/// The parts of a service-account JSON key needed to mint access tokens.
#[derive(Debug, Clone)]
pub struct ServiceAccountKey {
    pub project_id: Option<String>,
    pub private_key_id: Option<String>,
    pub private_key: SecretString,
    pub client_email: String,
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Load the key from the named environment variable. Nothing touches the
    /// network here, so a missing or malformed key fails the run up front.
    pub fn from_env(var: &str) -> Result<Self> {
        Self::from_env_value(var, env::var(var))
    }

    fn from_env_value(
        var: &str,
        value: std::result::Result<String, env::VarError>,
    ) -> Result<Self> {
        match value {
            Ok(content) => Self::from_json(&content),
            Err(env::VarError::NotPresent) => {
                Err(PublishError::MissingCredentials(var.to_string()))
            }
            Err(env::VarError::NotUnicode(_)) => {
                Err(PublishError::invalid_credentials(format!(
                    "env var {var} is not valid unicode"
                )))
            }
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawServiceAccountKey = serde_json::from_str(content)
            .map_err(|e| {
                PublishError::invalid_credentials(format!(
                    "service account key is not valid JSON: {e}"
                ))
            })?;

        if let Some(key_type) = raw.key_type.as_deref()
            && key_type != SERVICE_ACCOUNT_TYPE
        {
            return Err(PublishError::invalid_credentials(format!(
                "expected key type {SERVICE_ACCOUNT_TYPE}, got {key_type}"
            )));
        }

        let client_email = raw
            .client_email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| {
                PublishError::invalid_credentials("missing client_email")
            })?;

        let private_key = raw
            .private_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                PublishError::invalid_credentials("missing private_key")
            })?;

        Ok(Self {
            project_id: raw.project_id,
            private_key_id: raw.private_key_id,
            private_key: SecretString::from(private_key),
            client_email,
            token_uri: raw.token_uri,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Bearer token attached to every publisher API request.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Credentials scoped to a fixed set of OAuth scopes.
pub struct ServiceAccountCredentials {
    client_email: String,
    key_id: Option<String>,
    scopes: Vec<String>,
    token_uri: Url,
    encoding_key: EncodingKey,
}

impl ServiceAccountCredentials {
    /// Fails when the private key is not a usable RSA PEM key.
    pub fn new(
        key: ServiceAccountKey,
        scopes: Vec<String>,
        token_uri_override: Option<Url>,
    ) -> Result<Self> {
        let pem = key.private_key.expose_secret().as_bytes();
        let encoding_key = EncodingKey::from_rsa_pem(pem).map_err(|e| {
            PublishError::invalid_credentials(format!(
                "private_key is not a valid RSA key: {e}"
            ))
        })?;

        let token_uri = match token_uri_override {
            Some(url) => url,
            None => {
                let raw =
                    key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
                Url::parse(raw).map_err(|e| {
                    PublishError::invalid_credentials(format!(
                        "invalid token_uri {raw}: {e}"
                    ))
                })?
            }
        };

        debug!(
            "using service account {} for project {:?}",
            key.client_email, key.project_id
        );

        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            scopes,
            token_uri,
            encoding_key,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn token_uri(&self) -> &Url {
        &self.token_uri
    }

    pub(crate) fn claims(&self, now: DateTime<Utc>) -> AssertionClaims {
        AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_uri.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        }
    }

    /// Signed RS256 JWT asserting this service account's identity.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        let claims = self.claims(now);
        let jwt = jsonwebtoken::encode(&header, &claims, &self.encoding_key)?;
        Ok(jwt)
    }

    /// Exchange a fresh assertion for an access token.
    pub async fn fetch_token(&self, client: &Client) -> Result<AccessToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        debug!("requesting access token from {}", self.token_uri);

        let response = client
            .post(self.token_uri.clone())
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::AuthenticationError(format!(
                "token request rejected ({status}): {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;

        Ok(AccessToken {
            token: SecretString::from(token.access_token),
            expires_at: token
                .expires_in
                .map(|secs| now + Duration::seconds(secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    const PRIVATE_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/service_account_key.pem"
    ));
    const PUBLIC_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/service_account_key.pub.pem"
    ));
    const TEST_ENV_VAR: &str = "PLAY_PUBLISH_TEST_SERVICE_ACCOUNT";

    fn key_json() -> String {
        serde_json::json!({
            "type": "service_account",
            "project_id": "test-project",
            "private_key_id": "key-1",
            "private_key": PRIVATE_KEY,
            "client_email": "publisher@test-project.iam.gserviceaccount.com",
            "token_uri": "https://oauth2.example.com/token"
        })
        .to_string()
    }

    #[test]
    fn loads_key_from_env_value() {
        let key =
            ServiceAccountKey::from_env_value(TEST_ENV_VAR, Ok(key_json()))
                .unwrap();

        assert_eq!(
            key.client_email,
            "publisher@test-project.iam.gserviceaccount.com"
        );
        assert_eq!(key.project_id.as_deref(), Some("test-project"));
        assert_eq!(key.private_key_id.as_deref(), Some("key-1"));
        assert_eq!(key.private_key.expose_secret(), PRIVATE_KEY);
    }

    #[test]
    fn missing_env_var_is_missing_credentials() {
        let result = ServiceAccountKey::from_env_value(
            TEST_ENV_VAR,
            Err(env::VarError::NotPresent),
        );
        assert!(matches!(
            result,
            Err(PublishError::MissingCredentials(var)) if var == TEST_ENV_VAR
        ));

        // never set by anything
        let result = ServiceAccountKey::from_env(
            "PLAY_PUBLISH_CREDENTIALS_TEST_UNSET_VAR",
        );
        assert!(matches!(result, Err(PublishError::MissingCredentials(_))));
    }

    #[test]
    fn malformed_json_is_invalid_credentials() {
        let result = ServiceAccountKey::from_env_value(
            TEST_ENV_VAR,
            Ok("{not json".to_string()),
        );
        assert!(matches!(result, Err(PublishError::InvalidCredentials(_))));
    }

    #[test]
    fn rejects_wrong_key_type() {
        let json = serde_json::json!({
            "type": "authorized_user",
            "private_key": PRIVATE_KEY,
            "client_email": "someone@example.com"
        })
        .to_string();

        let result = ServiceAccountKey::from_json(&json);
        assert!(matches!(result, Err(PublishError::InvalidCredentials(_))));
    }

    #[test]
    fn rejects_missing_client_email() {
        let json = serde_json::json!({ "private_key": PRIVATE_KEY }).to_string();
        let result = ServiceAccountKey::from_json(&json);
        assert!(matches!(result, Err(PublishError::InvalidCredentials(_))));
    }

    #[test]
    fn rejects_private_key_that_is_not_rsa_pem() {
        let json = serde_json::json!({
            "private_key": "not a key",
            "client_email": "someone@example.com"
        })
        .to_string();

        let key = ServiceAccountKey::from_json(&json).unwrap();
        let result = ServiceAccountCredentials::new(key, vec![], None);
        assert!(matches!(result, Err(PublishError::InvalidCredentials(_))));
    }

    #[test]
    fn token_uri_falls_back_to_key_then_default() {
        let key = ServiceAccountKey::from_json(&key_json()).unwrap();
        let creds = ServiceAccountCredentials::new(key, vec![], None).unwrap();
        assert_eq!(
            creds.token_uri().as_str(),
            "https://oauth2.example.com/token"
        );

        let mut key = ServiceAccountKey::from_json(&key_json()).unwrap();
        key.token_uri = None;
        let creds = ServiceAccountCredentials::new(key, vec![], None).unwrap();
        assert_eq!(creds.token_uri().as_str(), DEFAULT_TOKEN_URI);

        let key = ServiceAccountKey::from_json(&key_json()).unwrap();
        let override_uri = Url::parse("http://localhost:9000/token").unwrap();
        let creds =
            ServiceAccountCredentials::new(key, vec![], Some(override_uri))
                .unwrap();
        assert_eq!(creds.token_uri().as_str(), "http://localhost:9000/token");
    }

    #[test]
    fn signs_assertion_scoped_to_publisher_api() {
        let key = ServiceAccountKey::from_json(&key_json()).unwrap();
        let creds = ServiceAccountCredentials::new(
            key,
            vec![crate::config::ANDROID_PUBLISHER_SCOPE.to_string()],
            None,
        )
        .unwrap();

        let now = Utc::now();
        let jwt = creds.assertion(now).unwrap();

        let header = jsonwebtoken::decode_header(&jwt).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("key-1"));

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth2.example.com/token"]);

        let decoded = jsonwebtoken::decode::<AssertionClaims>(
            &jwt,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(
            decoded.claims.iss,
            "publisher@test-project.iam.gserviceaccount.com"
        );
        assert_eq!(
            decoded.claims.scope,
            crate::config::ANDROID_PUBLISHER_SCOPE
        );
        assert_eq!(decoded.claims.iat, now.timestamp());
        assert_eq!(
            decoded.claims.exp - decoded.claims.iat,
            ASSERTION_LIFETIME_SECS
        );
    }
}
