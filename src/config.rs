//! Publisher configuration: target package, API endpoints, and credential
//! lookup.
use derive_builder::Builder;
use std::time::Duration;
use url::Url;

use crate::error::{PublishError, Result};

/// Package published when none is given on the command line.
pub const DEFAULT_PACKAGE_NAME: &str = "de.fragdenstaat.scanner";
/// The single OAuth scope requested for the Android Publisher API.
pub const ANDROID_PUBLISHER_SCOPE: &str =
    "https://www.googleapis.com/auth/androidpublisher";
/// Base URL of the Android Publisher API.
pub const DEFAULT_API_URL: &str = "https://androidpublisher.googleapis.com";
/// Environment variable holding the service-account JSON key.
pub const DEFAULT_CREDENTIALS_ENV: &str = "GOOGLE_SERVICE_ACCOUNT";
/// Track used by the library entry point when none is given.
pub const DEFAULT_TRACK: &str = "internal";
/// Release status used by the library entry point when none is given.
pub const DEFAULT_STATUS: &str = "completed";
/// Connect and read timeout for every API call, and the overall bound for
/// the JSON calls. Bundle uploads have no overall bound.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Builder)]
#[builder(setter(into), build_fn(private, name = "_build"))]
pub struct PublisherConfigParams {
    #[builder(default = "DEFAULT_PACKAGE_NAME.to_string()")]
    pub package_name: String,
    #[builder(default = "DEFAULT_API_URL.to_string()")]
    pub api_url: String,
    /// Overrides the token endpoint named in the service-account key.
    #[builder(default)]
    pub token_uri: Option<String>,
    #[builder(default = "vec![ANDROID_PUBLISHER_SCOPE.to_string()]")]
    pub scopes: Vec<String>,
    #[builder(default = "Duration::from_secs(DEFAULT_TIMEOUT_SECS)")]
    pub timeout: Duration,
    #[builder(default = "DEFAULT_CREDENTIALS_ENV.to_string()")]
    pub credentials_env: String,
    #[builder(default)]
    pub discard_on_failure: bool,
}

impl PublisherConfigParamsBuilder {
    pub fn build(&self) -> Result<PublisherConfig> {
        let params = self._build().map_err(|e| {
            PublishError::invalid_config(format!(
                "Failed to build publisher config: {}",
                e
            ))
        })?;
        PublisherConfig::new(params)
    }
}

/// Resolved configuration shared by the credential loader, the Play API
/// client, and the uploader.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub package_name: String,
    /// Always ends with a slash so relative API paths join beneath it.
    pub api_url: Url,
    pub token_uri: Option<Url>,
    pub scopes: Vec<String>,
    pub timeout: Duration,
    pub credentials_env: String,
    pub discard_on_failure: bool,
}

impl PublisherConfig {
    pub fn builder() -> PublisherConfigParamsBuilder {
        PublisherConfigParamsBuilder::default()
    }

    pub fn new(params: PublisherConfigParams) -> Result<Self> {
        let package_name = params.package_name.trim().to_string();

        if package_name.is_empty() {
            return Err(PublishError::invalid_config(
                "package name must not be empty",
            ));
        }

        if package_name.contains('/') {
            return Err(PublishError::invalid_config(format!(
                "invalid package name: {package_name}"
            )));
        }

        if params.scopes.is_empty() {
            return Err(PublishError::invalid_config(
                "at least one authorization scope is required",
            ));
        }

        if params.timeout.is_zero() {
            return Err(PublishError::invalid_config(
                "request timeout must be greater than zero",
            ));
        }

        let mut api_url = parse_http_url(&params.api_url)?;

        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        let token_uri = params
            .token_uri
            .as_deref()
            .map(parse_http_url)
            .transpose()?;

        Ok(Self {
            package_name,
            api_url,
            token_uri,
            scopes: params.scopes,
            timeout: params.timeout,
            credentials_env: params.credentials_env,
            discard_on_failure: params.discard_on_failure,
        })
    }
}

/// Parse a URL and require an http or https scheme.
fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PublishError::invalid_config(format!(
            "only http and https schemes are supported, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let config = PublisherConfig::builder().build().unwrap();

        assert_eq!(config.package_name, DEFAULT_PACKAGE_NAME);
        assert_eq!(
            config.api_url.as_str(),
            "https://androidpublisher.googleapis.com/"
        );
        assert_eq!(config.scopes, vec![ANDROID_PUBLISHER_SCOPE.to_string()]);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.credentials_env, DEFAULT_CREDENTIALS_ENV);
        assert!(config.token_uri.is_none());
        assert!(!config.discard_on_failure);
    }

    #[test]
    fn appends_trailing_slash_to_api_url() {
        let config = PublisherConfig::builder()
            .api_url("http://localhost:8080/mock")
            .build()
            .unwrap();

        assert_eq!(config.api_url.as_str(), "http://localhost:8080/mock/");
    }

    #[test]
    fn rejects_empty_package_name() {
        let result = PublisherConfig::builder().package_name("  ").build();
        assert!(matches!(result, Err(PublishError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_non_http_api_url() {
        let result = PublisherConfig::builder()
            .api_url("ftp://example.com")
            .build();
        assert!(matches!(result, Err(PublishError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let result = PublisherConfig::builder()
            .timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(PublishError::InvalidConfig(_))));
    }

    #[test]
    fn parses_token_uri_override() {
        let config = PublisherConfig::builder()
            .token_uri(Some("http://localhost:9000/token".to_string()))
            .build()
            .unwrap();

        assert_eq!(
            config.token_uri.unwrap().as_str(),
            "http://localhost:9000/token"
        );
    }
}
